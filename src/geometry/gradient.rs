use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Point, Rgba8};

/// Background gradient orientation. Unknown names read as [`GradientDirection::ToBottom`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GradientDirection {
    ToRight,
    ToBottom,
    ToBottomRight,
    ToBottomLeft,
    /// Radial, centered on the canvas.
    Circle,
}

impl GradientDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToRight => "to right",
            Self::ToBottom => "to bottom",
            Self::ToBottomRight => "to bottom right",
            Self::ToBottomLeft => "to bottom left",
            Self::Circle => "circle",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "to right" => Self::ToRight,
            "to bottom right" => Self::ToBottomRight,
            "to bottom left" => Self::ToBottomLeft,
            "circle" => Self::Circle,
            _ => Self::ToBottom,
        }
    }
}

impl From<String> for GradientDirection {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<GradientDirection> for String {
    fn from(d: GradientDirection) -> Self {
        d.as_str().to_owned()
    }
}

impl fmt::Display for GradientDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gradient geometry in canvas pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradientGeometry {
    Linear { start: Point, end: Point },
    Radial { center: Point, radius: f64 },
}

pub fn gradient_geometry(direction: GradientDirection, width: f64, height: f64) -> GradientGeometry {
    let (w, h) = (width, height);
    match direction {
        GradientDirection::ToRight => GradientGeometry::Linear {
            start: Point::new(0.0, 0.0),
            end: Point::new(w, 0.0),
        },
        GradientDirection::ToBottom => GradientGeometry::Linear {
            start: Point::new(0.0, 0.0),
            end: Point::new(0.0, h),
        },
        GradientDirection::ToBottomRight => GradientGeometry::Linear {
            start: Point::new(0.0, 0.0),
            end: Point::new(w, h),
        },
        GradientDirection::ToBottomLeft => GradientGeometry::Linear {
            start: Point::new(w, 0.0),
            end: Point::new(0.0, h),
        },
        GradientDirection::Circle => GradientGeometry::Radial {
            center: Point::new(w / 2.0, h / 2.0),
            radius: w / 2.0,
        },
    }
}

impl GradientGeometry {
    /// Gradient parameter in `[0, 1]` at `p`; outside the ramp the end stops are padded.
    pub fn t_at(&self, p: Point) -> f64 {
        let t = match *self {
            Self::Linear { start, end } => {
                let d = end - start;
                let len2 = d.hypot2();
                if len2 <= f64::EPSILON {
                    0.0
                } else {
                    (p - start).dot(d) / len2
                }
            }
            Self::Radial { center, radius } => {
                if radius <= f64::EPSILON {
                    1.0
                } else {
                    (p - center).hypot() / radius
                }
            }
        };
        t.clamp(0.0, 1.0)
    }
}

/// Rasterize a two-stop gradient into premultiplied RGBA8, sampling at pixel centers.
///
/// Interpolation happens in premultiplied space.
pub fn rasterize_gradient(
    geometry: GradientGeometry,
    from: Rgba8,
    to: Rgba8,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let start = from.premultiplied().to_array();
    let end = to.premultiplied().to_array();
    let mut bytes = vec![0u8; (width as usize).saturating_mul(height as usize).saturating_mul(4)];
    for y in 0..height {
        for x in 0..width {
            let t = geometry.t_at(Point::new(x as f64 + 0.5, y as f64 + 0.5)) as f32;
            let lerp = |a: u8, b: u8| -> u8 {
                let af = a as f32;
                let bf = b as f32;
                (af + (bf - af) * t).round().clamp(0.0, 255.0) as u8
            };
            let idx = ((y as usize) * (width as usize) + (x as usize)) * 4;
            bytes[idx] = lerp(start[0], end[0]);
            bytes[idx + 1] = lerp(start[1], end[1]);
            bytes[idx + 2] = lerp(start[2], end[2]);
            bytes[idx + 3] = lerp(start[3], end[3]);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_endpoints_follow_direction() {
        let g = gradient_geometry(GradientDirection::ToBottomLeft, 100.0, 50.0);
        assert_eq!(
            g,
            GradientGeometry::Linear {
                start: Point::new(100.0, 0.0),
                end: Point::new(0.0, 50.0),
            }
        );
        let g = gradient_geometry(GradientDirection::ToRight, 100.0, 50.0);
        assert_eq!(g.t_at(Point::new(0.0, 30.0)), 0.0);
        assert_eq!(g.t_at(Point::new(50.0, 0.0)), 0.5);
        assert_eq!(g.t_at(Point::new(500.0, 0.0)), 1.0);
    }

    #[test]
    fn radial_uses_half_width_radius() {
        let g = gradient_geometry(GradientDirection::Circle, 200.0, 400.0);
        assert_eq!(
            g,
            GradientGeometry::Radial {
                center: Point::new(100.0, 200.0),
                radius: 100.0,
            }
        );
        assert_eq!(g.t_at(Point::new(100.0, 250.0)), 0.5);
        assert_eq!(g.t_at(Point::new(100.0, 0.0)), 1.0);
    }

    #[test]
    fn unknown_direction_reads_as_to_bottom() {
        let d: GradientDirection = serde_json::from_str("\"diagonal\"").unwrap();
        assert_eq!(d, GradientDirection::ToBottom);
        let d: GradientDirection = serde_json::from_str("\"to bottom right\"").unwrap();
        assert_eq!(d, GradientDirection::ToBottomRight);
        assert_eq!(
            serde_json::to_string(&GradientDirection::Circle).unwrap(),
            "\"circle\""
        );
    }

    #[test]
    fn rasterized_ramp_runs_from_first_to_second_stop() {
        let g = gradient_geometry(GradientDirection::ToRight, 4.0, 1.0);
        let px = rasterize_gradient(g, Rgba8::BLACK, Rgba8::WHITE, 4, 1);
        assert_eq!(px.len(), 16);
        let reds: Vec<u8> = px.chunks_exact(4).map(|p| p[0]).collect();
        assert!(reds.windows(2).all(|w| w[0] < w[1]));
        assert!(px.chunks_exact(4).all(|p| p[3] == 255));
    }
}
