//! CSS color strings as they appear in panel settings.

use crate::foundation::core::Rgba8;
use crate::foundation::error::{StoreshotError, StoreshotResult};

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`, `hsl()`, `hsla()` or a
/// common color keyword.
pub fn parse_css_color(s: &str) -> StoreshotResult<Rgba8> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if let Some(args) = functional_args(&lower, "rgba").or_else(|| functional_args(&lower, "rgb"))
    {
        return parse_rgb_args(&args);
    }
    if let Some(args) = functional_args(&lower, "hsla").or_else(|| functional_args(&lower, "hsl"))
    {
        return parse_hsl_args(&args);
    }
    named(&lower).ok_or_else(|| StoreshotError::validation(format!("unsupported color \"{s}\"")))
}

/// Like [`parse_css_color`], but falls back to `fallback` and logs instead of failing.
pub fn css_color_or(s: &str, fallback: Rgba8) -> Rgba8 {
    match parse_css_color(s) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(color = s, error = %e, "falling back to default color");
            fallback
        }
    }
}

fn functional_args(s: &str, name: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix(name)?.trim_start().strip_prefix('(')?;
    let inner = inner.trim_end().strip_suffix(')')?;
    Some(
        inner
            .split([',', '/', ' '])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

fn parse_hex(hex: &str) -> StoreshotResult<Rgba8> {
    fn nibble(c: u8) -> Option<u8> {
        (c as char).to_digit(16).map(|d| d as u8)
    }

    let b = hex.as_bytes();
    let digits: Option<Vec<u8>> = b.iter().map(|&c| nibble(c)).collect();
    let Some(d) = digits else {
        return Err(StoreshotError::validation(format!(
            "invalid hex color \"#{hex}\""
        )));
    };
    let c = match d.len() {
        3 => Rgba8::opaque(d[0] * 17, d[1] * 17, d[2] * 17),
        4 => Rgba8::new(d[0] * 17, d[1] * 17, d[2] * 17, d[3] * 17),
        6 => Rgba8::opaque(d[0] << 4 | d[1], d[2] << 4 | d[3], d[4] << 4 | d[5]),
        8 => Rgba8::new(
            d[0] << 4 | d[1],
            d[2] << 4 | d[3],
            d[4] << 4 | d[5],
            d[6] << 4 | d[7],
        ),
        _ => {
            return Err(StoreshotError::validation(
                "hex color must be #rgb, #rgba, #rrggbb or #rrggbbaa",
            ));
        }
    };
    Ok(c)
}

fn parse_channel(s: &str) -> StoreshotResult<u8> {
    let v = if let Some(p) = s.strip_suffix('%') {
        parse_f64(p)? / 100.0 * 255.0
    } else {
        parse_f64(s)?
    };
    Ok(v.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(s: &str) -> StoreshotResult<u8> {
    let v = if let Some(p) = s.strip_suffix('%') {
        parse_f64(p)? / 100.0
    } else {
        parse_f64(s)?
    };
    Ok((v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn parse_f64(s: &str) -> StoreshotResult<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StoreshotError::validation(format!("invalid color component \"{s}\"")))
}

fn parse_rgb_args(args: &[String]) -> StoreshotResult<Rgba8> {
    match args {
        [r, g, b] => Ok(Rgba8::opaque(
            parse_channel(r)?,
            parse_channel(g)?,
            parse_channel(b)?,
        )),
        [r, g, b, a] => Ok(Rgba8::new(
            parse_channel(r)?,
            parse_channel(g)?,
            parse_channel(b)?,
            parse_alpha(a)?,
        )),
        _ => Err(StoreshotError::validation(
            "rgb()/rgba() takes 3 or 4 components",
        )),
    }
}

fn parse_hsl_args(args: &[String]) -> StoreshotResult<Rgba8> {
    let (h, s, l, a) = match args {
        [h, s, l] => (h, s, l, None),
        [h, s, l, a] => (h, s, l, Some(a)),
        _ => {
            return Err(StoreshotError::validation(
                "hsl()/hsla() takes 3 or 4 components",
            ));
        }
    };
    let h = parse_f64(h.trim_end_matches("deg"))?;
    let pct = |v: &String| -> StoreshotResult<f64> { Ok(parse_f64(v.trim_end_matches('%'))? / 100.0) };
    let (r, g, b) = hsl_to_rgb(h, pct(s)?, pct(l)?);
    let to_u8 = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = match a {
        Some(a) => parse_alpha(a)?,
        None => 255,
    };
    Ok(Rgba8::new(to_u8(r), to_u8(g), to_u8(b), alpha))
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    let h = (h % 360.0 + 360.0) % 360.0 / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        return (l, l, l);
    }

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn named(s: &str) -> Option<Rgba8> {
    let c = match s {
        "white" => Rgba8::WHITE,
        "black" => Rgba8::BLACK,
        "transparent" => Rgba8::new(0, 0, 0, 0),
        "red" => Rgba8::opaque(255, 0, 0),
        "green" => Rgba8::opaque(0, 128, 0),
        "blue" => Rgba8::opaque(0, 0, 255),
        "yellow" => Rgba8::opaque(255, 255, 0),
        "orange" => Rgba8::opaque(255, 165, 0),
        "purple" => Rgba8::opaque(128, 0, 128),
        "gray" | "grey" => Rgba8::opaque(128, 128, 128),
        "silver" => Rgba8::opaque(192, 192, 192),
        "gold" => Rgba8::opaque(255, 215, 0),
        _ => return None,
    };
    Some(c)
}
