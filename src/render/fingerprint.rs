use crate::foundation::math::Fnv1a64;
use crate::render::compositor::RenderRequest;

/// 128-bit identity of everything a render reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PanelFingerprint {
    pub hi: u64,
    pub lo: u64,
}

pub fn fingerprint_request(req: &RenderRequest<'_>) -> PanelFingerprint {
    let mut a = Fnv1a64::new_default();
    let mut b = Fnv1a64::new(0x9ae1_6a3b_2f90_404f);

    write_str_pair(&mut a, &mut b, req.device_type.as_str());
    write_str_pair(&mut a, &mut b, req.orientation.as_str());
    write_u64_pair(&mut a, &mut b, u64::from(req.dimensions.width));
    write_u64_pair(&mut a, &mut b, u64::from(req.dimensions.height));
    write_u64_pair(&mut a, &mut b, req.resolution_scale.to_bits());
    write_u64_pair(&mut a, &mut b, req.pixel_density.to_bits());

    match req.screenshot {
        Some(shot) => {
            write_u8_pair(&mut a, &mut b, 1);
            write_str_pair(&mut a, &mut b, &shot.name);
            write_u64_pair(&mut a, &mut b, u64::from(shot.width));
            write_u64_pair(&mut a, &mut b, u64::from(shot.height));
            write_str_pair(&mut a, &mut b, &shot.data_url);
            // Handle-only screenshots are identified by their pixels.
            if shot.data_url.is_empty()
                && let Some(pixels) = shot.display_handle()
            {
                a.write_bytes(&pixels.rgba8_premul);
                b.write_bytes(&pixels.rgba8_premul);
            }
        }
        None => write_u8_pair(&mut a, &mut b, 0),
    }

    match serde_json::to_value(req.setting) {
        Ok(v) => write_json_value_pair(&mut a, &mut b, &v),
        Err(_) => write_u8_pair(&mut a, &mut b, 0xff),
    }

    PanelFingerprint {
        hi: a.finish(),
        lo: b.finish(),
    }
}

fn write_json_value_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: &serde_json::Value) {
    match v {
        serde_json::Value::Null => write_u8_pair(a, b, 0),
        serde_json::Value::Bool(x) => {
            write_u8_pair(a, b, 1);
            write_u8_pair(a, b, u8::from(*x));
        }
        serde_json::Value::Number(n) => {
            write_u8_pair(a, b, 2);
            write_str_pair(a, b, &n.to_string());
        }
        serde_json::Value::String(s) => {
            write_u8_pair(a, b, 3);
            write_str_pair(a, b, s);
        }
        serde_json::Value::Array(items) => {
            write_u8_pair(a, b, 4);
            write_u64_pair(a, b, items.len() as u64);
            for item in items {
                write_json_value_pair(a, b, item);
            }
        }
        serde_json::Value::Object(map) => {
            write_u8_pair(a, b, 5);
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();
            write_u64_pair(a, b, keys.len() as u64);
            for k in keys {
                write_str_pair(a, b, k);
                write_json_value_pair(a, b, &map[k]);
            }
        }
    }
}

fn write_u8_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u8) {
    a.write_u8(v);
    b.write_u8(v);
}

fn write_u64_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u64) {
    a.write_u64(v);
    b.write_u64(v);
}

fn write_str_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, s: &str) {
    a.write_str(s);
    b.write_str(s);
}
