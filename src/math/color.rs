use glam::Vec3;

/// HSV to linear RGB; `hue` wraps at 1.0
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let channel = |n: f32| {
        let k = (n + hue.rem_euclid(1.0) * 6.0) % 6.0;
        value - value * saturation * k.min(4.0 - k).clamp(0.0, 1.0)
    };
    [channel(5.0), channel(3.0), channel(1.0)]
}

/// Linear radiance to an opaque 8-bit pixel, gamma 2.2
pub fn to_rgba8(color: Vec3) -> [u8; 4] {
    let encode = |c: f32| (c.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0 + 0.5) as u8;
    [encode(color.x), encode(color.y), encode(color.z), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn primary_hues() {
        assert!(close(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), [0.0, 1.0, 0.0]));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), [0.0, 0.0, 1.0]));
        assert!(close(hsv_to_rgb(1.0, 1.0, 1.0), [1.0, 0.0, 0.0]));
    }

    #[test]
    fn zero_saturation_is_grey() {
        assert!(close(hsv_to_rgb(0.42, 0.0, 0.5), [0.5, 0.5, 0.5]));
    }

    #[test]
    fn to_rgba8_clamps_and_is_opaque() {
        assert_eq!(to_rgba8(Vec3::ZERO), [0, 0, 0, 255]);
        assert_eq!(to_rgba8(Vec3::splat(4.0)), [255, 255, 255, 255]);
        let mid = to_rgba8(Vec3::splat(0.5));
        assert!(mid[0] > 128, "gamma brightens mid tones");
    }
}
