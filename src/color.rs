use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Gray-scale codes for aggregate rows
// ---------------------------------------------------------------------------

/// Web hex triplet (`#XXXXXX`) for a gray of the given lightness in [0, 1].
pub fn gray_hex(lightness: f32) -> String {
    let hsl = Hsl::new(0.0, 0.0, lightness);
    let rgb: Srgb = hsl.into_color();
    format!(
        "#{:02X}{:02X}{:02X}",
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8
    )
}

/// `k` gray-scale hex codes, increasingly light, linear in lightness from
/// 0.5 to 0.8.  Coarser aggregation levels are assigned the darker codes.
pub fn gray_codes(k: usize) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }
    let (ll, ul) = (0.5_f32, 0.8_f32);
    let delta = (ul - ll) / k as f32;
    (0..k).map(|i| gray_hex(ll + delta * i as f32)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_hex_triplets_and_monotone() {
        let codes = gray_codes(3);
        assert_eq!(codes.len(), 3);
        for c in &codes {
            assert_eq!(c.len(), 7);
            assert!(c.starts_with('#'));
        }
        // Increasingly light means lexicographically increasing gray bytes.
        assert!(codes[0] < codes[1] && codes[1] < codes[2]);
    }

    #[test]
    fn gray_is_achromatic() {
        let c = gray_hex(0.5);
        assert_eq!(&c[1..3], &c[3..5]);
        assert_eq!(&c[3..5], &c[5..7]);
    }
}
