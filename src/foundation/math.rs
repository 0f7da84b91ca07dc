pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Convert straight RGBA8 into premultiplied RGBA8 in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

/// Convert premultiplied RGBA8 back into straight RGBA8 in place.
pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_endpoints() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(0, 255), 0);
        assert_eq!(mul_div255_u8(128, 255), 128);
    }

    #[test]
    fn premultiply_then_unpremultiply_is_close() {
        let mut px = vec![100u8, 50, 200, 128, 9, 9, 9, 0];
        premultiply_rgba8_in_place(&mut px);
        assert_eq!(&px[..4], &[50, 25, 100, 128]);
        assert_eq!(&px[4..], &[0, 0, 0, 0]);

        unpremultiply_rgba8_in_place(&mut px);
        assert!((i32::from(px[0]) - 100).abs() <= 1);
        assert!((i32::from(px[1]) - 50).abs() <= 1);
        assert!((i32::from(px[2]) - 200).abs() <= 1);
    }
}
