use crate::foundation::error::{VoisyncError, VoisyncResult};
use crate::foundation::math::mul_div255_u8 as mul_div255;

pub type PremulRgba8 = [u8; 4];

/// Source-over of premultiplied `src` onto `dst`, with `src` scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Flatten premultiplied RGBA8 over an opaque background into opaque RGBA8.
pub fn flatten_premul_over_bg(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> VoisyncResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(VoisyncError::validation(
            "flatten_premul_over_bg expects equal-length rgba8 buffers",
        ));
    }

    let bg = [bg_rgba[0], bg_rgba[1], bg_rgba[2], 255];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let out = over(bg, [s[0], s[1], s[2], s[3]], 1.0);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        let src = [255, 255, 255, 0];
        assert_eq!(over(dst, src, 1.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_dst_transparent_returns_scaled_src() {
        let dst = [0, 0, 0, 0];
        let src = [100, 110, 120, 200];
        assert_eq!(over(dst, src, 1.0), src);
        assert_eq!(over(dst, [255, 255, 255, 255], 0.5), [128, 128, 128, 128]);
    }

    #[test]
    fn flatten_alpha_0_returns_bg_and_opaque_is_identity() {
        let src = vec![0u8, 0, 0, 0, 1, 2, 3, 255];
        let mut dst = vec![0u8; 8];
        flatten_premul_over_bg(&mut dst, &src, [10, 20, 30, 255]).unwrap();
        assert_eq!(&dst[..4], &[10, 20, 30, 255]);
        assert_eq!(&dst[4..], &[1, 2, 3, 255]);
    }

    #[test]
    fn flatten_rejects_mismatched_buffers() {
        let mut dst = vec![0u8; 4];
        assert!(flatten_premul_over_bg(&mut dst, &[0u8; 8], [0, 0, 0, 255]).is_err());
    }
}
