// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// 4 channels × u8 in → same layout out, written into a caller-provided buffer.
// The scaler never looks at channel meaning, so BGRA and RGBA go through unchanged.

use fast_image_resize as fir;
use fir::images::{TypedCroppedImageMut, TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::plan::{AspectMode, ScalePlan, Size};

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("output buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    #[error("input buffer too small: need {needed} bytes, got {got}")]
    InputTooSmall { needed: usize, got: usize },
    #[error("stride mismatch but no staging buffer provided")]
    StrideMismatchAndNoStaging,
    #[error("fast image resize error: {0}")]
    Fir(#[from] fir::ResizeError),
    #[error("image buffer error: {0}")]
    ImageBuf(#[from] fir::ImageBufferError),
    #[error("crop error: {0}")]
    Crop(#[from] fir::CropBoxError),
}

/// Pre-allocated scratch to compact strided input to tightly packed rows (only if needed).
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}

impl Staging {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }
    pub fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Main scaling entry point.
/// `src_stride_bytes`: bytes per row of source. If `Some(stride) != width*4`, rows are compacted into staging.
/// `dst` must hold at least `plan.out_len()` bytes.
pub fn scale_cpu(
    resizer: &mut Resizer,
    src_px: &[u8],
    src: Size,
    src_stride_bytes: Option<usize>,
    plan: &ScalePlan,
    dst: &mut [u8],
    mut staging: Option<&mut Staging>,
) -> Result<(), ScaleError> {
    let dst_len = plan.out_len();
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall {
            needed: dst_len,
            got: dst.len(),
        });
    }

    let tight_row_bytes = (src.w as usize) * 4;
    let pitch = src_stride_bytes.unwrap_or(tight_row_bytes);
    let needed = pitch * (src.h as usize).saturating_sub(1) + tight_row_bytes;
    if src_px.len() < needed {
        return Err(ScaleError::InputTooSmall {
            needed,
            got: src_px.len(),
        });
    }

    // --- Build source view (tightly packed) ---
    let packed: &[u8] = if pitch == tight_row_bytes {
        &src_px[..tight_row_bytes * src.h as usize]
    } else {
        let st = staging
            .as_deref_mut()
            .ok_or(ScaleError::StrideMismatchAndNoStaging)?;
        st.ensure_len(tight_row_bytes * (src.h as usize));
        compact_rows(
            src_px,
            pitch,
            st.buf.as_mut_slice(),
            tight_row_bytes,
            src.h as usize,
        );
        &st.buf[..tight_row_bytes * src.h as usize]
    };

    if plan.is_identity() {
        dst[..dst_len].copy_from_slice(packed);
        return Ok(());
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, packed)?;

    // Letterbox bars must be painted before the typed view borrows dst.
    if let (AspectMode::Letterbox { bg }, Some(_)) = (plan.aspect, plan.dst_roi) {
        fill_px(&mut dst[..dst_len], bg);
    }
    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    let mut dst_view_any = if let Some((x, y, w, h)) = plan.dst_roi {
        let cropped = TypedCroppedImageMut::from_ref(&mut dst_image, x, y, w, h)?;
        CroppedOrFull::Cropped(cropped)
    } else {
        CroppedOrFull::Full(dst_image)
    };

    let opts = ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
        .use_alpha(false);

    match &mut dst_view_any {
        CroppedOrFull::Full(full) => resizer.resize_typed::<U8x4>(&src_view, full, &opts)?,
        CroppedOrFull::Cropped(roi) => resizer.resize_typed::<U8x4>(&src_view, roi, &opts)?,
    }

    Ok(())
}

enum CroppedOrFull<'a> {
    Full(TypedImage<'a, U8x4>),
    Cropped(TypedCroppedImageMut<'a, TypedImage<'a, U8x4>>),
}

#[inline]
fn fill_px(dst: &mut [u8], bg: [u8; 4]) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes..(r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{build_plan, FitMode};

    // Fixed-point convolution may be off by one on flat input.
    fn close(px: &[u8], want: [u8; 4]) -> bool {
        px.iter().zip(want).all(|(&a, b)| a.abs_diff(b) <= 1)
    }

    fn solid(size: Size, px: [u8; 4]) -> Vec<u8> {
        let mut v = vec![0u8; size.rgba_len()];
        fill_px(&mut v, px);
        v
    }

    #[test]
    fn stretch_downscale_keeps_uniform_colour() {
        let input = Size::new(16, 8);
        let src = solid(input, [10, 20, 30, 255]);
        let plan = build_plan(input, Size::new(4, 6), AspectMode::Stretch);
        let mut out = vec![0u8; plan.out_len()];
        scale_cpu(&mut Resizer::new(), &src, input, None, &plan, &mut out, None).unwrap();
        assert!(out.chunks_exact(4).all(|p| close(p, [10, 20, 30, 255])));
    }

    #[test]
    fn letterbox_paints_bars() {
        let input = Size::new(8, 2);
        let src = solid(input, [200, 200, 200, 255]);
        let plan = build_plan(input, Size::new(8, 8), FitMode::Letterbox.to_aspect());
        let mut out = vec![7u8; plan.out_len()];
        scale_cpu(&mut Resizer::new(), &src, input, None, &plan, &mut out, None).unwrap();
        // First row is a bar, a middle row is content.
        assert_eq!(&out[0..4], &[0, 0, 0, 255]);
        let mid = 4 * 8 * 4;
        assert!(close(&out[mid..mid + 4], [200, 200, 200, 255]));
    }

    #[test]
    fn strided_input_requires_staging() {
        let input = Size::new(2, 2);
        let src = vec![1u8; 12 * 2];
        let plan = build_plan(input, Size::new(1, 1), AspectMode::Stretch);
        let mut out = vec![0u8; plan.out_len()];
        let err = scale_cpu(&mut Resizer::new(), &src, input, Some(12), &plan, &mut out, None)
            .unwrap_err();
        assert!(matches!(err, ScaleError::StrideMismatchAndNoStaging));

        let mut staging = Staging::with_capacity(16);
        scale_cpu(
            &mut Resizer::new(),
            &src,
            input,
            Some(12),
            &plan,
            &mut out,
            Some(&mut staging),
        )
        .unwrap();
        assert!(close(&out, [1, 1, 1, 1]));
    }

    #[test]
    fn identity_plan_copies() {
        let input = Size::new(3, 1);
        let src: Vec<u8> = (0..12).collect();
        let plan = build_plan(input, input, AspectMode::Stretch);
        let mut out = vec![0u8; 12];
        scale_cpu(&mut Resizer::new(), &src, input, None, &plan, &mut out, None).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn short_output_is_rejected() {
        let input = Size::new(2, 2);
        let src = vec![0u8; 16];
        let plan = build_plan(input, Size::new(4, 4), AspectMode::Stretch);
        let mut out = vec![0u8; 8];
        assert!(matches!(
            scale_cpu(&mut Resizer::new(), &src, input, None, &plan, &mut out, None),
            Err(ScaleError::BufferTooSmall { .. })
        ));
    }
}
