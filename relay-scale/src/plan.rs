// SPDX-License-Identifier: MIT
//! # Scale plan computation
//!
//! A [`ScalePlan`] fixes the output canvas (always the requested size) and,
//! for letterboxing, the sub-rectangle the scaled image is drawn into.
//! Unlike thumbnailing, plans here upscale freely: a 640×480 camera feeding
//! a 1280×720 virtual device must fill the device.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Byte length of a tightly packed 4-channel buffer of this size.
    pub fn rgba_len(&self) -> usize {
        self.w as usize * self.h as usize * 4
    }
}

/// Defines how aspect ratio differences are handled during scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectMode {
    /// Stretch/squeeze the image to exactly match the canvas.
    Stretch,
    /// Preserve the aspect ratio and pad the remaining canvas with `bg`.
    /// `bg` is written verbatim, so it must already be in the buffer's channel order.
    Letterbox { bg: [u8; 4] },
}

/// How the CLI and form expose [`AspectMode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FitMode {
    /// Stretch to the configured size (ignores the source aspect ratio)
    #[default]
    Stretch,
    /// Keep the source aspect ratio, pad with black bars
    Letterbox,
}

impl FitMode {
    pub fn to_aspect(self) -> AspectMode {
        match self {
            FitMode::Stretch => AspectMode::Stretch,
            FitMode::Letterbox => AspectMode::Letterbox {
                bg: [0, 0, 0, 255],
            },
        }
    }
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Aspect ratio handling strategy
    pub aspect: AspectMode,
    /// Output canvas; always the requested size
    pub out: Size,
    /// Where scaled content is placed when letterboxing: (x, y, width, height).
    pub dst_roi: Option<(u32, u32, u32, u32)>,
}

impl ScalePlan {
    /// Byte length the destination buffer must have.
    pub fn out_len(&self) -> usize {
        self.out.rgba_len()
    }

    /// True when scaling would be a plain copy.
    pub fn is_identity(&self) -> bool {
        self.input == self.out && self.dst_roi.is_none()
    }
}

/// Compute the plan that maps `input` onto a canvas of exactly `out`.
pub fn build_plan(input: Size, out: Size, aspect: AspectMode) -> ScalePlan {
    match aspect {
        AspectMode::Stretch => ScalePlan {
            input,
            aspect,
            out,
            dst_roi: None,
        },
        AspectMode::Letterbox { .. } => {
            let (rw, rh) = fit_within(input, out);
            if (rw, rh) == (out.w, out.h) {
                return ScalePlan {
                    input,
                    aspect,
                    out,
                    dst_roi: None,
                };
            }
            let x = (out.w - rw) / 2;
            let y = (out.h - rh) / 2;
            ScalePlan {
                input,
                aspect,
                out,
                dst_roi: Some((x, y, rw, rh)),
            }
        }
    }
}

/// Largest size with the input's aspect ratio that fits inside `box_`.
/// Scales up as well as down; never returns a zero side.
fn fit_within(input: Size, box_: Size) -> (u32, u32) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let (bw, bh) = (box_.w as f64, box_.h as f64);
    let s = (bw / w).min(bh / h);
    (
        ((w * s).round() as u32).clamp(1, box_.w.max(1)),
        ((h * s).round() as u32).clamp(1, box_.h.max(1)),
    )
}
