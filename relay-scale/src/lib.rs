// SPDX-License-Identifier: MIT
//! # relay-scale: exact-size frame scaling for virtual camera output
//!
//! Frames pulled from an IP camera rarely match the geometry the virtual
//! camera was registered with. This crate turns any 4-channel 8-bit frame
//! into one of exactly the requested size, and reorders its colour channels
//! for the output device.
//!
//! ## Key Components
//!
//! - [`plan`]: computes the output canvas and the region the scaled image
//!   occupies (stretch or letterbox)
//! - [`cpu`]: SIMD-accelerated scaling through `fast_image_resize`
//! - [`channels`]: fixed channel-order permutations (BGRA ↔ RGBA)
//!
//! ## Usage Example
//!
//! ```rust
//! use relay_scale::cpu::scale_cpu;
//! use relay_scale::plan::{build_plan, AspectMode, Size};
//!
//! let input = Size { w: 4, h: 2 };
//! let src = vec![128u8; 4 * 2 * 4];
//! let plan = build_plan(input, Size { w: 2, h: 2 }, AspectMode::Stretch);
//!
//! let mut resizer = fast_image_resize::Resizer::new();
//! let mut out = vec![0u8; plan.out_len()];
//! scale_cpu(&mut resizer, &src, input, None, &plan, &mut out, None).unwrap();
//! assert_eq!(out.len(), 2 * 2 * 4);
//! ```

pub mod channels;
pub mod cpu;
pub mod plan;
