//! # Core Infrastructure Module
//!
//! The frame type shared by every stage of the relay and the pacing clock
//! that holds the loop to the configured frame rate.

pub mod frame;
pub mod pacer;

pub use frame::VideoFrame;
pub use pacer::Pacer;
