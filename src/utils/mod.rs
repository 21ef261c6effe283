//! Utility Module
//!
//! - [`time`]: frame timing for the [`FrameDriver`](crate::app::FrameDriver)

pub mod time;

pub use time::Timer;
