//! Image transform engine.
//!
//! Operations run in a fixed order regardless of how an `ImageSpec` lists them:
//! rotate, brightness, contrast, colour, noise, blur, micro-resize, then
//! JPEG re-encode at a randomized quality and a fresh EXIF stamp.

mod engine;
pub mod ops;

pub use engine::{Deadline, ImageEngine, ImageOutput};
