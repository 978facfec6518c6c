//! Image primitives for differential photometry.
//!
//! Everything here operates on a single frame: statistics, the pixel
//! coordinate conventions, centroiding, source detection and aperture
//! photometry. Frame-to-frame state lives in the `fieldtrack` crate.

pub mod algo;
pub mod coords;
pub mod image_proc;
pub mod image_size;

pub use coords::{to_array_coords, to_centroid_coords, PIXEL_CENTER_OFFSET};
pub use image_size::ImageSize;
