//! Frame dimensions and bounds checks

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame dimensions in pixels.
///
/// Arrays are indexed `[row, col]`, so `height` is the first axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn of(image: &ArrayView2<f64>) -> Self {
        let (height, width) = image.dim();
        Self { width, height }
    }

    /// True when the square of half-width `half` centered on pixel
    /// `(col, row)` lies entirely inside the frame.
    pub fn contains_square(&self, col: i64, row: i64, half: usize) -> bool {
        let half = half as i64;
        col - half >= 0
            && row - half >= 0
            && col + half < self.width as i64
            && row + half < self.height as i64
    }

    /// True when an array-coordinate position falls on a pixel of the frame.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (col, row) = (x.round(), y.round());
        col >= 0.0 && row >= 0.0 && col < self.width as f64 && row < self.height as f64
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
