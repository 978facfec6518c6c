//! Image thresholding and segmentation for star detection
//!
//! Provides a robust sky-relative threshold, binary masking and
//! 8-connected component labelling.

use ndarray::{Array2, ArrayView2};

use crate::algo::stats::{median_absolute_deviation, MAD_TO_SIGMA};

/// Bounding box of a labelled component, inclusive of both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BoundingBox {
    fn seed(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }
}

/// Sky level and detection threshold `median + k * sigma`, with sigma
/// estimated from the median absolute deviation.
///
/// Returns `(sky_level, threshold)`.
pub fn robust_threshold(image: &ArrayView2<f64>, k_sigma: f64) -> Result<(f64, f64), String> {
    let values: Vec<f64> = image.iter().copied().collect();
    let (sky, mad) = median_absolute_deviation(&values)?;
    Ok((sky, sky + k_sigma * mad * MAD_TO_SIGMA))
}

/// Apply thresholding to an image and return a binary mask
///
/// A pixel is set when it is strictly above `threshold`.
pub fn apply_threshold(image: &ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    image.mapv(|v| v > threshold)
}

/// Find connected components in a binary mask
///
/// This uses a simple 8-connectivity flood fill algorithm.
///
/// # Returns
///
/// A labeled image where each component has a unique label starting at 1
/// (0 is background), and the bounding box of each label in label order.
pub fn connected_components(mask: &ArrayView2<bool>) -> (Array2<u32>, Vec<BoundingBox>) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut boxes: Vec<BoundingBox> = Vec::new();

    // 8-connectivity neighboring offsets
    #[rustfmt::skip]
    let neighbors: [(isize, isize); 8] = [
        (-1, -1), (-1, 0), (-1, 1),
        (0, -1),           (0, 1),
        (1, -1),  (1, 0),  (1, 1),
    ];

    for i in 0..rows {
        for j in 0..cols {
            if !mask[[i, j]] || labels[[i, j]] != 0 {
                continue;
            }
            let label = boxes.len() as u32 + 1;
            let mut bbox = BoundingBox::seed(i, j);
            let mut stack = vec![(i, j)];

            while let Some((y, x)) = stack.pop() {
                if labels[[y, x]] != 0 {
                    continue;
                }
                labels[[y, x]] = label;
                bbox.include(y, x);

                for &(dy, dx) in &neighbors {
                    let ny = y as isize + dy;
                    let nx = x as isize + dx;
                    if ny >= 0 && ny < rows as isize && nx >= 0 && nx < cols as isize {
                        let (ny, nx) = (ny as usize, nx as usize);
                        if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                            stack.push((ny, nx));
                        }
                    }
                }
            }

            boxes.push(bbox);
        }
    }

    (labels, boxes)
}
