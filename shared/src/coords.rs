//! Pixel coordinate conventions.
//!
//! Two conventions meet in this pipeline:
//!
//! * **Array coordinates**: pixel `(row, col)` has its center at
//!   `(x, y) = (col, row)`. Photometry, oversampling and detection masks use
//!   these.
//! * **Centroid coordinates**: pixel `(row, col)` covers `[col, col + 1)` in
//!   x, so its center sits at `(col + 0.5, row + 0.5)`. Centroid results,
//!   star catalogs, field solutions and the triangle matcher use these.
//!
//! The half-pixel shift between them is applied only through the two
//! functions below, at the boundary where a position leaves the centroider
//! or enters photometry.

use phot_math::Position;

/// Offset between the centroid convention and array indexing, in pixels.
pub const PIXEL_CENTER_OFFSET: f64 = 0.5;

/// Convert a centroid-convention position to array coordinates.
pub fn to_array_coords(position: &Position) -> Position {
    position - Position::new(PIXEL_CENTER_OFFSET, PIXEL_CENTER_OFFSET)
}

/// Convert an array-coordinate position to the centroid convention.
pub fn to_centroid_coords(position: &Position) -> Position {
    position + Position::new(PIXEL_CENTER_OFFSET, PIXEL_CENTER_OFFSET)
}
