//! Geometry for registering star fields between exposures.
//!
//! Provides the [`Locatable2d`] abstraction shared by every stage of the
//! photometry pipeline, the brightness-ranked [`StarCatalog`], and the
//! triangle-invariant matcher that recovers the translation between two
//! catalogs.

pub mod catalog;
pub mod locatable;
pub mod triangle;

pub use catalog::StarCatalog;
pub use locatable::{Locatable2d, Position};
pub use triangle::{
    build_triangles, match_catalogs, MatchConfig, MatchError, MatchResult, Triangle,
    TriangleInvariant, TriangleMatcher,
};
