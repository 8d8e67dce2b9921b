//! Tiled spatial store for classified ground points.
//!
//! Points live in a `cot × rot` grid of tiles, each tile a regular array of
//! square cells (`cell_size` metres, commonly 0.25 m). Lookup is by planar
//! cell: [`PtTileSet::collect_points`] appends every point of one cell and
//! reports whether the covering tile was resident — a miss is not an error,
//! callers keep an out-of-bounds counter.
//!
//! Buffered mode bounds memory: [`PtTileSet::create_buffers`] starts a
//! boustrophedon traversal over the tile grid and [`PtTileSet::next_tile`]
//! brings the next tile in, evicting the oldest resident tile beyond the
//! buffer capacity. The serpentine order keeps successive seeds spatially
//! close to the resident window.

mod set;
mod tile;

pub use set::PtTileSet;
pub use tile::PtTile;
