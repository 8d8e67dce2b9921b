//! Directional scan engine.
//!
//! Overview
//! - A [`DirectionalScanner`] rasterizes a strip of discrete scan lines
//!   parallel to an arbitrary direction `(a, b)`, one line per step, clipped
//!   to a rectangle. Scan lines are naive digital lines sharing one cyclic
//!   step pattern; successive lines are exact translates along the secondary
//!   axis, so the family partitions the grid (no gaps, no duplicates).
//! - The eight sign/magnitude octants of `(a, b)` and the three scanner
//!   kinds (static, adaptive, vertical/horizontal) collapse into a
//!   single type parameterised by an [`Octant`] descriptor and a
//!   [`ScanKind`] flag.
//! - Adaptive scanners support [`DirectionalScanner::bind_to`], which moves
//!   the strip to a new offset between steps; the cursors are realigned into
//!   the strip on the next advance. This is what lets a tracker follow a
//!   gently curving road.
//! - [`ScannerProvider`] builds scanners from stroke endpoints and owns the
//!   shared step-pattern pool; scanner clones share the pattern view but
//!   keep independent cursors.
//!
//! Scan outputs are appended to the caller's vector; the caller decides when
//! to clear it (central scans of a sub-divided grid accumulate several
//! fills).

mod pattern;
mod provider;
#[allow(clippy::module_inception)]
mod scanner;

pub use pattern::{Octant, ScanPattern};
pub use provider::ScannerProvider;
pub use scanner::{ClipRect, DirectionalScanner, ScanKind};
