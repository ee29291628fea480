pub mod coords;
pub mod trace;

pub use coords::{ArrayGeometry, CoordinateResolver, ReferencePoint};
pub use trace::Trace;
