/// Geometry staging - draw batches and the per-slot geometry ring

pub mod geometry_batch;
pub mod geometry_ring;

pub use geometry_batch::*;
pub use geometry_ring::*;
