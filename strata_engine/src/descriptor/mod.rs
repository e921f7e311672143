/// Descriptor binding state tracking

pub mod descriptor_tracker;

pub use descriptor_tracker::*;
