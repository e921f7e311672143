/// Device memory sub-allocation for images

pub mod image_arena;

pub use image_arena::*;
