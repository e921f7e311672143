/// Textures - samplers, sampled images with their upload path, and readback

pub mod sampler;
pub mod texture_store;
pub mod readback;

pub use sampler::*;
pub use texture_store::*;
pub use readback::*;
