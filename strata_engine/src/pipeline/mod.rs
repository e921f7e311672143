/// Pipeline definitions and the permutation cache

pub mod pipeline_definition;
pub mod pipeline_cache;

pub use pipeline_definition::*;
pub use pipeline_cache::*;
