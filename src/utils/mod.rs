pub mod buffer;
pub mod filters;
pub mod peak;
pub mod stats;
