pub mod config;
pub mod geometry;
pub mod logging;
pub mod media;
