pub mod landmarks;
pub mod extract;
pub mod indexer;
pub mod cluster;
