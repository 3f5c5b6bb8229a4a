pub mod utils;
pub mod models;
pub mod db;
pub mod recognition;
pub mod pipeline;
