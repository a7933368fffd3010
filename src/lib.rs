pub mod core;
pub mod dataset;
pub mod engine;
pub mod export;
pub mod hal;
pub mod observability;
