pub mod analytics;
pub mod config;
pub mod detection;
pub mod error;
pub mod model;
pub mod output;
pub mod store;
