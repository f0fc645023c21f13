pub mod config;
pub mod pipeline;

pub use config::SyncConfig;
pub use pipeline::*;
