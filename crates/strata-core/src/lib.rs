pub mod config;
pub mod error;
pub mod types;

pub use config::{
    EmbedderConfig, FilterStrategy, IngestConfig, ProcessorConfig, SourceConfig, StrataConfig,
};
pub use error::{Result, StrataError};
pub use types::*;
