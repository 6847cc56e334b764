//! Shared configuration library for Tilecast.
//!
//! Both binaries resolve their settings through [`ConfigLoader`]: built-in
//! defaults, then an optional TOML file, then `.env` and the process
//! environment. Command line flags are applied on top by each binary.

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, DispatchSettings, FfmpegConfig, ServerConfig, StorageConfig,
    WorkerConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
