use std::{path::PathBuf, time::Duration};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 1111;
pub const DEFAULT_RESULT_ROOT: &str = "./results";
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_SERVER_ADDR: &str = "http://localhost:1111";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fully resolved configuration shared by the server and the worker.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub dispatch: DispatchSettings,
    pub storage: StorageConfig,
    pub ffmpeg: FfmpegConfig,
    pub worker: WorkerConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    /// Zero means "use the dispatch core's default".
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub result_root: PathBuf,
    pub input_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            result_root: PathBuf::from(DEFAULT_RESULT_ROOT),
            input_root: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub path: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_FFMPEG_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server_addr: String,
    pub retry_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
