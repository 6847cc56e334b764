use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::{
    models::{
        Config, ConfigMetadata, DispatchSettings, FfmpegConfig, ServerConfig, StorageConfig,
        WorkerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["tilecast.toml", "config/tilecast.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env` into the process environment, then resolve everything.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Resolve against an already gathered environment. Never touches the
    /// process environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let config_present = config_path.is_some();

        let mut warnings = ConfigWarnings::default();
        if !config_present {
            warnings.push_with_hint(
                "No tilecast.toml detected; using defaults and environment variables",
                "Pass --config or set TILECAST_CONFIG to use a configuration file",
            );
        }

        let config = compose_config(file_config.unwrap_or_default(), env, config_path)?;
        warnings.extend(validation::apply_guard_rails(&config));

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists());
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        dispatch: file_dispatch,
        storage: file_storage,
        ffmpeg: file_ffmpeg,
        worker: file_worker,
    } = file;

    let server_defaults = ServerConfig::default();
    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or(server_defaults.host),
        port: env
            .server_port
            .or(file_server.port)
            .unwrap_or(server_defaults.port),
    };

    let dispatch = DispatchSettings {
        timeout: duration_setting(
            "DISPATCH_TIMEOUT",
            env.dispatch_timeout.or(file_dispatch.timeout),
        )?
        .unwrap_or_default(),
    };

    let storage_defaults = StorageConfig::default();
    let storage = StorageConfig {
        result_root: env
            .result_root
            .or(file_storage.result_root)
            .unwrap_or(storage_defaults.result_root),
        input_root: env.input_root.or(file_storage.input_root),
    };

    let ffmpeg = FfmpegConfig {
        path: env
            .ffmpeg_path
            .or(file_ffmpeg.path)
            .unwrap_or_else(|| FfmpegConfig::default().path),
    };

    let worker_defaults = WorkerConfig::default();
    let worker = WorkerConfig {
        server_addr: env
            .server_addr
            .or(file_worker.server_addr)
            .unwrap_or(worker_defaults.server_addr),
        retry_interval: duration_setting(
            "RETRY_INTERVAL",
            env.retry_interval.or(file_worker.retry_interval),
        )?
        .unwrap_or(worker_defaults.retry_interval),
        connect_timeout: duration_setting(
            "CONNECT_TIMEOUT",
            env.connect_timeout.or(file_worker.connect_timeout),
        )?
        .unwrap_or(worker_defaults.connect_timeout),
    };

    Ok(Config {
        server,
        dispatch,
        storage,
        ffmpeg,
        worker,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    })
}

fn duration_setting(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim())
            .map_err(|source| ConfigLoadError::InvalidDuration { field, value, source })
    })
    .transpose()
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} is not a valid duration: {value:?}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(self, ConfigPathProvenance::Explicit | ConfigPathProvenance::Env)
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.metadata.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("tilecast.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "");

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .expect("loads");
        let config = load.config;

        assert_eq!(config.server.bind_address(), "0.0.0.0:1111");
        assert_eq!(config.dispatch.timeout, Duration::ZERO);
        assert_eq!(config.storage.result_root, PathBuf::from("./results"));
        assert_eq!(config.storage.input_root, None);
        assert_eq!(config.ffmpeg.path, "ffmpeg");
        assert_eq!(config.worker.server_addr, "http://localhost:1111");
        assert_eq!(config.worker.retry_interval, Duration::from_secs(5));
        assert_eq!(config.worker.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.metadata.config_path, Some(path));
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn file_values_are_overridden_by_environment() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[dispatch]
timeout = "20s"

[worker]
server_addr = "http://dispatch:9000"
retry_interval = "500ms"
"#,
        );

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(env(&[("SERVER_PORT", "7000"), ("DISPATCH_TIMEOUT", "1m")]))
            .expect("loads");

        assert_eq!(load.config.server.host, "127.0.0.1");
        assert_eq!(load.config.server.port, 7000);
        assert_eq!(load.config.dispatch.timeout, Duration::from_secs(60));
        assert_eq!(load.config.worker.server_addr, "http://dispatch:9000");
        assert_eq!(load.config.worker.retry_interval, Duration::from_millis(500));
    }

    #[test]
    fn config_path_can_come_from_the_environment() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[ffmpeg]\npath = \"/opt/ffmpeg\"\n");
        let from_env = path.to_string_lossy().into_owned();

        let load = ConfigLoader::new()
            .load_with_env(env(&[("TILECAST_CONFIG", from_env.as_str())]))
            .expect("loads");

        assert_eq!(load.config.ffmpeg.path, "/opt/ffmpeg");
        assert_eq!(load.config_path(), Some(path.as_path()));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("absent.toml");

        let err = ConfigLoader::new()
            .with_config_path(&missing)
            .load_with_env(EnvConfig::default())
            .expect_err("missing explicit config");

        assert!(matches!(err, ConfigLoadError::MissingConfig { path } if path == missing));
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[server\nport = ");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .expect_err("parse failure");

        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }

    #[test]
    fn invalid_durations_name_the_setting() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(env(&[("RETRY_INTERVAL", "soon")]))
            .expect_err("bad duration");

        assert!(matches!(
            err,
            ConfigLoadError::InvalidDuration { field: "RETRY_INTERVAL", .. }
        ));
    }

    #[test]
    fn guard_rail_warnings_are_collected() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "[worker]\nretry_interval = \"0s\"\n");

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(env(&[("DISPATCH_TIMEOUT", "10m")]))
            .expect("loads");

        assert_eq!(load.warnings.len(), 2);
    }
}
