use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations stay strings here and are parsed with `humantime` by the loader.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub dispatch: FileDispatchConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub ffmpeg: FileFfmpegConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDispatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFfmpegConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub dispatch_timeout: Option<String>,
    pub result_root: Option<PathBuf>,
    pub input_root: Option<PathBuf>,
    pub ffmpeg_path: Option<String>,
    pub server_addr: Option<String>,
    pub retry_interval: Option<String>,
    pub connect_timeout: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("TILECAST_CONFIG").map(PathBuf::from),
            server_host: var("SERVER_HOST"),
            server_port: var("SERVER_PORT").and_then(|s| s.trim().parse().ok()),
            dispatch_timeout: var("DISPATCH_TIMEOUT"),
            result_root: var("RESULT_PATH").map(PathBuf::from),
            input_root: var("INPUT_PATH").map(PathBuf::from),
            ffmpeg_path: var("FFMPEG_PATH"),
            server_addr: var("SERVER_ADDR"),
            retry_interval: var("RETRY_INTERVAL"),
            connect_timeout: var("CONNECT_TIMEOUT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_known_variables_and_skips_blanks() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "8080"),
            ("SERVER_HOST", "  "),
            ("DISPATCH_TIMEOUT", "30s"),
            ("INPUT_PATH", "/srv/media"),
        ]);

        let env = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env.server_port, Some(8080));
        assert_eq!(env.server_host, None);
        assert_eq!(env.dispatch_timeout.as_deref(), Some("30s"));
        assert_eq!(env.input_root, Some(PathBuf::from("/srv/media")));
        assert_eq!(env.server_addr, None);
    }

    #[test]
    fn unparsable_port_is_ignored() {
        let env = EnvConfig::from_lookup(|name| (name == "SERVER_PORT").then(|| "http".to_string()));
        assert_eq!(env.server_port, None);
    }

    #[test]
    fn file_sections_are_optional() {
        let file: FileConfig = toml::from_str("[worker]\nretry_interval = \"2s\"\n").expect("valid toml");
        assert_eq!(file.worker.retry_interval.as_deref(), Some("2s"));
        assert!(file.server.port.is_none());
    }
}
