use std::time::Duration;

use crate::models::Config;

const LONG_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    /// Emit every warning through `tracing`.
    pub fn log(&self) {
        for warning in &self.items {
            match &warning.hint {
                Some(hint) => {
                    tracing::warn!(message = %warning.message, hint = %hint, "configuration warning")
                }
                None => tracing::warn!(message = %warning.message, "configuration warning"),
            }
        }
    }
}

/// Settings that are legal but probably not what the operator meant.
pub fn apply_guard_rails(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.dispatch.timeout > LONG_DISPATCH_TIMEOUT {
        warnings.push_with_hint(
            format!(
                "DISPATCH_TIMEOUT of {} holds poll requests open for a long time",
                humantime::format_duration(config.dispatch.timeout)
            ),
            "Proxies and load balancers often drop idle requests well before that",
        );
    }

    if config.worker.retry_interval.is_zero() {
        warnings.push_with_hint(
            "RETRY_INTERVAL is zero; workers retry failed polls without pausing",
            "Set RETRY_INTERVAL to a few seconds",
        );
    }

    warnings
}
