//! INI configuration file.
//!
//! ```ini
//! [monitor]
//! interval_secs = 10
//! subscription_mode = replaceable
//! push_policy = every_tick
//!
//! [range]
//! radius_miles = 10
//! min_vertical_rate = 0.1
//! max_speed = 300
//!
//! [delivery]
//! queue_capacity = 16
//! timeout_secs = 5
//! max_consecutive_failures = 3
//!
//! [server]
//! bind = 127.0.0.1:50051
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Every key is optional; missing keys keep their defaults. Unknown keys are
//! ignored.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use crate::broadcast::{CoordinatorConfig, PushPolicy, SubscriptionMode, DEFAULT_TICK_INTERVAL};
use crate::delivery::DeliveryConfig;
use crate::logging::LoggingConfig;
use crate::server::DEFAULT_BIND_ADDR;
use crate::tracker::RangeConfig;

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "loadmonitor";

/// File name of the default config.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// `[monitor]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub mode: SubscriptionMode,
    pub push_policy: PushPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            mode: SubscriptionMode::default(),
            push_policy: PushPolicy::default(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub monitor: MonitorSettings,
    pub range: RangeConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerSettings,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Platform default location, e.g. `~/.config/loadmonitor/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("monitor")) {
            let s = Section::new("monitor", section);
            if let Some(secs) = s.positive::<u64>("interval_secs")? {
                config.monitor.interval = Duration::from_secs(secs);
            }
            if let Some(mode) = s.parsed::<SubscriptionMode>("subscription_mode")? {
                config.monitor.mode = mode;
            }
            if let Some(policy) = s.parsed::<PushPolicy>("push_policy")? {
                config.monitor.push_policy = policy;
            }
        }

        if let Some(section) = ini.section(Some("range")) {
            let s = Section::new("range", section);
            if let Some(radius) = s.positive::<f64>("radius_miles")? {
                config.range.radius_miles = radius;
            }
            if let Some(rate) = s.non_negative::<f64>("min_vertical_rate")? {
                config.range.min_vertical_rate = rate;
            }
            if let Some(speed) = s.non_negative::<f64>("max_speed")? {
                config.range.max_speed = speed;
            }
        }

        if let Some(section) = ini.section(Some("delivery")) {
            let s = Section::new("delivery", section);
            if let Some(capacity) = s.positive::<usize>("queue_capacity")? {
                config.delivery.queue_capacity = capacity;
            }
            if let Some(secs) = s.positive::<u64>("timeout_secs")? {
                config.delivery.timeout = Duration::from_secs(secs);
            }
            if let Some(max) = s.parsed::<u32>("max_consecutive_failures")? {
                config.delivery.max_consecutive_failures = max;
            }
        }

        if let Some(section) = ini.section(Some("server")) {
            let s = Section::new("server", section);
            if let Some(bind) = s.value("bind") {
                if bind.parse::<SocketAddr>().is_err() {
                    return Err(s.invalid("bind", bind));
                }
                config.server.bind = bind.to_string();
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            let s = Section::new("logging", section);
            if let Some(level) = s.value("level") {
                let level = level.to_ascii_lowercase();
                if !LoggingConfig::is_valid_level(&level) {
                    return Err(s.invalid("level", &level));
                }
                config.logging.level = level;
            }
            if let Some(file) = s.value("file") {
                config.logging.file = Some(PathBuf::from(file));
            }
        }

        Ok(config)
    }

    /// Coordinator settings from `[monitor]` and `[delivery]`.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .with_interval(self.monitor.interval)
            .with_mode(self.monitor.mode)
            .with_push_policy(self.monitor.push_policy)
            .with_delivery(self.delivery.clone())
    }
}

/// Typed accessors over one INI section.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    /// Trimmed value with any trailing `;` or `#` comment removed. Blank
    /// values count as unset.
    fn value(&self, key: &str) -> Option<&'a str> {
        let raw = self.props.get(key)?;
        let value = match raw.find(|c: char| c == ';' || c == '#') {
            Some(at) => &raw[..at],
            None => raw,
        }
        .trim();
        (!value.is_empty()).then_some(value)
    }

    fn invalid(&self, key: &str, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.value(key)
            .map(|value| value.parse::<T>().map_err(|_| self.invalid(key, value)))
            .transpose()
    }

    fn positive<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
    {
        self.bounded(key, |v: &T| *v > T::default())
    }

    fn non_negative<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
    {
        self.bounded(key, |v: &T| *v >= T::default())
    }

    fn bounded<T: FromStr>(
        &self,
        key: &str,
        accept: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, ConfigError> {
        match self.parsed::<T>(key)? {
            Some(v) if !accept(&v) => Err(self.invalid(key, self.value(key).unwrap_or_default())),
            other => Ok(other),
        }
    }
}
