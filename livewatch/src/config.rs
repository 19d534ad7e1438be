//! Command line, environment and config file handling.
//!
//! Precedence is command line (or the matching `ACFUN_*` environment
//! variable) over the TOML file over built-in defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "livewatch.toml";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_FILTER_LIST: &str = "config/filter_list.txt";
const DEFAULT_LIKE_INTERVAL_SECS: u64 = 30;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 300;
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing {0}: set it on the command line, in the environment or in the config file")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Keeps one comment listener per active AcFun live room.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Account used to log in
    #[arg(short, long, env = "ACFUN_ACCOUNT")]
    pub account: Option<String>,

    /// Password used to log in
    #[arg(short, long, env = "ACFUN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Live list refresh interval in seconds
    #[arg(short, long = "interval", env = "ACFUN_INTERVAL")]
    pub interval: Option<u64>,

    /// Path to the filter list (one owner id per line)
    #[arg(long, env = "ACFUN_FILTER_LIST")]
    pub filter_list: Option<PathBuf>,

    /// Send periodic likes to every monitored room
    #[arg(long, env = "ACFUN_AUTO_LIKE", value_parser = BoolishValueParser::new())]
    pub auto_like: Option<bool>,

    /// Interval between likes in seconds
    #[arg(long, env = "ACFUN_LIKE_INTERVAL")]
    pub like_interval: Option<u64>,

    /// Interval between status reports in seconds
    #[arg(long)]
    pub status_interval: Option<u64>,

    /// Address for the status API to listen on (disabled when unset)
    #[arg(long)]
    pub web_listen: Option<SocketAddr>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long)]
    pub log_retention_days: Option<u64>,
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub account: AccountSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub web: WebSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct AccountSection {
    pub account: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MonitorSection {
    pub poll_interval_secs: Option<u64>,
    pub filter_list: Option<String>,
    pub auto_like: Option<bool>,
    pub like_interval_secs: Option<u64>,
    pub status_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WebSection {
    pub listen: Option<String>,
}

/// Fully resolved settings.
#[derive(Clone)]
pub struct Settings {
    pub account: String,
    pub password: String,
    pub poll_interval: Duration,
    pub filter_list: PathBuf,
    pub auto_like: bool,
    pub like_interval: Duration,
    pub status_interval: Duration,
    pub web_listen: Option<SocketAddr>,
    pub log_dir: PathBuf,
    pub log_retention_days: u64,
    pub log_level: Option<String>,
    pub verbose: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("filter_list", &self.filter_list)
            .field("auto_like", &self.auto_like)
            .field("like_interval", &self.like_interval)
            .field("status_interval", &self.status_interval)
            .field("web_listen", &self.web_listen)
            .field("log_dir", &self.log_dir)
            .field("log_retention_days", &self.log_retention_days)
            .field("log_level", &self.log_level)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Settings {
    /// Merge command line arguments over the config file.
    pub fn resolve(args: Args, file: ConfigFile) -> Result<Self, ConfigError> {
        let account = non_empty(args.account.or(file.account.account), "account")?;
        let password = non_empty(args.password.or(file.account.password), "password")?;

        let poll_interval = positive_secs(
            args.interval
                .or(file.monitor.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            "poll interval",
        )?;
        let like_interval = positive_secs(
            args.like_interval
                .or(file.monitor.like_interval_secs)
                .unwrap_or(DEFAULT_LIKE_INTERVAL_SECS),
            "like interval",
        )?;
        let status_interval = positive_secs(
            args.status_interval
                .or(file.monitor.status_interval_secs)
                .unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
            "status interval",
        )?;

        let filter_list = args
            .filter_list
            .or_else(|| file.monitor.filter_list.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILTER_LIST));

        let web_listen = match args.web_listen {
            Some(addr) => Some(addr),
            None => file
                .web
                .listen
                .as_deref()
                .map(|s| {
                    s.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                        name: "web listen address",
                        reason: format!("{:?}: {}", s, e),
                    })
                })
                .transpose()?,
        };

        Ok(Self {
            account,
            password,
            poll_interval,
            filter_list,
            auto_like: args.auto_like.or(file.monitor.auto_like).unwrap_or(true),
            like_interval,
            status_interval,
            web_listen,
            log_dir: args
                .log_dir
                .or_else(|| file.logging.log_dir.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_retention_days: args
                .log_retention_days
                .or(file.logging.retention_days)
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
            log_level: file.logging.level,
            verbose: args.verbose,
        })
    }
}

fn non_empty(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn positive_secs(secs: u64, name: &'static str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Pick the config file: explicit path, else `livewatch.toml` if present.
pub fn locate_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    })
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<ConfigFile, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
