use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::{filter, prelude::*};

// default name (fixed)
const APP_SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub app_name: Option<String>,
    pub level: Option<String>,
    pub file_name: Option<String>,
    pub file_dir: Option<String>,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_use_stdout")]
    pub use_stdout: bool,
}

fn default_use_stdout() -> bool {
    true
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self {
            app_name: None,
            level: None,
            file_name: None,
            file_dir: None,
            use_json: false,
            use_stdout: true,
        }
    }

    pub fn app_service_name(&self) -> String {
        self.app_name
            .clone()
            .unwrap_or_else(|| APP_SERVICE_NAME.to_string())
    }

    /// Level from `level`, INFO when unset or unparsable
    pub fn max_level(&self) -> tracing::Level {
        self.level
            .as_deref()
            .and_then(|l| tracing::Level::from_str(l).ok())
            .unwrap_or(tracing::Level::INFO)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        tracing::info!("Use default LoggingConfig.");
        Self::new()
    }
}

/// Same as [`load_tracing_config_from_env`] but with an explicit set of
/// variables. Keys keep the `LOG_` prefix.
pub fn load_tracing_config_from_vars<I>(vars: I) -> Result<LoggingConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    envy::prefixed("LOG_")
        .from_iter::<_, LoggingConfig>(vars)
        .context("cannot read logging config from vars:")
}

pub fn load_tracing_config_from_env() -> Result<LoggingConfig> {
    envy::prefixed("LOG_")
        .from_env::<LoggingConfig>()
        .context("cannot read logging config from env:")
}

pub fn tracing_init(conf: LoggingConfig) -> Result<()> {
    let layer = setup_layer_from_logging_config(&conf)?;
    tracing::subscriber::set_global_default(layer).context("setting default subscriber failed")?;
    tracing::debug!("logging initialized for {}", conf.app_service_name());
    Ok(())
}

pub fn tracing_init_from_env() -> Result<()> {
    match load_tracing_config_from_env() {
        Ok(conf) => tracing_init(conf),
        Err(e) => {
            tracing::warn!("failed to load logging config from env: {:?}", e);
            Err(e)
        }
    }
}

fn create_log_file(conf: &LoggingConfig) -> Result<Option<File>> {
    let Some(file_name) = conf.file_name.as_deref() else {
        return Ok(None);
    };
    let dir = match conf.file_dir.as_deref() {
        Some(d) => PathBuf::from_str(d).context("Invalid log file directory")?,
        None => env::current_dir().context("current directory")?,
    };
    std::fs::create_dir_all(&dir).context("create log file directory:")?;
    let path = dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("create log file to {:?}:", path.as_os_str()))?;
    Ok(Some(file))
}

pub fn setup_layer_from_logging_config(
    conf: &LoggingConfig,
) -> Result<Box<dyn Subscriber + Send + Sync + 'static>> {
    let lv = conf.max_level();
    let filter = filter::Targets::new().with_default(lv);
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();

    let file = create_log_file(conf)?;
    let (json_file, text_file) = match file {
        Some(f) if conf.use_json => (Some(f), None),
        Some(f) => (None, Some(f)),
        None => (None, None),
    };

    let subscriber = Box::new(
        tracing_subscriber::registry()
            .with(filter)
            .with(env_filter)
            .with(json_file.map(|f| {
                Layer::new()
                    .with_writer(f.with_max_level(lv))
                    .with_ansi(false)
                    .json()
            }))
            .with(text_file.map(|f| {
                Layer::new()
                    .with_writer(f.with_max_level(lv))
                    .with_ansi(false)
            }))
            .with(if !conf.use_json && conf.use_stdout {
                Some(tracing_subscriber::fmt::layer().pretty())
            } else {
                None
            })
            .with(if conf.use_json && conf.use_stdout {
                Some(tracing_subscriber::fmt::layer().json())
            } else {
                None
            }),
    );
    Ok(subscriber)
}

// for simple stdout logging
pub fn tracing_init_test(level: tracing::Level) {
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_from_vars() {
        let conf = load_tracing_config_from_vars(vars(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_USE_JSON", "true"),
            ("LOG_APP_NAME", "chunker"),
        ]))
        .unwrap();
        assert_eq!(conf.max_level(), tracing::Level::DEBUG);
        assert!(conf.use_json);
        assert!(conf.use_stdout, "stdout defaults on");
        assert_eq!(conf.app_service_name(), "chunker");
    }

    #[test]
    fn test_load_from_empty_vars() {
        let conf = load_tracing_config_from_vars(Vec::new()).unwrap();
        assert_eq!(conf, LoggingConfig::new());
        assert_eq!(conf.max_level(), tracing::Level::INFO);
        assert_eq!(conf.app_service_name(), APP_SERVICE_NAME);
    }

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        let conf = LoggingConfig {
            level: Some("loud".to_string()),
            ..LoggingConfig::new()
        };
        assert_eq!(conf.max_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_bad_bool_is_error() {
        let res = load_tracing_config_from_vars(vars(&[("LOG_USE_JSON", "maybe")]));
        assert!(res.is_err());
    }

    #[test]
    fn test_setup_without_file() {
        let conf = LoggingConfig {
            use_stdout: false,
            ..LoggingConfig::new()
        };
        assert!(setup_layer_from_logging_config(&conf).is_ok());
    }
}
