//! Loader for Switchboard settings with YAML + environment overlays.
//!
//! Every field has a default, so an empty source set yields a usable
//! configuration. Environment variables use the `SWITCHBOARD__` prefix with
//! `__` as the path separator (`SWITCHBOARD__UI__WINDOWS=2`), and `${VAR}`
//! placeholders inside string values are expanded after merging.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use switchboard_common::{LogConfig, LogFormat};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub ui: UiConfig,
    pub log: LogSettings,
    /// Template name -> template text, consumed by the application theme.
    pub templates: Templates,
}

/// Terminal multiplexer knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Stacked windows created at startup. Values below one are raised to one.
    pub windows: usize,
    /// Upper bound for a single keystroke poll, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Lines kept per buffer before the oldest are dropped.
    pub scrollback: usize,
    /// Leading character that routes a line to the command registry.
    pub command_marker: char,
    pub beep: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            windows: 1,
            poll_timeout_ms: 100,
            scrollback: 1000,
            command_marker: '/',
            beep: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    pub filter: String,
    pub format: LogFormat,
    pub stderr: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            filter: "info".into(),
            format: LogFormat::Text,
            stderr: false,
        }
    }
}

impl LogSettings {
    pub fn to_log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Templates(pub BTreeMap<String, String>);

impl Default for Templates {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "window_status".to_string(),
            "[{buffer_num}] {buffer_name} {buffer_descr}".to_string(),
        );
        map.insert("status_line".to_string(), "{text}".to_string());
        Self(map)
    }
}

impl Templates {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SwitchboardConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SwitchboardConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchboardConfigLoader {
    /// Start empty; `SWITCHBOARD__` env overrides are layered last in [`Self::load`].
    ///
    /// ```
    /// use switchboard_config::SwitchboardConfigLoader;
    ///
    /// let config = SwitchboardConfigLoader::new()
    ///     .with_yaml_str("ui:\n  windows: 2")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.ui.windows, 2);
    /// assert_eq!(config.ui.command_marker, '/');
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use switchboard_config::SwitchboardConfigLoader;
    ///
    /// unsafe { std::env::set_var("SB_DOC_NAME", "console"); }
    ///
    /// let config = SwitchboardConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// templates:
    ///   window_status: "${SB_DOC_NAME} [{buffer_num}]"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.templates.get("window_status"), Some("console [{buffer_num}]"));
    ///
    /// unsafe { std::env::remove_var("SB_DOC_NAME"); }
    /// ```
    pub fn load(self) -> Result<SwitchboardConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("SWITCHBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: SwitchboardConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.ui.windows = typed.ui.windows.max(1);

        Ok(typed)
    }
}
