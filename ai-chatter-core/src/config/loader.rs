//! Settings loading and layering

use super::schema::{Settings, Verbosity};
use super::validate::validate_settings;
use crate::{Error, APP_NAME};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of environment variables that override settings fields
pub const ENV_PREFIX: &str = "AI_CHATTER_";

const CONFIG_FILE_NAME: &str = "config.json";

/// Values given on the command line
///
/// These sit above every config file and below the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_key: Option<String>,
    pub ephemeral: bool,
    pub log_file: Option<PathBuf>,
    pub verbosity: Option<Verbosity>,
}

impl SettingsOverrides {
    fn apply(&self, settings: &mut Value) -> crate::Result<()> {
        if let Some(api_key) = &self.api_key {
            set_path_value(settings, &["api_key".to_string()], Value::String(api_key.clone()));
        }
        if self.ephemeral {
            set_path_value(settings, &["persist".to_string()], Value::Bool(false));
        }
        if let Some(log_file) = &self.log_file {
            set_path_value(
                settings,
                &["log_file".to_string()],
                serde_json::to_value(log_file)?,
            );
        }
        if let Some(verbosity) = self.verbosity {
            set_path_value(
                settings,
                &["verbosity".to_string()],
                serde_json::to_value(verbosity)?,
            );
        }
        Ok(())
    }
}

/// Settings loader
///
/// Layers, lowest precedence first: defaults, site config, user config,
/// explicit file, command line overrides, environment.
pub struct SettingsLoader {
    site_config_dir: Option<PathBuf>,
    user_config_dir: Option<PathBuf>,
}

impl SettingsLoader {
    /// Create a loader using the platform's config directories
    pub fn new() -> Self {
        Self {
            site_config_dir: site_config_dir().map(|d| d.join(APP_NAME)),
            user_config_dir: dirs::config_dir().map(|d| d.join(APP_NAME)),
        }
    }

    /// Create a loader with custom site and user config directories
    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(site: P, user: Q) -> Self {
        Self {
            site_config_dir: Some(site.as_ref().to_path_buf()),
            user_config_dir: Some(user.as_ref().to_path_buf()),
        }
    }

    /// Config files to try, in increasing order of precedence
    pub fn config_paths(&self, explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = &self.site_config_dir {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        if let Some(dir) = &self.user_config_dir {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        let explicit = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir()
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME)),
        };
        paths.push(explicit);
        paths
    }

    /// Load settings from files, overrides and the process environment
    pub fn load(
        &self,
        explicit: Option<&Path>,
        overrides: &SettingsOverrides,
    ) -> crate::Result<Settings> {
        self.load_with_env(explicit, overrides, std::env::vars())
    }

    /// Load settings using the given environment variables
    pub fn load_with_env<I>(
        &self,
        explicit: Option<&Path>,
        overrides: &SettingsOverrides,
        env: I,
    ) -> crate::Result<Settings>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = serde_json::to_value(Settings::default())?;

        for path in self.config_paths(explicit) {
            debug!("Trying to load config from {}", path.display());
            if !path.is_file() {
                continue;
            }
            info!("Loading config from {}", path.display());
            let file_value = read_config_file(&path)?;
            merge_values(&mut merged, file_value);
        }

        overrides.apply(&mut merged)?;
        apply_env_overrides(&mut merged, env);

        let settings: Settings =
            serde_json::from_value(merged).map_err(|e| Error::Config(e.to_string()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Machine-wide config directory
#[cfg(target_os = "macos")]
fn site_config_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/Library/Application Support"))
}

/// Machine-wide config directory
#[cfg(target_os = "windows")]
fn site_config_dir() -> Option<PathBuf> {
    std::env::var_os("PROGRAMDATA").map(PathBuf::from)
}

/// Machine-wide config directory
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn site_config_dir() -> Option<PathBuf> {
    let dirs = std::env::var("XDG_CONFIG_DIRS").unwrap_or_default();
    let first = dirs.split(':').find(|d| !d.trim().is_empty());
    Some(PathBuf::from(first.unwrap_or("/etc/xdg")))
}

fn read_config_file(path: &Path) -> crate::Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&content).map_err(|source| Error::InvalidConfigJson {
            path: path.to_path_buf(),
            source,
        })?;
    if !value.is_object() {
        let source = <serde_json::Error as serde::de::Error>::custom(
            "top-level value must be an object",
        );
        return Err(Error::InvalidConfigJson {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(value)
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn get_path_value<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |current, segment| current.get(segment.as_str()))
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn apply_env_overrides<I>(config: &mut Value, env: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut alias = None;
    let mut prefixed = Vec::new();

    for (key, value) in env {
        let upper = key.to_ascii_uppercase();
        if upper == "OPENAI_API_KEY" {
            alias = Some(value);
            continue;
        }
        let Some(suffix) = upper.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        prefixed.push((segments, value));
    }

    if let Some(key) = alias {
        set_path_value(config, &["api_key".to_string()], Value::String(key));
    }

    // Sorted so that a nested override lands after a whole-object override
    prefixed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
    for (segments, raw) in prefixed {
        debug!("Applying environment override for {}", segments.join("."));
        let value = match get_path_value(config, &segments) {
            // Keep string fields verbatim so "1234" stays a string
            Some(Value::String(_)) | Some(Value::Null) => Value::String(raw),
            _ => parse_env_value(&raw),
        };
        let mut overlay = Value::Object(Map::new());
        set_path_value(&mut overlay, &segments, value);
        merge_values(config, overlay);
    }
}
