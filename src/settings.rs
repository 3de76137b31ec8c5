//! Settings service
//!
//! A dotted-path key/value store over a JSON document (`settings.json` in the
//! data directory). Lookup order for every key: environment variable override,
//! persisted value, interactive prompt (the answer is written back). The
//! service is an explicit object passed by reference to whoever needs it, so
//! tests can point it at a scratch file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const SETTINGS_FILENAME: &str = "settings.json";

/// Resolve the data directory holding settings, problem records, sessions and
/// the compile cache. `OJX_DATA_DIR` overrides; the default is the directory
/// the executable lives in.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJX_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand the `{EXE_DIR}` placeholder used by a few path-valued settings.
pub fn expand_exe_dir(value: &str) -> String {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
        .unwrap_or_default();
    value.replacen("{EXE_DIR}", &exe_dir, 1)
}

pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Settings {
    /// Load settings from the given file. A missing file is not an error, it
    /// just starts the store empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("settings file {:?} is not a JSON object, ignoring", path);
                    Map::new()
                }
                Err(e) => {
                    warn!("failed to parse settings file {:?}: {}", path, e);
                    Map::new()
                }
            },
            Err(_) => {
                debug!("no settings file at {:?}", path);
                Map::new()
            }
        };
        Self { path, values }
    }

    /// Look up `selector` (`Section.Sub.Key`). When `env_key` is non-empty and
    /// set in the environment, its value wins over the persisted one.
    pub fn get(&self, selector: &str, env_key: &str) -> Option<Value> {
        if !env_key.is_empty() {
            if let Ok(v) = std::env::var(env_key) {
                debug!("setting `{}` taken from environment `{}`", selector, env_key);
                return Some(Value::String(v));
            }
        }

        let mut cur = &self.values;
        let parts: Vec<&str> = selector.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            cur = cur.get(*part)?.as_object()?;
        }
        match cur.get(*parts.last()?) {
            // null marks a cleared key, treated the same as absent
            Some(Value::Null) | None => None,
            Some(v) => Some(v.clone()),
        }
    }

    pub fn get_str(&self, selector: &str, env_key: &str) -> Option<String> {
        match self.get(selector, env_key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn get_bool(&self, selector: &str, env_key: &str) -> Option<bool> {
        match self.get(selector, env_key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => Some(s == "true" || s == "1"),
            _ => None,
        }
    }

    /// Write `value` at `selector`, creating intermediate objects as needed,
    /// and persist the whole document.
    pub fn set(&mut self, selector: &str, value: impl Into<Value>) -> Result<()> {
        let parts: Vec<&str> = selector.split('.').collect();
        let mut cur = &mut self.values;
        for part in &parts[..parts.len() - 1] {
            cur = cur
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .with_context(|| {
                    format!("setting `{}` collides with a non-object value", selector)
                })?;
        }
        cur.insert(parts[parts.len() - 1].to_string(), value.into());
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(self.values.clone()))?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write settings to {:?}", self.path))?;
        debug!("settings saved to {:?}", self.path);
        Ok(())
    }

    /// Resolve a string setting, asking the user when it is absent. The answer
    /// is persisted for next time.
    pub fn get_or_prompt(&mut self, selector: &str, env_key: &str, prompt: &str) -> Result<String> {
        if let Some(v) = self.get_str(selector, env_key) {
            return Ok(v);
        }
        let answer: String = dialoguer::Input::new()
            .with_prompt(prompt)
            .interact_text()
            .context("failed to read input")?;
        self.set(selector, answer.clone())?;
        Ok(answer)
    }

    /// Same as [`get_or_prompt`](Self::get_or_prompt) but with hidden input.
    pub fn get_or_prompt_password(
        &mut self,
        selector: &str,
        env_key: &str,
        prompt: &str,
    ) -> Result<String> {
        if let Some(v) = self.get_str(selector, env_key) {
            return Ok(v);
        }
        let answer = dialoguer::Password::new()
            .with_prompt(prompt)
            .interact()
            .context("failed to read input")?;
        self.set(selector, answer.clone())?;
        Ok(answer)
    }

    /// Resolve a bool setting, asking a yes/no question when it is absent.
    pub fn get_or_confirm(&mut self, selector: &str, prompt: &str) -> Result<bool> {
        if let Some(v) = self.get_bool(selector, "") {
            return Ok(v);
        }
        let answer = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("failed to read input")?;
        self.set(selector, answer)?;
        Ok(answer)
    }
}
