use crate::error::BracketError;
use crate::types::*;
use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

/// Environment keys this crate reads. `.env` lines naming anything else
/// are skipped.
pub const ENV_KEYS: [&str; 5] = [
  "TKD_BRACKET_CONFIG",
  "TKD_SHUFFLE_SEED",
  "TKD_LOG_FILTER",
  "TKD_SEPARATION",
  "RUST_LOG",
];

pub fn crate_dir() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Relative paths hang off the crate directory.
pub fn crate_path(raw: &str) -> PathBuf {
  let raw = Path::new(raw);
  if raw.is_absolute() {
    raw.to_path_buf()
  } else {
    crate_dir().join(raw)
  }
}

pub fn config_path() -> PathBuf {
  crate_path(&env_value("TKD_BRACKET_CONFIG").unwrap_or_else(|| "bracket.json".to_string()))
}

/// Trimmed value of `key`, `None` when unset or blank.
pub fn env_value(key: &str) -> Option<String> {
  let value = env::var(key).ok()?;
  let value = value.trim();
  (!value.is_empty()).then(|| value.to_string())
}

pub fn parse_separation(raw: &str) -> Option<SeparationOptions> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "off" | "none" | "false" | "0" => Some(SeparationOptions::default()),
    "strict" => Some(SeparationOptions::strict()),
    "balanced" | "on" | "true" | "1" => Some(SeparationOptions::balanced()),
    _ => None,
  }
}

/// Environment wins over the file for the keys it sets.
pub fn apply_overrides<F>(mut config: EngineConfig, lookup: F) -> EngineConfig
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(value) = lookup("TKD_SHUFFLE_SEED") {
    match value.parse::<u64>() {
      Ok(seed) => config.shuffle_seed = Some(seed),
      Err(_) => tracing::warn!("ignoring TKD_SHUFFLE_SEED={value:?}: not an unsigned integer"),
    }
  }
  if let Some(value) = lookup("TKD_LOG_FILTER") {
    config.log_filter = value;
  }
  if let Some(value) = lookup("TKD_SEPARATION") {
    match parse_separation(&value) {
      Some(separation) => config.separation = separation,
      None => tracing::warn!("ignoring TKD_SEPARATION={value:?}: expected off, strict or balanced"),
    }
  }
  if config.column_size == 0 {
    config.column_size = DEFAULT_COLUMN_SIZE;
  }
  if config.log_filter.trim().is_empty() {
    config.log_filter = DEFAULT_LOG_FILTER.to_string();
  }
  config
}

pub fn apply_env_defaults(config: EngineConfig) -> EngineConfig {
  apply_overrides(config, env_value)
}

pub fn parse_config(data: &str) -> Result<EngineConfig, BracketError> {
  serde_json::from_str::<EngineConfig>(data)
    .map_err(|e| BracketError::Config(format!("parse config: {e}")))
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, BracketError> {
  if !path.is_file() {
    return Ok(apply_env_defaults(EngineConfig::default()));
  }
  let data = fs::read_to_string(path)
    .map_err(|e| BracketError::Config(format!("read config {}: {e}", path.display())))?;
  let config = parse_config(&data)
    .map_err(|e| BracketError::Config(format!("{} ({})", e, path.display())))?;
  Ok(apply_env_defaults(config))
}

pub fn load_config_inner() -> Result<EngineConfig, BracketError> {
  load_config_from(&config_path())
}

pub fn save_config_to(path: &Path, config: &EngineConfig) -> Result<(), BracketError> {
  let payload =
    serde_json::to_string_pretty(config).map_err(|e| BracketError::Config(e.to_string()))?;
  fs::write(path, payload)
    .map_err(|e| BracketError::Config(format!("write config {}: {e}", path.display())))
}

pub fn log_dir(config: &EngineConfig) -> PathBuf {
  match config.log_dir.trim() {
    "" => crate_dir().join("logs"),
    dir => crate_path(dir),
  }
}

/// Applies `<crate>/.env` without overriding variables that are already
/// set. Returns how many keys were applied.
pub fn load_env_file() -> usize {
  let Ok(contents) = fs::read_to_string(crate_dir().join(".env")) else {
    return 0;
  };
  let mut applied = 0;
  for (key, value) in env_file_pairs(&contents) {
    if env::var_os(key).is_none() {
      env::set_var(key, value);
      applied += 1;
    }
  }
  applied
}

/// The `ENV_KEYS` assignments of a `.env` file, in file order.
pub fn env_file_pairs(contents: &str) -> Vec<(&'static str, String)> {
  let mut pairs = Vec::new();
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    match ENV_KEYS.iter().find(|known| **known == key) {
      Some(known) => pairs.push((*known, value)),
      None => tracing::debug!(key, "ignoring unrelated .env key"),
    }
  }
  pairs
}

/// `KEY=value`, optionally prefixed with `export`. Quoted values are taken
/// verbatim; unquoted ones stop at `#`.
pub fn parse_env_line(line: &str) -> Option<(&str, String)> {
  let line = line.trim();
  if line.starts_with('#') {
    return None;
  }
  let (key, value) = line.strip_prefix("export ").unwrap_or(line).split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  Some((key, unquote(value.trim())))
}

fn unquote(value: &str) -> String {
  for quote in ['"', '\''] {
    if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
      return inner.to_string();
    }
  }
  value
    .split_once('#')
    .map_or(value, |(head, _)| head)
    .trim_end()
    .to_string()
}
