use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    pub music_root: String,
    pub library_path: String,
    pub favorites_name: String,
    pub watch_music: bool,
    pub watch_debounce_secs: u64,
    pub loader_interval_ms: u64,
    pub placeholder_image: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "".to_string(),
            library_path: "playlist.json".to_string(),
            favorites_name: "Favorites".to_string(),
            watch_music: true,
            watch_debounce_secs: 2,
            loader_interval_ms: 200,
            placeholder_image: library::PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("RIFFLE_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(AppConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: AppConfig = serde_yaml::from_str(&contents)?;
        let defaults = AppConfig::default();
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.library_path.trim().is_empty() {
            config.library_path = defaults.library_path;
        }
        if config.favorites_name.trim().is_empty() {
            config.favorites_name = defaults.favorites_name;
        }
        if config.watch_debounce_secs == 0 {
            config.watch_debounce_secs = defaults.watch_debounce_secs;
        }
        if config.loader_interval_ms == 0 {
            config.loader_interval_ms = defaults.loader_interval_ms;
        }
        if config.placeholder_image.trim().is_empty() {
            config.placeholder_image = defaults.placeholder_image;
        }
        return Ok((config, false));
    }

    let config = AppConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.yaml");

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let (again, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(again, config);
    }

    #[test]
    fn blank_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 0\nmusic_root: music\nlibrary_path: ''\nwatch_debounce_secs: 0\n",
        )
        .unwrap();

        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.music_root, "music");
        assert_eq!(config.library_path, "playlist.json");
        assert_eq!(config.watch_debounce_secs, 2);
        assert_eq!(config.favorites_name, "Favorites");
    }

    #[test]
    fn relative_paths_resolve_next_to_config() {
        let config_path = Path::new("/etc/riffle/config.yaml");
        assert_eq!(
            resolve_path(config_path, "playlist.json"),
            PathBuf::from("/etc/riffle/playlist.json")
        );
        assert_eq!(
            resolve_path(config_path, "/data/playlist.json"),
            PathBuf::from("/data/playlist.json")
        );
        assert_eq!(resolve_music_root(config_path, "  "), None);
    }
}
