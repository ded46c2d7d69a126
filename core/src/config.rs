use crate::favorites::{StoreOptions, DEFAULT_ROOT, DEFAULT_TIMEOUT};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CATALOG_URL: &str = "https://www.themealdb.com/api/json/v1/1";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FavoritesConfig {
    pub root: String,
    pub timeout_secs: u64,
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Where the favorites table lives
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Sqlite { path: PathBuf },
    Firebase { database_url: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: PathBuf::from("recetario.db"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub favorites: FavoritesConfig,
    pub catalog: CatalogConfig,
    pub backend: BackendConfig,
}

impl Config {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            root: self.favorites.root.clone(),
            timeout: Duration::from_secs(self.favorites.timeout_secs),
            diagnostics: None,
        }
    }
}

/// Read the config at `path`, writing out the defaults first if it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        fs::write(path, toml::to_string(&config)?)?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(config);
    }

    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
