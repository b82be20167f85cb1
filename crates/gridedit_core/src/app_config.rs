use crate::GridError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Grid behaviour that depends on the record source's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub api_base_url: String,

    /// Column holding each persisted row's durable identity.
    pub primary_key: String,

    /// Columns whose input is normalized to a number.
    pub numeric_columns: Vec<String>,

    /// Computed columns that are never editable.
    pub locked_columns: Vec<String>,

    /// Schemas the user may open. Empty means no restriction.
    pub accessible_schemas: Vec<String>,

    pub rows_per_page: u32,
    pub undo_limit: usize,
    pub request_timeout_ms: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            primary_key: "Item_Code".to_string(),
            numeric_columns: [
                "BOQ_Qty",
                "Unit_Price_LE",
                "Unit_Price_Euro",
                "Previous_Qty",
                "Cumulative_Qty",
            ]
            .map(String::from)
            .to_vec(),
            locked_columns: ["Monthly_Qty", "Total_Price_LE", "Total_Price_Euro"]
                .map(String::from)
                .to_vec(),
            accessible_schemas: ["Presented", "Accepted", "PresentedToNAT", "BOQ"]
                .map(String::from)
                .to_vec(),
            rows_per_page: 50,
            undo_limit: 50,
            request_timeout_ms: 30_000,
        }
    }
}

impl GridConfig {
    pub fn is_numeric_column(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == column)
    }

    pub fn is_locked_column(&self, column: &str) -> bool {
        self.locked_columns.iter().any(|c| c == column)
    }

    pub fn is_schema_accessible(&self, schema: &str) -> bool {
        self.accessible_schemas.is_empty() || self.accessible_schemas.iter().any(|s| s == schema)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.primary_key.trim().is_empty() {
            return Err(GridError::Config("primary_key must not be empty".into()));
        }
        if self.rows_per_page == 0 {
            return Err(GridError::Config("rows_per_page must be greater than 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(GridError::Config(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

pub struct GridConfigStore {
    path: PathBuf,
}

impl GridConfigStore {
    pub fn new() -> Result<Self, GridError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            GridError::IoError(std::io::Error::other("Could not find config directory"))
        })?;

        Ok(Self {
            path: config_dir.join("gridedit").join("config.json"),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing file means defaults.
    pub fn load(&self) -> Result<GridConfig, GridError> {
        Self::load_from(&self.path)
    }

    pub fn load_from(path: &Path) -> Result<GridConfig, GridError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(GridConfig::default());
        }

        let content = fs::read_to_string(path)?;
        let config: GridConfig =
            serde_json::from_str(&content).map_err(|e| GridError::Config(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config: &GridConfig) -> Result<(), GridError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(config).map_err(|e| GridError::Config(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
