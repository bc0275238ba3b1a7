use std::path::PathBuf;
use thiserror::Error;

use crate::ids::IdStrategy;
use crate::store::is_valid_identifier;
use crate::AppError;

pub const DEFAULT_DB_NAME: &str = "hris";
pub const DEFAULT_COLLECTION: &str = "employees";
pub const DATA_DIR_NAME: &str = "hris-normalize";

pub const DB_NAME_ENV: &str = "HRIS_DB_NAME";
pub const COLLECTION_ENV: &str = "HRIS_COLLECTION";
pub const DATA_DIR_ENV: &str = "HRIS_DATA_DIR";
pub const DB_PATH_ENV: &str = "HRIS_DB_PATH";
pub const ID_STRATEGY_ENV: &str = "HRIS_ID_STRATEGY";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database name must not be empty")]
    EmptyDbName,
    #[error("database name '{0}' may only contain letters, digits, '-', '_' and '.'")]
    InvalidDbName(String),
    #[error("collection name '{0}' is not a plain identifier")]
    InvalidCollection(String),
    #[error("unknown id strategy '{0}' (expected 'timestamp' or 'uuid')")]
    InvalidIdStrategy(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::EmptyDbName | ConfigError::InvalidDbName(_) => "CONFIG/INVALID_DB_NAME",
            ConfigError::InvalidCollection(_) => "CONFIG/INVALID_COLLECTION",
            ConfigError::InvalidIdStrategy(_) => "CONFIG/INVALID_ID_STRATEGY",
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        AppError::new(error.code(), error.to_string())
    }
}

/// Where the migration runs and how it fills missing identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub db_name: String,
    pub collection_name: String,
    pub data_dir: PathBuf,
    /// Explicit database file; wins over `data_dir`/`db_name`.
    pub db_path: Option<PathBuf>,
    pub id_strategy: IdStrategy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            db_name: DEFAULT_DB_NAME.to_string(),
            collection_name: DEFAULT_COLLECTION.to_string(),
            data_dir: default_data_dir(),
            db_path: None,
            id_strategy: IdStrategy::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

impl MigrationConfig {
    /// Defaults overlaid with the `HRIS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = MigrationConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = non_empty(DB_NAME_ENV) {
            config.db_name = name;
        }
        if let Some(name) = non_empty(COLLECTION_ENV) {
            config.collection_name = name;
        }
        if let Some(dir) = non_empty(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty(DB_PATH_ENV) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_empty(ID_STRATEGY_ENV) {
            config.id_strategy =
                IdStrategy::parse(&raw).ok_or(ConfigError::InvalidIdStrategy(raw))?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_name.is_empty() {
            return Err(ConfigError::EmptyDbName);
        }
        let db_name_ok = self
            .db_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !self.db_name.starts_with('.');
        if !db_name_ok {
            return Err(ConfigError::InvalidDbName(self.db_name.clone()));
        }
        if !is_valid_identifier(&self.collection_name) {
            return Err(ConfigError::InvalidCollection(self.collection_name.clone()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => path.clone(),
            None => self.data_dir.join(format!("{}.sqlite3", self.db_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_target_hris_employees() {
        let config = MigrationConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_name, "hris");
        assert_eq!(config.collection_name, "employees");
        assert_eq!(config.id_strategy, IdStrategy::Timestamp);
        assert!(config.database_path().ends_with("hris-normalize/hris.sqlite3"));
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = MigrationConfig::from_lookup(lookup(&[
            (DB_NAME_ENV, "staging"),
            (COLLECTION_ENV, "people"),
            (DATA_DIR_ENV, "/tmp/hris"),
            (ID_STRATEGY_ENV, "uuid"),
        ]))
        .unwrap();
        assert_eq!(config.collection_name, "people");
        assert_eq!(config.id_strategy, IdStrategy::Uuid);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/hris/staging.sqlite3")
        );
    }

    #[test]
    fn explicit_db_path_wins() {
        let config = MigrationConfig::from_lookup(lookup(&[
            (DB_NAME_ENV, "ignored"),
            (DB_PATH_ENV, "/srv/data/people.db"),
        ]))
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/srv/data/people.db"));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let config = MigrationConfig::from_lookup(lookup(&[(COLLECTION_ENV, "  ")])).unwrap();
        assert_eq!(config.collection_name, "employees");
    }

    #[test]
    fn rejects_bad_names_and_strategies() {
        let err = MigrationConfig::from_lookup(lookup(&[(ID_STRATEGY_ENV, "random")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG/INVALID_ID_STRATEGY");

        let mut config = MigrationConfig::default();
        config.collection_name = "employees; drop".into();
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidCollection("employees; drop".into())
        );

        config.collection_name = "employees".into();
        config.db_name = "../etc".into();
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG/INVALID_DB_NAME");

        config.db_name = String::new();
        assert_eq!(config.validate().unwrap_err(), ConfigError::EmptyDbName);
    }

    #[test]
    fn config_error_converts_to_app_error() {
        let app: AppError = ConfigError::InvalidCollection("x y".into()).into();
        assert_eq!(app.code(), "CONFIG/INVALID_COLLECTION");
        assert!(app.message().contains("x y"));
    }
}
