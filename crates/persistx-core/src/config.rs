//! Persistence descriptor loading
//!
//! The descriptor is a TOML file (default `persistx.toml`) read exactly once
//! when the provider initializes. [`Configuration`] is immutable after load.

use crate::cache::{region_name, CacheManager, CacheStrategy};
use crate::errors::ConfigError;
use persistx_core_types::sensitive::REDACTED;
use persistx_core_types::Sensitive;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Descriptor file name used when none is given
pub const DEFAULT_DESCRIPTOR: &str = "persistx.toml";

/// Environment variable overriding the default descriptor path
pub const DESCRIPTOR_ENV: &str = "PERSISTX_CONFIG";

const MEMORY_URL: &str = "sqlite::memory:";
const FILE_URL_PREFIX: &str = "sqlite://";
const MAX_POOL_SIZE: u32 = 64;

/// Raw descriptor schema
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub mappings: MappingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Sensitive<String>>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

/// Which second-level cache implementation backs the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheProvider {
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub use_second_level_cache: bool,
    #[serde(default = "default_provider")]
    pub provider: CacheProvider,
    #[serde(default = "default_strategy")]
    pub default_strategy: CacheStrategy,
    #[serde(default = "default_max_entries")]
    pub max_entries_per_region: usize,
    #[serde(default)]
    pub transaction_manager: Option<String>,
    #[serde(default)]
    pub regions: BTreeMap<String, CacheStrategy>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            use_second_level_cache: true,
            provider: default_provider(),
            default_strategy: default_strategy(),
            max_entries_per_region: default_max_entries(),
            transaction_manager: None,
            regions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSettings {
    /// SQL mapping resources, relative to the descriptor's directory
    #[serde(default)]
    pub resources: Vec<PathBuf>,
}

fn default_pool_size() -> u32 {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_provider() -> CacheProvider {
    CacheProvider::Memory
}

fn default_strategy() -> CacheStrategy {
    CacheStrategy::ReadWrite
}

fn default_max_entries() -> usize {
    1_000
}

/// Where the relational store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A private in-memory database shared by the pool's connections
    Memory,
    /// A database file, resolved against the descriptor directory
    File(PathBuf),
}

/// Immutable, validated configuration
#[derive(Debug, Clone)]
pub struct Configuration {
    descriptor: PathBuf,
    base_dir: PathBuf,
    settings: PersistenceConfig,
    database: DatabaseLocation,
    properties: BTreeMap<String, String>,
}

impl Configuration {
    /// Descriptor path to use when the caller names none
    ///
    /// `$PERSISTX_CONFIG` wins over [`DEFAULT_DESCRIPTOR`].
    pub fn default_descriptor() -> PathBuf {
        std::env::var_os(DESCRIPTOR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DESCRIPTOR))
    }

    /// Load and validate a descriptor file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: display.clone(),
            },
            _ => ConfigError::Read {
                path: display.clone(),
                message: err.to_string(),
            },
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&text, path.to_path_buf(), base_dir)
    }

    /// Build a configuration from descriptor text
    ///
    /// Relative paths (database file, mapping resources) resolve against
    /// `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base_dir = base_dir.into();
        Self::parse(text, base_dir.join(DEFAULT_DESCRIPTOR), base_dir)
    }

    fn parse(text: &str, descriptor: PathBuf, base_dir: PathBuf) -> Result<Self, ConfigError> {
        let settings: PersistenceConfig =
            toml::from_str(text).map_err(|err| ConfigError::Parse {
                path: descriptor.display().to_string(),
                message: err.to_string(),
            })?;
        validate(&settings)?;
        let database = parse_url(&settings.connection.url, &base_dir)?;
        let properties = flatten(&settings);
        Ok(Self {
            descriptor,
            base_dir,
            settings,
            database,
            properties,
        })
    }

    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings(&self) -> &PersistenceConfig {
        &self.settings
    }

    pub fn connection(&self) -> &ConnectionSettings {
        &self.settings.connection
    }

    pub fn cache(&self) -> &CacheSettings {
        &self.settings.cache
    }

    pub fn database(&self) -> &DatabaseLocation {
        &self.database
    }

    /// Mapping resources resolved against the descriptor directory, in order
    pub fn mapping_paths(&self) -> Vec<PathBuf> {
        self.settings
            .mappings
            .resources
            .iter()
            .map(|p| self.base_dir.join(p))
            .collect()
    }

    /// Whether sessions should consult a second-level cache at all
    pub fn second_level_cache_enabled(&self) -> bool {
        let cache = &self.settings.cache;
        cache.use_second_level_cache && cache.provider != CacheProvider::None
    }

    /// Cache manager configured from the `[cache]` section
    pub fn cache_manager(&self) -> CacheManager {
        let cache = &self.settings.cache;
        CacheManager::new(
            self.second_level_cache_enabled(),
            cache.default_strategy,
            cache.regions.clone(),
            cache.max_entries_per_region,
        )
    }

    /// Flattened dotted-key view of every setting; the password is redacted
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

fn validate(settings: &PersistenceConfig) -> Result<(), ConfigError> {
    let conn = &settings.connection;
    if conn.pool_size == 0 || conn.pool_size > MAX_POOL_SIZE {
        return Err(invalid(
            "connection.pool_size",
            format!("must be between 1 and {}", MAX_POOL_SIZE),
        ));
    }
    if conn.acquire_timeout_ms == 0 {
        return Err(invalid("connection.acquire_timeout_ms", "must be positive"));
    }

    let cache = &settings.cache;
    if cache.max_entries_per_region == 0 {
        return Err(invalid("cache.max_entries_per_region", "must be positive"));
    }
    let mut seen = std::collections::BTreeSet::new();
    for region in cache.regions.keys() {
        if !is_identifier(region) {
            return Err(invalid(
                format!("cache.regions.{}", region),
                "region names must be SQL identifiers",
            ));
        }
        if !seen.insert(region_name(region)) {
            return Err(invalid(
                format!("cache.regions.{}", region),
                "region names are case-insensitive; this one is declared twice",
            ));
        }
    }
    let wants_transactional = cache.default_strategy == CacheStrategy::Transactional
        || cache
            .regions
            .values()
            .any(|s| *s == CacheStrategy::Transactional);
    let has_manager = cache
        .transaction_manager
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty());
    if wants_transactional && !has_manager {
        return Err(invalid(
            "cache.transaction_manager",
            "the transactional strategy requires a transaction manager",
        ));
    }
    Ok(())
}

fn parse_url(url: &str, base_dir: &Path) -> Result<DatabaseLocation, ConfigError> {
    if url == MEMORY_URL {
        return Ok(DatabaseLocation::Memory);
    }
    match url.strip_prefix(FILE_URL_PREFIX) {
        Some("") => Err(invalid("connection.url", "missing database path")),
        Some(path) => Ok(DatabaseLocation::File(base_dir.join(path))),
        None => Err(invalid(
            "connection.url",
            format!(
                "unsupported connection url '{}'; expected '{}' or '{}<path>'",
                url, MEMORY_URL, FILE_URL_PREFIX
            ),
        )),
    }
}

fn flatten(settings: &PersistenceConfig) -> BTreeMap<String, String> {
    let conn = &settings.connection;
    let cache = &settings.cache;
    let mut props = BTreeMap::new();
    props.insert("connection.url".to_string(), conn.url.clone());
    if let Some(user) = &conn.username {
        props.insert("connection.username".to_string(), user.clone());
    }
    if conn.password.is_some() {
        props.insert("connection.password".to_string(), REDACTED.to_string());
    }
    props.insert("connection.pool_size".to_string(), conn.pool_size.to_string());
    props.insert(
        "connection.acquire_timeout_ms".to_string(),
        conn.acquire_timeout_ms.to_string(),
    );
    props.insert(
        "connection.foreign_keys".to_string(),
        conn.foreign_keys.to_string(),
    );
    props.insert(
        "cache.use_second_level_cache".to_string(),
        cache.use_second_level_cache.to_string(),
    );
    let provider = match cache.provider {
        CacheProvider::Memory => "memory",
        CacheProvider::None => "none",
    };
    props.insert("cache.provider".to_string(), provider.to_string());
    props.insert(
        "cache.default_strategy".to_string(),
        cache.default_strategy.to_string(),
    );
    props.insert(
        "cache.max_entries_per_region".to_string(),
        cache.max_entries_per_region.to_string(),
    );
    if let Some(manager) = &cache.transaction_manager {
        props.insert("cache.transaction_manager".to_string(), manager.clone());
    }
    for (region, strategy) in &cache.regions {
        props.insert(
            format!("cache.regions.{}", region_name(region)),
            strategy.to_string(),
        );
    }
    let resources: Vec<String> = settings
        .mappings
        .resources
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    props.insert("mappings.resources".to_string(), resources.join(","));
    props
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.into(),
        reason: reason.into(),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[connection]
url = "sqlite::memory:"
"#;

    #[test]
    fn test_minimal_descriptor_uses_defaults() {
        let cfg = Configuration::from_toml_str(MINIMAL, "/srv/app").unwrap();
        assert_eq!(cfg.database(), &DatabaseLocation::Memory);
        assert_eq!(cfg.connection().pool_size, 4);
        assert!(cfg.second_level_cache_enabled());
        assert_eq!(cfg.cache().default_strategy, CacheStrategy::ReadWrite);
        assert!(cfg.mapping_paths().is_empty());
    }

    #[test]
    fn test_file_url_resolves_against_base_dir() {
        let text = "[connection]\nurl = \"sqlite://data/app.db\"\n";
        let cfg = Configuration::from_toml_str(text, "/srv/app").unwrap();
        assert_eq!(
            cfg.database(),
            &DatabaseLocation::File(PathBuf::from("/srv/app/data/app.db"))
        );
    }

    #[test]
    fn test_unsupported_url_rejected() {
        let text = "[connection]\nurl = \"postgres://localhost/app\"\n";
        let err = Configuration::from_toml_str(text, ".").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == "connection.url"));
    }

    #[test]
    fn test_pool_size_bounds() {
        let text = "[connection]\nurl = \"sqlite::memory:\"\npool_size = 0\n";
        let err = Configuration::from_toml_str(text, ".").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == "connection.pool_size"));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let text = "[connection]\nurl = \"sqlite::memory:\"\nhost = \"db\"\n";
        let err = Configuration::from_toml_str(text, ".").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let text = format!("{}\n[cache]\ndefault_strategy = \"write-behind\"\n", MINIMAL);
        let err = Configuration::from_toml_str(&text, ".").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_transactional_requires_transaction_manager() {
        let text = format!("{}\n[cache.regions]\nledger = \"transactional\"\n", MINIMAL);
        let err = Configuration::from_toml_str(&text, ".").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == "cache.transaction_manager")
        );

        let text = format!(
            "{}\n[cache]\ntransaction_manager = \"local\"\n[cache.regions]\nledger = \"transactional\"\n",
            MINIMAL
        );
        assert!(Configuration::from_toml_str(&text, ".").is_ok());
    }

    #[test]
    fn test_region_names_must_be_identifiers() {
        let text = format!("{}\n[cache.regions]\n\"drop table\" = \"read-only\"\n", MINIMAL);
        let err = Configuration::from_toml_str(&text, ".").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn test_provider_none_disables_cache() {
        let text = format!("{}\n[cache]\nprovider = \"none\"\n", MINIMAL);
        let cfg = Configuration::from_toml_str(&text, ".").unwrap();
        assert!(!cfg.second_level_cache_enabled());
        assert!(!cfg.cache_manager().is_enabled());
    }

    #[test]
    fn test_properties_redact_password() {
        let text = r#"
[connection]
url = "sqlite::memory:"
username = "app"
password = "hunter2"

[cache.regions]
employee = "read-only"
"#;
        let cfg = Configuration::from_toml_str(text, ".").unwrap();
        assert_eq!(cfg.property("connection.username"), Some("app"));
        assert_eq!(cfg.property("connection.password"), Some(REDACTED));
        assert_eq!(cfg.property("cache.regions.employee"), Some("read-only"));
        assert!(!format!("{:?}", cfg).contains("hunter2"));
        assert_eq!(
            cfg.connection().password.as_ref().map(|p| p.expose().as_str()),
            Some("hunter2")
        );
    }

    #[test]
    fn test_region_names_are_case_insensitive() {
        let text = format!(
            "{}\n[cache.regions]\nEmployee = \"read-only\"\n",
            MINIMAL
        );
        let cfg = Configuration::from_toml_str(&text, ".").unwrap();
        assert_eq!(cfg.property("cache.regions.employee"), Some("read-only"));
        assert_eq!(
            cfg.cache_manager().strategy_for("EMPLOYEE"),
            Some(CacheStrategy::ReadOnly)
        );

        let clash = format!(
            "{}\n[cache.regions]\nEmployee = \"read-only\"\nemployee = \"read-write\"\n",
            MINIMAL
        );
        let err = Configuration::from_toml_str(&clash, ".").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }), "{:?}", err);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("employee"));
        assert!(is_identifier("_t1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
