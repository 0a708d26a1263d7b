//! Bridge configuration.
//!
//! Read from `fram-bridge.toml` (every key optional), then overridden by
//! environment variables:
//!
//! | Variable            | Key                        |
//! |---------------------|----------------------------|
//! | `SKYPORTAL_URL`     | `skyportal.base_url`       |
//! | `SKYPORTAL_TOKEN`   | `skyportal.token`          |
//! | `FRAM_PLANS_DIR`    | `storage.root`             |
//! | `FRAM_MIN_ALTITUDE` | `visibility.min_altitude`  |
//! | `RTS2_API_URL`      | `rts2.api_url`             |
//! | `RTS2_USERNAME`     | `rts2.username`            |
//! | `RTS2_PASSWORD`     | `rts2.password`            |

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ObserverLocation;
use crate::db::RepositoryType;
use crate::error::{BridgeError, BridgeResult};

/// Configuration file name searched in the default locations.
pub const CONFIG_FILE_NAME: &str = "fram-bridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub skyportal: SkyPortalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Fixed site; when absent the location is requested from RTS2
    #[serde(default)]
    pub site: Option<SiteConfig>,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub rts2: Rts2Config,
    #[serde(default)]
    pub observe: ObserveConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyPortalConfig {
    #[serde(default = "default_skyportal_url")]
    pub base_url: String,
    /// API token; takes precedence over `token_file`
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// SkyPortal instrument id (22 = FRAM-Auger, 23 = FRAM-CTA-N)
    #[serde(default = "default_instrument_id")]
    pub instrument_id: i64,
    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,
    /// Plans older than this since the trigger are ignored
    #[serde(default = "default_max_age_days")]
    pub max_age_days: f64,
    /// Keep only the first N tiles of a plan (0 = all)
    #[serde(default)]
    pub max_tiles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: RepositoryType,
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Altitude limit in degrees
    #[serde(default = "default_min_altitude")]
    pub min_altitude: f64,
    #[serde(default = "default_horizon_file")]
    pub horizon_file: PathBuf,
    /// Instants sampled across the night for the visibility report
    #[serde(default = "default_night_samples")]
    pub night_samples: usize,
    /// Priority given to newly fetched plans
    #[serde(default)]
    pub default_priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rts2Config {
    #[serde(default = "default_rts2_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// RTS2 target enabled while plans are pending
    #[serde(default = "default_target_id")]
    pub target_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserveConfig {
    /// Pointings to visit in one pass
    #[serde(default = "default_max_pointings")]
    pub max_pointings: usize,
    /// Frames to acquire at every pointing
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Exposure in seconds
    #[serde(default = "default_exposure")]
    pub exposure: f64,
    #[serde(default = "default_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_observer_name")]
    pub observer_name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Overwrite files that were already exported
    #[serde(default)]
    pub replace: bool,
}

fn default_skyportal_url() -> String {
    "https://skyportal-icare.ijclab.in2p3.fr".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".token")
}

fn default_instrument_id() -> i64 {
    22
}

fn default_poll_delay_secs() -> u64 {
    10
}

fn default_max_age_days() -> f64 {
    1.0
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("plans")
}

/// Altitude limits must be finite and inside [-90, 90].
fn check_min_altitude(value: f64) -> BridgeResult<f64> {
    if value.is_finite() && (-90.0..=90.0).contains(&value) {
        Ok(value)
    } else {
        Err(BridgeError::Configuration(format!(
            "min_altitude must lie in [-90, 90] degrees, got {}",
            value
        )))
    }
}

fn default_min_altitude() -> f64 {
    20.0
}

fn default_horizon_file() -> PathBuf {
    PathBuf::from("/etc/rts2/horizon")
}

fn default_night_samples() -> usize {
    50
}

fn default_rts2_url() -> String {
    "http://localhost:8889".to_string()
}

fn default_target_id() -> i64 {
    50
}

fn default_max_pointings() -> usize {
    20
}

fn default_frames() -> u32 {
    1
}

fn default_exposure() -> f64 {
    120.0
}

fn default_filter() -> String {
    "R".to_string()
}

fn default_observer_name() -> String {
    "FRAM".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for SkyPortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_skyportal_url(),
            token: None,
            token_file: default_token_file(),
            instrument_id: default_instrument_id(),
            poll_delay_secs: default_poll_delay_secs(),
            max_age_days: default_max_age_days(),
            max_tiles: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: RepositoryType::default(),
            root: default_storage_root(),
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            min_altitude: default_min_altitude(),
            horizon_file: default_horizon_file(),
            night_samples: default_night_samples(),
            default_priority: 0.0,
        }
    }
}

impl Default for Rts2Config {
    fn default() -> Self {
        Self {
            api_url: default_rts2_url(),
            username: String::new(),
            password: String::new(),
            target_id: default_target_id(),
        }
    }
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            max_pointings: default_max_pointings(),
            frames: default_frames(),
            exposure: default_exposure(),
            filter: default_filter(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            observer_name: default_observer_name(),
            output_dir: default_output_dir(),
            replace: false,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Configuration(format!("Failed to parse config: {}", e)))?;
        check_min_altitude(config.visibility.min_altitude)?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `fram-bridge.toml` in the current directory, then in
    /// `config/`. Falls back to built-in defaults when neither exists.
    pub fn from_default_location() -> BridgeResult<Self> {
        let search_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("config").join(CONFIG_FILE_NAME),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                return Self::from_file(path);
            }
        }

        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from `path` (or the default location) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_location()?,
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> BridgeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SKYPORTAL_URL") {
            self.skyportal.base_url = url;
        }
        if let Some(token) = lookup("SKYPORTAL_TOKEN") {
            self.skyportal.token = Some(token);
        }
        if let Some(root) = lookup("FRAM_PLANS_DIR") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(min_alt) = lookup("FRAM_MIN_ALTITUDE") {
            let value: f64 = min_alt.trim().parse().map_err(|_| {
                BridgeError::Configuration(format!(
                    "FRAM_MIN_ALTITUDE must be a number of degrees, got '{}'",
                    min_alt
                ))
            })?;
            self.visibility.min_altitude = check_min_altitude(value)?;
        }
        if let Some(url) = lookup("RTS2_API_URL") {
            self.rts2.api_url = url;
        }
        if let Some(username) = lookup("RTS2_USERNAME") {
            self.rts2.username = username;
        }
        if let Some(password) = lookup("RTS2_PASSWORD") {
            self.rts2.password = password;
        }
        Ok(())
    }

    /// SkyPortal token: the configured value, else the token file.
    pub fn resolve_token(&self) -> BridgeResult<String> {
        if let Some(token) = self.skyportal.token.as_deref().map(str::trim) {
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }

        match fs::read_to_string(&self.skyportal.token_file) {
            Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            Ok(_) => {
                warn!("Token file {} is empty", self.skyportal.token_file.display());
                Err(BridgeError::MissingToken)
            }
            Err(_) => Err(BridgeError::MissingToken),
        }
    }

    /// Configured fixed site, validated.
    pub fn site_location(&self) -> BridgeResult<Option<ObserverLocation>> {
        self.site
            .map(|site| ObserverLocation::new(site.latitude, site.longitude, site.elevation_m))
            .transpose()
    }

    /// Altitude limit as a typed angle.
    pub fn min_altitude(&self) -> qtty::Degrees {
        qtty::Degrees::new(self.visibility.min_altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.visibility.min_altitude, 20.0);
        assert_eq!(config.skyportal.instrument_id, 22);
        assert_eq!(config.rts2.target_id, 50);
        assert_eq!(config.storage.backend, RepositoryType::Filesystem);
        assert!(config.site.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [skyportal]
            instrument_id = 23
            max_tiles = 10

            [site]
            latitude = 28.3
            longitude = -16.5

            [storage]
            backend = "local"
            "#,
        )
        .unwrap();
        assert_eq!(config.skyportal.instrument_id, 23);
        assert_eq!(config.skyportal.max_tiles, 10);
        assert_eq!(config.skyportal.poll_delay_secs, 10);
        assert_eq!(config.storage.backend, RepositoryType::Local);
        assert_eq!(config.storage.root, PathBuf::from("plans"));
        let site = config.site_location().unwrap().unwrap();
        assert_eq!(site.latitude, 28.3);
        assert_eq!(site.elevation_m, 0.0);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[skyportal\n"),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_site_is_rejected() {
        let config = BridgeConfig::from_toml_str("[site]\nlatitude = 95.0\nlongitude = 0.0\n").unwrap();
        assert!(matches!(
            config.site_location(),
            Err(BridgeError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SKYPORTAL_TOKEN", "abc"),
            ("FRAM_MIN_ALTITUDE", "25.5"),
            ("RTS2_USERNAME", "observer"),
        ]
        .into_iter()
        .collect();
        let mut config = BridgeConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.skyportal.token.as_deref(), Some("abc"));
        assert_eq!(config.visibility.min_altitude, 25.5);
        assert_eq!(config.rts2.username, "observer");
        assert_eq!(config.resolve_token().unwrap(), "abc");
    }

    #[test]
    fn test_bad_min_altitude_override() {
        let mut config = BridgeConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "FRAM_MIN_ALTITUDE").then(|| "high".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_or_out_of_range_min_altitude_rejected() {
        for bad in ["NaN", "inf", "-inf", "90.5", "-91"] {
            let mut config = BridgeConfig::default();
            let result = config.apply_overrides(|key| {
                (key == "FRAM_MIN_ALTITUDE").then(|| bad.to_string())
            });
            assert!(
                matches!(result, Err(BridgeError::Configuration(_))),
                "{} was accepted",
                bad
            );
            assert_eq!(config.visibility.min_altitude, 20.0);
        }

        let mut config = BridgeConfig::default();
        config
            .apply_overrides(|key| (key == "FRAM_MIN_ALTITUDE").then(|| "-5".to_string()))
            .unwrap();
        assert_eq!(config.visibility.min_altitude, -5.0);

        assert!(matches!(
            BridgeConfig::from_toml_str("[visibility]\nmin_altitude = nan\n"),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn test_token_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join(".token");
        fs::write(&token_file, "  secret-token\n").unwrap();

        let mut config = BridgeConfig::default();
        config.skyportal.token_file = token_file;
        assert_eq!(config.resolve_token().unwrap(), "secret-token");

        config.skyportal.token_file = dir.path().join("missing");
        assert_eq!(config.resolve_token(), Err(BridgeError::MissingToken));
    }
}
