//! Configuration Vault – reads/writes `~/.stride/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stride_middleware::RoutingProfile;
use stride_runtime::{SensingConfig, TrackerConfig};
use stride_types::StrideError;
use zeroize::Zeroize;

/// Tracker thresholds, in metres and seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    pub arrival_threshold_m: f64,
    pub approach_distance_m: f64,
    pub deviation_threshold_m: f64,
    pub deviation_cooldown_secs: u64,
    pub walking_speed_mps: f64,
    pub routing_timeout_secs: u64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        let d = TrackerConfig::default();
        Self {
            arrival_threshold_m: d.arrival_threshold_m,
            approach_distance_m: d.approach_distance_m,
            deviation_threshold_m: d.deviation_threshold_m,
            deviation_cooldown_secs: d.deviation_cooldown.as_secs(),
            walking_speed_mps: d.walking_speed_mps,
            routing_timeout_secs: d.routing_timeout.as_secs(),
        }
    }
}

/// Sensing loop timings, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensingSection {
    pub interval_secs: u64,
    pub capture_timeout_secs: u64,
    pub perception_deadline_secs: u64,
    pub duplicate_window_secs: u64,
}

impl Default for SensingSection {
    fn default() -> Self {
        let d = SensingConfig::default();
        Self {
            interval_secs: d.interval.as_secs(),
            capture_timeout_secs: d.capture_timeout.as_secs(),
            perception_deadline_secs: d.perception_deadline.as_secs(),
            duplicate_window_secs: d.duplicate_window.as_secs(),
        }
    }
}

/// Persisted user configuration stored in `~/.stride/config.toml`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the openrouteservice-compatible routing backend.
    #[serde(default = "default_routing_url")]
    pub routing_url: String,

    /// Routing API key (stored as plain text with owner-only permissions).
    /// Empty means routes are planned by the offline direct router.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub routing_api_key: String,

    #[serde(default)]
    pub routing_profile: RoutingProfile,

    /// Base URL of the perception backend (`/detect`, `/ocr`, `/healthz`).
    #[serde(default = "default_perception_url")]
    pub perception_url: String,

    #[serde(default)]
    pub tracker: TrackerSection,

    #[serde(default)]
    pub sensing: SensingSection,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("routing_url", &self.routing_url)
            .field(
                "routing_api_key",
                if self.routing_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("routing_profile", &self.routing_profile)
            .field("perception_url", &self.perception_url)
            .field("tracker", &self.tracker)
            .field("sensing", &self.sensing)
            .finish()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.routing_api_key.zeroize();
    }
}

fn default_routing_url() -> String {
    "https://api.openrouteservice.org".to_string()
}
fn default_perception_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routing_url: default_routing_url(),
            routing_api_key: String::new(),
            routing_profile: RoutingProfile::default(),
            perception_url: default_perception_url(),
            tracker: TrackerSection::default(),
            sensing: SensingSection::default(),
        }
    }
}

impl Config {
    pub fn has_routing_key(&self) -> bool {
        !self.routing_api_key.is_empty()
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        let t = &self.tracker;
        TrackerConfig {
            profile: self.routing_profile,
            arrival_threshold_m: t.arrival_threshold_m,
            approach_distance_m: t.approach_distance_m,
            deviation_threshold_m: t.deviation_threshold_m,
            deviation_cooldown: Duration::from_secs(t.deviation_cooldown_secs),
            walking_speed_mps: t.walking_speed_mps,
            routing_timeout: Duration::from_secs(t.routing_timeout_secs),
            ..TrackerConfig::default()
        }
    }

    pub fn sensing_config(&self) -> SensingConfig {
        let s = &self.sensing;
        SensingConfig {
            interval: Duration::from_secs(s.interval_secs.max(1)),
            capture_timeout: Duration::from_secs(s.capture_timeout_secs),
            perception_deadline: Duration::from_secs(s.perception_deadline_secs),
            duplicate_window: Duration::from_secs(s.duplicate_window_secs),
            ..SensingConfig::default()
        }
    }
}

/// Return the path to `~/.stride/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".stride").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, StrideError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, StrideError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        StrideError::Config(format!("failed to read config at {}: {}", path.display(), e))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| StrideError::Config(format!("failed to parse config: {}", e)))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `STRIDE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `STRIDE_ROUTING_URL` | `routing_url` |
/// | `STRIDE_ROUTING_API_KEY` | `routing_api_key` |
/// | `STRIDE_PERCEPTION_URL` | `perception_url` |
/// | `STRIDE_SCAN_INTERVAL_SECS` | `sensing.interval_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("STRIDE_ROUTING_URL") {
        cfg.routing_url = v;
    }
    if let Ok(v) = std::env::var("STRIDE_ROUTING_API_KEY") {
        cfg.routing_api_key.zeroize();
        cfg.routing_api_key = v;
    }
    if let Ok(v) = std::env::var("STRIDE_PERCEPTION_URL") {
        cfg.perception_url = v;
    }
    if let Ok(v) = std::env::var("STRIDE_SCAN_INTERVAL_SECS") {
        if let Ok(secs) = v.parse::<u64>() {
            if secs > 0 {
                cfg.sensing.interval_secs = secs;
            }
        }
    }
}

/// Save the config to disk, creating `~/.stride/` if necessary.
pub fn save(cfg: &Config) -> Result<(), StrideError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), StrideError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            StrideError::Config(format!("failed to create config directory: {}", e))
        })?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                StrideError::Config(format!("failed to set config directory permissions: {}", e))
            })?;
        }
    }
    let mut raw = toml::to_string_pretty(cfg)
        .map_err(|e| StrideError::Config(format!("failed to serialize config: {}", e)))?;
    let written = write_private(path, &raw);
    raw.zeroize();
    written.map_err(|e| {
        StrideError::Config(format!("failed to write config at {}: {}", path.display(), e))
    })
}

/// Write with owner-only read/write (rw-------) on Unix.
#[cfg(unix)]
fn write_private(path: &Path, raw: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut f = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    f.write_all(raw.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, raw: &str) -> std::io::Result<()> {
    fs::write(path, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_api_key() {
        let mut cfg = Config::default();
        cfg.routing_api_key = "ors-super-secret".to_string();
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("ors-super-secret"), "key must not appear in debug output");
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn config_debug_shows_not_set_for_empty_key() {
        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.routing_profile, RoutingProfile::FootWalking);
        assert_eq!(loaded.tracker.deviation_threshold_m, 50.0);
        assert_eq!(loaded.sensing.perception_deadline_secs, 25);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "routing_profile = \"wheelchair\"\n[tracker]\narrival_threshold_m = 15.0\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.routing_profile, RoutingProfile::Wheelchair);
        assert_eq!(cfg.tracker.arrival_threshold_m, 15.0);
        assert_eq!(cfg.tracker.approach_distance_m, 80.0);
        assert_eq!(cfg.sensing.interval_secs, 8);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "routing_profile = [").unwrap();
        assert!(matches!(load_from(&path), Err(StrideError::Config(_))));
    }

    #[test]
    fn sections_convert_to_runtime_configs() {
        let mut cfg = Config::default();
        cfg.tracker.deviation_cooldown_secs = 20;
        cfg.sensing.interval_secs = 0;

        let tracker = cfg.tracker_config();
        assert_eq!(tracker.deviation_cooldown, Duration::from_secs(20));
        assert_eq!(tracker.arrival_threshold_m, 20.0);

        let sensing = cfg.sensing_config();
        assert_eq!(sensing.interval, Duration::from_secs(1));
        assert_eq!(sensing.capture_timeout, Duration::from_secs(7));
    }

    #[test]
    fn config_path_points_to_stride_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".stride"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    // Environment variables are process-global; keep every override
    // assertion in one test.
    #[test]
    fn apply_env_overrides_reads_stride_variables() {
        // SAFETY: no other test touches these variables.
        unsafe {
            std::env::set_var("STRIDE_PERCEPTION_URL", "http://phone.local:8000");
            std::env::set_var("STRIDE_SCAN_INTERVAL_SECS", "12");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.perception_url, "http://phone.local:8000");
        assert_eq!(cfg.sensing.interval_secs, 12);

        unsafe { std::env::set_var("STRIDE_SCAN_INTERVAL_SECS", "soon") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sensing.interval_secs, 8);

        unsafe {
            std::env::remove_var("STRIDE_PERCEPTION_URL");
            std::env::remove_var("STRIDE_SCAN_INTERVAL_SECS");
        }
    }
}
