use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use maturity_sync::{Cadence, SyncSettings};

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

const APP_DIR: &str = "maturity-assessment";

const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2_000;
const DEFAULT_EDIT_IDLE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SYNC_INTERVAL_EDITING_MS: u64 = 30_000;
const DEFAULT_SYNC_INTERVAL_IDLE_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Local store directory. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Custom question catalog. The built-in catalog is used when unset
    /// or unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    pub autosave_delay_ms: u64,
    pub edit_idle_timeout_ms: u64,
    pub sync_interval_editing_ms: u64,
    pub sync_interval_idle_ms: u64,
    /// Version tag stamped on saved assessments. Defaults to the build version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl Default for MaturityConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            data_dir: None,
            catalog_path: None,
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            edit_idle_timeout_ms: DEFAULT_EDIT_IDLE_TIMEOUT_MS,
            sync_interval_editing_ms: DEFAULT_SYNC_INTERVAL_EDITING_MS,
            sync_interval_idle_ms: DEFAULT_SYNC_INTERVAL_IDLE_MS,
            app_version: None,
        }
    }
}

impl MaturityConfig {
    pub fn data_dir(&self) -> eyre::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir().ok_or_else(|| eyre::eyre!("no data directory found"))?;
        Ok(base.join(APP_DIR))
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let mut settings = SyncSettings {
            autosave_delay: Duration::from_millis(self.autosave_delay_ms),
            edit_idle_timeout: Duration::from_millis(self.edit_idle_timeout_ms),
            cadence: Cadence {
                editing: Duration::from_millis(self.sync_interval_editing_ms),
                idle: Duration::from_millis(self.sync_interval_idle_ms),
            },
            ..SyncSettings::default()
        };
        if let Some(version) = &self.app_version {
            settings.app_version = version.clone();
        }
        settings
    }
}

pub fn default_config_path() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join(APP_DIR).join("config.json"))
}

/// Load the config at `path`, or the defaults when no file exists yet.
pub fn load_config(path: &Path) -> eyre::Result<MaturityConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(MaturityConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: MaturityConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value.
fn migrate(mut json: serde_json::Value, from_version: u32) -> eyre::Result<serde_json::Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update maturity."
        ));
    }

    // v0 → v1: timing fields became configurable
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;
        for (field, default) in [
            ("autosave_delay_ms", DEFAULT_AUTOSAVE_DELAY_MS),
            ("edit_idle_timeout_ms", DEFAULT_EDIT_IDLE_TIMEOUT_MS),
            ("sync_interval_editing_ms", DEFAULT_SYNC_INTERVAL_EDITING_MS),
            ("sync_interval_idle_ms", DEFAULT_SYNC_INTERVAL_IDLE_MS),
        ] {
            obj.entry(field).or_insert(serde_json::Value::from(default));
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (added timing fields)");
    }

    Ok(json)
}

pub fn save_config(config: &MaturityConfig, path: &Path) -> eyre::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path {} has no parent", path.display()))?;
    std::fs::create_dir_all(dir)?;

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;

    // Write to a temp file then rename for atomicity
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
