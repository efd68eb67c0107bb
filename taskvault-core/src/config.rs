//! Settings — profiles, output locations, feature flags, oracle endpoint.
//!
//! # Storage layout
//!
//! ```text
//! ~/.taskvault/
//!   config.yaml        (settings, mode 0600, written by `taskvault init`)
//!   sync_record.json   (per-project sync cursor, see taskvault-sync)
//! ```
//!
//! Environment variables override the file (see [`Settings::apply_env`]).
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ProjectId;

/// Default name of the custom field holding a record's knowledge expiry date.
pub const DEFAULT_EXPIRY_FIELD_NAME: &str = "Knowledge Expiry";

const SETTINGS_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.taskvault/`
pub fn taskvault_dir_at(home: &Path) -> PathBuf {
    home.join(".taskvault")
}

/// `<home>/.taskvault/config.yaml`. Pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    taskvault_dir_at(home).join(SETTINGS_FILE)
}

// ---------------------------------------------------------------------------
// 2. Types
// ---------------------------------------------------------------------------

/// One tracker account + project pairing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub token: String,
    pub project_id: ProjectId,
    /// Section names or ids never exported for this profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_sections: Vec<String>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("excluded_sections", &self.excluded_sections)
            .finish()
    }
}

/// Which custom field carries the expiry date.
///
/// `id` is the tracker's stable field key and wins when set; `name` is the
/// fallback for setups that only know the display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryFieldConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Default for ExpiryFieldConfig {
    fn default() -> Self {
        ExpiryFieldConfig {
            name: DEFAULT_EXPIRY_FIELD_NAME.to_string(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Download attachments next to the artifacts.
    pub download_attachments: bool,
    /// Send free text through the redaction oracle.
    pub redact: bool,
    /// Ask the vision oracle to describe downloaded images.
    pub analyze_images: bool,
    /// Post a redacted preview back to the record as a comment.
    pub upload_preview: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            download_attachments: true,
            redact: true,
            analyze_images: true,
            upload_preview: false,
        }
    }
}

/// Chat-completions deployment used for redaction, image analysis and Q&A.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

impl fmt::Debug for OracleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .finish()
    }
}

/// Fully resolved oracle connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleEndpoint<'a> {
    pub endpoint: &'a str,
    pub api_key: &'a str,
    pub api_version: &'a str,
    pub deployment: &'a str,
}

/// Root settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profiles: Vec<Profile>,
    /// Where rendered artifacts go. Defaults to `~/TaskVault/knowledge`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
    /// Where mined Q&A pairs go. Defaults to `~/TaskVault/qa`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_root: Option<PathBuf>,
    /// Directory of `.tera` files overriding the embedded templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    pub expiry_field: ExpiryFieldConfig,
    pub features: Features,
    pub oracle: OracleSettings,
}

impl Settings {
    pub fn output_root_at(&self, home: &Path) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(|| home.join("TaskVault").join("knowledge"))
    }

    pub fn qa_root_at(&self, home: &Path) -> PathBuf {
        self.qa_root
            .clone()
            .unwrap_or_else(|| home.join("TaskVault").join("qa"))
    }

    /// True when any enabled feature talks to the oracle.
    pub fn oracle_required(&self) -> bool {
        self.features.redact || self.features.analyze_images
    }

    /// Resolved oracle settings, or the first missing key.
    pub fn oracle_endpoint(&self) -> Result<OracleEndpoint<'_>, ConfigError> {
        fn get<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing {
                    key,
                    required_by: "the oracle",
                })
        }
        Ok(OracleEndpoint {
            endpoint: get(&self.oracle.endpoint, "AZURE_OPENAI_ENDPOINT")?,
            api_key: get(&self.oracle.api_key, "AZURE_OPENAI_API_KEY")?,
            api_version: get(&self.oracle.api_version, "AZURE_OPENAI_API_VERSION")?,
            deployment: get(&self.oracle.deployment, "AZURE_OPENAI_CHAT_DEPLOYMENT")?,
        })
    }

    /// Check everything a sync run needs before any record is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }
        if self.oracle_required() {
            self.oracle_endpoint().map_err(|e| match e {
                ConfigError::Missing { key, .. } => ConfigError::Missing {
                    key,
                    required_by: if self.features.redact {
                        "redaction"
                    } else {
                        "image analysis"
                    },
                },
                other => other,
            })?;
        }
        if self.features.upload_preview && !self.features.redact {
            tracing::warn!("upload_preview is ignored while redaction is disabled");
        }
        Ok(())
    }

    /// Find a profile by exact name or 1-based index.
    pub fn find_profile(&self, selector: &str) -> Result<&Profile, ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }
        if let Some(p) = self.profiles.iter().find(|p| p.name == selector) {
            return Ok(p);
        }
        selector
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|i| (1..=self.profiles.len()).contains(i))
            .map(|i| &self.profiles[i - 1])
            .ok_or_else(|| ConfigError::ProfileNotFound {
                selector: selector.to_string(),
            })
    }

    /// Overlay environment variables on top of the file settings.
    ///
    /// Recognised keys:
    /// - `ASANA_PROFILE_<n>_NAME` / `_TOKEN` / `_PROJECT` (n = 1, 2, … until a gap)
    /// - `AZURE_OPENAI_ENDPOINT` / `_API_KEY` / `_API_VERSION` / `_CHAT_DEPLOYMENT`
    /// - `DOWNLOAD_ATTACHMENTS`, `ENABLE_LLM_ANALYSIS`, `ENABLE_UPLOAD_PREVIEW`
    /// - `EXPIRY_FIELD_NAME`, `EXPIRY_FIELD_ID`, `TASKVAULT_OUTPUT_ROOT`, `TASKVAULT_QA_ROOT`
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for idx in 1.. {
            let name = var(&format!("ASANA_PROFILE_{idx}_NAME"));
            let token = var(&format!("ASANA_PROFILE_{idx}_TOKEN"));
            let project = var(&format!("ASANA_PROFILE_{idx}_PROJECT"));
            let (Some(name), Some(token), Some(project)) = (name, token, project) else {
                break;
            };
            match self.profiles.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    existing.token = token;
                    existing.project_id = ProjectId::from(project);
                }
                None => self.profiles.push(Profile {
                    name,
                    token,
                    project_id: ProjectId::from(project),
                    excluded_sections: Vec::new(),
                }),
            }
        }

        if let Some(v) = var("AZURE_OPENAI_ENDPOINT") {
            self.oracle.endpoint = Some(v);
        }
        if let Some(v) = var("AZURE_OPENAI_API_KEY") {
            self.oracle.api_key = Some(v);
        }
        if let Some(v) = var("AZURE_OPENAI_API_VERSION") {
            self.oracle.api_version = Some(v);
        }
        if let Some(v) = var("AZURE_OPENAI_CHAT_DEPLOYMENT") {
            self.oracle.deployment = Some(v);
        }

        if let Some(v) = var("DOWNLOAD_ATTACHMENTS") {
            self.features.download_attachments = parse_flag("DOWNLOAD_ATTACHMENTS", &v)?;
        }
        if let Some(v) = var("ENABLE_LLM_ANALYSIS") {
            let on = parse_flag("ENABLE_LLM_ANALYSIS", &v)?;
            self.features.redact = on;
            self.features.analyze_images = on;
        }
        if let Some(v) = var("ENABLE_UPLOAD_PREVIEW") {
            self.features.upload_preview = parse_flag("ENABLE_UPLOAD_PREVIEW", &v)?;
        }

        if let Some(v) = var("EXPIRY_FIELD_NAME") {
            self.expiry_field.name = v;
        }
        if let Some(v) = var("EXPIRY_FIELD_ID") {
            self.expiry_field.id = Some(v);
        }
        if let Some(v) = var("TASKVAULT_OUTPUT_ROOT") {
            self.output_root = Some(PathBuf::from(v));
        }
        if let Some(v) = var("TASKVAULT_QA_ROOT") {
            self.qa_root = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.taskvault/config.yaml` without environment overrides.
///
/// A missing file yields [`Settings::default`]; a malformed one is an error
/// carrying the path.
pub fn load_file_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Load settings from `home` and overlay the process environment.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    let mut settings = load_file_at(home)?;
    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Scaffold
// ---------------------------------------------------------------------------

const SETTINGS_TEMPLATE: &str = "\
# taskvault settings
profiles: []
#  - name: support
#    token: <personal access token>
#    project_id: \"1200000000000000\"
#    excluded_sections: [\"Backlog\"]
expiry_field:
  name: Knowledge Expiry
features:
  download_attachments: true
  redact: true
  analyze_images: true
  upload_preview: false
oracle: {}
#  endpoint: https://<resource>.openai.azure.com
#  api_key: <key>
#  api_version: 2024-06-01
#  deployment: gpt-4o-mini
";

/// Write a commented settings template unless one already exists.
///
/// Write flow: `.yaml.tmp` sibling → `chmod 0600` → `rename`. Returns the
/// settings path and whether it was created.
pub fn init_at(home: &Path) -> Result<(PathBuf, bool), ConfigError> {
    let dir = taskvault_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = settings_path_at(home);
    if path.exists() {
        return Ok((path, false));
    }
    let tmp = dir.join(format!("{SETTINGS_FILE}.tmp"));
    std::fs::write(&tmp, SETTINGS_TEMPLATE)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path)?;
    Ok((path, true))
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<(PathBuf, bool), ConfigError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_oracle(mut s: Settings) -> Settings {
        s.oracle = OracleSettings {
            endpoint: Some("https://example.openai.azure.com".into()),
            api_key: Some("k".into()),
            api_version: Some("2024-06-01".into()),
            deployment: Some("gpt".into()),
        };
        s
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let s = load_file_at(tmp.path()).unwrap();
        assert!(s.profiles.is_empty());
        assert_eq!(s.expiry_field.name, DEFAULT_EXPIRY_FIELD_NAME);
        assert!(s.features.download_attachments);
        assert!(!s.features.upload_preview);
    }

    #[test]
    fn env_profiles_stop_at_first_gap() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("ASANA_PROFILE_1_NAME", "support"),
            ("ASANA_PROFILE_1_TOKEN", "t1"),
            ("ASANA_PROFILE_1_PROJECT", "111"),
            ("ASANA_PROFILE_2_NAME", "ops"),
            ("ASANA_PROFILE_2_TOKEN", "t2"),
            // no project for 2 → loop ends
            ("ASANA_PROFILE_3_NAME", "never"),
            ("ASANA_PROFILE_3_TOKEN", "t3"),
            ("ASANA_PROFILE_3_PROJECT", "333"),
        ]))
        .unwrap();
        assert_eq!(s.profiles.len(), 1);
        assert_eq!(s.profiles[0].project_id, ProjectId::from("111"));
    }

    #[test]
    fn env_overrides_existing_profile_by_name() {
        let mut s = Settings::default();
        s.profiles.push(Profile {
            name: "support".into(),
            token: "old".into(),
            project_id: ProjectId::from("1"),
            excluded_sections: vec!["Backlog".into()],
        });
        s.apply_env(env(&[
            ("ASANA_PROFILE_1_NAME", "support"),
            ("ASANA_PROFILE_1_TOKEN", "new"),
            ("ASANA_PROFILE_1_PROJECT", "2"),
        ]))
        .unwrap();
        assert_eq!(s.profiles.len(), 1);
        assert_eq!(s.profiles[0].token, "new");
        assert_eq!(s.profiles[0].excluded_sections, vec!["Backlog".to_string()]);
    }

    #[test]
    fn llm_analysis_flag_toggles_redaction_and_images() {
        let mut s = Settings::default();
        s.apply_env(env(&[("ENABLE_LLM_ANALYSIS", "False")])).unwrap();
        assert!(!s.features.redact);
        assert!(!s.features.analyze_images);
        assert!(!s.oracle_required());
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut s = Settings::default();
        let err = s
            .apply_env(env(&[("DOWNLOAD_ATTACHMENTS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn validate_requires_profiles_and_oracle() {
        let s = Settings::default();
        assert!(matches!(s.validate(), Err(ConfigError::NoProfiles)));

        let mut s = Settings::default();
        s.apply_env(env(&[
            ("ASANA_PROFILE_1_NAME", "support"),
            ("ASANA_PROFILE_1_TOKEN", "t1"),
            ("ASANA_PROFILE_1_PROJECT", "111"),
        ]))
        .unwrap();
        match s.validate() {
            Err(ConfigError::Missing { key, required_by }) => {
                assert_eq!(key, "AZURE_OPENAI_ENDPOINT");
                assert_eq!(required_by, "redaction");
            }
            other => panic!("expected Missing, got {other:?}"),
        }

        with_oracle(s).validate().expect("complete settings validate");
    }

    #[test]
    fn find_profile_by_name_or_index() {
        let mut s = Settings::default();
        for (i, name) in ["a", "b"].iter().enumerate() {
            s.profiles.push(Profile {
                name: name.to_string(),
                token: "t".into(),
                project_id: ProjectId::from(format!("{i}")),
                excluded_sections: vec![],
            });
        }
        assert_eq!(s.find_profile("b").unwrap().name, "b");
        assert_eq!(s.find_profile("1").unwrap().name, "a");
        assert!(matches!(
            s.find_profile("3"),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn profile_debug_hides_token() {
        let p = Profile {
            name: "a".into(),
            token: "secret-token".into(),
            project_id: ProjectId::from("1"),
            excluded_sections: vec![],
        };
        assert!(!format!("{p:?}").contains("secret-token"));
    }

    #[test]
    fn init_writes_template_once() {
        let tmp = TempDir::new().unwrap();
        let (path, created) = init_at(tmp.path()).unwrap();
        assert!(created);
        assert!(path.exists());
        let (_, created_again) = init_at(tmp.path()).unwrap();
        assert!(!created_again);

        let parsed = load_file_at(tmp.path()).expect("template parses");
        assert!(parsed.profiles.is_empty());
        assert_eq!(parsed.expiry_field.name, DEFAULT_EXPIRY_FIELD_NAME);
    }

    #[cfg(unix)]
    #[test]
    fn init_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let (path, _) = init_at(tmp.path()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
