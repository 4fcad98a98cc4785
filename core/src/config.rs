use crate::backend::{BackendKind, Identity, DEFAULT_BACKEND_URL};
use crate::handshake::{HandshakeConfig, DEFAULT_POLL_INTERVAL};
use crate::success::DEFAULT_CLOSE_AFTER;
use crate::window::OriginPolicy;
use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub base_url: Url,
    pub backend: BackendKind,
    pub identity: Identity,
    pub poll_interval: Duration,
    /// Empty means "the backend's own origin".
    pub allowed_origins: Vec<String>,
    pub close_after: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    Missing(PathBuf),
    #[error("connector configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Missing(path) => format!("No conduit.yaml at {}.", path.display()),
            Self::Invalid(detail) => format!("Connector not configured: {detail}. Update conduit.yaml."),
        }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            backend: BackendKind::default(),
            identity: Identity::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            allowed_origins: Vec::new(),
            close_after: DEFAULT_CLOSE_AFTER,
        }
    }
}

impl ConnectorSettings {
    /// Defaults, then the first `conduit.yaml` found, then `.env` and the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "ignoring unreadable .env file");
            }
        }
        let mut settings = match locate_config_file() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|err| {
            ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        let settings = Self::from_yaml(&contents)?;
        tracing::debug!(path = %path.display(), "loaded connector config");
        Ok(settings)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: ConduitConfig = serde_yaml::from_str(contents)
            .map_err(|err| ConfigError::Invalid(format!("invalid conduit.yaml: {err}")))?;
        resolve(file)
    }

    /// `CONDUIT_BACKEND_URL` and `CONDUIT_BACKEND` win over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CONDUIT_BACKEND_URL").filter(|raw| !raw.trim().is_empty()) {
            self.base_url = parse_base_url(&raw)?;
        }
        if let Some(raw) = lookup("CONDUIT_BACKEND") {
            self.backend = parse_backend_kind(&raw)?;
        }
        Ok(())
    }

    pub fn origin_policy(&self) -> OriginPolicy {
        if self.allowed_origins.is_empty() {
            OriginPolicy::backend(&self.base_url)
        } else if self.allowed_origins.iter().any(|origin| origin.trim() == "*") {
            OriginPolicy::AnyOrigin
        } else {
            OriginPolicy::from_origins(&self.allowed_origins)
        }
    }

    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            poll_interval: self.poll_interval,
            origin_policy: self.origin_policy(),
        }
    }
}

fn resolve(file: ConduitConfig) -> Result<ConnectorSettings, ConfigError> {
    let mut settings = ConnectorSettings::default();

    let backend = file.backend.unwrap_or_default();
    if let Some(raw) = backend.base_url {
        settings.base_url = parse_base_url(&raw)?;
    }
    if let Some(kind) = backend.kind {
        settings.backend = kind;
    }

    let identity = file.identity.unwrap_or_default();
    if let Some(user_id) = identity.user_id {
        settings.identity.user_id = non_blank("identity.user_id", user_id)?;
    }
    if let Some(org_id) = identity.org_id {
        settings.identity.org_id = non_blank("identity.org_id", org_id)?;
    }

    let handshake = file.handshake.unwrap_or_default();
    if let Some(ms) = handshake.poll_interval_ms {
        settings.poll_interval = Duration::from_millis(ms).max(MIN_POLL_INTERVAL);
    }
    settings.allowed_origins = handshake.allowed_origins;

    if let Some(secs) = file.success.and_then(|success| success.close_after_secs) {
        settings.close_after = Duration::from_secs(secs);
    }

    Ok(settings)
}

fn non_blank(key: &str, value: String) -> Result<String, ConfigError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("`{key}` must not be empty")));
    }
    Ok(value)
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ConfigError::Invalid(format!("backend url `{raw}` is not valid: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "backend url `{raw}` must use http or https"
        )));
    }
    Ok(url)
}

fn parse_backend_kind(raw: &str) -> Result<BackendKind, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "http" => Ok(BackendKind::Http),
        "mock" => Ok(BackendKind::Mock),
        other => Err(ConfigError::Invalid(format!(
            "unknown backend kind `{other}` (expected http or mock)"
        ))),
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).unwrap_or_else(|_| unreachable!("default backend url is valid"))
}

fn locate_config_file() -> Option<PathBuf> {
    conduit_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn conduit_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("conduit");
        paths.push(config_dir.join("conduit.yaml"));
        paths.push(config_dir.join("conduit.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".conduit").join("conduit.yaml"));
        paths.push(home_dir.join(".conduit").join("conduit.yml"));
    } else {
        paths.push(PathBuf::from("conduit.yaml"));
        paths.push(PathBuf::from("conduit.yml"));
    }
    paths
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConduitConfig {
    backend: Option<BackendSection>,
    identity: Option<IdentitySection>,
    handshake: Option<HandshakeSection>,
    success: Option<SuccessSection>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendSection {
    base_url: Option<String>,
    kind: Option<BackendKind>,
}

#[derive(Debug, Default, Deserialize)]
struct IdentitySection {
    user_id: Option<String>,
    org_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HandshakeSection {
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    allowed_origins: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SuccessSection {
    close_after_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = ConnectorSettings::from_yaml("").expect("defaults");
        assert_eq!(settings, ConnectorSettings::default());
        assert_eq!(settings.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(settings.identity, Identity::new("TestUser", "TestOrg"));
        assert_eq!(settings.poll_interval, Duration::from_millis(200));
        assert_eq!(settings.close_after, Duration::from_secs(5));
    }

    #[test]
    fn reads_every_section() {
        let yaml = r#"
backend:
  base_url: https://integrations.example.com
  kind: mock
identity:
  user_id: alice
  org_id: acme
handshake:
  poll_interval_ms: 500
  allowed_origins:
    - https://integrations.example.com
    - https://auth.example.com/callback
success:
  close_after_secs: 3
"#;
        let settings = ConnectorSettings::from_yaml(yaml).expect("settings");
        assert_eq!(settings.base_url.as_str(), "https://integrations.example.com/");
        assert_eq!(settings.backend, BackendKind::Mock);
        assert_eq!(settings.identity, Identity::new("alice", "acme"));
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.close_after, Duration::from_secs(3));
        let policy = settings.origin_policy();
        assert!(policy.allows("https://auth.example.com"));
        assert!(!policy.allows("http://localhost:8000"));
    }

    #[test]
    fn origin_policy_defaults_to_backend_origin() {
        let settings = ConnectorSettings::default();
        let policy = settings.handshake_config().origin_policy;
        assert!(policy.allows("http://localhost:8000"));
        assert!(!policy.allows("http://localhost:3000"));

        let wildcard = ConnectorSettings {
            allowed_origins: vec!["*".to_string()],
            ..ConnectorSettings::default()
        };
        assert_eq!(wildcard.origin_policy(), OriginPolicy::AnyOrigin);
    }

    #[test]
    fn tiny_poll_interval_is_clamped() {
        let settings =
            ConnectorSettings::from_yaml("handshake:\n  poll_interval_ms: 0\n").expect("settings");
        assert_eq!(settings.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ConnectorSettings::from_yaml("backend:\n  base_url: ftp://example.com\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ConnectorSettings::from_yaml("identity:\n  user_id: '  '\n").unwrap_err();
        assert!(err.user_message().contains("identity.user_id"));

        let err = ConnectorSettings::from_yaml("backend: nowhere\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut settings = ConnectorSettings::default();
        settings
            .apply_env(|key| match key {
                "CONDUIT_BACKEND_URL" => Some("http://127.0.0.1:9000".to_string()),
                "CONDUIT_BACKEND" => Some("MOCK".to_string()),
                _ => None,
            })
            .expect("env");
        assert_eq!(settings.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(settings.backend, BackendKind::Mock);

        let err = settings
            .apply_env(|key| (key == "CONDUIT_BACKEND").then(|| "grpc".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "identity:\n  user_id: bob").expect("write");
        let settings = ConnectorSettings::load_from(file.path()).expect("settings");
        assert_eq!(settings.identity.user_id, "bob");
        assert_eq!(settings.identity.org_id, "TestOrg");

        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("conduit.yaml");
        assert!(matches!(
            ConnectorSettings::load_from(&missing),
            Err(ConfigError::Missing(_))
        ));
    }
}
