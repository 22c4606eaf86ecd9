//! Configuration file management for nutriloop.
//!
//! Provides a TOML-based config file at `~/.config/nutriloop/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use nutriloop_core::llm::{OpenAiProvider, ProviderConfig};
use nutriloop_core::orchestrator::OrchestratorConfig;
use nutriloop_core::tools::{MailBackend, MailConfig};
use nutriloop_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub llm: LlmSection,
    pub mail: MailSection,
    pub orchestrator: OrchestratorSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Provider name: `scripted` or `openai`.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Prefer the `OPENAI_API_KEY` env var; the file is a fallback.
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    /// Delivery backend: `outbox` or `smtp`.
    pub backend: Option<String>,
    pub from: Option<String>,
    pub outbox_dir: Option<PathBuf>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub retry_max: Option<i32>,
    pub doctor_email: Option<String>,
}

impl ConfigFile {
    /// The populated file `nutriloop init` writes.
    pub fn default_file() -> Self {
        Self {
            database: DatabaseSection {
                path: Some(DbConfig::default_path()),
            },
            llm: LlmSection {
                provider: Some("scripted".to_string()),
                model: Some(OpenAiProvider::DEFAULT_MODEL.to_string()),
                base_url: None,
                api_key: None,
                timeout_secs: None,
            },
            mail: MailSection {
                backend: Some("outbox".to_string()),
                from: Some("clinic@nutriloop.local".to_string()),
                outbox_dir: Some(default_outbox_dir()),
                smtp_host: None,
                smtp_port: None,
                smtp_username: None,
                smtp_password: None,
            },
            orchestrator: OrchestratorSection {
                retry_max: Some(3),
                doctor_email: Some("doctor@nutriloop.local".to_string()),
            },
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the nutriloop config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/nutriloop` or
/// `~/.config/nutriloop`. We intentionally ignore the platform-specific
/// `dirs::config_dir()` (which returns `~/Library/Application Support`
/// on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nutriloop");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nutriloop")
}

/// Return the path to the nutriloop config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where outbox mail lands when the config names no directory.
pub fn default_outbox_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nutriloop")
        .join("outbox")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Set permissions to 0600 (owner read/write only) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct CliConfig {
    pub db_config: DbConfig,
    pub provider_config: ProviderConfig,
    pub mail_config: MailConfig,
    pub orchestrator_config: OrchestratorConfig,
}

impl CliConfig {
    /// Resolve configuration using the chain: CLI flag > env var >
    /// config file > default.
    ///
    /// - DB path: `cli_database` > `NUTRILOOP_DATABASE` env >
    ///   `[database].path` > `DbConfig::default_path()`
    /// - Provider: `NUTRILOOP_LLM_PROVIDER` env > `[llm].provider` >
    ///   `"scripted"` (the `run` command's `--provider` flag overrides
    ///   all of these)
    /// - API key: `OPENAI_API_KEY` env > `[llm].api_key`
    pub fn resolve(cli_database: Option<&std::path::Path>) -> Result<Self> {
        let file = load_config().ok();

        // DB path resolution.
        let database_path = if let Some(path) = cli_database {
            path.to_path_buf()
        } else if let Ok(path) = std::env::var("NUTRILOOP_DATABASE") {
            PathBuf::from(path)
        } else if let Some(path) = file.as_ref().and_then(|f| f.database.path.clone()) {
            path
        } else {
            DbConfig::default_path()
        };
        let db_config = DbConfig::new(database_path);

        // LLM provider resolution.
        let defaults = ProviderConfig::default();
        let provider = if let Ok(name) = std::env::var("NUTRILOOP_LLM_PROVIDER") {
            name
        } else if let Some(name) = file.as_ref().and_then(|f| f.llm.provider.clone()) {
            name
        } else {
            defaults.provider
        };
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| file.as_ref().and_then(|f| f.llm.api_key.clone()));
        let provider_config = ProviderConfig {
            provider,
            api_key,
            base_url: file
                .as_ref()
                .and_then(|f| f.llm.base_url.clone())
                .unwrap_or(defaults.base_url),
            model: file
                .as_ref()
                .and_then(|f| f.llm.model.clone())
                .unwrap_or(defaults.model),
            timeout_secs: file
                .as_ref()
                .and_then(|f| f.llm.timeout_secs)
                .unwrap_or(defaults.timeout_secs),
        };

        // Mail resolution.
        let mail = file.as_ref().map(|f| &f.mail);
        let backend_name = mail
            .and_then(|m| m.backend.as_deref())
            .unwrap_or("outbox");
        let backend = match backend_name {
            "outbox" => MailBackend::Outbox {
                dir: mail
                    .and_then(|m| m.outbox_dir.clone())
                    .unwrap_or_else(default_outbox_dir),
            },
            "smtp" => {
                let host = mail
                    .and_then(|m| m.smtp_host.clone())
                    .context("[mail] backend = \"smtp\" requires smtp_host in the config file")?;
                MailBackend::Smtp {
                    host,
                    port: mail.and_then(|m| m.smtp_port).unwrap_or(587),
                    username: mail.and_then(|m| m.smtp_username.clone()),
                    password: mail.and_then(|m| m.smtp_password.clone()),
                }
            }
            other => bail!("unknown mail backend {other:?}; expected \"outbox\" or \"smtp\""),
        };
        let mail_config = MailConfig {
            backend,
            from: mail
                .and_then(|m| m.from.clone())
                .unwrap_or_else(|| "clinic@nutriloop.local".to_string()),
        };

        // Orchestrator resolution.
        let mut orchestrator_config = OrchestratorConfig::default();
        if let Some(section) = file.as_ref().map(|f| &f.orchestrator) {
            if let Some(retry_max) = section.retry_max {
                orchestrator_config.retry_max = retry_max;
            }
            if let Some(ref doctor_email) = section.doctor_email {
                orchestrator_config.doctor_email = doctor_email.clone();
            }
        }

        Ok(Self {
            db_config,
            provider_config,
            mail_config,
            orchestrator_config,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Point HOME and XDG_CONFIG_HOME at a temp dir so load_config()
    /// cannot find a real config file, restoring them on drop.
    struct Hermit {
        home: Option<String>,
        xdg: Option<String>,
        _tmp: tempfile::TempDir,
    }

    impl Hermit {
        fn new() -> Self {
            let tmp = tempfile::TempDir::new().unwrap();
            let home = std::env::var("HOME").ok();
            let xdg = std::env::var("XDG_CONFIG_HOME").ok();
            unsafe { std::env::set_var("HOME", tmp.path()) };
            unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
            Self {
                home,
                xdg,
                _tmp: tmp,
            }
        }
    }

    impl Drop for Hermit {
        fn drop(&mut self) {
            match self.home.take() {
                Some(h) => unsafe { std::env::set_var("HOME", h) },
                None => unsafe { std::env::remove_var("HOME") },
            }
            match self.xdg.take() {
                Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
                None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
            }
        }
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("nutriloop/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }

    #[test]
    fn default_file_roundtrips_through_toml() {
        let original = ConfigFile::default_file();
        let contents = toml::to_string_pretty(&original).unwrap();
        let loaded: ConfigFile = toml::from_str(&contents).unwrap();

        assert_eq!(loaded.database.path, original.database.path);
        assert_eq!(loaded.llm.provider.as_deref(), Some("scripted"));
        assert_eq!(loaded.mail.backend.as_deref(), Some("outbox"));
        assert_eq!(loaded.orchestrator.retry_max, Some(3));
    }

    #[test]
    fn minimal_file_parses_with_empty_sections() {
        let loaded: ConfigFile = toml::from_str("[llm]\nprovider = \"openai\"\n").unwrap();
        assert_eq!(loaded.llm.provider.as_deref(), Some("openai"));
        assert!(loaded.database.path.is_none());
        assert!(loaded.mail.backend.is_none());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_env() {
        let _lock = lock_env();
        let _hermit = Hermit::new();

        unsafe { std::env::set_var("NUTRILOOP_DATABASE", "/tmp/env.db") };
        let config = CliConfig::resolve(Some(std::path::Path::new("/tmp/cli.db"))).unwrap();
        unsafe { std::env::remove_var("NUTRILOOP_DATABASE") };

        assert_eq!(config.db_config.database_path, PathBuf::from("/tmp/cli.db"));
    }

    #[test]
    fn resolve_reads_provider_and_key_from_env() {
        let _lock = lock_env();
        let _hermit = Hermit::new();

        unsafe { std::env::set_var("NUTRILOOP_LLM_PROVIDER", "openai") };
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-test") };
        let config = CliConfig::resolve(None).unwrap();
        unsafe { std::env::remove_var("NUTRILOOP_LLM_PROVIDER") };
        unsafe { std::env::remove_var("OPENAI_API_KEY") };

        assert_eq!(config.provider_config.provider, "openai");
        assert_eq!(config.provider_config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let _hermit = Hermit::new();

        unsafe { std::env::remove_var("NUTRILOOP_DATABASE") };
        unsafe { std::env::remove_var("NUTRILOOP_LLM_PROVIDER") };
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let config = CliConfig::resolve(None).unwrap();

        assert!(config.db_config.database_path.ends_with("nutriloop/nutriloop.db"));
        assert_eq!(config.provider_config.provider, "scripted");
        assert!(matches!(config.mail_config.backend, MailBackend::Outbox { .. }));
        assert_eq!(config.orchestrator_config.retry_max, 3);
    }
}
