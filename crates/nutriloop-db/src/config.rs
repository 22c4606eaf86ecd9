use std::env;
use std::path::PathBuf;

/// Database configuration.
///
/// Reads from the `NUTRILOOP_DATABASE` environment variable, falling back to
/// `~/.local/share/nutriloop/nutriloop.db` (or the platform equivalent).
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
}

impl DbConfig {
    /// The default database file used when no environment variable is set.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nutriloop")
            .join("nutriloop.db")
    }

    /// Build a config from the environment.
    ///
    /// Priority: `NUTRILOOP_DATABASE` env var, then the platform default.
    pub fn from_env() -> Self {
        let database_path = env::var("NUTRILOOP_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self { database_path }
    }

    /// Build a config from an explicit path (useful for tests and CLI flags).
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_db_file() {
        let path = DbConfig::default_path();
        assert!(path.ends_with("nutriloop/nutriloop.db"));
    }

    #[test]
    fn explicit_new() {
        let cfg = DbConfig::new("/tmp/custom.db");
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/custom.db"));
    }
}
