use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, DatabaseConfig, LogConfig, SessionConfig, WebConfig};

/// The file looked up when no `--config` flag is given.
pub const DEFAULT_CONFIG_PATH: &str = "classbook.toml";

/// Loads the application configuration from a TOML file.
///
/// A missing file is not an error: the built-in defaults are used and a
/// warning is logged. A file that exists but cannot be parsed, or that
/// fails validation, is reported as an error so startup can abort.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Configuration file not found, using defaults.");
        return Ok(Config::default());
    }

    let builder = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/definitely/not/here/classbook.toml")).unwrap();
        assert_eq!(config.web.listen, "0.0.0.0:4000");
        assert_eq!(config.database.query_timeout_ms, 3000);
        assert!(config.log.directory.is_none());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let file = temp_file(
            r#"
            [web]
            listen = "127.0.0.1:8080"
            cors_allowed_origins = ["http://localhost:3000"]

            [database]
            dbname = "journal_test"
            "#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.web.listen, "127.0.0.1:8080");
        assert_eq!(config.web.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.database.dbname, "journal_test");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "classbook");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = temp_file("[web\nlisten = ");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.web.listen = "not-an-address".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "web.listen", .. })
        ));

        config.web.listen = "0.0.0.0:4000".to_string();
        config.database.query_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "database.query_timeout_ms", .. })
        ));
    }
}
