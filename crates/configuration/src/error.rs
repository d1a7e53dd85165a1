use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read the configuration file: {0}")]
    Load(#[from] config::ConfigError),

    /// A value parsed but is unusable; `key` is the dotted TOML path.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { key, reason: reason.into() }
    }
}
