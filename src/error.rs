use thiserror::Error;

/// Ribbon error types
///
/// None of these are fatal to playback. Capture failures are logged by the
/// controller and swallowed; config failures fall back to defaults unless the
/// caller asked for strict loading.
#[derive(Error, Debug)]
pub enum RibbonError {
    #[error("Analysis capture error: {0}")]
    Capture(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RibbonError>;
