use thiserror::Error;

#[derive(Error, Debug)]
pub enum JamstarError {
    #[error("Administrator rights error: {0}")]
    AdminRights(String),

    #[cfg_attr(not(windows), allow(dead_code))]
    #[error("Firewall operation failed: {0}")]
    FirewallError(String),

    #[cfg_attr(not(windows), allow(dead_code))]
    #[error("Notification window error: {0}")]
    WindowError(String),

    #[cfg_attr(not(windows), allow(dead_code))]
    #[error("Hotkey registration failed: {0}")]
    HotkeyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg_attr(windows, allow(dead_code))]
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),
}

pub type Result<T> = std::result::Result<T, JamstarError>;
