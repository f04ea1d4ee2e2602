//! Bridges emulator log lines into the `log` facade.

use ygb_types::{LogItem, LogLevel};

/// `None` for [`LogLevel::Off`].
pub fn to_log_level(level: LogLevel) -> Option<log::Level> {
    match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(log::Level::Error),
        LogLevel::Warn => Some(log::Level::Warn),
        LogLevel::Info => Some(log::Level::Info),
        LogLevel::Debug => Some(log::Level::Debug),
    }
}

/// Emit one line under `target`.
pub fn forward(target: &str, item: &LogItem) {
    if let Some(level) = to_log_level(item.level) {
        log::log!(target: target, level, "{}", item.msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_maps_to_nothing() {
        assert_eq!(to_log_level(LogLevel::Off), None);
        assert_eq!(to_log_level(LogLevel::Warn), Some(log::Level::Warn));
    }
}
