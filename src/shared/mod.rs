//! Shared utilities for pixelparts

use rmcp::ErrorData as McpError;

/// Format milliseconds to a short human readable string
pub fn format_millis(ms: u64) -> String {
    let seconds = ms / 1000;
    if seconds == 0 {
        format!("{}ms", ms)
    } else if seconds < 60 {
        format!("{}.{}s", seconds, (ms % 1000) / 100)
    } else if seconds < 3600 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

pub fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Create an internal error
pub fn internal_error(msg: impl Into<String>) -> McpError {
    McpError::internal_error(msg.into(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(250), "250ms");
        assert_eq!(format_millis(1_500), "1.5s");
        assert_eq!(format_millis(120_000), "2m");
        assert_eq!(format_millis(125_000), "2m 5s");
        assert_eq!(format_millis(3_660_000), "1h 1m");
    }
}
