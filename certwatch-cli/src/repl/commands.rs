use std::time::Duration;

use certwatch_core::output::OutputFormat;

/// Default pause between passes in `watch`.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CommandContext {
    pub output_format: OutputFormat,
    pub watch_interval: Duration,
}

impl CommandContext {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(OutputFormat::Human)
    }
}

#[derive(Debug)]
pub enum CommandResult {
    Continue,
    Exit,
    Error(String),
}

/// Parse `30`, `30s`, `5m` or `2h` into a duration.
pub fn parse_interval(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();
    let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => text.split_at(idx),
        None => (text.as_str(), "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        _ => return None,
    };
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_interval("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_interval("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_interval("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_interval("0"), None);
        assert_eq!(parse_interval("soon"), None);
        assert_eq!(parse_interval("5d"), None);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(45)), "45s");
        assert_eq!(format_interval(Duration::from_secs(300)), "5m");
        assert_eq!(format_interval(Duration::from_secs(7200)), "2h");
    }
}
