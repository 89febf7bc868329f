/// Utility functions shared by the SLA services
use chrono::Duration;

/// Format a span of time the way notification emails phrase it,
/// e.g. "2 hours 5 minutes" or "3 days 4 hours".
///
/// Only the two most significant units are kept. Negative spans are treated
/// as zero, and anything under a minute reads "less than a minute".
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use oxidesk_sla::shared::utils::format_relative_duration;
/// assert_eq!(format_relative_duration(Duration::minutes(125)), "2 hours 5 minutes");
/// ```
pub fn format_relative_duration(span: Duration) -> String {
    let total_minutes = span.num_minutes().max(0);
    if total_minutes == 0 {
        return "less than a minute".to_string();
    }

    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .skip_while(|(value, _)| *value == 0)
        .take(2)
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| pluralize(value, unit))
        .collect();

    parts.join(" ")
}

fn pluralize(value: i64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes_only() {
        assert_eq!(format_relative_duration(Duration::minutes(1)), "1 minute");
        assert_eq!(format_relative_duration(Duration::minutes(45)), "45 minutes");
    }

    #[test]
    fn test_format_keeps_two_most_significant_units() {
        assert_eq!(
            format_relative_duration(Duration::minutes(125)),
            "2 hours 5 minutes"
        );
        assert_eq!(
            format_relative_duration(Duration::days(3) + Duration::hours(4) + Duration::minutes(59)),
            "3 days 4 hours"
        );
    }

    #[test]
    fn test_format_skips_zero_units() {
        assert_eq!(format_relative_duration(Duration::hours(2)), "2 hours");
        assert_eq!(
            format_relative_duration(Duration::days(1) + Duration::minutes(30)),
            "1 day"
        );
    }

    #[test]
    fn test_format_sub_minute_and_negative() {
        assert_eq!(
            format_relative_duration(Duration::seconds(40)),
            "less than a minute"
        );
        assert_eq!(
            format_relative_duration(Duration::minutes(-10)),
            "less than a minute"
        );
    }
}
