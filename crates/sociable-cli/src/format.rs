use chrono::{DateTime, Utc};

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a timestamp for listing, or an empty string when unknown
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%b %d, %Y %H:%M").to_string())
        .unwrap_or_default()
}

/// "1 like" / "3 likes"
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Xin chào các bạn", 9), "Xin ch...");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 2, 8, 15, 0).unwrap();
        assert_eq!(format_timestamp(Some(ts)), "Nov 02, 2024 08:15");
        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "like"), "1 like");
        assert_eq!(plural(0, "comment"), "0 comments");
    }
}
