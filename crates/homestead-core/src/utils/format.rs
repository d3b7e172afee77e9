use chrono::{DateTime, Utc};

/// Format a decimal price string for display.
/// "350000.00" becomes "$350,000"; cents are kept only when non-zero.
pub fn format_price(price: &str) -> String {
    let Ok(value) = price.trim().parse::<f64>() else {
        return price.to_string(); // Return original if can't format
    };

    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    if fraction == 0 {
        format!("{}${}", sign, grouped)
    } else {
        format!("{}${}.{:02}", sign, grouped, fraction)
    }
}

/// Format a bathroom count: "2.0" becomes "2", "1.5" stays "1.5"
pub fn format_bathrooms(bathrooms: &str) -> String {
    match bathrooms.trim().parse::<f64>() {
        Ok(value) if value.fract() == 0.0 => format!("{}", value as i64),
        Ok(value) => format!("{}", value),
        Err(_) => bathrooms.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Format a timestamp for display, e.g. "May 01, 2024"
pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
    date.map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("350000.00"), "$350,000");
        assert_eq!(format_price("1234567.5"), "$1,234,567.50");
        assert_eq!(format_price("999"), "$999");
        assert_eq!(format_price("0"), "$0");
        assert_eq!(format_price("-1500"), "-$1,500");
        assert_eq!(format_price("call us"), "call us"); // Not a number, return as-is
    }

    #[test]
    fn test_format_bathrooms() {
        assert_eq!(format_bathrooms("2.0"), "2");
        assert_eq!(format_bathrooms("1.5"), "1.5");
        assert_eq!(format_bathrooms("n/a"), "n/a");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Café au lait", 7), "Café...");
    }

    #[test]
    fn test_format_date() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_date(Some(&dt)), "May 01, 2024");
        assert_eq!(format_date(None), "-");
    }
}
