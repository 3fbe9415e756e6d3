//! Display formatting in the ru-RU conventions used for amounts and dates.

use chrono::{DateTime, NaiveDate};

/// No-break space used as the thousands separator and before the currency sign.
const NBSP: char = '\u{a0}';

const CURRENCY_SIGN: &str = "₽";

/// Format an amount in rubles, e.g. `1000.0` -> `1 000,00 ₽` (no-break spaces).
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };

    format!(
        "{}{},{:02}{}{}",
        sign,
        group_thousands(whole),
        fraction,
        NBSP,
        CURRENCY_SIGN
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(NBSP);
        }
        grouped.push(c);
    }
    grouped
}

/// Format a date as `DD.MM.YYYY`.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps; anything else is returned
/// unchanged.
pub fn format_date(date: &str) -> String {
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        day.format("%d.%m.%Y").to_string()
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        dt.date_naive().format("%d.%m.%Y").to_string()
    } else {
        date.to_string()
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
