// crates/core/src/reward.rs
//! Reward label rendering for posting cards.

/// Reward type used when a posting's reward type row is missing.
pub const UNKNOWN_REWARD_CODE: &str = "UNKNOWN";
pub const UNKNOWN_REWARD_DISPLAY: &str = "Reward";

/// Render a reward label from its type code, display name and value.
///
/// `POINTS` gets thousands separators, any `*GIFT*` code gets a `$` prefix,
/// everything else is `"{value} {display}"`. Codes compare case-insensitively.
pub fn format_reward_label(code: &str, display: &str, value: f64) -> String {
    let code = code.to_uppercase();
    if code == "POINTS" {
        format!("{} {display}", group_thousands(value))
    } else if code.contains("GIFT") {
        format!("${} {display}", plain_number(value))
    } else {
        format!("{} {display}", plain_number(value))
    }
}

/// `500.0` → `"500"`, `12.5` → `"12.5"`.
fn plain_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// `1234567.5` → `"1,234,567.5"`. At most three fraction digits.
fn group_thousands(value: f64) -> String {
    if !value.is_finite() {
        return format!("{value}");
    }
    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        "-"
    } else {
        ""
    };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}
