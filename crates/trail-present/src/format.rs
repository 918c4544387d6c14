//! Typed value formatting for diff display.
//!
//! Money-like numeric fields get fixed two-decimal rendering, date-like
//! fields get a readable date-time, and everything else passes through
//! as-is (JSON strings lose their quotes).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Field-name suffixes treated as monetary/numeric-precision fields.
const MONEY_SUFFIXES: &[&str] = &[
  "price", "amount", "total", "subtotal", "cost", "rate", "balance",
  "discount", "tax",
];

/// Field-name suffixes treated as date/time fields.
const DATE_SUFFIXES: &[&str] = &["_at", "_on", "_date", "date", "time"];

/// Render one diff value for display, driven by the field's name.
pub fn format_value(field: &str, value: &serde_json::Value) -> String {
  if value.is_null() {
    return String::new();
  }

  if is_date_field(field)
    && let Some(s) = value.as_str()
    && let Some(rendered) = format_date_like(s)
  {
    return rendered;
  }

  if is_money_field(field)
    && let Some(n) = value.as_f64()
  {
    return format!("{n:.2}");
  }

  match value {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn is_money_field(field: &str) -> bool {
  MONEY_SUFFIXES.iter().any(|suffix| field.ends_with(suffix))
}

fn is_date_field(field: &str) -> bool {
  DATE_SUFFIXES.iter().any(|suffix| field.ends_with(suffix))
}

/// Try the timestamp shapes diff producers actually emit; `None` falls
/// back to pass-through rendering.
fn format_date_like(s: &str) -> Option<String> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc).format("%b %-d, %Y %-I:%M %p").to_string());
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
    return Some(dt.format("%b %-d, %Y %-I:%M %p").to_string());
  }
  if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Some(d.format("%b %-d, %Y").to_string());
  }
  None
}

/// Human-relative rendering of `then` against `now`: "just now",
/// "4 minutes ago", … — falling back to the plain date past a month.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let gap = now - then;

  if gap < Duration::seconds(10) {
    return "just now".into();
  }
  if gap < Duration::minutes(1) {
    return format!("{} seconds ago", gap.num_seconds());
  }
  if gap < Duration::hours(1) {
    return plural(gap.num_minutes(), "minute");
  }
  if gap < Duration::days(1) {
    return plural(gap.num_hours(), "hour");
  }
  if gap < Duration::days(31) {
    return plural(gap.num_days(), "day");
  }
  then.format("%b %-d, %Y").to_string()
}

fn plural(n: i64, unit: &str) -> String {
  if n == 1 {
    format!("1 {unit} ago")
  } else {
    format!("{n} {unit}s ago")
  }
}
