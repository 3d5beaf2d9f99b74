//! Text record format for flushed observations.
//!
//! One line per observation:
//!
//! ```text
//! 03/14/26 09:26:53 "cpu.load" 0.5
//! ```
//!
//! The timestamp is UTC, the name is double-quoted with `"` and `\` escaped by
//! a backslash (line breaks and tabs as `\n`, `\r`, `\t`), and the value is
//! the plain textual form with no type tag.

use crate::core::{MetrologError, Result};
use crate::metrics::{MetricType, MetricValue, Observation};
use chrono::NaiveDateTime;
use std::fmt::Write as _;

/// strftime pattern for `MM/DD/YY HH:MM:SS`
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%y %H:%M:%S";

/// Quote a metric name, escaping embedded quotes and backslashes.
///
/// Line breaks and tabs are written as `\n`, `\r` and `\t` so a record always
/// stays on one line.
pub fn quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            },
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Read a quoted name from the start of `input`.
///
/// Returns the unescaped name and the remainder after the closing quote.
pub fn unquote(input: &str) -> Result<(String, &str)> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {},
        _ => return Err(MetrologError::parse("metric name must start with '\"'")),
    }

    let mut name = String::new();
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            name.push(match c {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((name, &input[idx + 1..]));
        } else {
            name.push(c);
        }
    }
    Err(MetrologError::parse("unterminated metric name"))
}

/// Format one observation as a record line, without the trailing newline.
pub fn format_record(observation: &Observation) -> String {
    let mut line = String::with_capacity(observation.name.len() + 40);
    // Writing into a String cannot fail
    let _ = write!(
        line,
        "{} {} {}",
        observation.timestamp.format(TIMESTAMP_FORMAT),
        quote(&observation.name),
        observation.value
    );
    line
}

/// A record read back from a sink file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Timestamp at second precision, UTC
    pub timestamp: NaiveDateTime,
    /// Unescaped metric name
    pub name: String,
    /// Value text as written
    pub value_text: String,
}

impl ParsedRecord {
    /// Interpret the value for a type known out of band
    pub fn value(&self, metric_type: MetricType) -> Result<MetricValue> {
        MetricValue::deserialize(&self.value_text, metric_type)
    }
}

/// Parse one record line produced by [`format_record`].
pub fn parse_record(line: &str) -> Result<ParsedRecord> {
    let line = line.trim_end_matches(['\r', '\n']);

    let mut parts = line.splitn(3, ' ');
    let (date, time, rest) = match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), Some(rest)) => (date, time, rest),
        _ => return Err(MetrologError::parse(format!("truncated record: '{}'", line))),
    };

    let timestamp =
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), TIMESTAMP_FORMAT)
            .map_err(|e| MetrologError::parse(format!("invalid timestamp in '{}': {}", line, e)))?;

    let (name, rest) = unquote(rest)?;
    let value_text = rest
        .strip_prefix(' ')
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MetrologError::parse(format!("missing value in '{}'", line)))?;

    Ok(ParsedRecord {
        timestamp,
        name,
        value_text: value_text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_record_layout() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let obs = Observation::new("cpu", MetricValue::Float(0.5), ts);
        assert_eq!(format_record(&obs), "03/14/26 09:26:53 \"cpu\" 0.5");

        let obs = Observation::new("requests", MetricValue::Integer(-3), ts);
        assert_eq!(format_record(&obs), "03/14/26 09:26:53 \"requests\" -3");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn test_unquote_returns_remainder() {
        let (name, rest) = unquote("\"a \\\"b\\\" \\\\c\" 42").unwrap();
        assert_eq!(name, "a \"b\" \\c");
        assert_eq!(rest, " 42");

        assert!(unquote("no quotes").is_err());
        assert!(unquote("\"never closed").is_err());
    }

    #[test]
    fn test_parse_record_reverses_format() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let obs = Observation::new("disk \"sda\" io", MetricValue::Integer(1024), ts);

        let parsed = parse_record(&format!("{}\n", format_record(&obs))).unwrap();
        assert_eq!(parsed.timestamp, ts.naive_utc());
        assert_eq!(parsed.name, "disk \"sda\" io");
        assert_eq!(parsed.value_text, "1024");
        assert_eq!(
            parsed.value(MetricType::Integer).unwrap(),
            MetricValue::Integer(1024)
        );
    }

    #[test]
    fn test_line_breaks_in_names_stay_on_one_line() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let obs = Observation::new("a\nb\r\tc", MetricValue::Integer(7), ts);

        let line = format_record(&obs);
        assert_eq!(line.lines().count(), 1);
        assert_eq!(line, "01/01/26 00:00:00 \"a\\nb\\r\\tc\" 7");
        assert_eq!(parse_record(&line).unwrap().name, "a\nb\r\tc");

        // A literal backslash followed by 'n' is not a line break
        let (name, _) = unquote(&quote("a\\nb")).unwrap();
        assert_eq!(name, "a\\nb");
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        assert!(parse_record("").is_err());
        assert!(parse_record("13/45/26 99:00:00 \"x\" 1").is_err());
        assert!(parse_record("01/02/26 03:04:05 x 1").is_err());
        assert!(parse_record("01/02/26 03:04:05 \"x\"").is_err());
    }

    #[test]
    fn test_subsecond_precision_truncated() {
        let ts = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        let obs = Observation::new("t", MetricValue::Integer(1), ts);
        let parsed = parse_record(&format_record(&obs)).unwrap();
        assert_eq!(parsed.timestamp.and_utc().timestamp(), 1_700_000_000);
    }
}
