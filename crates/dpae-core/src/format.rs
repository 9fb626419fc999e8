//! # Field Formatter
//!
//! Normalizes raw field values before they enter a declaration document.
//!
//! - Dates accept a fixed list of patterns and always come out as `YYYY-MM-DD`.
//! - Times accept a fixed list of patterns and always come out as `HH:mm:ss`.
//! - Free text is filtered through a per-field-class allow-set and capped at
//!   32 characters. Disallowed characters are dropped without error, but
//!   every normalization reports how many characters it removed so that the
//!   loss stays visible.
//!
//! Date and time patterns are chrono `strftime` formats tried in order. The
//! whole input must be consumed, and the resulting date or time must exist
//! on the calendar or clock.

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::error::ValidationError;

/// Maximum length, in characters, of a normalized free-text field.
pub const MAX_TEXT_LEN: usize = 32;

/// Birth department used when the real one is missing or unknown.
pub const UNKNOWN_BIRTH_DEPARTMENT: &str = "99";

/// Health service code used when none is set.
pub const DEFAULT_HEALTH_SERVICE: &str = "01";

/// Accepted date patterns, in priority order.
pub const DATE_PATTERNS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%Y%m%d",
    "%Y-%m",
    "%Y%m",
    "%Y",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%y-%m-%d %H:%M:%S",
    "%y-%m-%d %H:%M",
];

/// Accepted time patterns, in priority order.
pub const TIME_PATTERNS: &[&str] = &["%H:%M:%S", "%H:%M", "%H%M%S", "%H%M", "%H"];

/// Last year a two-digit year maps to; later ones fall back a century.
const TWO_DIGIT_YEAR_PIVOT: i32 = 2068;

fn parse_fields(input: &str, pattern: &str) -> Option<Parsed> {
    let mut parsed = Parsed::new();
    parse(&mut parsed, input, StrftimeItems::new(pattern)).ok()?;
    Some(parsed)
}

fn date_in(input: &str, pattern: &str) -> Option<NaiveDate> {
    let mut parsed = parse_fields(input, pattern)?;
    if !pattern.contains("%m") {
        parsed.set_month(1).ok()?;
    }
    if !pattern.contains("%d") {
        parsed.set_day(1).ok()?;
    }
    let date = parsed.to_naive_date().ok()?;

    if pattern.contains("%y") {
        // chrono places `%y` in 1970..=2069.
        return if date.year() > TWO_DIGIT_YEAR_PIVOT {
            date.with_year(date.year() - 100)
        } else {
            Some(date)
        };
    }
    // `%Y` also reads shorter digit runs; only four-digit years count.
    (1000..=9999).contains(&date.year()).then_some(date)
}

fn time_in(input: &str, pattern: &str) -> Option<NaiveTime> {
    let mut parsed = parse_fields(input, pattern)?;
    if !pattern.contains("%M") {
        parsed.set_minute(0).ok()?;
    }
    let time = parsed.to_naive_time().ok()?;
    // No leap seconds.
    (time.nanosecond() < 1_000_000_000).then_some(time)
}

// ── Dates and times ──────────────────────────────────────────────────

/// Parse a date in any accepted pattern.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let input = raw.trim();
    DATE_PATTERNS
        .iter()
        .find_map(|pattern| date_in(input, pattern))
        .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}

/// Normalize a date to `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Result<String, ValidationError> {
    parse_date(raw).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Parse a time in any accepted pattern.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    let input = raw.trim();
    TIME_PATTERNS
        .iter()
        .find_map(|pattern| time_in(input, pattern))
        .ok_or_else(|| ValidationError::InvalidTime(raw.to_string()))
}

/// Normalize a time to `HH:mm:ss`.
pub fn normalize_time(raw: &str) -> Result<String, ValidationError> {
    parse_time(raw).map(|time| time.format("%H:%M:%S").to_string())
}

// ── Free text ────────────────────────────────────────────────────────

/// Character allow-set applied to a free-text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextClass {
    /// Employer designation, address, town and postal code.
    EmployerText,
    /// Employee surname and christian name. Upper-cased first.
    PersonName,
    /// Employee birth town. Upper-cased first.
    Town,
}

const EMPLOYER_EXTRA: &str = "éèêëâàäöôûüîïç°²!#$%&'()*+,-./:;<=>?@ ";

impl TextClass {
    fn upper_cases(self) -> bool {
        matches!(self, Self::PersonName | Self::Town)
    }

    /// Whether `c` survives normalization for this field class.
    pub fn allows(self, c: char) -> bool {
        match self {
            Self::EmployerText => c.is_ascii_alphanumeric() || EMPLOYER_EXTRA.contains(c),
            Self::PersonName => c.is_ascii_uppercase() || matches!(c, '\'' | ' ' | '.' | '-'),
            Self::Town => {
                c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '.' | '\'' | '-')
            }
        }
    }
}

/// Result of a free-text normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// The normalized value.
    pub value: String,
    /// Characters removed because the field class does not allow them.
    pub stripped: usize,
    /// Characters removed by the length cap.
    pub truncated: usize,
}

impl NormalizedText {
    /// Whether normalization lost any input.
    pub fn is_lossy(&self) -> bool {
        self.stripped > 0 || self.truncated > 0
    }
}

/// Filter `raw` through the allow-set of `class` and cap it at
/// [`MAX_TEXT_LEN`] characters.
pub fn normalize_text(raw: &str, class: TextClass) -> NormalizedText {
    let source = if class.upper_cases() {
        raw.to_uppercase()
    } else {
        raw.to_string()
    };

    let mut stripped = 0;
    let kept: Vec<char> = source
        .chars()
        .filter(|&c| {
            let allowed = class.allows(c);
            if !allowed {
                stripped += 1;
            }
            allowed
        })
        .collect();

    let truncated = kept.len().saturating_sub(MAX_TEXT_LEN);
    NormalizedText {
        value: kept.into_iter().take(MAX_TEXT_LEN).collect(),
        stripped,
        truncated,
    }
}

// ── Defaults ─────────────────────────────────────────────────────────

/// Missing, empty or `"00"` becomes `"99"`; longer codes keep their first
/// two characters.
pub fn normalize_birth_department(raw: Option<&str>) -> String {
    match raw {
        None | Some("") | Some("00") => UNKNOWN_BIRTH_DEPARTMENT.to_string(),
        Some(code) => code.chars().take(2).collect(),
    }
}

/// Missing or empty becomes `"01"`.
pub fn normalize_health_service(raw: Option<&str>) -> String {
    match raw {
        None | Some("") => DEFAULT_HEALTH_SERVICE.to_string(),
        Some(code) => code.to_string(),
    }
}
