//! Typed value parsing: numbers, booleans, UTC offsets and locale-aware
//! date/time text.
//!
//! A [`FormatProvider`] stands in for the host culture. It is chosen once per
//! schema attempt from the schema's `locale_name` and passed down explicitly.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatProvider {
    name: String,
    decimal_separator: char,
    day_first: bool,
}

impl Default for FormatProvider {
    fn default() -> Self {
        Self::invariant()
    }
}

impl FormatProvider {
    pub fn invariant() -> Self {
        Self {
            name: String::new(),
            decimal_separator: '.',
            day_first: false,
        }
    }

    /// Resolves a culture name such as `en-GB` or `fr-FR`.
    pub fn for_locale(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Some(Self::invariant());
        }
        let normalized = trimmed.replace('_', "-").to_ascii_lowercase();
        let (decimal_separator, day_first) = match normalized.as_str() {
            "en-us" | "en-ca" => ('.', false),
            "en-gb" | "en-au" | "en-nz" | "en-ie" => ('.', true),
            "fr-fr" | "fr-ca" | "de-de" | "es-es" | "it-it" | "nl-nl" | "pt-br" => (',', true),
            _ => return None,
        };
        Some(Self {
            name: trimmed.to_string(),
            decimal_separator,
            day_first,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    fn date_formats(&self) -> &'static [&'static str] {
        if self.day_first {
            &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%d %b %Y"]
        } else {
            &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%Y/%m/%d", "%b %d %Y", "%d %b %Y"]
        }
    }

    fn datetime_formats(&self) -> Vec<String> {
        let mut formats = Vec::new();
        for date in self.date_formats() {
            for time in DEFAULT_TIME_FORMATS {
                formats.push(format!("{date} {time}"));
                formats.push(format!("{date}T{time}"));
            }
        }
        formats
    }

    pub fn parse_number(&self, text: &str) -> Result<f64, String> {
        let trimmed = text.trim();
        let mut normalized = String::with_capacity(trimmed.len());
        for c in trimmed.chars() {
            if c == self.decimal_separator {
                normalized.push('.');
            } else if (c == ',' || c == '.' || c == '\u{a0}' || c == ' ' || c == '\'')
                && c != self.decimal_separator
            {
                // grouping separators
                continue;
            } else {
                normalized.push(c);
            }
        }
        normalized
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("'{text}' is not a valid number"))
    }

    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let trimmed = text.trim();
        self.date_formats()
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
    }

    pub fn parse_time(&self, text: &str) -> Option<NaiveTime> {
        let trimmed = text.trim();
        DEFAULT_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
    }

    pub fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        let trimmed = text.trim();
        self.datetime_formats()
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .or_else(|| self.parse_date(trimmed).map(|d| d.and_time(NaiveTime::MIN)))
    }

    pub fn parse_datetime_offset(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let trimmed = text.trim();
        DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .or_else(|| DateTime::parse_from_rfc2822(trimmed).ok())
            .or_else(|| {
                DEFAULT_OFFSET_FORMATS
                    .iter()
                    .find_map(|fmt| DateTime::parse_from_str(trimmed, fmt).ok())
            })
    }
}

const DEFAULT_TIME_FORMATS: &[&str] = &[
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
];

const DEFAULT_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %:z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M %:z",
];

pub fn parse_boolean(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("'{text}' is not a valid boolean")),
    }
}

/// Parses `+10:00`, `-0530`, `UTC+10`, `Z` or decimal hours such as `-7.5`.
pub fn parse_utc_offset(text: &str) -> Result<FixedOffset, String> {
    let invalid = || format!("'{text}' is not a valid UTC offset");
    let mut trimmed = text.trim();
    for prefix in ["UTC", "utc", "GMT", "gmt"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            trimmed = rest.trim();
        }
    }
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("z") {
        return Ok(utc());
    }
    let (sign, body) = match trimmed.as_bytes()[0] {
        b'+' => (1, &trimmed[1..]),
        b'-' => (-1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let seconds = if let Some((hours, minutes)) = body.split_once(':') {
        let hours: u32 = hours.trim().parse().map_err(|_| invalid())?;
        let minutes: u32 = minutes.trim().parse().map_err(|_| invalid())?;
        offset_seconds(hours, minutes).ok_or_else(invalid)?
    } else if body.len() == 4 && body.chars().all(|c| c.is_ascii_digit()) {
        let hours: u32 = body[..2].parse().map_err(|_| invalid())?;
        let minutes: u32 = body[2..].parse().map_err(|_| invalid())?;
        offset_seconds(hours, minutes).ok_or_else(invalid)?
    } else {
        let hours: f64 = body.parse().map_err(|_| invalid())?;
        if !hours.is_finite() || hours.abs() >= 24.0 {
            return Err(invalid());
        }
        (hours * 3600.0).round() as i32
    };
    FixedOffset::east_opt(sign * seconds).ok_or_else(invalid)
}

// Offsets stay within one day either side of UTC.
fn offset_seconds(hours: u32, minutes: u32) -> Option<i32> {
    (hours < 24 && minutes < 60).then(|| (hours * 3600 + minutes * 60) as i32)
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Splits a comma separated list, dropping blank entries.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
