//! Timestamp assembly. Several partial sources (a date column, a time column,
//! an offset column) are folded into one timestamp, starting from
//! 1900-01-01 00:00 at the location's UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};

use crate::{
    data::{FormatProvider, parse_utc_offset},
    domain::{Timestamp, timestamp_seed},
    schema::{TimestampKind, TimestampSource},
};

/// A parsed timestamp fragment, shaped by its [`TimestampKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampValue {
    Time(NaiveTime),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

/// One timestamp source with the raw text read for the current row.
#[derive(Debug, Clone)]
pub struct TimestampInput<'a> {
    pub source: &'a TimestampSource,
    pub text: Option<String>,
    pub utc_offset: Option<String>,
}

pub fn parse_value(
    kind: TimestampKind,
    formats: &[String],
    text: &str,
    provider: &FormatProvider,
) -> Result<TimestampValue, String> {
    let trimmed = text.trim();
    let parsed = if formats.is_empty() {
        parse_with_defaults(kind, trimmed, provider)
    } else {
        formats
            .iter()
            .find_map(|format| parse_with_format(kind, trimmed, format))
    };
    parsed.ok_or_else(|| {
        if formats.is_empty() {
            format!("'{text}' is not a valid {kind} value")
        } else {
            format!(
                "'{text}' does not match any {kind} format: {}",
                formats.join(", ")
            )
        }
    })
}

fn parse_with_format(kind: TimestampKind, text: &str, format: &str) -> Option<TimestampValue> {
    match kind {
        TimestampKind::TimeOnly => NaiveTime::parse_from_str(text, format)
            .ok()
            .map(TimestampValue::Time),
        TimestampKind::DateOnly => NaiveDate::parse_from_str(text, format)
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, format)
                    .ok()
                    .map(|value| value.date())
            })
            .map(TimestampValue::Date),
        TimestampKind::DateTimeOnly | TimestampKind::DateAndSeparateOffset => {
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .map(|date| date.and_time(NaiveTime::MIN))
                })
                .map(TimestampValue::DateTime)
        }
        TimestampKind::DateTimeOffset => DateTime::parse_from_str(text, format)
            .ok()
            .map(TimestampValue::Offset),
    }
}

fn parse_with_defaults(
    kind: TimestampKind,
    text: &str,
    provider: &FormatProvider,
) -> Option<TimestampValue> {
    match kind {
        TimestampKind::TimeOnly => provider.parse_time(text).map(TimestampValue::Time),
        TimestampKind::DateOnly => provider
            .parse_date(text)
            .or_else(|| provider.parse_datetime(text).map(|value| value.date()))
            .map(TimestampValue::Date),
        TimestampKind::DateTimeOnly | TimestampKind::DateAndSeparateOffset => {
            provider.parse_datetime(text).map(TimestampValue::DateTime)
        }
        TimestampKind::DateTimeOffset => provider
            .parse_datetime_offset(text)
            .map(TimestampValue::Offset),
    }
}

fn at_offset(naive: NaiveDateTime, offset: FixedOffset) -> Result<Timestamp, String> {
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("{naive} cannot be expressed at offset {offset}"))
}

/// Folds one parsed fragment into the accumulator. `own_offset` is the
/// source's configured UTC offset; only a date fragment takes it, the other
/// partial kinds keep the accumulator's offset.
pub fn merge(
    accumulator: Timestamp,
    value: TimestampValue,
    own_offset: Option<FixedOffset>,
) -> Result<Timestamp, String> {
    let kept = *accumulator.offset();
    let local = accumulator.naive_local();
    match value {
        TimestampValue::Time(time) => at_offset(local.date().and_time(time), kept),
        TimestampValue::Date(date) => {
            at_offset(date.and_time(local.time()), own_offset.unwrap_or(kept))
        }
        TimestampValue::DateTime(date_time) => at_offset(date_time, kept),
        TimestampValue::Offset(full) => Ok(full),
    }
}

/// Date from the value, offset from `own_offset` or else the negated
/// time-of-day of the value, time-of-day from the accumulator.
pub fn merge_separate_offset(
    accumulator: Timestamp,
    value: NaiveDateTime,
    own_offset: Option<FixedOffset>,
) -> Result<Timestamp, String> {
    let offset = match own_offset {
        Some(offset) => offset,
        None => {
            let seconds = value.time().num_seconds_from_midnight() as i32;
            FixedOffset::west_opt(seconds)
                .ok_or_else(|| format!("{} is not a valid UTC offset", value.time()))?
        }
    };
    at_offset(value.date().and_time(accumulator.naive_local().time()), offset)
}

/// Merges every present source, in order. Returns `None` when no source had
/// a value on this row.
pub fn resolve(
    inputs: &[TimestampInput<'_>],
    location_offset: FixedOffset,
    provider: &FormatProvider,
) -> Result<Option<Timestamp>, String> {
    let mut accumulator = timestamp_seed(location_offset);
    let mut any = false;
    for input in inputs {
        let Some(text) = input.text.as_deref() else {
            continue;
        };
        let source = input.source;
        let own_offset = input
            .utc_offset
            .as_deref()
            .map(parse_utc_offset)
            .transpose()
            .map_err(|err| format!("{}: {err}", source.source.name()))?;
        let value = parse_value(source.kind, &source.formats, text, provider)
            .map_err(|err| format!("{}: {err}", source.source.name()))?;
        accumulator = match (source.kind, value) {
            (TimestampKind::DateAndSeparateOffset, TimestampValue::DateTime(date_time)) => {
                merge_separate_offset(accumulator, date_time, own_offset)
            }
            _ => merge(accumulator, value, own_offset),
        }
        .map_err(|err| format!("{}: {err}", source.source.name()))?;
        any = true;
    }
    Ok(any.then_some(accumulator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSource;

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    fn source(kind: TimestampKind) -> TimestampSource {
        TimestampSource::new(ColumnSource::header("T"), kind)
    }

    fn input<'a>(source: &'a TimestampSource, text: &str) -> TimestampInput<'a> {
        TimestampInput {
            source,
            text: Some(text.to_string()),
            utc_offset: None,
        }
    }

    #[test]
    fn date_and_time_columns_combine() {
        let date = source(TimestampKind::DateOnly);
        let time = source(TimestampKind::TimeOnly);
        let resolved = resolve(
            &[input(&time, "08:30"), input(&date, "2020-01-01")],
            offset(-5),
            &FormatProvider::invariant(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-01-01T08:30:00-05:00");
    }

    #[test]
    fn declared_formats_take_precedence() {
        let date = source(TimestampKind::DateOnly).with_formats(["%d.%m.%Y"]);
        let resolved = resolve(&[input(&date, "03.02.2021")], offset(0), &FormatProvider::invariant())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.date_naive(), NaiveDate::from_ymd_opt(2021, 2, 3).unwrap());
        let err = resolve(&[input(&date, "2021-02-03")], offset(0), &FormatProvider::invariant())
            .unwrap_err();
        assert!(err.contains("%d.%m.%Y"));
    }

    #[test]
    fn date_only_uses_its_own_offset() {
        let date = source(TimestampKind::DateOnly);
        let mut with_offset = input(&date, "2020-06-01");
        with_offset.utc_offset = Some("+10:00".to_string());
        let resolved = resolve(&[with_offset], offset(0), &FormatProvider::invariant())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-06-01T00:00:00+10:00");
    }

    #[test]
    fn time_and_date_time_keep_the_location_offset() {
        let date = source(TimestampKind::DateOnly);
        let time = source(TimestampKind::TimeOnly);
        let mut timed = input(&time, "08:00");
        timed.utc_offset = Some("+10:00".to_string());
        let resolved = resolve(
            &[input(&date, "2020-01-01"), timed],
            offset(0),
            &FormatProvider::invariant(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-01-01T08:00:00+00:00");

        let full = source(TimestampKind::DateTimeOnly);
        let mut stamped = input(&full, "2020-01-01 08:00");
        stamped.utc_offset = Some("+10:00".to_string());
        let resolved = resolve(&[stamped], offset(-5), &FormatProvider::invariant())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-01-01T08:00:00-05:00");
    }

    #[test]
    fn date_time_offset_replaces_everything() {
        let time = source(TimestampKind::TimeOnly);
        let full = source(TimestampKind::DateTimeOffset);
        let resolved = resolve(
            &[input(&time, "08:00"), input(&full, "2020-01-01T12:00:00+02:00")],
            offset(-5),
            &FormatProvider::invariant(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-01-01T12:00:00+02:00");
    }

    #[test]
    fn separate_offset_comes_from_negated_time_of_day() {
        let time = source(TimestampKind::TimeOnly);
        let legacy = source(TimestampKind::DateAndSeparateOffset);
        let resolved = resolve(
            &[input(&time, "09:15"), input(&legacy, "2020-03-04 05:00")],
            offset(0),
            &FormatProvider::invariant(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.to_rfc3339(), "2020-03-04T09:15:00-05:00");
    }

    #[test]
    fn absent_sources_yield_nothing() {
        let date = source(TimestampKind::DateOnly);
        let empty = TimestampInput {
            source: &date,
            text: None,
            utc_offset: None,
        };
        assert_eq!(
            resolve(&[empty], offset(0), &FormatProvider::invariant()).unwrap(),
            None
        );
    }

    #[test]
    fn locale_controls_default_date_order() {
        let date = source(TimestampKind::DateOnly);
        let gb = FormatProvider::for_locale("en-GB").unwrap();
        let resolved = resolve(&[input(&date, "02/03/2020")], offset(0), &gb)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.date_naive(), NaiveDate::from_ymd_opt(2020, 3, 2).unwrap());
    }
}
