//! Value lookup for one data row.
//!
//! A [`RowReader`] turns any [`ColumnSource`] into text (fixed value, preface
//! capture, or header/index field), applies alias substitution, and offers
//! typed helpers that report failures as row errors naming the column.

use std::str::FromStr;

use chrono::FixedOffset;
use uuid::Uuid;

use crate::{
    activities::TimingDefinition,
    data::{FormatProvider, parse_boolean, split_list},
    domain::{Measurement, TimeRange, Timestamp},
    error::{MappingError, Result, RowContext},
    preface::Preface,
    schema::{AliasTables, ColumnSource, SourceKind, TimestampSource},
    timestamps::{self, TimestampInput},
    validator::HeaderMap,
};

/// Raw text as read from the row and the value after alias substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub raw: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug)]
pub struct RowReader<'r> {
    line: usize,
    fields: &'r [String],
    header_map: Option<&'r HeaderMap>,
    preface: &'r Preface,
    aliases: &'r AliasTables,
    provider: &'r FormatProvider,
    utc_offset: FixedOffset,
}

impl<'r> RowReader<'r> {
    pub fn new(
        line: usize,
        fields: &'r [String],
        header_map: Option<&'r HeaderMap>,
        preface: &'r Preface,
        aliases: &'r AliasTables,
        provider: &'r FormatProvider,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            line,
            fields,
            header_map,
            preface,
            aliases,
            provider,
            utc_offset,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn provider(&self) -> &FormatProvider {
        self.provider
    }

    /// Offset used to seed timestamps; the row's location decides it.
    pub fn set_utc_offset(&mut self, offset: FixedOffset) {
        self.utc_offset = offset;
    }

    pub fn error(&self, message: impl Into<String>) -> MappingError {
        MappingError::row(self.line, message)
    }

    fn field(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|idx| self.fields.get(idx))
            .map(String::as_str)
    }

    fn raw(&self, source: &ColumnSource) -> Result<Option<String>> {
        let text = match source.kind() {
            Some(SourceKind::Fixed) => source.fixed_value.as_deref(),
            Some(SourceKind::PrefaceCapture) => self.preface.value(source.name()),
            Some(SourceKind::Header) => source
                .column_header
                .as_deref()
                .and_then(|header| self.header_map?.position(header))
                .and_then(|position| self.field(position)),
            Some(SourceKind::Index) => {
                let index = source.column_index.unwrap_or_default();
                if index <= 0 {
                    return Err(self.error(format!(
                        "{}: ColumnIndex {index} must be 1 or greater",
                        source.name()
                    )));
                }
                self.field(index as usize)
            }
            None => None,
        };
        Ok(text
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string))
    }

    /// Reads a source and applies its alias table. An exact match wins, then
    /// the table's empty-key entry, then the raw text itself.
    pub fn lookup(&self, source: &ColumnSource) -> Result<Lookup> {
        let raw = self.raw(source)?;
        let Some(table_name) = source.alias.as_deref() else {
            return Ok(Lookup {
                value: raw.clone(),
                raw,
            });
        };
        let table = self.aliases.get(table_name).ok_or_else(|| {
            self.error(format!(
                "{}: alias table '{table_name}' is not defined",
                source.name()
            ))
        })?;
        let key = raw.as_deref().unwrap_or_default();
        let substituted = table
            .get(key)
            .or_else(|| table.get(""))
            .map(String::as_str)
            .or(raw.as_deref());
        let value = substituted
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        Ok(Lookup { raw, value })
    }

    pub fn text(&self, source: &Option<ColumnSource>) -> Result<Option<String>> {
        match source {
            Some(source) => Ok(self.lookup(source)?.value),
            None => Ok(None),
        }
    }

    pub fn required_text(&self, source: &Option<ColumnSource>, what: &str) -> Result<String> {
        self.text(source)?.ok_or_else(|| match source {
            Some(source) => self.error(format!("{}: a value is required", source.name())),
            None => self.error(format!("{what} is not configured")),
        })
    }

    fn typed<T>(
        &self,
        source: &Option<ColumnSource>,
        parse: impl FnOnce(&str) -> std::result::Result<T, String>,
    ) -> Result<Option<T>> {
        let Some(column) = source else {
            return Ok(None);
        };
        match self.lookup(column)?.value {
            Some(text) => parse(&text)
                .map(Some)
                .map_err(|err| format!("{}: {err}", column.name()))
                .at_line(self.line),
            None => Ok(None),
        }
    }

    pub fn number(&self, source: &Option<ColumnSource>) -> Result<Option<f64>> {
        self.typed(source, |text| self.provider.parse_number(text))
    }

    pub fn count(&self, source: &Option<ColumnSource>) -> Result<Option<u32>> {
        self.typed(source, |text| {
            let number = self.provider.parse_number(text)?;
            if number.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&number) {
                Ok(number as u32)
            } else {
                Err(format!("'{text}' is not a whole number"))
            }
        })
    }

    pub fn boolean(&self, source: &Option<ColumnSource>) -> Result<Option<bool>> {
        self.typed(source, parse_boolean)
    }

    pub fn unique_id(&self, source: &Option<ColumnSource>) -> Result<Option<Uuid>> {
        self.typed(source, |text| {
            Uuid::parse_str(text).map_err(|_| format!("'{text}' is not a valid unique ID"))
        })
    }

    /// Parses one of the text-backed domain enumerations.
    pub fn choice<T>(&self, source: &Option<ColumnSource>) -> Result<Option<T>>
    where
        T: FromStr<Err = String>,
    {
        self.typed(source, T::from_str)
    }

    pub fn list(&self, source: &Option<ColumnSource>) -> Result<Vec<String>> {
        Ok(self
            .text(source)?
            .map(|text| split_list(&text))
            .unwrap_or_default())
    }

    pub fn measurement(
        &self,
        value: &Option<ColumnSource>,
        unit: &Option<ColumnSource>,
    ) -> Result<Option<Measurement>> {
        match self.number(value)? {
            Some(number) => Ok(Some(Measurement::new(number, self.text(unit)?))),
            None => Ok(None),
        }
    }

    /// Merges a group of timestamp sources into one timestamp.
    pub fn timestamp(&self, sources: &[&TimestampSource]) -> Result<Option<Timestamp>> {
        let mut inputs = Vec::with_capacity(sources.len());
        for &source in sources {
            inputs.push(TimestampInput {
                source,
                text: self.lookup(&source.source)?.value,
                utc_offset: self.text(&source.utc_offset)?,
            });
        }
        timestamps::resolve(&inputs, self.utc_offset, self.provider).at_line(self.line)
    }

    /// `Time`/`Times` give an instant; otherwise `StartTime`/`EndTime` give a
    /// range, collapsing to an instant when only one bound is present.
    pub fn time_range(&self, timing: &TimingDefinition) -> Result<Option<TimeRange>> {
        if let Some(at) = self.timestamp(&timing.time_sources())? {
            return Ok(Some(TimeRange::instant(at)));
        }
        let start = self.timestamp(&timing.start_sources())?;
        let end = self.timestamp(&timing.end_sources())?;
        Ok(match (start, end) {
            (Some(start), Some(end)) => Some(TimeRange::new(start, end)),
            (Some(at), None) | (None, Some(at)) => Some(TimeRange::instant(at)),
            (None, None) => None,
        })
    }

    /// An activity's own time, else the visit's declared period.
    pub fn activity_period(
        &self,
        owner: &str,
        timing: &TimingDefinition,
        visit_period: &TimeRange,
    ) -> Result<TimeRange> {
        if let Some(range) = self.time_range(timing)? {
            return Ok(range);
        }
        if !visit_period.is_unset() {
            return Ok(*visit_period);
        }
        let checked = timing.column_names();
        Err(self.error(if checked.is_empty() {
            format!("{owner}: no time columns are configured and the visit has no time")
        } else {
            format!(
                "{owner}: no time found in {} and the visit has no time",
                checked.join(", ")
            )
        }))
    }
}
