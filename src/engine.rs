//! The row engine: drives one schema attempt over one decoded file.
//!
//! ## Responsibilities
//!
//! - Preface detection, then header rows (skipping ignored leading/trailing
//!   rows and merging the rest column-wise), then data rows
//! - Comment-line and footer handling ahead of delimited-text framing
//! - Per-row location resolution, visit metadata and activity extraction
//! - The row-error policy: once a visit has been produced, bad rows are
//!   logged and skipped; before that, the first bad row fails the attempt

use log::{debug, error};

use crate::{
    data::{FormatProvider, utc},
    domain::{FieldVisitDetails, LocationInfo, TimeRange},
    error::{MappingError, Result},
    extract,
    io_utils,
    merger::{VisitCandidate, VisitMerger},
    preface::{Preface, PrefaceScanner},
    row::RowReader,
    schema::Schema,
    session::ParseSession,
    validator::HeaderMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    AwaitingPreface,
    AwaitingHeader,
    ParsingData,
    Done,
}

/// What a completed attempt hands back: visits still waiting to be flushed.
#[derive(Debug)]
pub struct EngineOutcome {
    pub merger: VisitMerger,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

pub struct RowEngine<'e, 'a> {
    schema: &'e Schema,
    session: &'e mut ParseSession<'a>,
    provider: FormatProvider,
    state: EngineState,
    preface: Preface,
    preface_lines: usize,
    header_rows_seen: usize,
    merged_header: Vec<String>,
    header_map: Option<HeaderMap>,
    merger: VisitMerger,
    visits_produced: usize,
    data_rows_seen: usize,
    rows_read: usize,
    rows_skipped: usize,
}

impl<'e, 'a> RowEngine<'e, 'a> {
    pub fn new(schema: &'e Schema, session: &'e mut ParseSession<'a>) -> Result<Self> {
        let locale = schema.locale_name.as_deref().unwrap_or_default();
        let provider = FormatProvider::for_locale(locale)
            .ok_or_else(|| MappingError::config(format!("Unknown locale '{locale}'")))?;
        Ok(Self {
            schema,
            session,
            provider,
            state: EngineState::AwaitingPreface,
            preface: Preface::default(),
            preface_lines: 0,
            header_rows_seen: 0,
            merged_header: Vec::new(),
            header_map: None,
            merger: VisitMerger::new(schema.skips_empty_visits()),
            visits_produced: 0,
            data_rows_seen: 0,
            rows_read: 0,
            rows_skipped: 0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn run(mut self, text: &str) -> Result<EngineOutcome> {
        let (preface, body) = PrefaceScanner::scan(self.schema, text)?;
        self.preface_lines = preface.line_count();
        self.preface = preface;
        self.state = EngineState::AwaitingHeader;
        if self.schema.effective_header_row_count() == 0 {
            self.enter_data()?;
        }

        let body = prepare_body(self.schema, body);
        let mut reader = io_utils::open_csv_reader(body.as_bytes(), delimiter(self.schema)?);
        let mut record = csv::StringRecord::new();
        let mut records_seen = 0usize;

        while self.state != EngineState::Done {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    let line = if records_seen == 0 {
                        0
                    } else {
                        self.preface_lines
                            + err.position().map_or(0, |position| position.line() as usize)
                    };
                    return Err(MappingError::Framing {
                        line,
                        message: err.to_string(),
                    });
                }
            }
            records_seen += 1;
            let line = self.preface_lines
                + record
                    .position()
                    .map_or(records_seen, |position| position.line() as usize);
            let fields = record.iter().map(str::to_string).collect::<Vec<_>>();
            match self.state {
                EngineState::AwaitingHeader => self.accept_header_row(&fields)?,
                EngineState::ParsingData => self.accept_data_row(line, &fields)?,
                EngineState::AwaitingPreface | EngineState::Done => break,
            }
        }

        if self.state == EngineState::AwaitingHeader {
            debug!(
                "{}: input ended before the header row",
                self.schema.display_name()
            );
            return Err(MappingError::AllHeadersMissing);
        }
        self.state = EngineState::Done;
        Ok(EngineOutcome {
            merger: self.merger,
            rows_read: self.rows_read,
            rows_skipped: self.rows_skipped,
        })
    }

    fn accept_header_row(&mut self, fields: &[String]) -> Result<()> {
        self.header_rows_seen += 1;
        let total = self.schema.effective_header_row_count();
        let first = self.schema.ignored_leading_header_rows + 1;
        let last = total.saturating_sub(self.schema.ignored_trailing_header_rows);
        let row = self.header_rows_seen;

        if (first..=last).contains(&row) {
            merge_header_row(&mut self.merged_header, fields);
        }
        if row == last {
            debug!(
                "{}: header row {:?}",
                self.schema.display_name(),
                self.merged_header
            );
            self.header_map = Some(HeaderMap::build(self.schema, &self.merged_header)?);
        }
        if row >= total {
            self.enter_data()?;
        }
        Ok(())
    }

    fn enter_data(&mut self) -> Result<()> {
        self.state = EngineState::ParsingData;
        if self.schema.data_row_count == Some(0) {
            let line = self.preface_lines + self.header_rows_seen;
            self.rows_read += 1;
            self.process_guarded(line, &[])?;
            self.state = EngineState::Done;
        }
        Ok(())
    }

    fn accept_data_row(&mut self, line: usize, fields: &[String]) -> Result<()> {
        if fields.iter().all(|field| field.trim().is_empty()) {
            return Ok(());
        }
        if let Some(limit) = self.schema.data_row_count
            && self.data_rows_seen >= limit
        {
            self.state = EngineState::Done;
            return Ok(());
        }
        self.data_rows_seen += 1;
        self.rows_read += 1;
        self.process_guarded(line, fields)
    }

    fn process_guarded(&mut self, line: usize, fields: &[String]) -> Result<()> {
        match self.process_row(line, fields) {
            Ok(()) => Ok(()),
            Err(err) if is_row_level(&err) && self.visits_produced > 0 => {
                error!("{}: skipping row. {err}", self.schema.display_name());
                self.rows_skipped += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn process_row(&mut self, line: usize, fields: &[String]) -> Result<()> {
        let mut reader = RowReader::new(
            line,
            fields,
            self.header_map.as_ref(),
            &self.preface,
            &self.schema.aliases,
            &self.provider,
            utc(),
        );
        let location = row_location(self.session, self.schema, &reader)?;
        reader.set_utc_offset(location.utc_offset);

        let mut details = FieldVisitDetails::new(TimeRange::unset());
        if let Some(visit) = &self.schema.visit {
            if let Some(period) = reader.time_range(&visit.timing)? {
                details.period = period;
            }
            details.party = reader.text(&visit.party)?;
            details.comments = reader.text(&visit.comments)?;
            details.weather = reader.text(&visit.weather)?;
            details.collection_agency = reader.text(&visit.collection_agency)?;
        }

        let declared = details.period;
        let mut candidate = VisitCandidate::new(location, details);
        candidate.activities = extract::activities(&reader, self.schema, &declared)?;
        if !candidate.activities.is_empty() && candidate.effective_period().is_unset() {
            return Err(reader.error(
                "the visit has no time; configure Visit times or a time on one of its activities",
            ));
        }
        if self.merger.add(candidate) {
            self.visits_produced += 1;
        }
        Ok(())
    }
}

/// Reads just the merged header row of `text`, after its preface.
pub fn sample_header(schema: &Schema, text: &str) -> Result<Vec<String>> {
    let (_, body) = PrefaceScanner::scan(schema, text)?;
    let body = prepare_body(schema, body);
    let total = schema.effective_header_row_count();
    let first = schema.ignored_leading_header_rows + 1;
    let last = total.saturating_sub(schema.ignored_trailing_header_rows);
    let mut merged = Vec::new();
    let mut reader = io_utils::open_csv_reader(body.as_bytes(), delimiter(schema)?);
    for (index, record) in reader.records().take(last).enumerate() {
        let record = record?;
        if index + 1 >= first {
            let fields = record.iter().map(str::to_string).collect::<Vec<_>>();
            merge_header_row(&mut merged, &fields);
        }
    }
    Ok(merged)
}

fn delimiter(schema: &Schema) -> Result<u8> {
    schema
        .separator_char()
        .filter(char::is_ascii)
        .map(|c| c as u8)
        .ok_or_else(|| MappingError::config(format!("Invalid separator '{}'", schema.separator)))
}

fn is_row_level(err: &MappingError) -> bool {
    matches!(err, MappingError::Row { .. } | MappingError::Location(_))
}

/// The row's location column, else the host-supplied location.
fn row_location(
    session: &mut ParseSession<'_>,
    schema: &Schema,
    reader: &RowReader<'_>,
) -> Result<LocationInfo> {
    let text = reader.text(&schema.location)?;
    match (text, session.fixed_location()) {
        (Some(text), _) => session
            .resolve_location(&text)
            .map_err(|err| reader.error(err.to_string())),
        (None, Some(fixed)) => Ok(fixed.clone()),
        (None, None) => Err(reader.error("Location: a value is required")),
    }
}

/// Blanks comment lines (keeping line numbers intact) and cuts the text at
/// the footer.
fn prepare_body<'t>(schema: &Schema, body: &'t str) -> std::borrow::Cow<'t, str> {
    let comment = schema
        .comment_line_prefix
        .as_deref()
        .filter(|prefix| !prefix.is_empty());
    let footer = schema
        .footer_starts_with
        .as_deref()
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_lowercase);
    if comment.is_none() && footer.is_none() {
        return std::borrow::Cow::Borrowed(body);
    }
    let mut prepared = String::with_capacity(body.len());
    for line in body.split_inclusive('\n') {
        let content = line.trim_start();
        if let Some(footer) = &footer
            && content.to_lowercase().starts_with(footer.as_str())
        {
            break;
        }
        if let Some(comment) = comment
            && content.starts_with(comment)
        {
            prepared.push('\n');
            continue;
        }
        prepared.push_str(line);
    }
    std::borrow::Cow::Owned(prepared)
}

/// Folds one header row into the running column names, padding with empty
/// names as needed and joining parts with a single space.
fn merge_header_row(merged: &mut Vec<String>, row: &[String]) {
    if row.len() > merged.len() {
        merged.resize(row.len(), String::new());
    }
    for (slot, field) in merged.iter_mut().zip(row) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(field);
    }
}
