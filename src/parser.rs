//! The multi-schema entry point: tries each enabled schema against one file
//! and reports a single outcome for it.

use log::{debug, info, warn};

use crate::{
    appender::FieldDataAppender,
    domain::LocationInfo,
    engine::RowEngine,
    error::{MappingError, Result},
    io_utils::{self, SpreadsheetFormat},
    schema::Schema,
    session::ParseSession,
    validator,
};

/// Turns a workbook binary into delimited text. Conversion happens outside
/// the mapping engine; hosts without a converter cannot parse workbooks.
pub trait SpreadsheetConverter {
    fn convert(&self, format: SpreadsheetFormat, bytes: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSummary {
    pub schema: String,
    pub visits: usize,
    pub activities: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

/// How one schema fared against one file.
#[derive(Debug)]
pub enum SchemaAttempt {
    Accepted(ParseSummary),
    /// The file is not shaped for this schema; try the next one quietly.
    SoftReject(String),
    HardError(MappingError),
}

#[derive(Debug)]
pub enum ParseResult {
    CannotParse,
    ParsedAndValid(ParseSummary),
    ParsedButInvalid(MappingError),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::ParsedAndValid(_))
    }
}

pub struct FieldVisitParser {
    schemas: Vec<Schema>,
    converter: Option<Box<dyn SpreadsheetConverter>>,
    fixed_location: Option<LocationInfo>,
}

impl FieldVisitParser {
    /// Keeps enabled schemas only, ordered by ascending priority with ties in
    /// the order given.
    pub fn new(schemas: Vec<Schema>) -> Self {
        let mut schemas = schemas
            .into_iter()
            .filter(Schema::is_enabled)
            .collect::<Vec<_>>();
        schemas.sort_by_key(|schema| schema.priority);
        Self {
            schemas,
            converter: None,
            fixed_location: None,
        }
    }

    pub fn with_converter(mut self, converter: Box<dyn SpreadsheetConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_fixed_location(mut self, location: LocationInfo) -> Self {
        self.fixed_location = Some(location);
        self
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn parse(&self, bytes: &[u8], appender: &mut dyn FieldDataAppender) -> ParseResult {
        let converted;
        let bytes = match io_utils::sniff_spreadsheet(bytes) {
            None => bytes,
            Some(format) => {
                let Some(converter) = &self.converter else {
                    debug!("Input looks like a {format:?} workbook and no converter is available");
                    return ParseResult::CannotParse;
                };
                match converter.convert(format, bytes) {
                    Ok(text) => {
                        converted = text;
                        converted.as_slice()
                    }
                    Err(err) => {
                        warn!("Workbook conversion failed: {err}");
                        return ParseResult::CannotParse;
                    }
                }
            }
        };

        let mut session = ParseSession::new(appender, self.fixed_location.clone());
        for schema in &self.schemas {
            match self.try_schema(schema, bytes, &mut session) {
                SchemaAttempt::Accepted(summary) => {
                    info!(
                        "Schema '{}' produced {} visit(s) with {} activit(ies) from {} row(s)",
                        summary.schema, summary.visits, summary.activities, summary.rows
                    );
                    return ParseResult::ParsedAndValid(summary);
                }
                SchemaAttempt::SoftReject(reason) => {
                    debug!("Schema '{}' does not fit: {reason}", schema.display_name());
                }
                SchemaAttempt::HardError(err) => {
                    return ParseResult::ParsedButInvalid(err);
                }
            }
        }
        ParseResult::CannotParse
    }

    /// Runs one isolated attempt. Nothing reaches the appender unless the
    /// attempt completes.
    pub fn try_schema(
        &self,
        schema: &Schema,
        bytes: &[u8],
        session: &mut ParseSession<'_>,
    ) -> SchemaAttempt {
        match self.attempt(schema, bytes, session) {
            Ok(summary) => SchemaAttempt::Accepted(summary),
            Err(err) if err.is_soft_reject() => SchemaAttempt::SoftReject(err.to_string()),
            Err(err) if err.aborts_file() => SchemaAttempt::HardError(err),
            Err(err) => {
                warn!("Schema '{}' skipped: {err}", schema.display_name());
                SchemaAttempt::SoftReject(err.to_string())
            }
        }
    }

    fn attempt(
        &self,
        schema: &Schema,
        bytes: &[u8],
        session: &mut ParseSession<'_>,
    ) -> Result<ParseSummary> {
        validator::validate(schema, session.fixed_location().is_some())?;
        let encoding = io_utils::resolve_encoding(schema.encoding.as_deref())?;
        let text = io_utils::decode_text(bytes, encoding)?;

        let outcome = RowEngine::new(schema, session)?.run(&text)?;
        let flushed = outcome.merger.finish(session.appender())?;
        Ok(ParseSummary {
            schema: schema.display_name().to_string(),
            visits: flushed.visits,
            activities: flushed.activities,
            rows: outcome.rows_read,
            skipped_rows: outcome.rows_skipped,
        })
    }
}
