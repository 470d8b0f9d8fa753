//! Error types shared by the mapping engine.
//!
//! Errors fall into three tiers: schema-load problems (fatal for one schema),
//! header-resolution problems (some soft, some fatal for the whole file), and
//! row-level problems (skippable once the file has produced a visit).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// None of the header-sourced columns were found. The caller moves on to
    /// the next candidate schema without logging.
    #[error("None of the configured column headers were found in the header row")]
    AllHeadersMissing,

    #[error("Missing column headers: {message}")]
    MissingHeaders { message: String },

    #[error("Ambiguous column headers: {0}")]
    AmbiguousHeaders(String),

    #[error("Unable to read delimited text at line {line}: {message}")]
    Framing { line: usize, message: String },

    #[error("Preface error: {0}")]
    Preface(String),

    #[error("Line {line}: {message}")]
    Row { line: usize, message: String },

    #[error("Location error: {0}")]
    Location(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MappingError {
    pub fn config(message: impl Into<String>) -> Self {
        MappingError::Configuration(message.into())
    }

    pub fn row(line: usize, message: impl Into<String>) -> Self {
        MappingError::Row {
            line,
            message: message.into(),
        }
    }

    /// Signals that the schema simply does not describe this file: no
    /// configured header was found, or the very first record could not be
    /// framed.
    pub fn is_soft_reject(&self) -> bool {
        matches!(
            self,
            MappingError::AllHeadersMissing | MappingError::Framing { line: 0, .. }
        )
    }

    /// Signals that the input itself is unusable, whichever schema is tried.
    /// Anything else only rules out the schema that raised it.
    pub fn aborts_file(&self) -> bool {
        matches!(
            self,
            MappingError::AmbiguousHeaders(_)
                | MappingError::Framing { .. }
                | MappingError::Preface(_)
                | MappingError::Row { .. }
                | MappingError::Location(_)
        ) && !self.is_soft_reject()
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;

/// Attaches a row line number to a value-level failure.
pub(crate) trait RowContext<T> {
    fn at_line(self, line: usize) -> Result<T>;
}

impl<T> RowContext<T> for std::result::Result<T, String> {
    fn at_line(self, line: usize) -> Result<T> {
        self.map_err(|message| MappingError::row(line, message))
    }
}
