//! Preface detection: finds where a free-form preamble ends and the tabular
//! part of a file begins, and evaluates preface-capture columns against it.

use std::collections::HashMap;

use log::debug;

use crate::{
    error::{MappingError, Result},
    schema::Schema,
};

/// Outcome of feeding one line to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// The line belongs to the preface; keep going.
    Continue,
    /// The line was the last preface line.
    CompleteAfter,
    /// The line is the first header/data line and is not part of the preface.
    CompleteBefore,
}

#[derive(Debug)]
pub struct PrefaceScanner<'a> {
    schema: &'a Schema,
    header_names: Vec<String>,
    lines: Vec<String>,
}

impl<'a> PrefaceScanner<'a> {
    /// Whether the schema expects a preface at all.
    pub fn is_active(schema: &Schema) -> bool {
        schema.preface_row_count > 0
            || has_marker(&schema.preface_ends_with)
            || has_marker(&schema.preface_ends_before)
            || schema.has_preface_columns()
    }

    pub fn new(schema: &'a Schema) -> Self {
        let mut header_names = Vec::new();
        for column in schema.columns() {
            if let Some(header) = column.source.column_header.as_deref() {
                let name = header.trim().to_lowercase();
                if !header_names.contains(&name) {
                    header_names.push(name);
                }
            }
        }
        Self {
            schema,
            header_names,
            lines: Vec::new(),
        }
    }

    fn has_explicit_end(&self) -> bool {
        self.schema.preface_row_count > 0
            || has_marker(&self.schema.preface_ends_with)
            || has_marker(&self.schema.preface_ends_before)
    }

    pub fn push(&mut self, line: &str) -> Result<ScanStep> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(marker) = marker(&self.schema.preface_ends_before)
            && starts_with_ignore_case(line, marker)
        {
            return Ok(ScanStep::CompleteBefore);
        }
        if !self.has_explicit_end() && self.looks_like_header(line) {
            debug!("Preface ends before header line '{line}'");
            return Ok(ScanStep::CompleteBefore);
        }

        self.lines.push(line.to_string());
        if self.lines.len() > self.schema.max_preface_lines {
            return Err(MappingError::Preface(format!(
                "No end of preface found within {} lines",
                self.schema.max_preface_lines
            )));
        }

        if self.schema.preface_row_count > 0 && self.lines.len() == self.schema.preface_row_count {
            return Ok(ScanStep::CompleteAfter);
        }
        if let Some(marker) = marker(&self.schema.preface_ends_with)
            && starts_with_ignore_case(line, marker)
        {
            return Ok(ScanStep::CompleteAfter);
        }
        Ok(ScanStep::Continue)
    }

    fn looks_like_header(&self, line: &str) -> bool {
        if self.header_names.is_empty() {
            return false;
        }
        let separator = self.schema.separator_char().unwrap_or(',');
        let fields = line
            .split(separator)
            .map(|field| field.trim().trim_matches('"').trim().to_lowercase())
            .collect::<Vec<_>>();
        self.header_names.iter().all(|name| fields.contains(name))
    }

    /// Evaluates every preface-capture column against the collected lines.
    pub fn finish(self) -> Result<Preface> {
        Preface::capture(self.schema, self.lines)
    }

    /// Scans the head of `text`, returning the preface and the remaining body.
    pub fn scan<'t>(schema: &Schema, text: &'t str) -> Result<(Preface, &'t str)> {
        if !Self::is_active(schema) {
            return Ok((Preface::capture(schema, Vec::new())?, text));
        }
        let mut scanner = PrefaceScanner::new(schema);
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            match scanner.push(line)? {
                ScanStep::Continue => offset += line.len(),
                ScanStep::CompleteAfter => {
                    offset += line.len();
                    break;
                }
                ScanStep::CompleteBefore => break,
            }
        }
        let preface = scanner.finish()?;
        Ok((preface, &text[offset..]))
    }
}

fn marker(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

fn has_marker(value: &Option<String>) -> bool {
    marker(value).is_some()
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// The preface lines of one file and the values captured from them.
#[derive(Debug, Clone, Default)]
pub struct Preface {
    lines: Vec<String>,
    values: HashMap<String, Option<String>>,
}

impl Preface {
    fn capture(schema: &Schema, lines: Vec<String>) -> Result<Self> {
        let block = lines.join("\n");
        let mut values = HashMap::new();
        for column in schema.columns() {
            let Some(regex) = column.source.preface_pattern()? else {
                continue;
            };
            let captured = if column.source.is_multiline_capture() {
                regex.captures(&block)
            } else {
                lines.iter().find_map(|line| regex.captures(line))
            };
            let value = captured
                .and_then(|caps| caps.name(crate::schema::PREFACE_CAPTURE_GROUP))
                .map(|group| group.as_str().trim().to_string())
                .filter(|value| !value.is_empty());
            values.insert(column.name.clone(), value);
        }
        Ok(Self { lines, values })
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The captured value for a preface column, by qualified name.
    pub fn value(&self, column_name: &str) -> Option<&str> {
        self.values.get(column_name).and_then(|value| value.as_deref())
    }
}
