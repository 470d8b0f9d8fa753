//! Schema validation and header resolution.
//!
//! ## Responsibilities
//!
//! - [`validate`] checks a loaded schema for structural problems before any
//!   input is read (one source kind per column, alias tables, index bounds,
//!   separator and header-row layout, locale and encoding names)
//! - [`HeaderMap`] binds header-sourced columns to positions in an observed
//!   header row, classifying what is missing or ambiguous

use std::collections::{BTreeMap, HashMap};

use crate::{
    data::FormatProvider,
    error::{MappingError, Result},
    resolver,
    schema::{Schema, SourceKind},
};

/// Checks a schema for configuration problems. Every problem found is
/// reported, not just the first.
pub fn validate(schema: &Schema, has_fixed_location: bool) -> Result<()> {
    let mut issues = Vec::new();

    if schema.location.is_none() && !has_fixed_location {
        issues.push("No Location column is configured and no fixed location was supplied".to_string());
    }

    match schema.separator_char() {
        Some(c) if c.is_ascii() => {}
        Some(c) => issues.push(format!(
            "Separator '{c}' must be a single-byte (ASCII) character"
        )),
        None => issues.push(format!(
            "Separator '{}' must be exactly one character",
            schema.separator
        )),
    }

    check_header_layout(schema, &mut issues);

    if let Some(locale) = schema.locale_name.as_deref()
        && FormatProvider::for_locale(locale).is_none()
    {
        issues.push(format!("Unknown locale '{locale}'"));
    }
    if let Some(label) = schema.encoding.as_deref()
        && encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none()
    {
        issues.push(format!("Unknown encoding '{label}'"));
    }
    if schema.preface_row_count > schema.max_preface_lines {
        issues.push(format!(
            "PrefaceRowCount {} exceeds MaxPrefaceLines {}",
            schema.preface_row_count, schema.max_preface_lines
        ));
    }

    for name in resolver::duplicate_names(schema.columns()) {
        issues.push(format!("Column name '{name}' is declared more than once"));
    }
    check_columns(schema, &mut issues);
    check_timestamp_groups(schema, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(MappingError::config(format!(
            "Schema '{}' is invalid: {}",
            schema.display_name(),
            issues.join("; ")
        )))
    }
}

fn check_header_layout(schema: &Schema, issues: &mut Vec<String>) {
    let header_rows = schema.effective_header_row_count();
    let ignored = schema.ignored_leading_header_rows + schema.ignored_trailing_header_rows;
    if ignored > 0 && ignored >= header_rows {
        issues.push(format!(
            "Ignored header rows ({ignored}) must be fewer than HeaderRowCount ({header_rows})"
        ));
    }
    if schema.has_header_columns() && header_rows == 0 {
        let names = schema
            .columns()
            .iter()
            .filter(|column| column.source.column_header.is_some())
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        issues.push(format!(
            "HeaderRowCount is 0 but these columns use ColumnHeader: {}",
            names.join(", ")
        ));
    }
}

fn check_columns(schema: &Schema, issues: &mut Vec<String>) {
    for column in schema.columns() {
        let kinds = column.source.source_kinds();
        match kinds.as_slice() {
            [] => issues.push(format!(
                "{}: no source is configured (set one of ColumnHeader, ColumnIndex, FixedValue, PrefaceRegex)",
                column.name
            )),
            [_] => {}
            many => issues.push(format!(
                "{}: only one source may be configured but found {}",
                column.name,
                many.iter().map(SourceKind::to_string).collect::<Vec<_>>().join(" + ")
            )),
        }

        if let Some(index) = column.source.column_index
            && index <= 0
        {
            issues.push(format!(
                "{}: ColumnIndex {index} must be 1 or greater",
                column.name
            ));
        }

        if let Err(err) = column.source.preface_pattern() {
            issues.push(match err {
                MappingError::Configuration(message) => message,
                other => other.to_string(),
            });
        }

        if let Some(alias) = column.source.alias.as_deref()
            && !schema.aliases.contains_key(alias)
        {
            issues.push(format!(
                "{}: alias table '{alias}' is not defined in Aliases",
                column.name
            ));
        }
    }
}

/// Each timestamp group may use a given kind at most once.
fn check_timestamp_groups(schema: &Schema, issues: &mut Vec<String>) {
    let mut groups: BTreeMap<&str, Vec<(&str, String)>> = BTreeMap::new();
    for column in schema.columns() {
        if let Some(timestamp) = &column.timestamp {
            groups
                .entry(timestamp.group.as_str())
                .or_default()
                .push((column.name.as_str(), timestamp.kind.to_string()));
        }
    }
    for (group, members) in groups {
        let mut by_kind: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, kind) in &members {
            by_kind.entry(kind.as_str()).or_default().push(*name);
        }
        for (kind, names) in by_kind {
            if names.len() > 1 {
                issues.push(format!(
                    "{group}: timestamp type {kind} is ambiguous across {}",
                    names.join(", ")
                ));
            }
        }
    }
}

/// Resolved header row: observed field text (made unique) and the position of
/// every header-sourced column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderMap {
    /// Builds the map from the (merged) header row.
    pub fn build(schema: &Schema, observed: &[String]) -> Result<Self> {
        let fields = disambiguate(observed);

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        let mut header_column_count = 0;
        for column in schema.columns() {
            if let Some(header) = column.source.column_header.as_deref() {
                header_column_count += 1;
                let wanted = header.trim();
                let matches = fields
                    .iter()
                    .enumerate()
                    .filter(|(_, field)| normalize(field) == normalize(wanted))
                    .map(|(idx, _)| idx + 1)
                    .collect::<Vec<_>>();
                match matches.as_slice() {
                    [] => missing.push((column.name.as_str(), wanted)),
                    [position] => {
                        positions.insert(normalize(wanted), *position);
                    }
                    several => {
                        return Err(MappingError::AmbiguousHeaders(format!(
                            "{}: header '{wanted}' matches columns {}",
                            column.name,
                            several
                                .iter()
                                .map(usize::to_string)
                                .collect::<Vec<_>>()
                                .join(", ")
                        )));
                    }
                }
            }

            if let Some(index) = column.source.column_index
                && index > 0
                && index as usize > fields.len()
            {
                return Err(MappingError::config(format!(
                    "{}: ColumnIndex {index} is beyond the {} fields of the header row",
                    column.name,
                    fields.len()
                )));
            }
        }

        if header_column_count > 0 && missing.len() == header_column_count {
            return Err(MappingError::AllHeadersMissing);
        }
        if !missing.is_empty() {
            return Err(MappingError::MissingHeaders {
                message: describe_missing(&missing, &fields),
            });
        }

        Ok(Self { fields, positions })
    }

    /// The observed header fields after duplicate suffixing.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// 1-based position of a configured header name.
    pub fn position(&self, header: &str) -> Option<usize> {
        self.positions.get(&normalize(header.trim())).copied()
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Appends `#2`, `#3`, ... to repeated header text so every field is
/// addressable.
pub fn disambiguate(observed: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    observed
        .iter()
        .map(|field| {
            let trimmed = field.trim();
            let count = seen.entry(normalize(trimmed)).or_insert(0);
            *count += 1;
            if *count == 1 {
                trimmed.to_string()
            } else {
                format!("{trimmed}#{count}")
            }
        })
        .collect()
}

fn describe_missing(missing: &[(&str, &str)], fields: &[String]) -> String {
    let candidates = fields.iter().map(String::as_str).collect::<Vec<_>>();
    missing
        .iter()
        .map(|(name, header)| {
            let suggestions = similar::get_close_matches(*header, &candidates, 3, 0.6);
            if suggestions.is_empty() {
                format!("{name} '{header}'")
            } else {
                format!(
                    "{name} '{header}' (did you mean {}?)",
                    suggestions
                        .iter()
                        .map(|s| format!("'{s}'"))
                        .collect::<Vec<_>>()
                        .join(" or ")
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
