//! Schema model: the declarative description of where each value lives in a
//! tabular file and how it becomes a typed field-visit activity.
//!
//! ## Responsibilities
//!
//! - YAML schema loading via `serde_yaml`, with case-insensitive attribute
//!   names (keys are normalised to snake_case before deserialisation)
//! - [`ColumnSource`] and [`TimestampSource`] leaves, including the bare-scalar
//!   shorthand for fixed values
//! - Root-level parsing options (separator, locale, preface and header layout)
//! - The cached, flattened column list produced by [`crate::resolver`]

use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::Path,
    str::FromStr,
    sync::OnceLock,
};

use heck::ToSnakeCase;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_yaml::{Mapping, Value};

use crate::{
    activities::{
        AdcpDischargeDefinition, CalibrationDefinition, ControlConditionDefinition,
        EngineeredStructureDischargeDefinition, GageAtZeroFlowDefinition, InspectionDefinition,
        LevelSurveyDefinition, ManualGaugingDischargeDefinition, OtherDischargeDefinition,
        ReadingDefinition, VisitDefinition, VolumetricDischargeDefinition,
    },
    error::{MappingError, Result},
    resolver::{self, ResolvedColumn},
};

pub const DEFAULT_MAX_PREFACE_LINES: usize = 100;
pub const PREFACE_CAPTURE_GROUP: &str = "value";

/// Keys whose contents are user data rather than schema attributes.
const VERBATIM_KEYS: &[&str] = &["aliases"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Header,
    Index,
    Fixed,
    PrefaceCapture,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::Header => "header",
            SourceKind::Index => "index",
            SourceKind::Fixed => "fixed",
            SourceKind::PrefaceCapture => "preface",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnSourceDocument {
    #[serde(default, alias = "header")]
    column_header: Option<String>,
    #[serde(default, alias = "index")]
    column_index: Option<i64>,
    #[serde(default, alias = "fixed")]
    fixed_value: Option<Value>,
    #[serde(default, alias = "regex")]
    preface_regex: Option<String>,
    #[serde(default)]
    alias: Option<String>,
}

/// One leaf of the schema tree: where a single raw value comes from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preface_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip)]
    name: OnceLock<String>,
    #[serde(skip)]
    compiled: OnceLock<Regex>,
}

impl ColumnSource {
    pub fn header(name: impl Into<String>) -> Self {
        Self {
            column_header: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn index(index: i64) -> Self {
        Self {
            column_index: Some(index),
            ..Self::default()
        }
    }

    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            fixed_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn preface(regex: impl Into<String>) -> Self {
        Self {
            preface_regex: Some(regex.into()),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Fully-qualified diagnostic name such as `Readings[2].Value`.
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("(unnamed column)")
    }

    pub(crate) fn assign_name(&self, name: &str) {
        let _ = self.name.set(name.to_string());
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if self.column_header.is_some() {
            kinds.push(SourceKind::Header);
        }
        if self.column_index.is_some() {
            kinds.push(SourceKind::Index);
        }
        if self.fixed_value.is_some() {
            kinds.push(SourceKind::Fixed);
        }
        if self.preface_regex.is_some() {
            kinds.push(SourceKind::PrefaceCapture);
        }
        kinds
    }

    /// The single source kind, once validation has guaranteed there is one.
    pub fn kind(&self) -> Option<SourceKind> {
        match self.source_kinds().as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self.kind() {
            Some(SourceKind::Header) => self.column_header.clone().unwrap_or_default(),
            Some(SourceKind::Index) => self.column_index.unwrap_or_default().to_string(),
            Some(SourceKind::Fixed) => self.fixed_value.clone().unwrap_or_default(),
            Some(SourceKind::PrefaceCapture) => self.preface_regex.clone().unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Compiles the preface expression and checks for the `value` group.
    pub fn preface_pattern(&self) -> Result<Option<&Regex>> {
        let Some(source) = self.preface_regex.as_deref() else {
            return Ok(None);
        };
        if let Some(regex) = self.compiled.get() {
            return Ok(Some(regex));
        }
        let regex = Regex::new(source).map_err(|err| {
            MappingError::config(format!(
                "{}: invalid preface expression '{source}': {err}",
                self.name()
            ))
        })?;
        if !regex
            .capture_names()
            .flatten()
            .any(|group| group == PREFACE_CAPTURE_GROUP)
        {
            return Err(MappingError::config(format!(
                "{}: preface expression '{source}' must define a named group '(?<{PREFACE_CAPTURE_GROUP}>...)'",
                self.name()
            )));
        }
        let _ = self.compiled.set(regex);
        Ok(self.compiled.get())
    }

    /// Expressions that set the `m` or `s` flag are matched against the whole
    /// preface block instead of line by line.
    pub fn is_multiline_capture(&self) -> bool {
        self.preface_regex
            .as_deref()
            .is_some_and(expression_spans_lines)
    }

    fn from_yaml(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Mapping(_) => {
                let document: ColumnSourceDocument =
                    serde_yaml::from_value(value).map_err(|err| err.to_string())?;
                Ok(Self {
                    column_header: document.column_header,
                    column_index: document.column_index,
                    fixed_value: document.fixed_value.map(scalar_text).transpose()?,
                    preface_regex: document.preface_regex,
                    alias: document.alias,
                    ..Self::default()
                })
            }
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
            other => Ok(Self::fixed(scalar_text(other)?)),
        }
    }
}

fn scalar_text(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("expected a scalar value but found {other:?}")),
    }
}

fn expression_spans_lines(expression: &str) -> bool {
    if expression.contains("\\n") {
        return true;
    }
    expression.match_indices("(?").any(|(start, _)| {
        let rest = &expression[start + 2..];
        let flags = rest
            .chars()
            .take_while(|c| "imsxuUR-".contains(*c))
            .collect::<String>();
        let terminator = rest[flags.len()..].chars().next();
        matches!(terminator, Some(')' | ':'))
            && flags
                .split('-')
                .next()
                .is_some_and(|enabled| enabled.contains(['m', 's']))
    })
}

impl<'de> Deserialize<'de> for ColumnSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ColumnSource::from_yaml(value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TimestampKind {
    TimeOnly,
    DateOnly,
    #[default]
    DateTimeOnly,
    DateTimeOffset,
    DateAndSeparateOffset,
}

impl TimestampKind {
    pub fn variants() -> &'static [&'static str] {
        &[
            "TimeOnly",
            "DateOnly",
            "DateTimeOnly",
            "DateTimeOffset",
            "DateAndSeparateOffset",
        ]
    }
}

impl fmt::Display for TimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimestampKind::TimeOnly => "TimeOnly",
            TimestampKind::DateOnly => "DateOnly",
            TimestampKind::DateTimeOnly => "DateTimeOnly",
            TimestampKind::DateTimeOffset => "DateTimeOffset",
            TimestampKind::DateAndSeparateOffset => "DateAndSeparateOffset",
        };
        write!(f, "{label}")
    }
}

impl FromStr for TimestampKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "timeonly" | "time" => Ok(TimestampKind::TimeOnly),
            "dateonly" | "date" => Ok(TimestampKind::DateOnly),
            "datetimeonly" | "datetime" => Ok(TimestampKind::DateTimeOnly),
            "datetimeoffset" => Ok(TimestampKind::DateTimeOffset),
            "dateandseparateoffset" => Ok(TimestampKind::DateAndSeparateOffset),
            _ => Err(format!(
                "Unknown timestamp type '{value}'. Supported types: {}",
                TimestampKind::variants().join(", ")
            )),
        }
    }
}

/// A column source that yields (part of) a timestamp.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimestampSource {
    #[serde(flatten)]
    pub source: ColumnSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    #[serde(rename = "type")]
    pub kind: TimestampKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<ColumnSource>,
}

impl TimestampSource {
    pub fn new(source: ColumnSource, kind: TimestampKind) -> Self {
        Self {
            source,
            formats: Vec::new(),
            kind,
            utc_offset: None,
        }
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_utc_offset(mut self, offset: ColumnSource) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    fn from_yaml(value: Value) -> std::result::Result<Self, String> {
        let Value::Mapping(mut mapping) = value else {
            return Ok(Self::new(ColumnSource::from_yaml(value)?, TimestampKind::default()));
        };
        let formats = match mapping
            .remove("formats")
            .or_else(|| mapping.remove("format"))
        {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(single)) => vec![single],
            Some(Value::Sequence(items)) => items
                .into_iter()
                .map(scalar_text)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(other) => return Err(format!("formats must be a list of strings, found {other:?}")),
        };
        let kind = match mapping.remove("type") {
            None | Some(Value::Null) => TimestampKind::default(),
            Some(value) => TimestampKind::from_str(&scalar_text(value)?)?,
        };
        let utc_offset = match mapping.remove("utc_offset") {
            None | Some(Value::Null) => None,
            Some(value) => Some(ColumnSource::from_yaml(value)?),
        };
        Ok(Self {
            source: ColumnSource::from_yaml(Value::Mapping(mapping))?,
            formats,
            kind,
            utc_offset,
        })
    }
}

impl<'de> Deserialize<'de> for TimestampSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        TimestampSource::from_yaml(value).map_err(de::Error::custom)
    }
}

pub type AliasTables = BTreeMap<String, BTreeMap<String, String>>;

/// Root of a schema document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "Schema::default_priority")]
    pub priority: i32,
    #[serde(default = "Schema::default_separator")]
    pub separator: String,
    #[serde(default)]
    pub locale_name: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub preface_row_count: usize,
    #[serde(default)]
    pub preface_ends_with: Option<String>,
    #[serde(default)]
    pub preface_ends_before: Option<String>,
    #[serde(default = "Schema::default_max_preface_lines")]
    pub max_preface_lines: usize,
    #[serde(default)]
    pub header_row_count: Option<usize>,
    #[serde(default)]
    pub ignored_leading_header_rows: usize,
    #[serde(default)]
    pub ignored_trailing_header_rows: usize,
    #[serde(default)]
    pub data_row_count: Option<usize>,
    #[serde(default)]
    pub comment_line_prefix: Option<String>,
    #[serde(default)]
    pub footer_starts_with: Option<String>,
    #[serde(default)]
    pub skip_visit_if_no_activities: Option<bool>,
    #[serde(default)]
    pub aliases: AliasTables,

    #[serde(default)]
    pub location: Option<ColumnSource>,
    #[serde(default)]
    pub visit: Option<VisitDefinition>,
    #[serde(default)]
    pub reading: Option<ReadingDefinition>,
    #[serde(default)]
    pub readings: Vec<ReadingDefinition>,
    #[serde(default)]
    pub inspection: Option<InspectionDefinition>,
    #[serde(default)]
    pub inspections: Vec<InspectionDefinition>,
    #[serde(default)]
    pub calibration: Option<CalibrationDefinition>,
    #[serde(default)]
    pub calibrations: Vec<CalibrationDefinition>,
    #[serde(default)]
    pub control_condition: Option<ControlConditionDefinition>,
    #[serde(default)]
    pub control_conditions: Vec<ControlConditionDefinition>,
    #[serde(default)]
    pub gage_at_zero_flow: Option<GageAtZeroFlowDefinition>,
    #[serde(default)]
    pub gage_at_zero_flows: Vec<GageAtZeroFlowDefinition>,
    #[serde(default)]
    pub adcp_discharge: Option<AdcpDischargeDefinition>,
    #[serde(default)]
    pub adcp_discharges: Vec<AdcpDischargeDefinition>,
    #[serde(default)]
    pub manual_gauging_discharge: Option<ManualGaugingDischargeDefinition>,
    #[serde(default)]
    pub manual_gauging_discharges: Vec<ManualGaugingDischargeDefinition>,
    #[serde(default)]
    pub volumetric_discharge: Option<VolumetricDischargeDefinition>,
    #[serde(default)]
    pub volumetric_discharges: Vec<VolumetricDischargeDefinition>,
    #[serde(default)]
    pub engineered_structure_discharge: Option<EngineeredStructureDischargeDefinition>,
    #[serde(default)]
    pub engineered_structure_discharges: Vec<EngineeredStructureDischargeDefinition>,
    #[serde(default)]
    pub other_discharge: Option<OtherDischargeDefinition>,
    #[serde(default)]
    pub other_discharges: Vec<OtherDischargeDefinition>,
    #[serde(default)]
    pub level_survey: Option<LevelSurveyDefinition>,
    #[serde(default)]
    pub level_surveys: Vec<LevelSurveyDefinition>,

    /// Lazily resolved column list; see [`Schema::columns`].
    #[serde(skip)]
    pub(crate) column_cache: ColumnCache,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnCache(OnceLock<Vec<ResolvedColumn>>);

impl Default for Schema {
    fn default() -> Self {
        Self {
            id: None,
            priority: Self::default_priority(),
            separator: Self::default_separator(),
            locale_name: None,
            encoding: None,
            preface_row_count: 0,
            preface_ends_with: None,
            preface_ends_before: None,
            max_preface_lines: Self::default_max_preface_lines(),
            header_row_count: None,
            ignored_leading_header_rows: 0,
            ignored_trailing_header_rows: 0,
            data_row_count: None,
            comment_line_prefix: None,
            footer_starts_with: None,
            skip_visit_if_no_activities: None,
            aliases: AliasTables::new(),
            location: None,
            visit: None,
            reading: None,
            readings: Vec::new(),
            inspection: None,
            inspections: Vec::new(),
            calibration: None,
            calibrations: Vec::new(),
            control_condition: None,
            control_conditions: Vec::new(),
            gage_at_zero_flow: None,
            gage_at_zero_flows: Vec::new(),
            adcp_discharge: None,
            adcp_discharges: Vec::new(),
            manual_gauging_discharge: None,
            manual_gauging_discharges: Vec::new(),
            volumetric_discharge: None,
            volumetric_discharges: Vec::new(),
            engineered_structure_discharge: None,
            engineered_structure_discharges: Vec::new(),
            other_discharge: None,
            other_discharges: Vec::new(),
            level_survey: None,
            level_surveys: Vec::new(),
            column_cache: ColumnCache::default(),
        }
    }
}

/// Concatenates a singular slot and its list slot, singular first.
pub fn singular_then_list<'a, T>(single: &'a Option<T>, list: &'a [T]) -> Vec<&'a T> {
    single.iter().chain(list.iter()).collect()
}

impl Schema {
    pub const fn default_priority() -> i32 {
        1
    }

    pub fn default_separator() -> String {
        ",".to_string()
    }

    pub const fn default_max_preface_lines() -> usize {
        DEFAULT_MAX_PREFACE_LINES
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut schema = Self::from_yaml_str(&text)?;
        if schema.id.is_none() {
            schema.id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string);
        }
        Ok(schema)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(text)?;
        let normalized = normalize_keys(raw)?;
        let schema: Schema = serde_yaml::from_value(normalized)?;
        schema.columns();
        Ok(schema)
    }

    pub fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or("(unnamed schema)")
    }

    pub fn is_enabled(&self) -> bool {
        self.priority > 0
    }

    /// The flattened column list, computed once per schema instance.
    pub fn columns(&self) -> &[ResolvedColumn] {
        self.column_cache
            .0
            .get_or_init(|| resolver::resolve_columns(self))
    }

    pub fn has_header_columns(&self) -> bool {
        self.columns()
            .iter()
            .any(|column| column.source.column_header.is_some())
    }

    pub fn has_preface_columns(&self) -> bool {
        self.columns()
            .iter()
            .any(|column| column.source.preface_regex.is_some())
    }

    pub fn effective_header_row_count(&self) -> usize {
        self.header_row_count
            .unwrap_or(if self.has_header_columns() { 1 } else { 0 })
    }

    pub fn skips_empty_visits(&self) -> bool {
        self.skip_visit_if_no_activities.unwrap_or(true)
    }

    pub fn separator_char(&self) -> Option<char> {
        let mut chars = self.separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn readings(&self) -> Vec<&ReadingDefinition> {
        singular_then_list(&self.reading, &self.readings)
    }

    pub fn inspections(&self) -> Vec<&InspectionDefinition> {
        singular_then_list(&self.inspection, &self.inspections)
    }

    pub fn calibrations(&self) -> Vec<&CalibrationDefinition> {
        singular_then_list(&self.calibration, &self.calibrations)
    }

    pub fn control_conditions(&self) -> Vec<&ControlConditionDefinition> {
        singular_then_list(&self.control_condition, &self.control_conditions)
    }

    pub fn gage_at_zero_flows(&self) -> Vec<&GageAtZeroFlowDefinition> {
        singular_then_list(&self.gage_at_zero_flow, &self.gage_at_zero_flows)
    }

    pub fn adcp_discharges(&self) -> Vec<&AdcpDischargeDefinition> {
        singular_then_list(&self.adcp_discharge, &self.adcp_discharges)
    }

    pub fn manual_gauging_discharges(&self) -> Vec<&ManualGaugingDischargeDefinition> {
        singular_then_list(&self.manual_gauging_discharge, &self.manual_gauging_discharges)
    }

    pub fn volumetric_discharges(&self) -> Vec<&VolumetricDischargeDefinition> {
        singular_then_list(&self.volumetric_discharge, &self.volumetric_discharges)
    }

    pub fn engineered_structure_discharges(&self) -> Vec<&EngineeredStructureDischargeDefinition> {
        singular_then_list(
            &self.engineered_structure_discharge,
            &self.engineered_structure_discharges,
        )
    }

    pub fn other_discharges(&self) -> Vec<&OtherDischargeDefinition> {
        singular_then_list(&self.other_discharge, &self.other_discharges)
    }

    pub fn level_surveys(&self) -> Vec<&LevelSurveyDefinition> {
        singular_then_list(&self.level_survey, &self.level_surveys)
    }
}

/// Rewrites every mapping key to snake_case so attribute names match
/// case-insensitively. Alias tables are left untouched.
fn normalize_keys(value: Value) -> Result<Value> {
    match value {
        Value::Mapping(mapping) => {
            let mut normalized = Mapping::with_capacity(mapping.len());
            for (key, child) in mapping {
                let Value::String(key) = key else {
                    normalized.insert(key, normalize_keys(child)?);
                    continue;
                };
                let snake = key.to_snake_case();
                let child = if VERBATIM_KEYS.contains(&snake.as_str()) {
                    child
                } else {
                    normalize_keys(child)?
                };
                if normalized.contains_key(snake.as_str()) {
                    return Err(MappingError::config(format!(
                        "Attribute '{key}' is defined more than once"
                    )));
                }
                normalized.insert(Value::String(snake), child);
            }
            Ok(Value::Mapping(normalized))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(normalize_keys)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Value::Tagged(tagged) => normalize_keys(tagged.value),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_are_case_insensitive() {
        let schema = Schema::from_yaml_str(
            r#"
Id: Mixed
Separator: ";"
HeaderRowCount: 2
Location:
  ColumnHeader: Site
reading:
  parameterId: HG
  VALUE: { column_header: Stage }
"#,
        )
        .expect("schema loads");
        assert_eq!(schema.id.as_deref(), Some("Mixed"));
        assert_eq!(schema.separator, ";");
        assert_eq!(schema.header_row_count, Some(2));
        let reading = schema.reading.as_ref().expect("reading slot");
        assert_eq!(reading.parameter_id.as_ref().unwrap().fixed_value.as_deref(), Some("HG"));
        assert_eq!(reading.value.as_ref().unwrap().column_header.as_deref(), Some("Stage"));
    }

    #[test]
    fn bare_scalars_are_fixed_values() {
        let schema = Schema::from_yaml_str(
            r#"
location: SITE-1
reading:
  parameter_id: TW
  value: 12.5
"#,
        )
        .expect("schema loads");
        assert_eq!(
            schema.location.as_ref().unwrap().fixed_value.as_deref(),
            Some("SITE-1")
        );
        let value = schema.reading.as_ref().unwrap().value.as_ref().unwrap();
        assert_eq!(value.fixed_value.as_deref(), Some("12.5"));
        assert_eq!(value.kind(), Some(SourceKind::Fixed));
    }

    #[test]
    fn alias_tables_keep_their_keys() {
        let schema = Schema::from_yaml_str(
            r#"
aliases:
  GradeCodes:
    "Good Quality": GOOD
    "": UNSPECIFIED
"#,
        )
        .expect("schema loads");
        let table = schema.aliases.get("GradeCodes").expect("alias table");
        assert_eq!(table.get("Good Quality").map(String::as_str), Some("GOOD"));
        assert_eq!(table.get("").map(String::as_str), Some("UNSPECIFIED"));
    }

    #[test]
    fn timestamp_sources_read_type_formats_and_offset() {
        let schema = Schema::from_yaml_str(
            r#"
reading:
  value: { header: Stage }
  times:
    - { header: Date, type: DateOnly, formats: ["%d/%m/%Y"], utc_offset: "+10:00" }
    - { header: Time, type: time_only, format: "%H:%M" }
"#,
        )
        .expect("schema loads");
        let times = &schema.reading.as_ref().unwrap().timing.times;
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].kind, TimestampKind::DateOnly);
        assert_eq!(times[0].formats, vec!["%d/%m/%Y".to_string()]);
        assert_eq!(
            times[0].utc_offset.as_ref().unwrap().fixed_value.as_deref(),
            Some("+10:00")
        );
        assert_eq!(times[1].kind, TimestampKind::TimeOnly);
        assert_eq!(times[1].source.column_header.as_deref(), Some("Time"));
    }

    #[test]
    fn unknown_column_attributes_are_rejected() {
        let err = Schema::from_yaml_str("location: { column_heading: Site }").unwrap_err();
        assert!(err.to_string().contains("column_heading"));
    }

    #[test]
    fn duplicate_attributes_after_normalisation_are_rejected() {
        let err = Schema::from_yaml_str("Separator: \",\"\nseparator: \";\"").unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn multiline_expressions_are_detected() {
        assert!(ColumnSource::preface("(?m)^Site: (?<value>.+)$").is_multiline_capture());
        assert!(ColumnSource::preface("Site:\\n(?<value>.+)").is_multiline_capture());
        assert!(!ColumnSource::preface("^Site: (?<value>.+)$").is_multiline_capture());
        assert!(!ColumnSource::preface("(?i)^site: (?<value>.+)$").is_multiline_capture());
    }

    #[test]
    fn effective_header_rows_default_from_columns() {
        let mut schema = Schema::default();
        assert_eq!(schema.effective_header_row_count(), 0);
        schema = Schema {
            location: Some(ColumnSource::header("Site")),
            ..Schema::default()
        };
        assert_eq!(schema.effective_header_row_count(), 1);
    }
}
