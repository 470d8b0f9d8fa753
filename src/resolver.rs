//! Column resolution: flattens a schema tree into an ordered list of leaves,
//! each tagged with a dotted diagnostic name such as `Readings[2].Value`.
//!
//! Each node type implements [`ColumnTree`] and registers its own slots; the
//! [`ColumnWalker`] tracks the current path and assigns names as it goes.

use itertools::Itertools;

use crate::schema::{ColumnSource, Schema, TimestampKind, TimestampSource};

/// Extra facts about a leaf that feeds a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampColumn {
    /// Sources sharing a group are merged into one timestamp.
    pub group: String,
    pub kind: TimestampKind,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub name: String,
    pub source: ColumnSource,
    pub timestamp: Option<TimestampColumn>,
}

pub trait ColumnTree {
    fn walk(&self, walker: &mut ColumnWalker);
}

#[derive(Debug, Default)]
pub struct ColumnWalker {
    path: Vec<String>,
    columns: Vec<ResolvedColumn>,
}

impl ColumnWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_columns(self) -> Vec<ResolvedColumn> {
        self.columns
    }

    fn qualified(&self, leaf: &str) -> String {
        if self.path.is_empty() {
            leaf.to_string()
        } else {
            format!("{}.{leaf}", self.path.join("."))
        }
    }

    fn record(&mut self, name: String, source: &ColumnSource, timestamp: Option<TimestampColumn>) {
        source.assign_name(&name);
        self.columns.push(ResolvedColumn {
            name,
            source: source.clone(),
            timestamp,
        });
    }

    pub fn column(&mut self, leaf: &str, source: &Option<ColumnSource>) {
        if let Some(source) = source {
            let name = self.qualified(leaf);
            self.record(name, source, None);
        }
    }

    /// Registers a singular timestamp slot and its list counterpart as one
    /// merge group.
    pub fn timestamps(
        &mut self,
        singular: &str,
        plural: &str,
        single: &Option<TimestampSource>,
        list: &[TimestampSource],
    ) {
        let group = self.qualified(singular);
        if let Some(source) = single {
            let name = self.qualified(singular);
            self.timestamp(name, &group, source);
        }
        for (idx, source) in list.iter().enumerate() {
            let name = self.qualified(&format!("{plural}[{}]", idx + 1));
            self.timestamp(name, &group, source);
        }
    }

    fn timestamp(&mut self, name: String, group: &str, source: &TimestampSource) {
        let details = TimestampColumn {
            group: group.to_string(),
            kind: source.kind,
            formats: source.formats.clone(),
        };
        if let Some(offset) = &source.utc_offset {
            let offset_name = format!("{name}.UtcOffset");
            self.record(name, &source.source, Some(details));
            self.record(offset_name, offset, None);
        } else {
            self.record(name, &source.source, Some(details));
        }
    }

    pub fn node<T: ColumnTree>(&mut self, segment: &str, node: &Option<T>) {
        if let Some(node) = node {
            self.path.push(segment.to_string());
            node.walk(self);
            self.path.pop();
        }
    }

    pub fn nodes<T: ColumnTree>(&mut self, segment: &str, nodes: &[T]) {
        for (idx, node) in nodes.iter().enumerate() {
            self.path.push(format!("{segment}[{}]", idx + 1));
            node.walk(self);
            self.path.pop();
        }
    }
}

impl ColumnTree for Schema {
    fn walk(&self, walker: &mut ColumnWalker) {
        walker.column("Location", &self.location);
        walker.node("Visit", &self.visit);
        walker.node("Reading", &self.reading);
        walker.nodes("Readings", &self.readings);
        walker.node("Inspection", &self.inspection);
        walker.nodes("Inspections", &self.inspections);
        walker.node("Calibration", &self.calibration);
        walker.nodes("Calibrations", &self.calibrations);
        walker.node("ControlCondition", &self.control_condition);
        walker.nodes("ControlConditions", &self.control_conditions);
        walker.node("GageAtZeroFlow", &self.gage_at_zero_flow);
        walker.nodes("GageAtZeroFlows", &self.gage_at_zero_flows);
        walker.node("AdcpDischarge", &self.adcp_discharge);
        walker.nodes("AdcpDischarges", &self.adcp_discharges);
        walker.node("ManualGaugingDischarge", &self.manual_gauging_discharge);
        walker.nodes("ManualGaugingDischarges", &self.manual_gauging_discharges);
        walker.node("VolumetricDischarge", &self.volumetric_discharge);
        walker.nodes("VolumetricDischarges", &self.volumetric_discharges);
        walker.node(
            "EngineeredStructureDischarge",
            &self.engineered_structure_discharge,
        );
        walker.nodes(
            "EngineeredStructureDischarges",
            &self.engineered_structure_discharges,
        );
        walker.node("OtherDischarge", &self.other_discharge);
        walker.nodes("OtherDischarges", &self.other_discharges);
        walker.node("LevelSurvey", &self.level_survey);
        walker.nodes("LevelSurveys", &self.level_surveys);
    }
}

pub fn resolve_columns(schema: &Schema) -> Vec<ResolvedColumn> {
    let mut walker = ColumnWalker::new();
    schema.walk(&mut walker);
    walker.into_columns()
}

/// Qualified names registered more than once, in first-seen order.
pub fn duplicate_names(columns: &[ResolvedColumn]) -> Vec<&str> {
    columns
        .iter()
        .map(|column| column.name.as_str())
        .duplicates()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::ReadingDefinition;

    fn reading(value_header: &str) -> ReadingDefinition {
        ReadingDefinition {
            value: Some(ColumnSource::header(value_header)),
            ..ReadingDefinition::default()
        }
    }

    #[test]
    fn list_slots_are_numbered_from_one() {
        let schema = Schema {
            location: Some(ColumnSource::header("Site")),
            reading: Some(reading("Stage")),
            readings: vec![reading("Temp"), reading("Cond")],
            ..Schema::default()
        };
        let names = schema
            .columns()
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Location",
                "Reading.Value",
                "Readings[1].Value",
                "Readings[2].Value"
            ]
        );
        assert_eq!(
            schema.readings[1].value.as_ref().unwrap().name(),
            "Readings[2].Value"
        );
    }

    #[test]
    fn timestamp_slots_share_a_group_and_name_their_offsets() {
        let mut definition = reading("Stage");
        definition.timing.time = Some(TimestampSource::new(
            ColumnSource::header("Date"),
            TimestampKind::DateOnly,
        ));
        definition.timing.times = vec![
            TimestampSource::new(ColumnSource::header("Clock"), TimestampKind::TimeOnly)
                .with_utc_offset(ColumnSource::fixed("-05:00")),
        ];
        let schema = Schema {
            reading: Some(definition),
            ..Schema::default()
        };
        let columns = schema.columns();
        let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Reading.Time",
                "Reading.Times[1]",
                "Reading.Times[1].UtcOffset",
                "Reading.Value"
            ]
        );
        assert_eq!(columns[0].timestamp.as_ref().unwrap().group, "Reading.Time");
        assert_eq!(columns[1].timestamp.as_ref().unwrap().group, "Reading.Time");
        assert!(columns[2].timestamp.is_none());
    }

    struct Clashing;

    impl ColumnTree for Clashing {
        fn walk(&self, walker: &mut ColumnWalker) {
            walker.column("Value", &Some(ColumnSource::header("A")));
            walker.column("Value", &Some(ColumnSource::header("B")));
            walker.column("Unit", &Some(ColumnSource::fixed("m")));
        }
    }

    #[test]
    fn clashing_names_are_reported() {
        let mut walker = ColumnWalker::new();
        Clashing.walk(&mut walker);
        let columns = walker.into_columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(duplicate_names(&columns), vec!["Value"]);

        let schema = Schema {
            location: Some(ColumnSource::header("Site")),
            reading: Some(reading("Stage")),
            readings: vec![reading("Temp")],
            ..Schema::default()
        };
        assert!(duplicate_names(schema.columns()).is_empty());
    }

    #[test]
    fn resolution_is_cached_per_schema() {
        let schema = Schema {
            location: Some(ColumnSource::header("Site")),
            ..Schema::default()
        };
        let first = schema.columns().as_ptr();
        let second = schema.columns().as_ptr();
        assert_eq!(first, second);
    }
}
