//! Per-activity extraction. Each function returns `Ok(None)` when the row
//! lacks the minimum fields for that activity, so a row may populate any mix
//! of activity kinds.

use crate::{
    activities::{
        AdcpDischargeDefinition, CalibrationDefinition, ControlConditionDefinition,
        DischargeDefinition, EngineeredStructureDischargeDefinition, GageAtZeroFlowDefinition,
        InspectionDefinition, LevelSurveyDefinition, LevelSurveyMeasurementDefinition,
        ManualGaugingDischargeDefinition, OtherDischargeDefinition, ReadingDefinition,
        TimingDefinition, VolumetricDischargeDefinition,
    },
    domain::{
        Activity, AdcpMeasurement, Calibration, CalibrationType, Certainty, ChannelMeasurement,
        ControlCleanedType, ControlCondition, DischargeActivity, EngineeredStructureMeasurement,
        GageAtZeroFlow, Inspection, InspectionType, LevelSurvey, LevelSurveyMeasurement,
        ManualGaugingMeasurement, OtherMeasurement, Reading, ReadingType, TimeRange, Timestamp,
        VolumetricMeasurement,
    },
    error::Result,
    row::RowReader,
    schema::Schema,
};

/// Every activity the schema describes, in slot order.
pub fn activities(reader: &RowReader<'_>, schema: &Schema, visit: &TimeRange) -> Result<Vec<Activity>> {
    let mut found = Vec::new();
    for definition in schema.readings() {
        found.extend(reading(reader, definition, visit)?.map(Activity::Reading));
    }
    for definition in schema.inspections() {
        found.extend(inspection(reader, definition, visit)?.map(Activity::Inspection));
    }
    for definition in schema.calibrations() {
        found.extend(calibration(reader, definition, visit)?.map(Activity::Calibration));
    }
    for definition in schema.control_conditions() {
        found.extend(control_condition(reader, definition)?.map(Activity::ControlCondition));
    }
    for definition in schema.gage_at_zero_flows() {
        found.extend(gage_at_zero_flow(reader, definition, visit)?.map(Activity::GageAtZeroFlow));
    }
    for definition in schema.adcp_discharges() {
        found.extend(adcp_discharge(reader, definition, visit)?.map(Activity::Discharge));
    }
    for definition in schema.manual_gauging_discharges() {
        found.extend(manual_gauging_discharge(reader, definition, visit)?.map(Activity::Discharge));
    }
    for definition in schema.volumetric_discharges() {
        found.extend(volumetric_discharge(reader, definition, visit)?.map(Activity::Discharge));
    }
    for definition in schema.engineered_structure_discharges() {
        found.extend(
            engineered_structure_discharge(reader, definition, visit)?.map(Activity::Discharge),
        );
    }
    for definition in schema.other_discharges() {
        found.extend(other_discharge(reader, definition, visit)?.map(Activity::Discharge));
    }
    for definition in schema.level_surveys() {
        found.extend(level_survey(reader, definition, visit)?.map(Activity::LevelSurvey));
    }
    Ok(found)
}

fn instant(
    reader: &RowReader<'_>,
    owner: &str,
    timing: &TimingDefinition,
    visit: &TimeRange,
) -> Result<Timestamp> {
    Ok(reader.activity_period(owner, timing, visit)?.start)
}

fn join_comments(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(first), Some(second)) => Some(format!("{first}\n{second}")),
        (first, second) => first.or(second),
    }
}

/// Numeric values become ordinary readings. Non-numeric text is a
/// non-detect when a prefix is configured, and so is a value that an alias
/// table mapped to nothing.
pub fn reading(
    reader: &RowReader<'_>,
    definition: &ReadingDefinition,
    visit: &TimeRange,
) -> Result<Option<Reading>> {
    let lookup = match &definition.value {
        Some(source) => reader.lookup(source)?,
        None => Default::default(),
    };
    let (value, non_detect) = match lookup.value.as_deref() {
        Some(text) => match reader.provider().parse_number(text) {
            Ok(number) => (Some(number), None),
            Err(err) => match definition.non_detect_prefix.as_deref() {
                Some(prefix) => {
                    let raw = lookup.raw.as_deref().unwrap_or(text);
                    (None, Some(format!("{prefix}{raw}")))
                }
                None => {
                    let name = definition
                        .value
                        .as_ref()
                        .map(|source| source.name())
                        .unwrap_or("Value");
                    return Err(reader.error(format!("{name}: {err}")));
                }
            },
        },
        None => match lookup.raw.as_deref() {
            Some(raw) => {
                let prefix = definition.non_detect_prefix.as_deref().unwrap_or_default();
                (None, Some(format!("{prefix}{raw}")))
            }
            None if definition.allow_empty_value => (None, None),
            None => return Ok(None),
        },
    };

    let parameter_id = reader.required_text(&definition.parameter_id, "Reading.ParameterId")?;
    let mut reading = Reading::new(parameter_id, value);
    reading.time = Some(instant(reader, "Reading", &definition.timing, visit)?);
    reading.unit_id = reader.text(&definition.unit_id)?;
    reading.reading_type = reader
        .choice::<ReadingType>(&definition.reading_type)?
        .unwrap_or(ReadingType::Unknown);
    reading.comments = join_comments(non_detect, reader.text(&definition.comments)?);
    reading.method = reader.text(&definition.method)?;
    reading.sub_location = reader.text(&definition.sub_location)?;
    reading.sensor_unique_id = reader.unique_id(&definition.sensor_unique_id)?;
    reading.grade_code = reader.text(&definition.grade_code)?;
    reading.qualifiers = reader.list(&definition.qualifiers)?;
    reading.uncertainty = reader.number(&definition.uncertainty)?;
    reading.reference_point_name = reader.text(&definition.reference_point_name)?;
    reading.use_location_datum_as_reference = reader
        .boolean(&definition.use_location_datum_as_reference)?
        .unwrap_or(false);
    reading.manufacturer = reader.text(&definition.manufacturer)?;
    reading.model = reader.text(&definition.model)?;
    reading.serial_number = reader.text(&definition.serial_number)?;
    reading.is_valid = reader.boolean(&definition.is_valid)?;
    Ok(Some(reading))
}

pub fn inspection(
    reader: &RowReader<'_>,
    definition: &InspectionDefinition,
    visit: &TimeRange,
) -> Result<Option<Inspection>> {
    let Some(inspection_type) = reader.choice::<InspectionType>(&definition.inspection_type)? else {
        return Ok(None);
    };
    Ok(Some(Inspection {
        time: Some(instant(reader, "Inspection", &definition.timing, visit)?),
        inspection_type,
        comments: reader.text(&definition.comments)?,
        sub_location: reader.text(&definition.sub_location)?,
        manufacturer: reader.text(&definition.manufacturer)?,
        model: reader.text(&definition.model)?,
        serial_number: reader.text(&definition.serial_number)?,
    }))
}

pub fn calibration(
    reader: &RowReader<'_>,
    definition: &CalibrationDefinition,
    visit: &TimeRange,
) -> Result<Option<Calibration>> {
    let Some(value) = reader.number(&definition.value)? else {
        return Ok(None);
    };
    Ok(Some(Calibration {
        time: Some(instant(reader, "Calibration", &definition.timing, visit)?),
        parameter_id: reader.required_text(&definition.parameter_id, "Calibration.ParameterId")?,
        unit_id: reader.text(&definition.unit_id)?,
        value,
        calibration_type: reader
            .choice::<CalibrationType>(&definition.calibration_type)?
            .unwrap_or(CalibrationType::Unknown),
        method: reader.text(&definition.method)?,
        standard_identifier: reader.text(&definition.standard_identifier)?,
        comments: reader.text(&definition.comments)?,
        party: reader.text(&definition.party)?,
        sub_location: reader.text(&definition.sub_location)?,
    }))
}

pub fn control_condition(
    reader: &RowReader<'_>,
    definition: &ControlConditionDefinition,
) -> Result<Option<ControlCondition>> {
    let cleaned = reader.choice::<ControlCleanedType>(&definition.control_cleaned)?;
    let date_cleaned = match &definition.date_cleaned {
        Some(source) => reader.timestamp(&[source])?,
        None => None,
    };
    let condition = ControlCondition {
        condition_type: reader.text(&definition.condition_type)?,
        control_cleaned: cleaned.unwrap_or(ControlCleanedType::Unknown),
        control_code: reader.text(&definition.control_code)?,
        distance_to_gage: reader.number(&definition.distance_to_gage)?,
        distance_to_gage_unit_id: reader.text(&definition.distance_to_gage_unit_id)?,
        date_cleaned,
        comments: reader.text(&definition.comments)?,
        party: reader.text(&definition.party)?,
    };
    let blank = cleaned.is_none()
        && condition.condition_type.is_none()
        && condition.control_code.is_none()
        && condition.distance_to_gage.is_none()
        && condition.date_cleaned.is_none()
        && condition.comments.is_none()
        && condition.party.is_none();
    Ok((!blank).then_some(condition))
}

pub fn gage_at_zero_flow(
    reader: &RowReader<'_>,
    definition: &GageAtZeroFlowDefinition,
    visit: &TimeRange,
) -> Result<Option<GageAtZeroFlow>> {
    let Some(zero_flow_height) = reader.number(&definition.zero_flow_height)? else {
        return Ok(None);
    };
    Ok(Some(GageAtZeroFlow {
        time: Some(instant(reader, "GageAtZeroFlow", &definition.timing, visit)?),
        zero_flow_height,
        unit_id: reader.text(&definition.unit_id)?,
        water_depth: reader.number(&definition.water_depth)?,
        certainty: reader
            .choice::<Certainty>(&definition.certainty)?
            .unwrap_or(Certainty::Unknown),
        comments: reader.text(&definition.comments)?,
        party: reader.text(&definition.party)?,
    }))
}

/// The fields shared by every discharge kind; `None` without a total
/// discharge.
fn discharge(
    reader: &RowReader<'_>,
    owner: &str,
    definition: &DischargeDefinition,
    visit: &TimeRange,
    channel_measurement: impl FnOnce() -> Result<ChannelMeasurement>,
) -> Result<Option<DischargeActivity>> {
    let Some(total) =
        reader.measurement(&definition.total_discharge, &definition.discharge_unit_id)?
    else {
        return Ok(None);
    };
    Ok(Some(DischargeActivity {
        period: reader.activity_period(owner, &definition.timing, visit)?,
        discharge: total,
        mean_gage_height: reader
            .measurement(&definition.mean_gage_height, &definition.gage_height_unit_id)?,
        channel_name: reader.text(&definition.channel_name)?,
        measurement_id: reader.text(&definition.measurement_id)?,
        grade_code: reader.text(&definition.grade_code)?,
        party: reader.text(&definition.party)?,
        comments: reader.text(&definition.comments)?,
        area: reader.measurement(&definition.area, &definition.area_unit_id)?,
        width: reader.measurement(&definition.width, &definition.distance_unit_id)?,
        velocity_average: reader
            .measurement(&definition.velocity_average, &definition.velocity_unit_id)?,
        channel_measurement: channel_measurement()?,
    }))
}

pub fn adcp_discharge(
    reader: &RowReader<'_>,
    definition: &AdcpDischargeDefinition,
    visit: &TimeRange,
) -> Result<Option<DischargeActivity>> {
    discharge(reader, "AdcpDischarge", &definition.discharge, visit, || {
        Ok(ChannelMeasurement::Adcp(AdcpMeasurement {
            deployment_method: reader.choice(&definition.deployment_method)?,
            manufacturer: reader.text(&definition.manufacturer)?,
            model: reader.text(&definition.model)?,
            serial_number: reader.text(&definition.serial_number)?,
            firmware_version: reader.text(&definition.firmware_version)?,
            software_version: reader.text(&definition.software_version)?,
            number_of_transects: reader.count(&definition.number_of_transects)?,
            magnetic_variation: reader.number(&definition.magnetic_variation)?,
        }))
    })
}

pub fn manual_gauging_discharge(
    reader: &RowReader<'_>,
    definition: &ManualGaugingDischargeDefinition,
    visit: &TimeRange,
) -> Result<Option<DischargeActivity>> {
    discharge(reader, "ManualGaugingDischarge", &definition.discharge, visit, || {
        Ok(ChannelMeasurement::ManualGauging(ManualGaugingMeasurement {
            discharge_method: reader.choice(&definition.discharge_method)?,
            start_point: reader.choice(&definition.start_point)?,
            deployment_method: reader.text(&definition.deployment_method)?,
            meter_manufacturer: reader.text(&definition.meter_manufacturer)?,
            meter_model: reader.text(&definition.meter_model)?,
            meter_serial_number: reader.text(&definition.meter_serial_number)?,
        }))
    })
}

pub fn volumetric_discharge(
    reader: &RowReader<'_>,
    definition: &VolumetricDischargeDefinition,
    visit: &TimeRange,
) -> Result<Option<DischargeActivity>> {
    discharge(reader, "VolumetricDischarge", &definition.discharge, visit, || {
        Ok(ChannelMeasurement::Volumetric(VolumetricMeasurement {
            container_volume: reader
                .measurement(&definition.container_volume, &definition.volume_unit_id)?,
            fill_duration_seconds: reader.number(&definition.fill_duration_seconds)?,
        }))
    })
}

pub fn engineered_structure_discharge(
    reader: &RowReader<'_>,
    definition: &EngineeredStructureDischargeDefinition,
    visit: &TimeRange,
) -> Result<Option<DischargeActivity>> {
    discharge(
        reader,
        "EngineeredStructureDischarge",
        &definition.discharge,
        visit,
        || {
            Ok(ChannelMeasurement::EngineeredStructure(EngineeredStructureMeasurement {
                structure_type: reader.text(&definition.structure_type)?,
                equation: reader.text(&definition.equation)?,
                mean_head: reader.measurement(&definition.mean_head, &definition.head_unit_id)?,
            }))
        },
    )
}

pub fn other_discharge(
    reader: &RowReader<'_>,
    definition: &OtherDischargeDefinition,
    visit: &TimeRange,
) -> Result<Option<DischargeActivity>> {
    discharge(reader, "OtherDischarge", &definition.discharge, visit, || {
        Ok(ChannelMeasurement::Other(OtherMeasurement {
            monitoring_method_code: reader.text(&definition.monitoring_method_code)?,
        }))
    })
}

pub fn level_survey(
    reader: &RowReader<'_>,
    definition: &LevelSurveyDefinition,
    visit: &TimeRange,
) -> Result<Option<LevelSurvey>> {
    let Some(origin) = reader.text(&definition.origin_reference_point_name)? else {
        return Ok(None);
    };
    let period = reader.activity_period("LevelSurvey", &definition.timing, visit)?;
    let mut measurements = Vec::new();
    for measurement_definition in definition.measurement_definitions() {
        if let Some(measurement) = level_survey_measurement(reader, measurement_definition, &period)? {
            measurements.push(measurement);
        }
    }
    Ok(Some(LevelSurvey {
        time: Some(period.start),
        origin_reference_point_name: origin,
        method: reader.text(&definition.method)?,
        party: reader.text(&definition.party)?,
        comments: reader.text(&definition.comments)?,
        measurements,
    }))
}

fn level_survey_measurement(
    reader: &RowReader<'_>,
    definition: &LevelSurveyMeasurementDefinition,
    survey: &TimeRange,
) -> Result<Option<LevelSurveyMeasurement>> {
    let Some(measured_elevation) = reader.number(&definition.measured_elevation)? else {
        return Ok(None);
    };
    Ok(Some(LevelSurveyMeasurement {
        time: Some(instant(reader, "LevelSurvey.Measurement", &definition.timing, survey)?),
        reference_point_name: reader.required_text(
            &definition.reference_point_name,
            "LevelSurvey.Measurement.ReferencePointName",
        )?,
        measured_elevation,
        comments: reader.text(&definition.comments)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::FormatProvider, data::utc, preface::Preface, schema::AliasTables};

    fn rows(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn with_reader<T>(
        schema: &Schema,
        fields: &[&str],
        check: impl FnOnce(&RowReader<'_>) -> T,
    ) -> T {
        let fields = rows(fields);
        let preface = Preface::default();
        let provider = FormatProvider::invariant();
        let aliases: &AliasTables = &schema.aliases;
        let reader = RowReader::new(2, &fields, None, &preface, aliases, &provider, utc());
        check(&reader)
    }

    fn visit_at(text: &str) -> TimeRange {
        let at = chrono::DateTime::parse_from_rfc3339(text).unwrap();
        TimeRange::instant(at)
    }

    fn reading_schema(extra: &str) -> Schema {
        Schema::from_yaml_str(&format!(
            "location: Site\nreading:\n  parameter_id: TW\n  value: {{ index: 1 }}\n{extra}aliases:\n  Flags:\n    dry: ''\n"
        ))
        .unwrap()
    }

    #[test]
    fn non_numeric_values_need_a_non_detect_prefix() {
        let visit = visit_at("2020-01-01T08:00:00+00:00");
        let plain = reading_schema("");
        let err = with_reader(&plain, &["<0.5"], |reader| {
            reading(reader, plain.reading.as_ref().unwrap(), &visit).unwrap_err()
        });
        assert_eq!(
            err.to_string(),
            "Line 2: Reading.Value: '<0.5' is not a valid number"
        );

        let prefixed = reading_schema("  non_detect_prefix: 'ND '\n  comments: { index: 2 }\n");
        let found = with_reader(&prefixed, &["<0.5", "lab"], |reader| {
            reading(reader, prefixed.reading.as_ref().unwrap(), &visit).unwrap()
        })
        .expect("a reading");
        assert_eq!(found.value, None);
        assert_eq!(found.comments.as_deref(), Some("ND <0.5\nlab"));
        assert_eq!(found.time, Some(visit.start));
    }

    #[test]
    fn values_aliased_to_nothing_become_non_detects() {
        let visit = visit_at("2020-01-01T08:00:00+00:00");
        let schema = Schema::from_yaml_str(
            "location: Site\nreading:\n  parameter_id: HG\n  value: { index: 1, alias: Flags }\naliases:\n  Flags:\n    dry: ''\n",
        )
        .unwrap();
        let found = with_reader(&schema, &["dry"], |reader| {
            reading(reader, schema.reading.as_ref().unwrap(), &visit).unwrap()
        })
        .expect("a reading");
        assert_eq!(found.value, None);
        assert_eq!(found.comments.as_deref(), Some("dry"));

        let blank = with_reader(&schema, &[""], |reader| {
            reading(reader, schema.reading.as_ref().unwrap(), &visit).unwrap()
        });
        assert!(blank.is_none());
    }

    #[test]
    fn blank_control_conditions_are_absent() {
        let schema = Schema::from_yaml_str(
            "location: Site\ncontrol_condition:\n  condition_type: { index: 1 }\n  control_cleaned: { index: 2 }\n",
        )
        .unwrap();
        let definition = schema.control_condition.as_ref().unwrap();
        let blank = with_reader(&schema, &["", ""], |reader| {
            control_condition(reader, definition).unwrap()
        });
        assert!(blank.is_none());
        let cleaned = with_reader(&schema, &["", "cleaned before readings"], |reader| {
            control_condition(reader, definition).unwrap()
        })
        .expect("a condition");
        assert_eq!(cleaned.control_cleaned, ControlCleanedType::CleanedBeforeReadings);
        let err = with_reader(&schema, &["", "scrubbed"], |reader| {
            control_condition(reader, definition).unwrap_err()
        });
        assert!(err.to_string().contains("ControlCondition.ControlCleaned"));
    }

    #[test]
    fn discharges_need_a_time_from_somewhere() {
        let schema = Schema::from_yaml_str(
            "location: Site\nother_discharge:\n  total_discharge: { index: 1 }\n  discharge_unit_id: m^3/s\n  monitoring_method_code: { index: 2 }\n",
        )
        .unwrap();
        let definition = schema.other_discharge.as_ref().unwrap();
        let err = with_reader(&schema, &["3.2", "QE"], |reader| {
            other_discharge(reader, definition, &TimeRange::unset()).unwrap_err()
        });
        assert!(err.to_string().contains("OtherDischarge"), "{err}");

        let visit = visit_at("2020-01-01T08:00:00+00:00");
        let found = with_reader(&schema, &["3.2", "QE"], |reader| {
            other_discharge(reader, definition, &visit).unwrap()
        })
        .expect("a discharge");
        assert_eq!(found.period, visit);
        assert_eq!(found.discharge.value, 3.2);
        assert_eq!(found.discharge.unit_id.as_deref(), Some("m^3/s"));
        assert!(matches!(
            found.channel_measurement,
            ChannelMeasurement::Other(OtherMeasurement { ref monitoring_method_code })
                if monitoring_method_code.as_deref() == Some("QE")
        ));
    }

    #[test]
    fn level_survey_measurements_inherit_the_survey_time() {
        let schema = Schema::from_yaml_str(
            "location: Site\nlevel_survey:\n  origin_reference_point_name: RP1\n  time: { index: 1 }\n  measurements:\n    - { reference_point_name: RP2, measured_elevation: { index: 2 } }\n    - { reference_point_name: RP3, measured_elevation: { index: 3 } }\n",
        )
        .unwrap();
        let definition = schema.level_survey.as_ref().unwrap();
        let survey = with_reader(&schema, &["2020-01-01 09:00", "10.125", ""], |reader| {
            level_survey(reader, definition, &TimeRange::unset()).unwrap()
        })
        .expect("a survey");
        assert_eq!(survey.origin_reference_point_name, "RP1");
        assert_eq!(survey.measurements.len(), 1);
        assert_eq!(survey.measurements[0].reference_point_name, "RP2");
        assert_eq!(survey.measurements[0].time, survey.time);
    }
}
