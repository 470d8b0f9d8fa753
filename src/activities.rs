//! Activity definitions: the schema sub-trees describing visits, readings,
//! inspections, calibrations, control conditions, gage-at-zero-flow,
//! discharges and level surveys.
//!
//! Every definition registers its own column slots with the
//! [`ColumnWalker`]; there is no reflection over field names.

use serde::{Deserialize, Serialize};

use crate::{
    resolver::{ColumnTree, ColumnWalker},
    schema::{ColumnSource, TimestampSource, singular_then_list},
};

/// Time columns shared by the visit and every activity.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimestampSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub times: Vec<TimestampSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimestampSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub start_times: Vec<TimestampSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimestampSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub end_times: Vec<TimestampSource>,
}

impl TimingDefinition {
    pub fn time_sources(&self) -> Vec<&TimestampSource> {
        singular_then_list(&self.time, &self.times)
    }

    pub fn start_sources(&self) -> Vec<&TimestampSource> {
        singular_then_list(&self.start_time, &self.start_times)
    }

    pub fn end_sources(&self) -> Vec<&TimestampSource> {
        singular_then_list(&self.end_time, &self.end_times)
    }

    /// Every diagnostic name this timing block reads from.
    pub fn column_names(&self) -> Vec<String> {
        self.time_sources()
            .into_iter()
            .chain(self.start_sources())
            .chain(self.end_sources())
            .map(|source| source.source.name().to_string())
            .collect()
    }

    fn walk(&self, walker: &mut ColumnWalker) {
        walker.timestamps("Time", "Times", &self.time, &self.times);
        walker.timestamps("StartTime", "StartTimes", &self.start_time, &self.start_times);
        walker.timestamps("EndTime", "EndTimes", &self.end_time, &self.end_times);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VisitDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub party: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub weather: Option<ColumnSource>,
    pub collection_agency: Option<ColumnSource>,
}

impl ColumnTree for VisitDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("Party", &self.party);
        walker.column("Comments", &self.comments);
        walker.column("Weather", &self.weather);
        walker.column("CollectionAgency", &self.collection_agency);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadingDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub parameter_id: Option<ColumnSource>,
    pub unit_id: Option<ColumnSource>,
    pub value: Option<ColumnSource>,
    pub reading_type: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub method: Option<ColumnSource>,
    pub sub_location: Option<ColumnSource>,
    pub sensor_unique_id: Option<ColumnSource>,
    pub grade_code: Option<ColumnSource>,
    pub qualifiers: Option<ColumnSource>,
    pub uncertainty: Option<ColumnSource>,
    pub reference_point_name: Option<ColumnSource>,
    pub use_location_datum_as_reference: Option<ColumnSource>,
    pub manufacturer: Option<ColumnSource>,
    pub model: Option<ColumnSource>,
    pub serial_number: Option<ColumnSource>,
    pub is_valid: Option<ColumnSource>,
    /// Keep readings whose value cell is blank.
    pub allow_empty_value: bool,
    /// Non-numeric values become value-less readings commented with this
    /// prefix followed by the raw text.
    pub non_detect_prefix: Option<String>,
}

impl ColumnTree for ReadingDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("ParameterId", &self.parameter_id);
        walker.column("UnitId", &self.unit_id);
        walker.column("Value", &self.value);
        walker.column("ReadingType", &self.reading_type);
        walker.column("Comments", &self.comments);
        walker.column("Method", &self.method);
        walker.column("SubLocation", &self.sub_location);
        walker.column("SensorUniqueId", &self.sensor_unique_id);
        walker.column("GradeCode", &self.grade_code);
        walker.column("Qualifiers", &self.qualifiers);
        walker.column("Uncertainty", &self.uncertainty);
        walker.column("ReferencePointName", &self.reference_point_name);
        walker.column(
            "UseLocationDatumAsReference",
            &self.use_location_datum_as_reference,
        );
        walker.column("Manufacturer", &self.manufacturer);
        walker.column("Model", &self.model);
        walker.column("SerialNumber", &self.serial_number);
        walker.column("IsValid", &self.is_valid);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectionDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub inspection_type: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub sub_location: Option<ColumnSource>,
    pub manufacturer: Option<ColumnSource>,
    pub model: Option<ColumnSource>,
    pub serial_number: Option<ColumnSource>,
}

impl ColumnTree for InspectionDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("InspectionType", &self.inspection_type);
        walker.column("Comments", &self.comments);
        walker.column("SubLocation", &self.sub_location);
        walker.column("Manufacturer", &self.manufacturer);
        walker.column("Model", &self.model);
        walker.column("SerialNumber", &self.serial_number);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub parameter_id: Option<ColumnSource>,
    pub unit_id: Option<ColumnSource>,
    pub value: Option<ColumnSource>,
    pub calibration_type: Option<ColumnSource>,
    pub method: Option<ColumnSource>,
    pub standard_identifier: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub party: Option<ColumnSource>,
    pub sub_location: Option<ColumnSource>,
}

impl ColumnTree for CalibrationDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("ParameterId", &self.parameter_id);
        walker.column("UnitId", &self.unit_id);
        walker.column("Value", &self.value);
        walker.column("CalibrationType", &self.calibration_type);
        walker.column("Method", &self.method);
        walker.column("StandardIdentifier", &self.standard_identifier);
        walker.column("Comments", &self.comments);
        walker.column("Party", &self.party);
        walker.column("SubLocation", &self.sub_location);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConditionDefinition {
    pub condition_type: Option<ColumnSource>,
    pub control_cleaned: Option<ColumnSource>,
    pub control_code: Option<ColumnSource>,
    pub distance_to_gage: Option<ColumnSource>,
    pub distance_to_gage_unit_id: Option<ColumnSource>,
    pub date_cleaned: Option<TimestampSource>,
    pub comments: Option<ColumnSource>,
    pub party: Option<ColumnSource>,
}

impl ColumnTree for ControlConditionDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        walker.column("ConditionType", &self.condition_type);
        walker.column("ControlCleaned", &self.control_cleaned);
        walker.column("ControlCode", &self.control_code);
        walker.column("DistanceToGage", &self.distance_to_gage);
        walker.column("DistanceToGageUnitId", &self.distance_to_gage_unit_id);
        walker.timestamps("DateCleaned", "DateCleaned", &self.date_cleaned, &[]);
        walker.column("Comments", &self.comments);
        walker.column("Party", &self.party);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GageAtZeroFlowDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub zero_flow_height: Option<ColumnSource>,
    pub unit_id: Option<ColumnSource>,
    pub water_depth: Option<ColumnSource>,
    pub certainty: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub party: Option<ColumnSource>,
}

impl ColumnTree for GageAtZeroFlowDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("ZeroFlowHeight", &self.zero_flow_height);
        walker.column("UnitId", &self.unit_id);
        walker.column("WaterDepth", &self.water_depth);
        walker.column("Certainty", &self.certainty);
        walker.column("Comments", &self.comments);
        walker.column("Party", &self.party);
    }
}

/// Columns common to every discharge sub-kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DischargeDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub total_discharge: Option<ColumnSource>,
    pub discharge_unit_id: Option<ColumnSource>,
    pub mean_gage_height: Option<ColumnSource>,
    pub gage_height_unit_id: Option<ColumnSource>,
    pub channel_name: Option<ColumnSource>,
    pub measurement_id: Option<ColumnSource>,
    pub grade_code: Option<ColumnSource>,
    pub party: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub area: Option<ColumnSource>,
    pub area_unit_id: Option<ColumnSource>,
    pub width: Option<ColumnSource>,
    pub distance_unit_id: Option<ColumnSource>,
    pub velocity_average: Option<ColumnSource>,
    pub velocity_unit_id: Option<ColumnSource>,
}

impl DischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("TotalDischarge", &self.total_discharge);
        walker.column("DischargeUnitId", &self.discharge_unit_id);
        walker.column("MeanGageHeight", &self.mean_gage_height);
        walker.column("GageHeightUnitId", &self.gage_height_unit_id);
        walker.column("ChannelName", &self.channel_name);
        walker.column("MeasurementId", &self.measurement_id);
        walker.column("GradeCode", &self.grade_code);
        walker.column("Party", &self.party);
        walker.column("Comments", &self.comments);
        walker.column("Area", &self.area);
        walker.column("AreaUnitId", &self.area_unit_id);
        walker.column("Width", &self.width);
        walker.column("DistanceUnitId", &self.distance_unit_id);
        walker.column("VelocityAverage", &self.velocity_average);
        walker.column("VelocityUnitId", &self.velocity_unit_id);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AdcpDischargeDefinition {
    #[serde(flatten)]
    pub discharge: DischargeDefinition,
    pub deployment_method: Option<ColumnSource>,
    pub manufacturer: Option<ColumnSource>,
    pub model: Option<ColumnSource>,
    pub serial_number: Option<ColumnSource>,
    pub firmware_version: Option<ColumnSource>,
    pub software_version: Option<ColumnSource>,
    pub number_of_transects: Option<ColumnSource>,
    pub magnetic_variation: Option<ColumnSource>,
}

impl ColumnTree for AdcpDischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.discharge.walk(walker);
        walker.column("DeploymentMethod", &self.deployment_method);
        walker.column("Manufacturer", &self.manufacturer);
        walker.column("Model", &self.model);
        walker.column("SerialNumber", &self.serial_number);
        walker.column("FirmwareVersion", &self.firmware_version);
        walker.column("SoftwareVersion", &self.software_version);
        walker.column("NumberOfTransects", &self.number_of_transects);
        walker.column("MagneticVariation", &self.magnetic_variation);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ManualGaugingDischargeDefinition {
    #[serde(flatten)]
    pub discharge: DischargeDefinition,
    pub discharge_method: Option<ColumnSource>,
    pub start_point: Option<ColumnSource>,
    pub deployment_method: Option<ColumnSource>,
    pub meter_manufacturer: Option<ColumnSource>,
    pub meter_model: Option<ColumnSource>,
    pub meter_serial_number: Option<ColumnSource>,
}

impl ColumnTree for ManualGaugingDischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.discharge.walk(walker);
        walker.column("DischargeMethod", &self.discharge_method);
        walker.column("StartPoint", &self.start_point);
        walker.column("DeploymentMethod", &self.deployment_method);
        walker.column("MeterManufacturer", &self.meter_manufacturer);
        walker.column("MeterModel", &self.meter_model);
        walker.column("MeterSerialNumber", &self.meter_serial_number);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VolumetricDischargeDefinition {
    #[serde(flatten)]
    pub discharge: DischargeDefinition,
    pub container_volume: Option<ColumnSource>,
    pub volume_unit_id: Option<ColumnSource>,
    pub fill_duration_seconds: Option<ColumnSource>,
}

impl ColumnTree for VolumetricDischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.discharge.walk(walker);
        walker.column("ContainerVolume", &self.container_volume);
        walker.column("VolumeUnitId", &self.volume_unit_id);
        walker.column("FillDurationSeconds", &self.fill_duration_seconds);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineeredStructureDischargeDefinition {
    #[serde(flatten)]
    pub discharge: DischargeDefinition,
    pub structure_type: Option<ColumnSource>,
    pub equation: Option<ColumnSource>,
    pub mean_head: Option<ColumnSource>,
    pub head_unit_id: Option<ColumnSource>,
}

impl ColumnTree for EngineeredStructureDischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.discharge.walk(walker);
        walker.column("StructureType", &self.structure_type);
        walker.column("Equation", &self.equation);
        walker.column("MeanHead", &self.mean_head);
        walker.column("HeadUnitId", &self.head_unit_id);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OtherDischargeDefinition {
    #[serde(flatten)]
    pub discharge: DischargeDefinition,
    pub monitoring_method_code: Option<ColumnSource>,
}

impl ColumnTree for OtherDischargeDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.discharge.walk(walker);
        walker.column("MonitoringMethodCode", &self.monitoring_method_code);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LevelSurveyDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub origin_reference_point_name: Option<ColumnSource>,
    pub method: Option<ColumnSource>,
    pub party: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
    pub measurement: Option<LevelSurveyMeasurementDefinition>,
    pub measurements: Vec<LevelSurveyMeasurementDefinition>,
}

impl LevelSurveyDefinition {
    pub fn measurement_definitions(&self) -> Vec<&LevelSurveyMeasurementDefinition> {
        singular_then_list(&self.measurement, &self.measurements)
    }
}

impl ColumnTree for LevelSurveyDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("OriginReferencePointName", &self.origin_reference_point_name);
        walker.column("Method", &self.method);
        walker.column("Party", &self.party);
        walker.column("Comments", &self.comments);
        walker.node("Measurement", &self.measurement);
        walker.nodes("Measurements", &self.measurements);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LevelSurveyMeasurementDefinition {
    #[serde(flatten)]
    pub timing: TimingDefinition,
    pub reference_point_name: Option<ColumnSource>,
    pub measured_elevation: Option<ColumnSource>,
    pub comments: Option<ColumnSource>,
}

impl ColumnTree for LevelSurveyMeasurementDefinition {
    fn walk(&self, walker: &mut ColumnWalker) {
        self.timing.walk(walker);
        walker.column("ReferencePointName", &self.reference_point_name);
        walker.column("MeasuredElevation", &self.measured_elevation);
        walker.column("Comments", &self.comments);
    }
}
