//! Normalized field-observation model produced by the mapping engine.
//!
//! These are plain data types: the engine builds them, the visit merger
//! groups them, and a [`FieldDataAppender`](crate::appender::FieldDataAppender)
//! receives them once parsing has finished.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Timestamp = DateTime<FixedOffset>;

/// A closed time interval. [`TimeRange::unset`] is the wide-open sentinel
/// used before any time has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn instant(at: Timestamp) -> Self {
        Self { start: at, end: at }
    }

    pub fn unset() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC.fixed_offset(),
            end: DateTime::<Utc>::MAX_UTC.fixed_offset(),
        }
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::unset()
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }

    /// Two ranges overlap when the earlier one ends strictly after the later
    /// one starts. Touching ranges do not overlap. Ranges starting together
    /// are ordered longest first.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        let (earlier, later) = if (self.start, other.end) <= (other.start, self.end) {
            (self, other)
        } else {
            (other, self)
        };
        earlier.end > later.start
    }

    /// Grows the range so it also covers `other`. An unset range simply
    /// becomes `other`.
    pub fn widen(&mut self, other: &TimeRange) {
        if other.is_unset() {
            return;
        }
        if self.is_unset() {
            *self = *other;
            return;
        }
        if other.start < self.start {
            self.start = other.start;
        }
        if other.end > self.end {
            self.end = other.end;
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "(unset)")
        } else {
            write!(f, "{} - {}", self.start.to_rfc3339(), self.end.to_rfc3339())
        }
    }
}

/// Midnight on 1900-01-01 at the given offset; the seed for merged timestamps.
pub fn timestamp_seed(offset: FixedOffset) -> Timestamp {
    let naive = NaiveDate::from_ymd_opt(1900, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    offset
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| naive.and_utc().fixed_offset())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub identifier: String,
    pub unique_id: Uuid,
    pub name: String,
    #[serde(with = "offset_text")]
    pub utc_offset: FixedOffset,
}

impl LocationInfo {
    pub fn new(identifier: impl Into<String>, unique_id: Uuid, utc_offset: FixedOffset) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            unique_id,
            utc_offset,
        }
    }
}

mod offset_text {
    use chrono::FixedOffset;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(offset: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&offset.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedOffset, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::data::parse_utc_offset(&text).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVisitDetails {
    pub period: TimeRange,
    pub party: Option<String>,
    pub comments: Option<String>,
    pub weather: Option<String>,
    pub collection_agency: Option<String>,
}

impl FieldVisitDetails {
    pub fn new(period: TimeRange) -> Self {
        Self {
            period,
            party: None,
            comments: None,
            weather: None,
            collection_agency: None,
        }
    }

    /// True when nothing beyond the unset period has been filled in.
    pub fn is_blank(&self) -> bool {
        self.period.is_unset()
            && self.party.is_none()
            && self.comments.is_none()
            && self.weather.is_none()
            && self.collection_agency.is_none()
    }
}

/// Declares a text-backed enumeration that parses case-insensitively and
/// ignores spaces, hyphens and underscores.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn variants() -> &'static [&'static str] {
                &[$(stringify!($variant)),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($name::$variant => stringify!($variant)),+
                };
                write!(f, "{name}")
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = normalize_enum_token(value);
                $(
                    if normalized == stringify!($variant).to_ascii_lowercase() {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!(
                    "'{}' is not a valid {}. Expected one of: {}",
                    value,
                    stringify!($name),
                    $name::variants().join(", ")
                ))
            }
        }
    };
}

fn normalize_enum_token(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .to_ascii_lowercase()
}

text_enum!(ReadingType {
    Unknown,
    Routine,
    ReferencePrimary,
    Reference,
    SafetyPrimary,
    Extreme,
    ExtremeMin,
    ExtremeMax,
});

text_enum!(InspectionType {
    Unknown,
    StageGageInspection,
    MaximumStageIndicator,
    CrestStageGage,
    RecordingGage,
    BubbleGage,
    StillingWell,
    Intake,
    SensorInspection,
    Other,
});

text_enum!(CalibrationType {
    Unknown,
    Calibration,
    CalibrationCheck,
    Cleaning,
});

text_enum!(ControlCleanedType {
    Unknown,
    NotCleaned,
    CleanedBeforeReadings,
    CleanedAfterReadings,
    BeforeAndAfterReadings,
});

text_enum!(AdcpDeploymentMethod {
    Unknown,
    Bridge,
    Boat,
    Cableway,
    IceCover,
    RemoteControlBoat,
    Tethered,
    Other,
});

text_enum!(DischargeMethod {
    Unknown,
    MidSection,
    MeanSection,
    Other,
});

text_enum!(StartPoint {
    Unknown,
    LeftEdgeOfWater,
    RightEdgeOfWater,
});

text_enum!(Certainty {
    Unknown,
    Estimated,
    Observed,
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub time: Option<Timestamp>,
    pub parameter_id: String,
    pub unit_id: Option<String>,
    pub value: Option<f64>,
    pub reading_type: ReadingType,
    pub comments: Option<String>,
    pub method: Option<String>,
    pub sub_location: Option<String>,
    pub sensor_unique_id: Option<Uuid>,
    pub grade_code: Option<String>,
    pub qualifiers: Vec<String>,
    pub uncertainty: Option<f64>,
    pub reference_point_name: Option<String>,
    pub use_location_datum_as_reference: bool,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub is_valid: Option<bool>,
}

impl Reading {
    pub fn new(parameter_id: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            time: None,
            parameter_id: parameter_id.into(),
            unit_id: None,
            value,
            reading_type: ReadingType::Unknown,
            comments: None,
            method: None,
            sub_location: None,
            sensor_unique_id: None,
            grade_code: None,
            qualifiers: Vec::new(),
            uncertainty: None,
            reference_point_name: None,
            use_location_datum_as_reference: false,
            manufacturer: None,
            model: None,
            serial_number: None,
            is_valid: None,
        }
    }

    /// Readings that agree on time, parameter, unit, value and type describe
    /// the same observation.
    pub fn is_duplicate_of(&self, other: &Reading) -> bool {
        self.time == other.time
            && self.parameter_id == other.parameter_id
            && self.unit_id == other.unit_id
            && self.value == other.value
            && self.reading_type == other.reading_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub time: Option<Timestamp>,
    pub inspection_type: InspectionType,
    pub comments: Option<String>,
    pub sub_location: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub time: Option<Timestamp>,
    pub parameter_id: String,
    pub unit_id: Option<String>,
    pub value: f64,
    pub calibration_type: CalibrationType,
    pub method: Option<String>,
    pub standard_identifier: Option<String>,
    pub comments: Option<String>,
    pub party: Option<String>,
    pub sub_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCondition {
    pub condition_type: Option<String>,
    pub control_cleaned: ControlCleanedType,
    pub control_code: Option<String>,
    pub distance_to_gage: Option<f64>,
    pub distance_to_gage_unit_id: Option<String>,
    pub date_cleaned: Option<Timestamp>,
    pub comments: Option<String>,
    pub party: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GageAtZeroFlow {
    pub time: Option<Timestamp>,
    pub zero_flow_height: f64,
    pub unit_id: Option<String>,
    pub water_depth: Option<f64>,
    pub certainty: Certainty,
    pub comments: Option<String>,
    pub party: Option<String>,
}

/// A measured quantity with an optional unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit_id: Option<String>,
}

impl Measurement {
    pub fn new(value: f64, unit_id: Option<String>) -> Self {
        Self { value, unit_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeActivity {
    pub period: TimeRange,
    pub discharge: Measurement,
    pub mean_gage_height: Option<Measurement>,
    pub channel_name: Option<String>,
    pub measurement_id: Option<String>,
    pub grade_code: Option<String>,
    pub party: Option<String>,
    pub comments: Option<String>,
    pub area: Option<Measurement>,
    pub width: Option<Measurement>,
    pub velocity_average: Option<Measurement>,
    pub channel_measurement: ChannelMeasurement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ChannelMeasurement {
    Adcp(AdcpMeasurement),
    ManualGauging(ManualGaugingMeasurement),
    Volumetric(VolumetricMeasurement),
    EngineeredStructure(EngineeredStructureMeasurement),
    Other(OtherMeasurement),
}

impl ChannelMeasurement {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelMeasurement::Adcp(_) => "ADCP",
            ChannelMeasurement::ManualGauging(_) => "ManualGauging",
            ChannelMeasurement::Volumetric(_) => "Volumetric",
            ChannelMeasurement::EngineeredStructure(_) => "EngineeredStructure",
            ChannelMeasurement::Other(_) => "Other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdcpMeasurement {
    pub deployment_method: Option<AdcpDeploymentMethod>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub software_version: Option<String>,
    pub number_of_transects: Option<u32>,
    pub magnetic_variation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualGaugingMeasurement {
    pub discharge_method: Option<DischargeMethod>,
    pub start_point: Option<StartPoint>,
    pub deployment_method: Option<String>,
    pub meter_manufacturer: Option<String>,
    pub meter_model: Option<String>,
    pub meter_serial_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumetricMeasurement {
    pub container_volume: Option<Measurement>,
    pub fill_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineeredStructureMeasurement {
    pub structure_type: Option<String>,
    pub equation: Option<String>,
    pub mean_head: Option<Measurement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherMeasurement {
    pub monitoring_method_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSurvey {
    pub time: Option<Timestamp>,
    pub origin_reference_point_name: String,
    pub method: Option<String>,
    pub party: Option<String>,
    pub comments: Option<String>,
    pub measurements: Vec<LevelSurveyMeasurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSurveyMeasurement {
    pub time: Option<Timestamp>,
    pub reference_point_name: String,
    pub measured_elevation: f64,
    pub comments: Option<String>,
}

/// Every activity the engine can attach to a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Activity {
    Reading(Reading),
    Inspection(Inspection),
    Calibration(Calibration),
    ControlCondition(ControlCondition),
    GageAtZeroFlow(GageAtZeroFlow),
    Discharge(DischargeActivity),
    LevelSurvey(LevelSurvey),
}

impl Activity {
    /// The time span the activity occupies, used to widen its visit.
    pub fn time_range(&self) -> Option<TimeRange> {
        match self {
            Activity::Reading(reading) => reading.time.map(TimeRange::instant),
            Activity::Inspection(inspection) => inspection.time.map(TimeRange::instant),
            Activity::Calibration(calibration) => calibration.time.map(TimeRange::instant),
            Activity::ControlCondition(_) => None,
            Activity::GageAtZeroFlow(gage) => gage.time.map(TimeRange::instant),
            Activity::Discharge(discharge) => Some(discharge.period),
            Activity::LevelSurvey(survey) => {
                let mut range = TimeRange::unset();
                if let Some(time) = survey.time {
                    range.widen(&TimeRange::instant(time));
                }
                for measurement in &survey.measurements {
                    if let Some(time) = measurement.time {
                        range.widen(&TimeRange::instant(time));
                    }
                }
                (!range.is_unset()).then_some(range)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Activity::Reading(_) => "Reading",
            Activity::Inspection(_) => "Inspection",
            Activity::Calibration(_) => "Calibration",
            Activity::ControlCondition(_) => "ControlCondition",
            Activity::GageAtZeroFlow(_) => "GageAtZeroFlow",
            Activity::Discharge(_) => "Discharge",
            Activity::LevelSurvey(_) => "LevelSurvey",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let morning = TimeRange::new(at(8, 0), at(9, 0));
        let later = TimeRange::new(at(9, 0), at(10, 0));
        assert!(!morning.overlaps(&later));
        assert!(!later.overlaps(&morning));
    }

    #[test]
    fn nested_and_partial_ranges_overlap() {
        let outer = TimeRange::new(at(8, 0), at(12, 0));
        let inner = TimeRange::new(at(9, 0), at(10, 0));
        let partial = TimeRange::new(at(11, 0), at(13, 0));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(outer.overlaps(&partial));
    }

    #[test]
    fn widening_an_unset_range_adopts_the_other() {
        let mut range = TimeRange::unset();
        range.widen(&TimeRange::instant(at(8, 0)));
        assert_eq!(range, TimeRange::instant(at(8, 0)));
        range.widen(&TimeRange::instant(at(8, 30)));
        assert_eq!(range, TimeRange::new(at(8, 0), at(8, 30)));
        range.widen(&TimeRange::new(at(8, 10), at(8, 20)));
        assert_eq!(range, TimeRange::new(at(8, 0), at(8, 30)));
    }

    #[test]
    fn enums_parse_loosely() {
        assert_eq!("reference primary".parse::<ReadingType>(), Ok(ReadingType::ReferencePrimary));
        assert_eq!("LEFT_EDGE_OF_WATER".parse::<StartPoint>(), Ok(StartPoint::LeftEdgeOfWater));
        let err = "sideways".parse::<StartPoint>().unwrap_err();
        assert!(err.contains("LeftEdgeOfWater"));
    }

    #[test]
    fn seed_is_midnight_on_the_first_day_of_1900() {
        let offset = FixedOffset::east_opt(10 * 3600).unwrap();
        let seed = timestamp_seed(offset);
        assert_eq!(seed.to_rfc3339(), "1900-01-01T00:00:00+10:00");
    }
}
