//! The host-facing sink for parsed visits.
//!
//! [`FieldDataAppender`] is what a host implements to receive results and to
//! resolve locations. [`CollectingAppender`] keeps everything in memory; the
//! command-line front end and the tests use it.

use chrono::FixedOffset;
use log::debug;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    data::utc,
    domain::{
        Activity, Calibration, ControlCondition, DischargeActivity, FieldVisitDetails,
        GageAtZeroFlow, Inspection, LevelSurvey, LocationInfo, Reading,
    },
    error::{MappingError, Result},
};

/// Opaque reference to a visit created by [`FieldDataAppender::add_field_visit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitHandle(pub usize);

pub trait FieldDataAppender {
    fn location_by_identifier(&mut self, identifier: &str) -> Result<Option<LocationInfo>>;

    fn location_by_unique_id(&mut self, unique_id: Uuid) -> Result<Option<LocationInfo>>;

    fn add_field_visit(
        &mut self,
        location: &LocationInfo,
        details: FieldVisitDetails,
    ) -> Result<VisitHandle>;

    fn add_reading(&mut self, visit: VisitHandle, reading: Reading) -> Result<()>;

    fn add_inspection(&mut self, visit: VisitHandle, inspection: Inspection) -> Result<()>;

    fn add_calibration(&mut self, visit: VisitHandle, calibration: Calibration) -> Result<()>;

    fn add_control_condition(
        &mut self,
        visit: VisitHandle,
        condition: ControlCondition,
    ) -> Result<()>;

    fn add_gage_at_zero_flow(&mut self, visit: VisitHandle, gage: GageAtZeroFlow) -> Result<()>;

    fn add_discharge_activity(
        &mut self,
        visit: VisitHandle,
        discharge: DischargeActivity,
    ) -> Result<()>;

    fn add_level_survey(&mut self, visit: VisitHandle, survey: LevelSurvey) -> Result<()>;

    /// Routes an activity to the matching `add_*` call.
    fn add_activity(&mut self, visit: VisitHandle, activity: Activity) -> Result<()> {
        match activity {
            Activity::Reading(reading) => self.add_reading(visit, reading),
            Activity::Inspection(inspection) => self.add_inspection(visit, inspection),
            Activity::Calibration(calibration) => self.add_calibration(visit, calibration),
            Activity::ControlCondition(condition) => self.add_control_condition(visit, condition),
            Activity::GageAtZeroFlow(gage) => self.add_gage_at_zero_flow(visit, gage),
            Activity::Discharge(discharge) => self.add_discharge_activity(visit, discharge),
            Activity::LevelSurvey(survey) => self.add_level_survey(visit, survey),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedVisit {
    pub location: String,
    #[serde(flatten)]
    pub details: FieldVisitDetails,
    pub activities: Vec<Activity>,
}

/// In-memory appender. Unknown location identifiers are registered on first
/// use with the default UTC offset.
#[derive(Debug, Clone, Serialize)]
pub struct CollectingAppender {
    #[serde(skip)]
    default_utc_offset: FixedOffset,
    #[serde(skip)]
    next_location: u128,
    pub locations: Vec<LocationInfo>,
    pub visits: Vec<CollectedVisit>,
}

impl Default for CollectingAppender {
    fn default() -> Self {
        Self::new(utc())
    }
}

impl CollectingAppender {
    pub fn new(default_utc_offset: FixedOffset) -> Self {
        Self {
            default_utc_offset,
            next_location: 1,
            locations: Vec::new(),
            visits: Vec::new(),
        }
    }

    pub fn register_location(&mut self, location: LocationInfo) {
        self.locations.push(location);
    }

    pub fn visits(&self) -> &[CollectedVisit] {
        &self.visits
    }

    pub fn into_visits(self) -> Vec<CollectedVisit> {
        self.visits
    }

    fn visit_mut(&mut self, visit: VisitHandle) -> Result<&mut CollectedVisit> {
        self.visits
            .get_mut(visit.0)
            .ok_or_else(|| MappingError::Location(format!("Unknown visit handle {}", visit.0)))
    }

    fn push(&mut self, visit: VisitHandle, activity: Activity) -> Result<()> {
        self.visit_mut(visit)?.activities.push(activity);
        Ok(())
    }
}

impl FieldDataAppender for CollectingAppender {
    fn location_by_identifier(&mut self, identifier: &str) -> Result<Option<LocationInfo>> {
        if let Some(found) = self
            .locations
            .iter()
            .find(|location| location.identifier.eq_ignore_ascii_case(identifier))
        {
            return Ok(Some(found.clone()));
        }
        let location = LocationInfo::new(
            identifier,
            Uuid::from_u128(self.next_location),
            self.default_utc_offset,
        );
        self.next_location += 1;
        debug!("Registered location '{identifier}' ({})", location.unique_id);
        self.locations.push(location.clone());
        Ok(Some(location))
    }

    fn location_by_unique_id(&mut self, unique_id: Uuid) -> Result<Option<LocationInfo>> {
        Ok(self
            .locations
            .iter()
            .find(|location| location.unique_id == unique_id)
            .cloned())
    }

    fn add_field_visit(
        &mut self,
        location: &LocationInfo,
        details: FieldVisitDetails,
    ) -> Result<VisitHandle> {
        self.visits.push(CollectedVisit {
            location: location.identifier.clone(),
            details,
            activities: Vec::new(),
        });
        Ok(VisitHandle(self.visits.len() - 1))
    }

    fn add_reading(&mut self, visit: VisitHandle, reading: Reading) -> Result<()> {
        self.push(visit, Activity::Reading(reading))
    }

    fn add_inspection(&mut self, visit: VisitHandle, inspection: Inspection) -> Result<()> {
        self.push(visit, Activity::Inspection(inspection))
    }

    fn add_calibration(&mut self, visit: VisitHandle, calibration: Calibration) -> Result<()> {
        self.push(visit, Activity::Calibration(calibration))
    }

    fn add_control_condition(
        &mut self,
        visit: VisitHandle,
        condition: ControlCondition,
    ) -> Result<()> {
        self.push(visit, Activity::ControlCondition(condition))
    }

    fn add_gage_at_zero_flow(&mut self, visit: VisitHandle, gage: GageAtZeroFlow) -> Result<()> {
        self.push(visit, Activity::GageAtZeroFlow(gage))
    }

    fn add_discharge_activity(
        &mut self,
        visit: VisitHandle,
        discharge: DischargeActivity,
    ) -> Result<()> {
        self.push(visit, Activity::Discharge(discharge))
    }

    fn add_level_survey(&mut self, visit: VisitHandle, survey: LevelSurvey) -> Result<()> {
        self.push(visit, Activity::LevelSurvey(survey))
    }
}
