//! Visit merging.
//!
//! Rows that describe the same field visit (same location, overlapping
//! period) are folded into one visit. Nothing reaches the appender until
//! [`VisitMerger::finish`], so later rows can still widen an earlier visit.

use log::debug;

use crate::{
    appender::FieldDataAppender,
    domain::{Activity, FieldVisitDetails, LocationInfo, TimeRange},
    error::{MappingError, Result},
};

/// One row's worth of visit: where, the visit period the row declared
/// (unset when the schema has no visit times), and the activities found.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitCandidate {
    pub location: LocationInfo,
    pub details: FieldVisitDetails,
    pub activities: Vec<Activity>,
}

impl VisitCandidate {
    pub fn new(location: LocationInfo, details: FieldVisitDetails) -> Self {
        Self {
            location,
            details,
            activities: Vec::new(),
        }
    }

    /// The declared period widened to cover every activity.
    pub fn effective_period(&self) -> TimeRange {
        let mut period = self.details.period;
        for range in self.activities.iter().filter_map(Activity::time_range) {
            period.widen(&range);
        }
        period
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.details.is_blank()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub visits: usize,
    pub activities: usize,
}

#[derive(Debug)]
pub struct VisitMerger {
    skip_empty_visits: bool,
    visits: Vec<VisitCandidate>,
}

impl VisitMerger {
    pub fn new(skip_empty_visits: bool) -> Self {
        Self {
            skip_empty_visits,
            visits: Vec::new(),
        }
    }

    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    pub fn visits(&self) -> &[VisitCandidate] {
        &self.visits
    }

    /// Adds a row's candidate. Returns false when an empty candidate was
    /// dropped.
    pub fn add(&mut self, candidate: VisitCandidate) -> bool {
        if self.skip_empty_visits && candidate.is_empty() {
            debug!(
                "Dropping empty visit for location '{}'",
                candidate.location.identifier
            );
            return false;
        }

        let declared = candidate.details.period;
        let existing = self.visits.iter_mut().find(|visit| {
            visit.location.unique_id == candidate.location.unique_id
                && visit.details.period.overlaps(&declared)
        });

        match existing {
            Some(visit) => {
                visit.details.period.widen(&declared);
                merge_details(&mut visit.details, &candidate.details);
                for activity in candidate.activities {
                    if let Some(range) = activity.time_range() {
                        visit.details.period.widen(&range);
                    }
                    if !is_duplicate(&visit.activities, &activity) {
                        visit.activities.push(activity);
                    }
                }
            }
            None => {
                let mut visit = candidate;
                visit.details.period = visit.effective_period();
                self.visits.push(visit);
            }
        }
        true
    }

    /// Hands every visit and its activities to the appender. Nothing is
    /// appended if any visit is still missing its period.
    pub fn finish<A>(self, appender: &mut A) -> Result<FlushSummary>
    where
        A: FieldDataAppender + ?Sized,
    {
        if let Some(visit) = self.visits.iter().find(|visit| visit.details.period.is_unset()) {
            return Err(MappingError::config(format!(
                "Field visit for location '{}' has no start or end time",
                visit.location.identifier
            )));
        }
        let mut summary = FlushSummary::default();
        for visit in self.visits {
            let handle = appender.add_field_visit(&visit.location, visit.details)?;
            summary.visits += 1;
            for activity in visit.activities {
                appender.add_activity(handle, activity)?;
                summary.activities += 1;
            }
        }
        Ok(summary)
    }
}

fn merge_details(target: &mut FieldVisitDetails, incoming: &FieldVisitDetails) {
    fill(&mut target.party, &incoming.party);
    fill(&mut target.weather, &incoming.weather);
    fill(&mut target.collection_agency, &incoming.collection_agency);
    if let Some(more) = &incoming.comments {
        match target.comments.as_mut() {
            Some(existing) => {
                if !existing.contains(more.as_str()) {
                    existing.push('\n');
                    existing.push_str(more);
                }
            }
            None => target.comments = Some(more.clone()),
        }
    }
}

fn fill(target: &mut Option<String>, incoming: &Option<String>) {
    if target.is_none() {
        target.clone_from(incoming);
    }
}

fn is_duplicate(existing: &[Activity], candidate: &Activity) -> bool {
    let Activity::Reading(reading) = candidate else {
        return false;
    };
    existing.iter().any(|activity| match activity {
        Activity::Reading(other) => other.is_duplicate_of(reading),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        appender::CollectingAppender,
        domain::{ControlCleanedType, ControlCondition, Reading, Timestamp},
    };
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn at(hour: u32, minute: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, hour, minute, 0)
            .unwrap()
    }

    fn site(id: u128) -> LocationInfo {
        LocationInfo::new(format!("S{id}"), Uuid::from_u128(id), FixedOffset::east_opt(0).unwrap())
    }

    fn reading_at(hour: u32, minute: u32, value: f64) -> Activity {
        let mut reading = Reading::new("HG", Some(value));
        reading.time = Some(at(hour, minute));
        Activity::Reading(reading)
    }

    fn candidate(location: LocationInfo, period: TimeRange, activities: Vec<Activity>) -> VisitCandidate {
        VisitCandidate {
            location,
            details: FieldVisitDetails::new(period),
            activities,
        }
    }

    #[test]
    fn undeclared_periods_merge_per_location() {
        let mut merger = VisitMerger::new(true);
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 1.23)]));
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 30, 1.30)]));
        merger.add(candidate(site(2), TimeRange::unset(), vec![reading_at(8, 0, 4.0)]));
        assert_eq!(merger.visit_count(), 2);
        let first = &merger.visits()[0];
        assert_eq!(first.details.period, TimeRange::new(at(8, 0), at(8, 30)));
        assert_eq!(first.activities.len(), 2);
    }

    #[test]
    fn disjoint_declared_periods_stay_apart() {
        let mut merger = VisitMerger::new(true);
        merger.add(candidate(site(1), TimeRange::new(at(8, 0), at(9, 0)), vec![]));
        merger.add(candidate(site(1), TimeRange::new(at(9, 0), at(10, 0)), vec![]));
        assert_eq!(merger.visit_count(), 2);
        merger.add(candidate(site(1), TimeRange::new(at(8, 30), at(8, 45)), vec![]));
        assert_eq!(merger.visit_count(), 2);
    }

    #[test]
    fn merged_visits_cover_both_declared_periods() {
        let mut merger = VisitMerger::new(false);
        merger.add(candidate(site(1), TimeRange::new(at(8, 0), at(10, 0)), vec![]));
        merger.add(candidate(site(1), TimeRange::new(at(9, 0), at(11, 0)), vec![]));
        assert_eq!(merger.visit_count(), 1);
        assert_eq!(merger.visits()[0].details.period, TimeRange::new(at(8, 0), at(11, 0)));

        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(10, 30, 1.0)]));
        assert_eq!(merger.visits()[0].details.period, TimeRange::new(at(8, 0), at(11, 0)));
    }

    #[test]
    fn identical_readings_are_not_duplicated() {
        let mut merger = VisitMerger::new(true);
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 1.0)]));
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 1.0)]));
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 2.0)]));
        assert_eq!(merger.visits()[0].activities.len(), 2);
    }

    #[test]
    fn empty_visits_are_dropped_unless_kept() {
        let mut merger = VisitMerger::new(true);
        assert!(!merger.add(candidate(site(1), TimeRange::unset(), vec![])));
        assert_eq!(merger.visit_count(), 0);

        let mut keeping = VisitMerger::new(false);
        assert!(keeping.add(candidate(site(1), TimeRange::unset(), vec![])));
        let err = keeping.finish(&mut CollectingAppender::default()).unwrap_err();
        assert!(err.to_string().contains("no start or end time"));
    }

    #[test]
    fn comments_are_joined_and_gaps_filled() {
        let mut merger = VisitMerger::new(true);
        let mut first = candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 1.0)]);
        first.details.comments = Some("windy".to_string());
        let mut second = candidate(site(1), TimeRange::unset(), vec![reading_at(9, 0, 1.0)]);
        second.details.comments = Some("rain later".to_string());
        second.details.party = Some("JS".to_string());
        merger.add(first);
        merger.add(second);
        let details = &merger.visits()[0].details;
        assert_eq!(details.comments.as_deref(), Some("windy\nrain later"));
        assert_eq!(details.party.as_deref(), Some("JS"));
    }

    #[test]
    fn finish_flushes_every_visit_once() {
        let mut merger = VisitMerger::new(true);
        merger.add(candidate(site(1), TimeRange::unset(), vec![reading_at(8, 0, 1.0)]));
        merger.add(candidate(
            site(1),
            TimeRange::unset(),
            vec![Activity::ControlCondition(ControlCondition {
                condition_type: Some("Clear".to_string()),
                control_cleaned: ControlCleanedType::Unknown,
                control_code: None,
                distance_to_gage: None,
                distance_to_gage_unit_id: None,
                date_cleaned: None,
                comments: None,
                party: None,
            })],
        ));
        let mut appender = CollectingAppender::default();
        let summary = merger.finish(&mut appender).unwrap();
        assert_eq!(summary, FlushSummary { visits: 1, activities: 2 });
        assert_eq!(appender.visits()[0].details.period, TimeRange::instant(at(8, 0)));
    }

    fn range(start: u32, length: u32) -> TimeRange {
        let start_time = at(0, 0) + chrono::Duration::minutes(start as i64);
        TimeRange::new(start_time, start_time + chrono::Duration::minutes(length as i64))
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric_and_strict(a in 0u32..600, al in 0u32..120, b in 0u32..600, bl in 0u32..120) {
            let first = range(a, al);
            let second = range(b, bl);
            prop_assert_eq!(first.overlaps(&second), second.overlaps(&first));
            let (earlier, later) = if (first.start, second.end) <= (second.start, first.end) { (first, second) } else { (second, first) };
            prop_assert_eq!(first.overlaps(&second), earlier.end > later.start);
        }

        #[test]
        fn declared_periods_merge_only_when_overlapping(a in 0u32..600, al in 1u32..120, b in 0u32..600, bl in 1u32..120) {
            let first = range(a, al);
            let second = range(b, bl);
            let mut merger = VisitMerger::new(true);
            merger.add(candidate(site(1), first, vec![]));
            merger.add(candidate(site(1), second, vec![]));
            let expected = if first.overlaps(&second) { 1 } else { 2 };
            prop_assert_eq!(merger.visit_count(), expected);
        }
    }
}
