mod common;

use chrono::DateTime;
use common::{fixture_bytes, fixture_schema, parse_with};
use tabular_field_visits::{
    MappingError, ParseResult, Schema,
    domain::{Activity, Reading, Timestamp},
};

fn at(text: &str) -> Timestamp {
    DateTime::parse_from_rfc3339(text).expect("timestamp")
}

fn readings(activities: &[Activity]) -> Vec<&Reading> {
    activities
        .iter()
        .filter_map(|activity| match activity {
            Activity::Reading(reading) => Some(reading),
            _ => None,
        })
        .collect()
}

#[test]
fn date_and_time_columns_merge_into_one_visit() {
    let (result, appender) = parse_with(
        vec![fixture_schema("stage_readings.yaml")],
        &fixture_bytes("stage_readings.csv"),
    );
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.schema, "StageLogger");
    assert_eq!(summary.visits, 1);
    assert_eq!(summary.activities, 2);

    let visits = appender.visits();
    assert_eq!(visits.len(), 1);
    let visit = &visits[0];
    assert_eq!(visit.location, "A");
    assert_eq!(visit.details.period.start, at("2020-01-01T08:00:00+00:00"));
    assert_eq!(visit.details.period.end, at("2020-01-01T08:30:00+00:00"));

    let readings = readings(&visit.activities);
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].parameter_id, "HG");
    assert_eq!(readings[0].unit_id.as_deref(), Some("m"));
    assert_eq!(readings[0].value, Some(1.23));
    assert_eq!(readings[1].time, Some(at("2020-01-01T08:30:00+00:00")));
}

#[test]
fn non_numeric_first_row_makes_the_file_invalid() {
    let input = "Site,Date,Time,Stage\nA,2020-01-01,08:00,dry\nA,2020-01-01,08:30,1.30\n";
    let (result, appender) = parse_with(vec![fixture_schema("stage_readings.yaml")], input.as_bytes());
    match result {
        ParseResult::ParsedButInvalid(MappingError::Row { line, message }) => {
            assert_eq!(line, 2);
            assert!(message.contains("'dry' is not a valid number"), "{message}");
        }
        other => panic!("expected a row error, got {other:?}"),
    }
    assert!(appender.visits().is_empty());
}

#[test]
fn bad_rows_after_a_good_one_are_skipped() {
    let input = "Site,Date,Time,Stage\nA,2020-01-01,08:00,1.23\nA,2020-01-01,08:15,dry\nA,2020-01-01,08:30,1.30\n";
    let (result, appender) = parse_with(vec![fixture_schema("stage_readings.yaml")], input.as_bytes());
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(readings(&appender.visits()[0].activities).len(), 2);
}

#[test]
fn preface_values_feed_location_and_party() {
    let (result, appender) = parse_with(
        vec![fixture_schema("logger_preface.yaml")],
        &fixture_bytes("logger_preface.csv"),
    );
    assert!(result.is_success(), "{result:?}");

    let visits = appender.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].location, "B-17");
    assert_eq!(visits[0].details.party.as_deref(), Some("J. Ngata"));
    assert_eq!(visits[0].details.period.start, at("2021-06-01T10:00:00+00:00"));
    assert_eq!(visits[0].details.period.end, at("2021-06-01T10:30:00+00:00"));

    let readings = readings(&visits[0].activities);
    assert_eq!(readings.len(), 3);
    assert_eq!(readings[1].value, None);
    assert_eq!(readings[1].comments.as_deref(), Some("ND <0.5"));
}

#[test]
fn schemas_are_tried_until_one_fits() {
    let schemas = vec![
        fixture_schema("logger_preface.yaml"),
        fixture_schema("stage_readings.yaml"),
    ];
    let (result, _) = parse_with(schemas.clone(), &fixture_bytes("logger_preface.csv"));
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.schema, "LoggerPreface");

    let (result, _) = parse_with(schemas, &fixture_bytes("stage_readings.csv"));
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.schema, "StageLogger");
}

#[test]
fn unrelated_files_cannot_be_parsed() {
    let (result, appender) = parse_with(
        vec![fixture_schema("stage_readings.yaml")],
        b"Station;Flow\nX;3\n",
    );
    assert!(matches!(result, ParseResult::CannotParse));
    assert!(appender.visits().is_empty());
}

#[test]
fn locale_comments_footer_and_aliases_apply() {
    let (result, appender) = parse_with(
        vec![fixture_schema("site_visits.yaml")],
        &fixture_bytes("site_visits.csv"),
    );
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 3);

    let visits = appender.visits();
    assert_eq!(visits.len(), 2, "overlapping visits merge, the next day does not");

    let first = &visits[0];
    assert_eq!(first.location, "S1");
    assert_eq!(first.details.party.as_deref(), Some("RB"));
    assert_eq!(first.details.period.start, at("2022-02-03T09:00:00+00:00"));
    assert_eq!(first.details.period.end, at("2022-02-03T11:00:00+00:00"));
    let values = readings(&first.activities)
        .iter()
        .map(|reading| (reading.parameter_id.as_str(), reading.value))
        .collect::<Vec<_>>();
    assert_eq!(
        values,
        [("HG", Some(1.25)), ("TW", Some(8.5)), ("HG", Some(1.27))]
    );
    let condition = first
        .activities
        .iter()
        .find_map(|activity| match activity {
            Activity::ControlCondition(condition) => Some(condition),
            _ => None,
        })
        .expect("control condition");
    assert_eq!(condition.condition_type.as_deref(), Some("VegetationLight"));
    assert_eq!(condition.comments.as_deref(), Some("cleared at 09:20"));

    let second = &visits[1];
    assert_eq!(second.details.party.as_deref(), Some("KT"));
    assert_eq!(second.activities.len(), 3);
}

#[test]
fn multi_row_headers_merge_after_ignored_rows() {
    let (result, appender) = parse_with(
        vec![fixture_schema("multi_row_header.yaml")],
        &fixture_bytes("multi_row_header.csv"),
    );
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 2, "blank rows are skipped and the limit stops the third row");

    let visits = appender.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].location, "S9");
    assert_eq!(visits[0].details.period.start, at("2023-04-05T07:00:00+00:00"));
    assert_eq!(visits[0].details.period.end, at("2023-04-05T07:15:00+00:00"));
    let values = readings(&visits[0].activities)
        .iter()
        .map(|reading| (reading.parameter_id.as_str(), reading.value))
        .collect::<Vec<_>>();
    assert_eq!(
        values,
        [("HG", Some(1.10)), ("TW", Some(7.5)), ("HG", Some(1.20)), ("TW", Some(7.6))]
    );
}

#[test]
fn ignored_trailing_header_rows_are_not_data() {
    let schema = Schema::from_yaml_str(
        "Id: Units\nHeaderRowCount: 2\nIgnoredTrailingHeaderRows: 1\nLocation: { ColumnHeader: Site }\nReading:\n  ParameterId: HG\n  Value: { ColumnHeader: Stage }\n  Time: { ColumnHeader: When, Type: DateTimeOnly, Format: \"%Y-%m-%d %H:%M\" }\n",
    )
    .expect("schema loads");
    let input = "Site,When,Stage\n-,-,m\nA,2020-01-01 08:00,1.5\n";
    let (result, appender) = parse_with(vec![schema], input.as_bytes());
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 1);
    let readings = readings(&appender.visits()[0].activities);
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].value, Some(1.5));
}

#[test]
fn data_row_limit_stops_reading() {
    let schema = Schema::from_yaml_str(
        "Id: FirstRow\nDataRowCount: 1\nLocation: { ColumnHeader: Site }\nReading:\n  ParameterId: HG\n  Value: { ColumnHeader: Stage }\n  Time: { ColumnHeader: When, Type: DateTimeOnly, Format: \"%Y-%m-%d %H:%M\" }\n",
    )
    .expect("schema loads");
    let input = "Site,When,Stage\n\nA,2020-01-01 08:00,1.5\nA,2020-01-01 09:00,not a number\n";
    let (result, appender) = parse_with(vec![schema], input.as_bytes());
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.skipped_rows, 0);
    assert_eq!(readings(&appender.visits()[0].activities).len(), 1);
}

#[test]
fn preface_only_files_get_one_pass() {
    let (result, appender) = parse_with(
        vec![fixture_schema("preface_only.yaml")],
        &fixture_bytes("preface_only.txt"),
    );
    let ParseResult::ParsedAndValid(summary) = result else {
        panic!("expected a successful parse, got {result:?}");
    };
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.visits, 1);

    let visits = appender.visits();
    assert_eq!(visits[0].location, "P-04");
    assert_eq!(visits[0].details.party.as_deref(), Some("A. Moana"));
    let calibration = visits[0]
        .activities
        .iter()
        .find_map(|activity| match activity {
            Activity::Calibration(calibration) => Some(calibration),
            _ => None,
        })
        .expect("calibration");
    assert_eq!(calibration.parameter_id, "PH");
    assert_eq!(calibration.value, 7.02);
    assert_eq!(calibration.time, Some(at("2022-11-30T14:45:00+00:00")));
}
