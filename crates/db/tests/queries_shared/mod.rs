//! Fixtures shared by the db integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sharecycle_core::{MetricInput, NewSession, SegmentSubmission, ValidatedSegment};
use sharecycle_db::{Database, ReferenceData};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
}

pub fn reference_data() -> ReferenceData {
    serde_json::from_value(serde_json::json!({
        "users": [
            { "userId": 3, "name": "Ada" },
            { "userId": 4, "name": "Grace" },
            { "userId": 10, "name": "Buyer Co" }
        ],
        "rewardTypes": [{ "rewardTypeId": 1, "code": "POINTS", "displayName": "Points" }],
        "postings": [
            { "postingId": 7, "buyerUserId": 10, "title": "Sleep study", "rewardTypeId": 1, "rewardValue": 1500 }
        ],
        "metricDefinitions": [
            { "metricId": 1, "displayName": "Steps" },
            { "metricId": 2, "displayName": "Heart rate" }
        ]
    }))
    .unwrap()
}

pub async fn seeded_in_memory() -> Database {
    let db = Database::new_in_memory().await.unwrap();
    db.load_reference_data(&reference_data()).await.unwrap();
    db
}

pub fn new_session(user_id: i64, segments_expected: i64) -> NewSession {
    NewSession {
        posting_id: 7,
        user_id,
        join_time_local: "2025-01-01T09:00:00".into(),
        join_timezone: "Europe/Paris".into(),
        cycle_anchor: t0(),
        segments_expected,
    }
}

pub fn steps(total: f64) -> MetricInput {
    MetricInput {
        metric_id: 1,
        metric_name: Some("Steps".into()),
        unit_code: "count".into(),
        total_value: Some(total),
        avg_value: None,
        min_value: None,
        max_value: None,
        samples_count: Some(24),
        computed_json: None,
    }
}

/// Day `day` of the `t0()` schedule carrying one steps metric.
pub fn day_segment(session_id: i64, day: u32) -> ValidatedSegment {
    let from = t0() + TimeDelta::days(i64::from(day));
    SegmentSubmission {
        session_id,
        day_index: i64::from(day),
        from_utc: from.to_rfc3339(),
        to_utc: (from + TimeDelta::days(1)).to_rfc3339(),
        has_data: true,
        metrics: vec![steps(1000.0 * f64::from(day + 1))],
    }
    .validate()
    .unwrap()
}
