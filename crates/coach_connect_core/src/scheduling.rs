//! crates/coach_connect_core/src/scheduling.rs
//!
//! Coach time slots: creation under the non-overlap invariant, and listing scoped to
//! a calendar day in a caller-supplied time zone.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{NewSlot, Slot, SlotStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{DatabaseService, PortError};

const OVERLAP: &str = "This slot overlaps with an existing slot";

/// Raw slot boundaries as supplied by the caller (RFC 3339).
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub start_time: String,
    pub end_time: String,
}

/// Optional day filter: a `YYYY-MM-DD` date read in an IANA time zone (UTC by default).
#[derive(Debug, Clone, Default)]
pub struct SlotQuery {
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

fn parse_instant(field: &str, value: &str) -> ServiceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ServiceError::bad_request(format!("{field} must be an RFC 3339 timestamp")))
}

fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut local: NaiveDateTime = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    // Midnight can fall in a DST gap; walk forward to the first instant that exists.
    for _ in 0..48 {
        if let Some(dt) = tz.from_local_datetime(&local).earliest() {
            return dt.with_timezone(&Utc);
        }
        local += chrono::Duration::minutes(30);
    }
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// The absolute `[start, end)` bounds of `date` as observed in `tz`.
pub fn day_bounds(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    (local_midnight(tz, date), local_midnight(tz, next))
}

pub fn parse_time_zone(name: Option<&str>) -> ServiceResult<Tz> {
    match name.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ServiceError::bad_request(format!("Unknown time zone '{name}'"))),
    }
}

#[derive(Clone)]
pub struct SlotService {
    db: Arc<dyn DatabaseService>,
}

impl SlotService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create(&self, coach_id: Uuid, request: SlotRequest) -> ServiceResult<Slot> {
        let start_time = parse_instant("startTime", &request.start_time)?;
        let end_time = parse_instant("endTime", &request.end_time)?;
        if start_time >= end_time {
            return Err(ServiceError::bad_request("Start time must be before end time"));
        }

        if self
            .db
            .find_overlapping_slot(coach_id, start_time, end_time)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict(OVERLAP));
        }

        let slot = self
            .db
            .create_slot(NewSlot {
                coach_id,
                start_time,
                end_time,
                status: SlotStatus::Available,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent insert; storage caught the overlap.
                PortError::Conflict(_) => ServiceError::conflict(OVERLAP),
                other => ServiceError::Port(other),
            })?;

        info!(slot_id = %slot.id, %coach_id, "Slot created");
        Ok(slot)
    }

    /// Without a date every slot of the coach is returned; the time zone alone is ignored.
    pub async fn get_all(&self, coach_id: Uuid, query: SlotQuery) -> ServiceResult<Vec<Slot>> {
        let window = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => None,
            Some(date) => {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| ServiceError::bad_request("date must be formatted as YYYY-MM-DD"))?;
                let tz = parse_time_zone(query.time_zone.as_deref())?;
                Some(day_bounds(date, &tz))
            }
        };
        Ok(self.db.list_slots(coach_id, window).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_slot, InMemoryDatabase};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn request(start: &str, end: &str) -> SlotRequest {
        SlotRequest {
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    fn seeded() -> (Arc<InMemoryDatabase>, SlotService, Uuid) {
        let db = Arc::new(InMemoryDatabase::new());
        let coach = Uuid::new_v4();
        db.insert_slot(sample_slot(
            coach,
            utc("2025-03-10T10:00:00Z"),
            utc("2025-03-10T11:00:00Z"),
        ));
        (db.clone(), SlotService::new(db), coach)
    }

    #[tokio::test]
    async fn test_adjacent_slots_are_accepted() {
        let (db, svc, coach) = seeded();
        let after = svc
            .create(coach, request("2025-03-10T11:00:00Z", "2025-03-10T12:00:00Z"))
            .await
            .unwrap();
        assert_eq!(after.status, SlotStatus::Available);
        svc.create(coach, request("2025-03-10T09:00:00Z", "2025-03-10T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(db.slots().len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_slot_is_a_conflict() {
        let (db, svc, coach) = seeded();
        for (start, end) in [
            ("2025-03-10T10:30:00Z", "2025-03-10T10:45:00Z"),
            ("2025-03-10T09:30:00Z", "2025-03-10T10:00:01Z"),
            ("2025-03-10T09:00:00Z", "2025-03-10T12:00:00Z"),
            ("2025-03-10T10:00:00Z", "2025-03-10T11:00:00Z"),
        ] {
            assert!(
                matches!(svc.create(coach, request(start, end)).await, Err(ServiceError::Conflict(_))),
                "{start}..{end} should conflict"
            );
        }
        assert_eq!(db.slots().len(), 1);
    }

    #[tokio::test]
    async fn test_overlap_caught_by_storage_is_the_same_conflict() {
        let (db, svc, coach) = seeded();
        db.hide_overlaps_from_lookup();
        match svc
            .create(coach, request("2025-03-10T10:30:00Z", "2025-03-10T11:30:00Z"))
            .await
        {
            Err(ServiceError::Conflict(message)) => assert_eq!(message, OVERLAP),
            other => panic!("expected Conflict, got {:?}", other),
        }
        assert_eq!(db.slot_writes(), 1);
        assert_eq!(db.slots().len(), 1);
    }

    #[tokio::test]
    async fn test_other_coaches_do_not_conflict() {
        let (_, svc, _) = seeded();
        svc.create(Uuid::new_v4(), request("2025-03-10T10:30:00Z", "2025-03-10T10:45:00Z"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inverted_range_never_reaches_storage() {
        let (db, svc, coach) = seeded();
        for (start, end) in [
            ("2025-03-10T12:00:00Z", "2025-03-10T11:00:00Z"),
            ("2025-03-10T12:00:00Z", "2025-03-10T12:00:00Z"),
        ] {
            assert!(matches!(
                svc.create(coach, request(start, end)).await,
                Err(ServiceError::BadRequest(_))
            ));
        }
        assert!(matches!(
            svc.create(coach, request("yesterday", "2025-03-10T12:00:00Z")).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert_eq!(db.slot_writes(), 0);
    }

    #[tokio::test]
    async fn test_offsets_are_normalized_to_utc() {
        let (_, svc, coach) = seeded();
        // 12:00+02:00 is 10:00Z, inside the existing slot.
        assert!(matches!(
            svc.create(coach, request("2025-03-10T12:00:00+02:00", "2025-03-10T12:30:00+02:00"))
                .await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn test_day_bounds_follow_time_zone() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(
            day_bounds(date, &Tz::UTC),
            (utc("2025-03-10T00:00:00Z"), utc("2025-03-11T00:00:00Z"))
        );
        assert_eq!(
            day_bounds(date, &chrono_tz::Asia::Tokyo),
            (utc("2025-03-09T15:00:00Z"), utc("2025-03-10T15:00:00Z"))
        );
    }

    #[test]
    fn test_day_bounds_span_dst_change() {
        // New York springs forward on 2025-03-09: that day is 23 hours long.
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let (start, end) = day_bounds(date, &chrono_tz::America::New_York);
        assert_eq!(start, utc("2025-03-09T05:00:00Z"));
        assert_eq!(end, utc("2025-03-10T04:00:00Z"));
    }

    #[test]
    fn test_midnight_in_dst_gap_resolves_forward() {
        // Santiago moved clocks from 00:00 to 01:00 on 2024-09-08.
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let (start, _) = day_bounds(date, &chrono_tz::America::Santiago);
        assert_eq!(start, utc("2024-09-08T04:00:00Z"));
    }

    #[tokio::test]
    async fn test_get_all_filters_by_local_day() {
        let db = Arc::new(InMemoryDatabase::new());
        let coach = Uuid::new_v4();
        // 23:30Z on the 9th is 08:30 on the 10th in Tokyo.
        db.insert_slot(sample_slot(coach, utc("2025-03-09T23:30:00Z"), utc("2025-03-10T00:30:00Z")));
        db.insert_slot(sample_slot(coach, utc("2025-03-10T16:00:00Z"), utc("2025-03-10T17:00:00Z")));
        db.insert_slot(sample_slot(coach, utc("2025-03-10T08:00:00Z"), utc("2025-03-10T09:00:00Z")));
        db.insert_slot(sample_slot(Uuid::new_v4(), utc("2025-03-10T09:00:00Z"), utc("2025-03-10T10:00:00Z")));
        let svc = SlotService::new(db);

        let in_utc = svc
            .get_all(
                coach,
                SlotQuery {
                    date: Some("2025-03-10".to_string()),
                    time_zone: None,
                },
            )
            .await
            .unwrap();
        let starts: Vec<_> = in_utc.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![utc("2025-03-10T08:00:00Z"), utc("2025-03-10T16:00:00Z")]);

        let in_tokyo = svc
            .get_all(
                coach,
                SlotQuery {
                    date: Some("2025-03-10".to_string()),
                    time_zone: Some("Asia/Tokyo".to_string()),
                },
            )
            .await
            .unwrap();
        let starts: Vec<_> = in_tokyo.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![utc("2025-03-09T23:30:00Z"), utc("2025-03-10T08:00:00Z")]);

        let everything = svc.get_all(coach, SlotQuery::default()).await.unwrap();
        assert_eq!(everything.len(), 3);
        assert!(everything.windows(2).all(|w| w[0].start_time <= w[1].start_time));
    }

    #[tokio::test]
    async fn test_get_all_rejects_bad_filters() {
        let (_, svc, coach) = seeded();
        assert!(matches!(
            svc.get_all(
                coach,
                SlotQuery {
                    date: Some("10/03/2025".to_string()),
                    time_zone: None
                }
            )
            .await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            svc.get_all(
                coach,
                SlotQuery {
                    date: Some("2025-03-10".to_string()),
                    time_zone: Some("Mars/Olympus".to_string())
                }
            )
            .await,
            Err(ServiceError::BadRequest(_))
        ));
    }
}
