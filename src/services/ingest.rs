//! The ingestion pipeline.
//!
//! One reading flows through one pass: validate, resolve its unit, evaluate
//! against the unit's ranges, persist any alarms, flag the plant, then run
//! correlation and the close sweep before the reading itself is stored.
//! Every decision in a pass shares a single `now`.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::readings::Reading;
use crate::store::{AlarmRecord, Store, TicketRecord};

use super::{correlation, evaluator, lifecycle};

/// What one ingestion pass produced.
#[derive(Debug)]
pub struct IngestOutcome {
    pub reading_id: i64,
    pub alarms: Vec<AlarmRecord>,
    pub opened: Vec<TicketRecord>,
    pub closed: Vec<TicketRecord>,
}

pub struct Monitor {
    store: Store,
    window: Duration,
}

impl Monitor {
    pub fn new(store: Store, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Ingests one reading at the current wall clock.
    pub fn ingest(&self, reading: &Reading) -> Result<IngestOutcome> {
        self.ingest_at(reading, Utc::now())
    }

    /// Ingests one reading at an explicit pass instant.
    pub fn ingest_at(&self, reading: &Reading, now: DateTime<Utc>) -> Result<IngestOutcome> {
        reading.validate()?;
        let unit = self.store.unit_context(reading.unit_id)?;
        let ranges = unit.ranges_for(reading);

        let candidates = evaluator::evaluate(reading, &ranges);
        let mut alarms = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            alarms.push(self.store.insert_alarm(candidate)?);
        }
        if !alarms.is_empty() {
            self.store.mark_plant_error(unit.plant_id)?;
            info!(
                unit = unit.id,
                plant = unit.plant_id,
                alarms = alarms.len(),
                "reading raised alarms"
            );
        }

        let opened = correlation::correlate(&self.store, now, self.window)?;
        let closed = lifecycle::sweep(&self.store, now, self.window)?;

        let reading_id = self.store.insert_reading(reading)?;
        debug!(
            reading = reading_id,
            unit = unit.id,
            kind = unit.profile.kind(),
            "reading stored"
        );

        Ok(IngestOutcome {
            reading_id,
            alarms,
            opened,
            closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ModuleRangeIds, RetryPolicy};
    use crate::taxonomy::{AlarmCode, Metric, PlantStatus, TicketStatus};
    use chrono::TimeZone;

    struct Bench {
        monitor: Monitor,
        plant_id: i64,
        unit_id: i64,
    }

    /// Module unit: AC 210-240 V / 1-16 A / 49.5-50.5 Hz, DC 300-420 V /
    /// 2-12 A. The pass instant in these tests is noon.
    fn bench() -> Bench {
        let store = Store::in_memory(RetryPolicy::default()).unwrap();
        let plant = store.create_plant("Plant One", "ACME Solar").unwrap();
        let ranges = ModuleRangeIds {
            ac_voltage: store.create_range(Metric::Voltage, 210.0, 240.0).unwrap(),
            ac_current: store.create_range(Metric::Current, 1.0, 16.0).unwrap(),
            ac_frequency: store.create_range(Metric::Frequency, 49.5, 50.5).unwrap(),
            dc_voltage: store.create_range(Metric::Voltage, 300.0, 420.0).unwrap(),
            dc_current: store.create_range(Metric::Current, 2.0, 12.0).unwrap(),
        };
        let unit_id = store
            .create_module_unit(plant.id, "inverter-1", ranges)
            .unwrap();
        Bench {
            monitor: Monitor::new(store, Duration::hours(1)),
            plant_id: plant.id,
            unit_id,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn minutes_before(minutes: i64) -> DateTime<Utc> {
        noon() - Duration::minutes(minutes)
    }

    fn ok_reading(unit_id: i64, minutes_ago: i64) -> Reading {
        Reading::new(unit_id, 230.0, 8.0, 50.0, minutes_before(minutes_ago))
    }

    fn low_voltage_reading(unit_id: i64, minutes_ago: i64) -> Reading {
        Reading::new(unit_id, 190.0, 8.0, 50.0, minutes_before(minutes_ago))
    }

    #[test]
    fn in_range_reading_stores_quietly() {
        let b = bench();
        let outcome = b
            .monitor
            .ingest_at(&ok_reading(b.unit_id, 5), noon())
            .unwrap();

        assert!(outcome.alarms.is_empty());
        assert!(outcome.opened.is_empty());
        assert!(outcome.closed.is_empty());
        assert!(outcome.reading_id > 0);
        assert_eq!(
            b.monitor.store().get_plant(b.plant_id).unwrap().status,
            PlantStatus::Ok
        );
    }

    #[test]
    fn two_recent_matching_alarms_open_one_ticket() {
        let b = bench();
        let first = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 30), noon())
            .unwrap();
        assert_eq!(first.alarms.len(), 1);
        assert!(first.opened.is_empty());

        let second = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 5), noon())
            .unwrap();
        assert_eq!(second.opened.len(), 1);
        let ticket = &second.opened[0];
        assert_eq!(ticket.code, TicketStatus::NotResolved);
        assert_eq!(
            ticket.alarms,
            vec![second.alarms[0].id, first.alarms[0].id]
        );
        assert_eq!(
            b.monitor.store().get_plant(b.plant_id).unwrap().status,
            PlantStatus::Error
        );
    }

    #[test]
    fn two_stale_matching_alarms_never_open() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 90), noon())
            .unwrap();
        let second = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 70), noon())
            .unwrap();

        assert!(second.opened.is_empty());
        assert!(b.monitor.store().list_tickets().unwrap().is_empty());
        assert_eq!(b.monitor.store().list_unlinked_alarms().unwrap().len(), 2);
    }

    #[test]
    fn one_recent_alarm_drags_a_stale_one_into_a_ticket() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 80), noon())
            .unwrap();
        let second = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 20), noon())
            .unwrap();

        assert_eq!(second.opened.len(), 1);
        assert_eq!(second.opened[0].alarms.len(), 2);
    }

    #[test]
    fn a_single_alarm_never_opens_a_ticket() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 1), noon())
            .unwrap();
        // Later quiet passes keep reconsidering the same lone alarm.
        let later = b
            .monitor
            .ingest_at(&ok_reading(b.unit_id, 0), noon())
            .unwrap();

        assert!(later.opened.is_empty());
        assert_eq!(b.monitor.store().list_unlinked_alarms().unwrap().len(), 1);
    }

    #[test]
    fn correlation_does_not_double_ticket_across_passes() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 30), noon())
            .unwrap();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 5), noon())
            .unwrap();

        let quiet = b
            .monitor
            .ingest_at(&ok_reading(b.unit_id, 0), noon())
            .unwrap();
        assert!(quiet.opened.is_empty());
        assert_eq!(b.monitor.store().list_tickets().unwrap().len(), 1);
    }

    #[test]
    fn distinct_signatures_get_distinct_tickets() {
        let b = bench();
        // Voltage below and current above: two signatures per reading.
        let mixed = Reading::new(b.unit_id, 190.0, 20.0, 50.0, minutes_before(30));
        b.monitor.ingest_at(&mixed, noon()).unwrap();
        let mixed = Reading::new(b.unit_id, 190.0, 20.0, 50.0, minutes_before(5));
        let second = b.monitor.ingest_at(&mixed, noon()).unwrap();

        assert_eq!(second.alarms.len(), 2);
        assert_eq!(second.opened.len(), 2);
        assert!(second.opened.iter().all(|t| t.alarms.len() == 2));
    }

    #[test]
    fn quiet_ticket_is_swept_solved_and_hidden() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 30), noon())
            .unwrap();
        let opened = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 5), noon())
            .unwrap();
        let ticket_id = opened.opened[0].id;

        // 70 minutes later the newest alarm is 75 minutes old.
        let later = noon() + Duration::minutes(70);
        let outcome = b
            .monitor
            .ingest_at(&Reading::new(b.unit_id, 230.0, 8.0, 50.0, later), later)
            .unwrap();

        assert_eq!(outcome.closed.len(), 1);
        assert_eq!(outcome.closed[0].id, ticket_id);
        assert_eq!(outcome.closed[0].code, TicketStatus::Solved);
        for alarm_id in &outcome.closed[0].alarms {
            assert!(!b.monitor.store().get_alarm(*alarm_id).unwrap().visible);
        }
    }

    #[test]
    fn operator_resolved_ticket_is_not_swept() {
        let b = bench();
        b.monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 30), noon())
            .unwrap();
        let opened = b
            .monitor
            .ingest_at(&low_voltage_reading(b.unit_id, 5), noon())
            .unwrap();
        let ticket_id = opened.opened[0].id;
        lifecycle::set_ticket_status(b.monitor.store(), ticket_id, "RESOLVED").unwrap();

        let later = noon() + Duration::hours(3);
        let outcome = b
            .monitor
            .ingest_at(&Reading::new(b.unit_id, 230.0, 8.0, 50.0, later), later)
            .unwrap();

        assert!(outcome.closed.is_empty());
        assert_eq!(
            b.monitor.store().get_ticket(ticket_id).unwrap().code,
            TicketStatus::Resolved
        );
    }

    #[test]
    fn device_reported_codes_correlate_like_threshold_alarms() {
        let b = bench();
        let flagged = |minutes| {
            ok_reading(b.unit_id, minutes).with_alarm_code(AlarmCode::BmsProblem)
        };
        b.monitor.ingest_at(&flagged(30), noon()).unwrap();
        let second = b.monitor.ingest_at(&flagged(5), noon()).unwrap();

        assert_eq!(second.alarms[0].code, AlarmCode::BmsProblem);
        assert_eq!(second.alarms[0].description, "BMS problem");
        assert_eq!(second.opened.len(), 1);
        assert_eq!(
            b.monitor.store().get_plant(b.plant_id).unwrap().status,
            PlantStatus::Error
        );
    }

    #[test]
    fn dc_side_reading_checks_dc_ranges_and_skips_frequency() {
        let b = bench();
        // 250 V is fine on the AC side but below the DC floor of 300 V.
        let dc = Reading::new(b.unit_id, 250.0, 6.0, 0.0, minutes_before(5));
        let outcome = b.monitor.ingest_at(&dc, noon()).unwrap();
        assert_eq!(outcome.alarms.len(), 1);
        assert_eq!(
            outcome.alarms[0].description,
            "detected voltage (V) below the operating range"
        );

        // In the DC bands, a zero frequency raises nothing.
        let dc_ok = Reading::new(b.unit_id, 350.0, 6.0, 0.0, minutes_before(4));
        assert!(b.monitor.ingest_at(&dc_ok, noon()).unwrap().alarms.is_empty());
    }

    #[test]
    fn unknown_unit_rejects_the_whole_pass() {
        let b = bench();
        let err = b.monitor.ingest_at(&ok_reading(999, 5), noon());
        assert!(matches!(err, Err(crate::error::MonitorError::NotFound(_))));

        let readings: i64 = b
            .monitor
            .store()
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM readings", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(readings, 0);
    }

    #[test]
    fn non_finite_samples_are_rejected_before_any_write() {
        let b = bench();
        let bad = Reading::new(b.unit_id, f64::NAN, 8.0, 50.0, minutes_before(5));
        assert!(matches!(
            b.monitor.ingest_at(&bad, noon()),
            Err(crate::error::MonitorError::Validation(_))
        ));
        assert!(b.monitor.store().list_alarms().unwrap().is_empty());
    }

    #[test]
    fn alarm_timestamps_round_trip_at_second_precision() {
        let b = bench();
        let precise = Utc.timestamp_opt(1_772_366_100, 987_654_321).unwrap();
        let reading = Reading::new(b.unit_id, 190.0, 8.0, 50.0, precise);
        let outcome = b.monitor.ingest_at(&reading, noon()).unwrap();

        let stored = b
            .monitor
            .store()
            .get_alarm(outcome.alarms[0].id)
            .unwrap();
        assert_eq!(stored.timestamp, Utc.timestamp_opt(1_772_366_100, 0).unwrap());
        assert_eq!(stored.timestamp, outcome.alarms[0].timestamp);
    }
}
