use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MonitorError, Result};
use crate::readings::{MetricRange, Reading, UnitProfile, UnitRanges};
use crate::taxonomy::{parse_battery_type, parse_plant_status, BatteryType, Metric, PlantStatus};
use crate::time;

use super::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub installer: String,
    pub status: PlantStatus,
}

/// An equipment unit resolved for ingestion: owning plant plus the range
/// profile the evaluator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitContext {
    pub id: i64,
    pub plant_id: i64,
    pub name: String,
    pub profile: UnitProfile,
}

impl UnitContext {
    pub fn ranges_for(&self, reading: &Reading) -> UnitRanges {
        self.profile.ranges_for(reading, self.plant_id)
    }
}

/// Range references for a module unit's two electrical sides.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRangeIds {
    pub ac_voltage: i64,
    pub ac_current: i64,
    pub ac_frequency: i64,
    pub dc_voltage: i64,
    pub dc_current: i64,
}

fn fetch_range(conn: &Connection, range_id: i64) -> Result<MetricRange> {
    let mut stmt = conn.prepare_cached("SELECT lower, upper FROM ranges WHERE id = ?1")?;
    let bounds = stmt
        .query_row(params![range_id], |row| {
            Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?))
        })
        .optional()?
        .ok_or_else(|| MonitorError::Consistency(format!("range {range_id} is missing")))?;
    MetricRange::new(bounds.0, bounds.1)
        .map_err(|err| MonitorError::Consistency(format!("stored range {range_id}: {err}")))
}

fn require(column: &str, unit_id: i64, value: Option<i64>) -> Result<i64> {
    value.ok_or_else(|| {
        MonitorError::Consistency(format!("unit {unit_id} is missing its {column} range"))
    })
}

impl Store {
    pub fn create_plant(&self, name: &str, installer: &str) -> Result<PlantRecord> {
        let uuid = Uuid::new_v4();
        let id = self.with_retried_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO plants (uuid, name, installer, status) VALUES (?1, ?2, ?3, 'ok')",
            )?;
            stmt.execute(params![uuid.to_string(), name, installer])?;
            Ok(tx.last_insert_rowid())
        })?;
        Ok(PlantRecord {
            id,
            uuid,
            name: name.to_string(),
            installer: installer.to_string(),
            status: PlantStatus::Ok,
        })
    }

    pub fn get_plant(&self, plant_id: i64) -> Result<PlantRecord> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, uuid, name, installer, status FROM plants WHERE id = ?1",
            )?;
            let row = stmt
                .query_row(params![plant_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .optional()?
                .ok_or_else(|| MonitorError::not_found(format!("plant {plant_id}")))?;

            let uuid = Uuid::parse_str(&row.1).map_err(|err| {
                MonitorError::Consistency(format!("plant {} has a malformed uuid: {err}", row.0))
            })?;
            let status = parse_plant_status(&row.4).ok_or_else(|| {
                MonitorError::Consistency(format!(
                    "plant {} carries unknown status {:?}",
                    row.0, row.4
                ))
            })?;
            Ok(PlantRecord {
                id: row.0,
                uuid,
                name: row.2,
                installer: row.3,
                status,
            })
        })
    }

    /// Marks a plant as having an active problem. Never reset automatically.
    pub fn mark_plant_error(&self, plant_id: i64) -> Result<()> {
        self.with_retried_tx(|tx| {
            let changed = tx.execute(
                "UPDATE plants SET status = 'error' WHERE id = ?1",
                params![plant_id],
            )?;
            if changed == 0 {
                return Err(MonitorError::not_found(format!("plant {plant_id}")));
            }
            Ok(())
        })
    }

    /// Creates an operating range. The `lower < upper` invariant is checked
    /// here, before anything reaches the database.
    pub fn create_range(&self, metric: Metric, lower: f64, upper: f64) -> Result<i64> {
        MetricRange::new(lower, upper)?;
        self.with_retried_tx(|tx| {
            let mut stmt = tx
                .prepare_cached("INSERT INTO ranges (metric, lower, upper) VALUES (?1, ?2, ?3)")?;
            stmt.execute(params![metric.name(), lower, upper])?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn create_module_unit(
        &self,
        plant_id: i64,
        name: &str,
        ranges: ModuleRangeIds,
    ) -> Result<i64> {
        self.with_retried_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO units (plant_id, name, kind,
                     ac_voltage_range_id, ac_current_range_id, ac_frequency_range_id,
                     dc_voltage_range_id, dc_current_range_id)
                 VALUES (?1, ?2, 'module', ?3, ?4, ?5, ?6, ?7)",
            )?;
            stmt.execute(params![
                plant_id,
                name,
                ranges.ac_voltage,
                ranges.ac_current,
                ranges.ac_frequency,
                ranges.dc_voltage,
                ranges.dc_current,
            ])?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn create_battery_unit(
        &self,
        plant_id: i64,
        name: &str,
        battery_type: BatteryType,
        voltage_range_id: i64,
        current_range_id: i64,
    ) -> Result<i64> {
        self.with_retried_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO units (plant_id, name, kind, battery_type,
                     battery_voltage_range_id, battery_current_range_id)
                 VALUES (?1, ?2, 'battery', ?3, ?4, ?5)",
            )?;
            stmt.execute(params![
                plant_id,
                name,
                battery_type.as_str(),
                voltage_range_id,
                current_range_id,
            ])?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Resolves the unit a reading refers to, or `NotFound`.
    pub fn unit_context(&self, unit_id: i64) -> Result<UnitContext> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT plant_id, name, kind, battery_type,
                        ac_voltage_range_id, ac_current_range_id, ac_frequency_range_id,
                        dc_voltage_range_id, dc_current_range_id,
                        battery_voltage_range_id, battery_current_range_id
                 FROM units
                 WHERE id = ?1",
            )?;
            let row = stmt
                .query_row(params![unit_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                        row.get::<_, Option<i64>>(7)?,
                        row.get::<_, Option<i64>>(8)?,
                        row.get::<_, Option<i64>>(9)?,
                        row.get::<_, Option<i64>>(10)?,
                    ))
                })
                .optional()?
                .ok_or_else(|| MonitorError::not_found(format!("unit {unit_id}")))?;

            let (plant_id, name, kind, bat_type, ac_v, ac_c, ac_f, dc_v, dc_c, bat_v, bat_c) = row;
            let profile = match kind.as_str() {
                "module" => UnitProfile::Module {
                    ac_voltage: fetch_range(conn, require("AC voltage", unit_id, ac_v)?)?,
                    ac_current: fetch_range(conn, require("AC current", unit_id, ac_c)?)?,
                    ac_frequency: fetch_range(conn, require("AC frequency", unit_id, ac_f)?)?,
                    dc_voltage: fetch_range(conn, require("DC voltage", unit_id, dc_v)?)?,
                    dc_current: fetch_range(conn, require("DC current", unit_id, dc_c)?)?,
                },
                "battery" => {
                    let label = bat_type.ok_or_else(|| {
                        MonitorError::Consistency(format!(
                            "unit {unit_id} is a battery with no battery type"
                        ))
                    })?;
                    UnitProfile::Battery {
                        battery_type: parse_battery_type(&label).ok_or_else(|| {
                            MonitorError::Consistency(format!(
                                "unit {unit_id} has unknown battery type {label:?}"
                            ))
                        })?,
                        voltage: fetch_range(conn, require("battery voltage", unit_id, bat_v)?)?,
                        current: fetch_range(conn, require("battery current", unit_id, bat_c)?)?,
                    }
                }
                other => {
                    return Err(MonitorError::Consistency(format!(
                        "unit {unit_id} has unknown kind {other:?}"
                    )))
                }
            };

            Ok(UnitContext {
                id: unit_id,
                plant_id,
                name,
                profile,
            })
        })
    }

    /// Records an ingested reading. Runs after evaluation; the stored row is
    /// an audit trail, not an input to it.
    pub fn insert_reading(&self, reading: &Reading) -> Result<i64> {
        let timestamp_text = time::format_utc_seconds(reading.timestamp);
        self.with_retried_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO readings (unit_id, voltage, current, frequency, alarm_code, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            stmt.execute(params![
                reading.unit_id,
                reading.voltage,
                reading.current,
                reading.frequency,
                reading.alarm_code.as_str(),
                timestamp_text,
            ])?;
            Ok(tx.last_insert_rowid())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::RetryPolicy;
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_store() -> Store {
        Store::in_memory(RetryPolicy::default()).unwrap()
    }

    fn seed_module(store: &Store) -> (i64, i64) {
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
        (plant.id, unit_id)
    }

    #[test]
    fn create_range_rejects_inverted_bounds_before_writing() {
        let store = test_store();
        let err = store.create_range(Metric::Voltage, 240.0, 210.0);
        assert!(matches!(err, Err(MonitorError::Validation(_))));

        let count: i64 = store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM ranges", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn module_unit_round_trips_into_a_profile() {
        let store = test_store();
        let (plant_id, unit_id) = seed_module(&store);

        let unit = store.unit_context(unit_id).unwrap();
        assert_eq!(unit.plant_id, plant_id);
        assert_eq!(unit.name, "inverter-1");
        match unit.profile {
            UnitProfile::Module { ac_voltage, .. } => {
                assert_eq!(ac_voltage.lower(), 210.0);
                assert_eq!(ac_voltage.upper(), 240.0);
            }
            other => panic!("expected module profile, got {other:?}"),
        }
    }

    #[test]
    fn battery_unit_round_trips_into_a_profile() {
        let store = test_store();
        let plant = store.create_plant("Plant One", "ACME Solar").unwrap();
        let voltage = store.create_range(Metric::Voltage, 44.0, 58.0).unwrap();
        let current = store.create_range(Metric::Current, 0.5, 30.0).unwrap();
        let unit_id = store
            .create_battery_unit(plant.id, "battery-1", BatteryType::Master, voltage, current)
            .unwrap();

        let unit = store.unit_context(unit_id).unwrap();
        match unit.profile {
            UnitProfile::Battery {
                battery_type,
                voltage,
                ..
            } => {
                assert_eq!(battery_type, BatteryType::Master);
                assert_eq!(voltage.lower(), 44.0);
            }
            other => panic!("expected battery profile, got {other:?}"),
        }
    }

    #[test]
    fn unknown_unit_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.unit_context(12),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn plant_status_flips_to_error_and_stays() {
        let store = test_store();
        let plant = store.create_plant("Plant One", "ACME Solar").unwrap();
        assert_eq!(plant.status, PlantStatus::Ok);

        store.mark_plant_error(plant.id).unwrap();
        assert_eq!(store.get_plant(plant.id).unwrap().status, PlantStatus::Error);

        // A second flip is a no-op, not an error.
        store.mark_plant_error(plant.id).unwrap();
        assert_eq!(store.get_plant(plant.id).unwrap().status, PlantStatus::Error);
    }

    #[test]
    fn readings_persist_with_their_alarm_code() {
        let store = test_store();
        let (_, unit_id) = seed_module(&store);
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let reading = Reading::new(unit_id, 230.0, 8.0, 50.0, ts)
            .with_alarm_code(crate::taxonomy::AlarmCode::BmsProblem);

        let id = store.insert_reading(&reading).unwrap();
        let stored: (f64, String, String) = store
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT voltage, alarm_code, timestamp FROM readings WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?)
            })
            .unwrap();
        assert_eq!(stored.0, 230.0);
        assert_eq!(stored.1, "02");
        assert_eq!(stored.2, "2026-03-01T09:00:00Z");
    }
}
