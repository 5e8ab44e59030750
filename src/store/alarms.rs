use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::error::{MonitorError, Result};
use crate::readings::AlarmCandidate;
use crate::taxonomy::{parse_alarm_code, parse_severity, AlarmCode, Severity};
use crate::time;

use super::Store;

/// A persisted alarm as exposed to callers. Timestamps serialize as UTC
/// second-precision text with a trailing `Z`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRecord {
    pub id: i64,
    pub code: AlarmCode,
    pub description: String,
    pub severity_level: Severity,
    #[serde(serialize_with = "time::serialize_utc_seconds")]
    pub timestamp: DateTime<Utc>,
    pub visible: bool,
    pub plant_id: i64,
    pub ticket_id: Option<i64>,
}

struct AlarmRow {
    id: i64,
    code: String,
    description: String,
    severity_level: String,
    timestamp: String,
    visible: bool,
    plant_id: i64,
    ticket_id: Option<i64>,
}

fn row_to_alarm(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlarmRow> {
    Ok(AlarmRow {
        id: row.get(0)?,
        code: row.get(1)?,
        description: row.get(2)?,
        severity_level: row.get(3)?,
        timestamp: row.get(4)?,
        visible: row.get(5)?,
        plant_id: row.get(6)?,
        ticket_id: row.get(7)?,
    })
}

impl TryFrom<AlarmRow> for AlarmRecord {
    type Error = MonitorError;

    fn try_from(row: AlarmRow) -> Result<Self> {
        let code = parse_alarm_code(&row.code).ok_or_else(|| {
            MonitorError::Consistency(format!(
                "alarm {} carries unknown code {:?}",
                row.id, row.code
            ))
        })?;
        let severity_level = parse_severity(&row.severity_level).ok_or_else(|| {
            MonitorError::Consistency(format!(
                "alarm {} carries unknown severity {:?}",
                row.id, row.severity_level
            ))
        })?;
        let timestamp = time::parse_utc(&row.timestamp)?;
        Ok(Self {
            id: row.id,
            code,
            description: row.description,
            severity_level,
            timestamp,
            visible: row.visible,
            plant_id: row.plant_id,
            ticket_id: row.ticket_id,
        })
    }
}

impl Store {
    /// Persists one alarm candidate: fresh id, `visible = true`, unlinked.
    pub fn insert_alarm(&self, candidate: &AlarmCandidate) -> Result<AlarmRecord> {
        let timestamp_text = time::format_utc_seconds(candidate.timestamp);
        let id = self.with_retried_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO alarms (code, description, severity_level, timestamp, visible, plant_id, ticket_id)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, NULL)",
            )?;
            stmt.execute(params![
                candidate.code.as_str(),
                candidate.description,
                candidate.severity.as_str(),
                timestamp_text,
                candidate.plant_id,
            ])?;
            Ok(tx.last_insert_rowid())
        })?;

        Ok(AlarmRecord {
            id,
            code: candidate.code,
            description: candidate.description.to_string(),
            severity_level: candidate.severity,
            // As stored: second precision.
            timestamp: time::parse_utc(&timestamp_text)?,
            visible: true,
            plant_id: candidate.plant_id,
            ticket_id: None,
        })
    }

    /// Every alarm, newest first.
    pub fn list_alarms(&self) -> Result<Vec<AlarmRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, code, description, severity_level, timestamp, visible, plant_id, ticket_id
                 FROM alarms
                 ORDER BY timestamp DESC, id DESC",
            )?;
            let rows = stmt.query_map([], row_to_alarm)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(AlarmRecord::try_from(row?)?);
            }
            Ok(out)
        })
    }

    pub fn get_alarm(&self, alarm_id: i64) -> Result<AlarmRecord> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, code, description, severity_level, timestamp, visible, plant_id, ticket_id
                 FROM alarms
                 WHERE id = ?1",
            )?;
            let row = stmt
                .query_row(params![alarm_id], row_to_alarm)
                .optional()?
                .ok_or_else(|| MonitorError::not_found(format!("alarm {alarm_id}")))?;
            AlarmRecord::try_from(row)
        })
    }

    /// Alarms with no ticket yet, oldest first: the correlator's working
    /// set.
    pub fn list_unlinked_alarms(&self) -> Result<Vec<AlarmRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, code, description, severity_level, timestamp, visible, plant_id, ticket_id
                 FROM alarms
                 WHERE ticket_id IS NULL
                 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_alarm)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(AlarmRecord::try_from(row?)?);
            }
            Ok(out)
        })
    }
}
