use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{MonitorError, Result};
use crate::taxonomy::{parse_ticket_status, TicketStatus};
use crate::time;

use super::Store;

/// A ticket with the ids of its linked alarms, newest alarm first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRecord {
    pub id: i64,
    pub code: TicketStatus,
    pub plant_id: i64,
    pub alarms: Vec<i64>,
}

fn linked_alarm_ids(conn: &Connection, ticket_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM alarms WHERE ticket_id = ?1 ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![ticket_id], |row| row.get::<_, i64>(0))?;
    let mut ids = Vec::new();
    for id in rows {
        ids.push(id?);
    }
    Ok(ids)
}

fn read_ticket(conn: &Connection, ticket_id: i64) -> Result<Option<TicketRecord>> {
    let mut stmt = conn.prepare_cached("SELECT code, plant_id FROM tickets WHERE id = ?1")?;
    let head = stmt
        .query_row(params![ticket_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .optional()?;
    let Some((code_text, plant_id)) = head else {
        return Ok(None);
    };
    let code = parse_ticket_status(&code_text).ok_or_else(|| {
        MonitorError::Consistency(format!(
            "ticket {ticket_id} carries unknown status {code_text:?}"
        ))
    })?;
    Ok(Some(TicketRecord {
        id: ticket_id,
        code,
        plant_id,
        alarms: linked_alarm_ids(conn, ticket_id)?,
    }))
}

impl Store {
    /// Opens a ticket over a correlated alarm group and links every alarm to
    /// it, atomically. Any alarm already claimed by another ticket aborts and
    /// rolls back the whole group.
    pub fn create_ticket_for_group(
        &self,
        plant_id: i64,
        alarm_ids: &[i64],
    ) -> Result<TicketRecord> {
        if alarm_ids.is_empty() {
            return Err(MonitorError::validation("a ticket needs at least one alarm"));
        }
        self.with_retried_tx(|tx| {
            let mut insert = tx.prepare_cached(
                "INSERT INTO tickets (code, plant_id) VALUES ('NOT RESOLVED', ?1)",
            )?;
            insert.execute(params![plant_id])?;
            let ticket_id = tx.last_insert_rowid();

            let mut claim = tx.prepare_cached(
                "UPDATE alarms SET ticket_id = ?1 WHERE id = ?2 AND ticket_id IS NULL",
            )?;
            for alarm_id in alarm_ids {
                let changed = claim.execute(params![ticket_id, alarm_id])?;
                if changed != 1 {
                    return Err(MonitorError::Consistency(format!(
                        "alarm {alarm_id} vanished or was already ticketed"
                    )));
                }
            }

            read_ticket(tx, ticket_id)?.ok_or_else(|| {
                MonitorError::Consistency(format!("ticket {ticket_id} vanished mid-transaction"))
            })
        })
    }

    pub fn get_ticket(&self, ticket_id: i64) -> Result<TicketRecord> {
        self.with_conn(|conn| {
            read_ticket(conn, ticket_id)?
                .ok_or_else(|| MonitorError::not_found(format!("ticket {ticket_id}")))
        })
    }

    /// All tickets, most recent alarm activity first. Tickets without any
    /// linked alarm sort last.
    pub fn list_tickets(&self) -> Result<Vec<TicketRecord>> {
        self.with_conn(|conn| {
            let mut heads = conn.prepare_cached(
                "SELECT t.id, t.code, t.plant_id
                 FROM tickets t
                 LEFT JOIN alarms a ON a.ticket_id = t.id
                 GROUP BY t.id
                 ORDER BY MAX(a.timestamp) DESC, t.id DESC",
            )?;
            let rows = heads.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut links = conn.prepare_cached(
                "SELECT ticket_id, id FROM alarms
                 WHERE ticket_id IS NOT NULL
                 ORDER BY timestamp DESC, id DESC",
            )?;
            let mut by_ticket: HashMap<i64, Vec<i64>> = HashMap::new();
            let link_rows = links.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for link in link_rows {
                let (ticket_id, alarm_id) = link?;
                by_ticket.entry(ticket_id).or_default().push(alarm_id);
            }

            let mut tickets = Vec::new();
            for row in rows {
                let (id, code_text, plant_id) = row?;
                let code = parse_ticket_status(&code_text).ok_or_else(|| {
                    MonitorError::Consistency(format!(
                        "ticket {id} carries unknown status {code_text:?}"
                    ))
                })?;
                tickets.push(TicketRecord {
                    id,
                    code,
                    plant_id,
                    alarms: by_ticket.remove(&id).unwrap_or_default(),
                });
            }
            Ok(tickets)
        })
    }

    /// Applies an operator (or sweep) status and flips linked-alarm
    /// visibility to match, in one transaction.
    pub fn update_ticket_status(
        &self,
        ticket_id: i64,
        status: TicketStatus,
    ) -> Result<TicketRecord> {
        self.with_retried_tx(|tx| {
            let changed = tx.execute(
                "UPDATE tickets SET code = ?1 WHERE id = ?2",
                params![status.as_str(), ticket_id],
            )?;
            if changed == 0 {
                return Err(MonitorError::not_found(format!("ticket {ticket_id}")));
            }
            tx.execute(
                "UPDATE alarms SET visible = ?1 WHERE ticket_id = ?2",
                params![!status.hides_alarms(), ticket_id],
            )?;
            read_ticket(tx, ticket_id)?.ok_or_else(|| {
                MonitorError::Consistency(format!("ticket {ticket_id} vanished mid-transaction"))
            })
        })
    }

    /// Open tickets whose newest alarm is strictly older than `cutoff`,
    /// i.e. candidates for the automatic close sweep. Only `NOT RESOLVED`
    /// tickets qualify; operator-claimed tickets are left alone.
    pub fn stale_open_tickets(&self, cutoff: DateTime<Utc>) -> Result<Vec<i64>> {
        let cutoff_text = time::format_utc_seconds(cutoff);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT t.id
                 FROM tickets t
                 JOIN alarms a ON a.ticket_id = t.id
                 WHERE t.code = 'NOT RESOLVED'
                 GROUP BY t.id
                 HAVING MAX(a.timestamp) < ?1
                 ORDER BY t.id",
            )?;
            let rows = stmt.query_map(params![cutoff_text], |row| row.get::<_, i64>(0))?;
            let mut ids = Vec::new();
            for id in rows {
                ids.push(id?);
            }
            Ok(ids)
        })
    }

    /// Closes one stale ticket: `NOT RESOLVED` becomes `SOLVED` and its
    /// alarms are hidden. Returns `None` when the ticket was claimed by an
    /// operator between selection and close, which is not an error.
    pub fn close_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>> {
        self.with_retried_tx(|tx| {
            let changed = tx.execute(
                "UPDATE tickets SET code = 'SOLVED' WHERE id = ?1 AND code = 'NOT RESOLVED'",
                params![ticket_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            tx.execute(
                "UPDATE alarms SET visible = 0 WHERE ticket_id = ?1",
                params![ticket_id],
            )?;
            read_ticket(tx, ticket_id)
        })
    }
}
