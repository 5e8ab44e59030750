//! Ticket lifecycle: the automatic close sweep and operator status changes.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::error::{MonitorError, Result};
use crate::store::{Store, TicketRecord};
use crate::taxonomy::parse_public_status;

/// One close pass at instant `now`: every `NOT RESOLVED` ticket whose
/// newest alarm left the window becomes `SOLVED` with its alarms hidden.
/// Tickets an operator has touched are never swept.
pub fn sweep(store: &Store, now: DateTime<Utc>, window: Duration) -> Result<Vec<TicketRecord>> {
    let cutoff = now - window;
    let mut closed = Vec::new();
    for ticket_id in store.stale_open_tickets(cutoff)? {
        match store.close_ticket(ticket_id) {
            Ok(Some(ticket)) => {
                info!(ticket = ticket.id, "alarm group went quiet, ticket closed");
                closed.push(ticket);
            }
            // Claimed by an operator between selection and close.
            Ok(None) => {}
            Err(err) => {
                warn!(
                    ticket = ticket_id,
                    error = %err,
                    "close failed, ticket deferred to the next sweep"
                );
            }
        }
    }
    Ok(closed)
}

/// Applies an operator-supplied status from its text form. Only the public
/// vocabulary is accepted; `SOLVED` belongs to the sweep and is rejected
/// like any unknown text.
pub fn set_ticket_status(store: &Store, ticket_id: i64, status: &str) -> Result<TicketRecord> {
    let status = parse_public_status(status)
        .ok_or_else(|| MonitorError::validation(format!("unknown ticket status {status:?}")))?;
    let ticket = store.update_ticket_status(ticket_id, status)?;
    info!(ticket = ticket.id, status = status.as_str(), "operator set ticket status");
    Ok(ticket)
}
