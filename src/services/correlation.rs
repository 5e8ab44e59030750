//! Correlation of unlinked alarms into tickets.
//!
//! Alarms sharing a signature (plant, code, description, severity) describe
//! one ongoing problem. A group earns a ticket once it shows at least one
//! alarm inside the correlation window and at least two alarms overall;
//! anything smaller is left unlinked and reconsidered on the next pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::{AlarmRecord, Store, TicketRecord};
use crate::taxonomy::{AlarmCode, Severity};

/// Grouping identity of an alarm. Two alarms correlate only when every
/// field matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Signature {
    pub plant_id: i64,
    pub code: AlarmCode,
    pub description: String,
    pub severity: Severity,
}

impl Signature {
    pub fn of(alarm: &AlarmRecord) -> Self {
        Self {
            plant_id: alarm.plant_id,
            code: alarm.code,
            description: alarm.description.clone(),
            severity: alarm.severity_level,
        }
    }
}

/// The opening rule, on its own so the boundary cases are testable without
/// a store: at least one alarm at or after `window_start`, and at least two
/// alarms in total.
pub fn group_is_eligible(timestamps: &[DateTime<Utc>], window_start: DateTime<Utc>) -> bool {
    timestamps.len() >= 2 && timestamps.iter().any(|ts| *ts >= window_start)
}

/// One correlation pass at instant `now`.
///
/// Groups are independent: a group that fails to ticket is logged and left
/// unlinked for the next pass, and never blocks its siblings.
pub fn correlate(store: &Store, now: DateTime<Utc>, window: Duration) -> Result<Vec<TicketRecord>> {
    let window_start = now - window;
    let unlinked = store.list_unlinked_alarms()?;

    let mut groups: BTreeMap<Signature, Vec<&AlarmRecord>> = BTreeMap::new();
    for alarm in &unlinked {
        groups.entry(Signature::of(alarm)).or_default().push(alarm);
    }

    let mut opened = Vec::new();
    for (signature, group) in groups {
        let timestamps: Vec<_> = group.iter().map(|alarm| alarm.timestamp).collect();
        if !group_is_eligible(&timestamps, window_start) {
            continue;
        }
        let alarm_ids: Vec<i64> = group.iter().map(|alarm| alarm.id).collect();
        match store.create_ticket_for_group(signature.plant_id, &alarm_ids) {
            Ok(ticket) => {
                info!(
                    ticket = ticket.id,
                    plant = signature.plant_id,
                    code = signature.code.as_str(),
                    alarms = alarm_ids.len(),
                    "opened ticket for correlated alarms"
                );
                opened.push(ticket);
            }
            Err(err) => {
                warn!(
                    plant = signature.plant_id,
                    code = signature.code.as_str(),
                    error = %err,
                    "ticket creation failed, group deferred to the next pass"
                );
            }
        }
    }
    Ok(opened)
}
