//! Stable alarm and ticket vocabularies.
//!
//! Alarm codes and ticket statuses are an external contract shared with UI
//! layers and stored as text, so every value here has a fixed wire form.

use serde::{Deserialize, Serialize};

/// Pass-through alarm codes carried by readings and attached to alarms.
///
/// `-01` is the "no alarm" sentinel: readings default to it and it never
/// becomes an alarm record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlarmCode {
    #[serde(rename = "-01")]
    NoAlarm,
    #[serde(rename = "00")]
    SoftwareError,
    #[serde(rename = "01")]
    InverterProblem,
    #[serde(rename = "02")]
    BmsProblem,
    #[serde(rename = "03")]
    SlaveBatteryProblem,
    #[serde(rename = "04")]
    PlantComponentProblem,
}

impl AlarmCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoAlarm => "-01",
            Self::SoftwareError => "00",
            Self::InverterProblem => "01",
            Self::BmsProblem => "02",
            Self::SlaveBatteryProblem => "03",
            Self::PlantComponentProblem => "04",
        }
    }

    /// Fixed descriptive message for pass-through alarms. The sentinel has
    /// none.
    pub fn description(self) -> Option<&'static str> {
        match self {
            Self::NoAlarm => None,
            Self::SoftwareError => Some("software error"),
            Self::InverterProblem => Some("DC-side inverter problem"),
            Self::BmsProblem => Some("BMS problem"),
            Self::SlaveBatteryProblem => Some("slave-battery problem"),
            Self::PlantComponentProblem => Some("plant-component problem"),
        }
    }
}

pub fn parse_alarm_code(value: &str) -> Option<AlarmCode> {
    match value.trim() {
        "-01" => Some(AlarmCode::NoAlarm),
        "00" => Some(AlarmCode::SoftwareError),
        "01" => Some(AlarmCode::InverterProblem),
        "02" => Some(AlarmCode::BmsProblem),
        "03" => Some(AlarmCode::SlaveBatteryProblem),
        "04" => Some(AlarmCode::PlantComponentProblem),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

pub fn parse_severity(value: &str) -> Option<Severity> {
    match value.trim().to_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        _ => None,
    }
}

/// Ticket statuses. The first three are operator vocabulary; `Solved` is
/// written only by the automatic sweep and is rejected as operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "IN PROGRESS")]
    InProgress,
    #[serde(rename = "RESOLVED")]
    Resolved,
    #[serde(rename = "NOT RESOLVED")]
    NotResolved,
    #[serde(rename = "SOLVED")]
    Solved,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::NotResolved => "NOT RESOLVED",
            Self::Solved => "SOLVED",
        }
    }

    /// Whether a ticket in this status hides its linked alarms.
    pub fn hides_alarms(self) -> bool {
        matches!(self, Self::Resolved | Self::Solved)
    }
}

/// Parses any stored status, including the internal `SOLVED`.
pub fn parse_ticket_status(value: &str) -> Option<TicketStatus> {
    match value.trim().to_uppercase().as_str() {
        "IN PROGRESS" => Some(TicketStatus::InProgress),
        "RESOLVED" => Some(TicketStatus::Resolved),
        "NOT RESOLVED" => Some(TicketStatus::NotResolved),
        "SOLVED" => Some(TicketStatus::Solved),
        _ => None,
    }
}

/// Parses operator input: only the public taxonomy, never `SOLVED`.
pub fn parse_public_status(value: &str) -> Option<TicketStatus> {
    match parse_ticket_status(value) {
        Some(TicketStatus::Solved) | None => None,
        some => some,
    }
}

/// Metrics checked against operating ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Voltage,
    Current,
    Frequency,
}

impl Metric {
    /// Bare metric name, used as the stored discriminator for ranges.
    pub fn name(self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Frequency => "frequency",
        }
    }
}

/// Role of a battery unit within its plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryType {
    Master,
    Slave,
}

impl BatteryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }
}

pub fn parse_battery_type(value: &str) -> Option<BatteryType> {
    match value.trim().to_lowercase().as_str() {
        "master" => Some(BatteryType::Master),
        "slave" => Some(BatteryType::Slave),
        _ => None,
    }
}

/// Health flag on a plant. Flips to `Error` on the first alarm and stays
/// there until an operator intervenes out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantStatus {
    Ok,
    Error,
}

impl PlantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

pub fn parse_plant_status(value: &str) -> Option<PlantStatus> {
    match value.trim().to_lowercase().as_str() {
        "ok" => Some(PlantStatus::Ok),
        "error" => Some(PlantStatus::Error),
        _ => None,
    }
}

/// Fixed descriptions for threshold alarms. These strings take part in the
/// correlation signature, so they must never be built ad hoc.
pub fn below_range_message(metric: Metric) -> &'static str {
    match metric {
        Metric::Voltage => "detected voltage (V) below the operating range",
        Metric::Current => "detected current (A) below the operating range",
        Metric::Frequency => "detected frequency (Hz) below the operating range",
    }
}

pub fn above_range_message(metric: Metric) -> &'static str {
    match metric {
        Metric::Voltage => "detected voltage (V) above the operating range",
        Metric::Current => "detected current (A) above the operating range",
        Metric::Frequency => "detected frequency (Hz) above the operating range",
    }
}
