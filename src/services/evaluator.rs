//! Threshold evaluation of readings against unit operating ranges.

use crate::readings::{AlarmCandidate, Reading, UnitRanges};
use crate::taxonomy::{above_range_message, below_range_message, AlarmCode, Metric, Severity};

// Out-of-range electrical behavior is always reported as code `01` at
// medium severity; device-reported codes keep their own code.
const THRESHOLD_CODE: AlarmCode = AlarmCode::InverterProblem;
const ALARM_SEVERITY: Severity = Severity::Medium;

/// Pure evaluation of one reading: one candidate per violated bound, in
/// metric order, plus the device-reported alarm code when the reading
/// carries one. Bound values themselves are inside the range.
pub fn evaluate(reading: &Reading, ranges: &UnitRanges) -> Vec<AlarmCandidate> {
    let mut candidates = Vec::new();
    let mut push = |code: AlarmCode, description: &'static str| {
        candidates.push(AlarmCandidate {
            code,
            description,
            severity: ALARM_SEVERITY,
            timestamp: reading.timestamp,
            plant_id: ranges.plant_id,
        });
    };

    if reading.voltage < ranges.voltage.lower() {
        push(THRESHOLD_CODE, below_range_message(Metric::Voltage));
    } else if reading.voltage > ranges.voltage.upper() {
        push(THRESHOLD_CODE, above_range_message(Metric::Voltage));
    }

    if reading.current < ranges.current.lower() {
        push(THRESHOLD_CODE, below_range_message(Metric::Current));
    } else if reading.current > ranges.current.upper() {
        push(THRESHOLD_CODE, above_range_message(Metric::Current));
    }

    if let Some(frequency) = ranges.frequency {
        if reading.frequency < frequency.lower() {
            push(THRESHOLD_CODE, below_range_message(Metric::Frequency));
        } else if reading.frequency > frequency.upper() {
            push(THRESHOLD_CODE, above_range_message(Metric::Frequency));
        }
    }

    if let Some(description) = reading.alarm_code.description() {
        push(reading.alarm_code, description);
    }

    candidates
}
