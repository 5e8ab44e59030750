use rusqlite::Connection;
use std::path::Path;

use crate::error::Result;

/// Opens (creating if needed) the monitor database at `path` and applies the
/// schema.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

/// In-memory database with the same schema; used by tests and throwaway
/// demo runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Timestamps are RFC 3339 UTC text at second precision, fixed width, so
    // string comparison in SQL is chronological comparison.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS plants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            installer TEXT NOT NULL DEFAULT 'unknown',
            status TEXT NOT NULL DEFAULT 'ok'
        );

        CREATE TABLE IF NOT EXISTS ranges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            metric TEXT NOT NULL CHECK (metric IN ('voltage', 'current', 'frequency')),
            lower REAL NOT NULL,
            upper REAL NOT NULL,
            CHECK (lower < upper)
        );

        CREATE TABLE IF NOT EXISTS units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plant_id INTEGER NOT NULL REFERENCES plants(id),
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('module', 'battery')),
            battery_type TEXT,
            ac_voltage_range_id INTEGER REFERENCES ranges(id),
            ac_current_range_id INTEGER REFERENCES ranges(id),
            ac_frequency_range_id INTEGER REFERENCES ranges(id),
            dc_voltage_range_id INTEGER REFERENCES ranges(id),
            dc_current_range_id INTEGER REFERENCES ranges(id),
            battery_voltage_range_id INTEGER REFERENCES ranges(id),
            battery_current_range_id INTEGER REFERENCES ranges(id)
        );

        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            unit_id INTEGER NOT NULL REFERENCES units(id),
            voltage REAL NOT NULL,
            current REAL NOT NULL,
            frequency REAL NOT NULL,
            alarm_code TEXT NOT NULL DEFAULT '-01',
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL DEFAULT 'NOT RESOLVED',
            plant_id INTEGER NOT NULL REFERENCES plants(id)
        );

        CREATE TABLE IF NOT EXISTS alarms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            description TEXT NOT NULL,
            severity_level TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            visible INTEGER NOT NULL DEFAULT 1,
            plant_id INTEGER NOT NULL REFERENCES plants(id),
            ticket_id INTEGER REFERENCES tickets(id)
        );

        CREATE INDEX IF NOT EXISTS idx_alarms_ticket ON alarms(ticket_id);
        CREATE INDEX IF NOT EXISTS idx_alarms_timestamp ON alarms(timestamp);
        "#,
    )?;
    Ok(())
}
