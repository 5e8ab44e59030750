use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solar_monitor_rs::readings::Reading;
use solar_monitor_rs::services::{lifecycle, Monitor};
use solar_monitor_rs::store::{ModuleRangeIds, Store};
use solar_monitor_rs::taxonomy::{AlarmCode, BatteryType, Metric};
use solar_monitor_rs::{cli, config};

struct DemoPlant {
    plant_id: i64,
    module_id: i64,
    battery_id: i64,
}

fn seed_fleet(store: &Store, plants: u32) -> Result<Vec<DemoPlant>> {
    let mut fleet = Vec::new();
    for index in 1..=plants.max(1) {
        let plant = store.create_plant(&format!("Plant {index}"), "Helios Installations")?;
        let module_ranges = ModuleRangeIds {
            ac_voltage: store.create_range(Metric::Voltage, 210.0, 240.0)?,
            ac_current: store.create_range(Metric::Current, 1.0, 16.0)?,
            ac_frequency: store.create_range(Metric::Frequency, 49.5, 50.5)?,
            dc_voltage: store.create_range(Metric::Voltage, 300.0, 420.0)?,
            dc_current: store.create_range(Metric::Current, 2.0, 12.0)?,
        };
        let module_id =
            store.create_module_unit(plant.id, &format!("inverter-{index}"), module_ranges)?;
        let battery_voltage = store.create_range(Metric::Voltage, 44.0, 58.0)?;
        let battery_current = store.create_range(Metric::Current, 0.5, 30.0)?;
        let battery_id = store.create_battery_unit(
            plant.id,
            &format!("battery-{index}"),
            BatteryType::Master,
            battery_voltage,
            battery_current,
        )?;
        fleet.push(DemoPlant {
            plant_id: plant.id,
            module_id,
            battery_id,
        });
    }
    Ok(fleet)
}

fn ac_sample(rng: &mut StdRng, unit_id: i64, at: DateTime<Utc>) -> Reading {
    Reading::new(
        unit_id,
        225.0 + rng.gen_range(-8.0..8.0),
        8.0 + rng.gen_range(-3.0..3.0),
        50.0 + rng.gen_range(-0.3..0.3),
        at,
    )
}

fn battery_sample(rng: &mut StdRng, unit_id: i64, at: DateTime<Utc>) -> Reading {
    Reading::new(
        unit_id,
        51.0 + rng.gen_range(-3.0..3.0),
        12.0 + rng.gen_range(-6.0..6.0),
        0.0,
        at,
    )
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = config::MonitorConfig::from_env();
    if let Some(db) = args.db.clone() {
        config.db_path = db;
    }

    let store = Store::open(&config.db_path, config.retry_policy())
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    let monitor = Monitor::new(store, config.correlation_window());
    tracing::info!(
        db = %config.db_path.display(),
        window_seconds = monitor.window().num_seconds(),
        "monitor ready"
    );

    let fleet = seed_fleet(monitor.store(), args.plants)?;
    tracing::info!(plants = fleet.len(), "seeded demo fleet");

    let mut rng = StdRng::seed_from_u64(args.seed);
    let now = Utc::now();

    // A fault that self-heals: two low-voltage readings on the first
    // module, then nothing but healthy samples. The replay below carries
    // the clock far enough for the sweep to close the ticket.
    let first = fleet.first().context("demo fleet is empty")?;
    for minutes in [140, 130] {
        let at = now - Duration::minutes(minutes);
        let reading = Reading::new(first.module_id, 195.0, 8.0, 50.0, at);
        monitor.ingest_at(&reading, at)?;
    }

    // Healthy replay across every unit, advancing toward the present.
    let steps = i64::from(args.readings.max(1));
    for step in 0..steps {
        let at = now - Duration::minutes(120) + Duration::minutes(step * 90 / steps);
        for plant in &fleet {
            monitor.ingest_at(&ac_sample(&mut rng, plant.module_id, at), at)?;
            monitor.ingest_at(&battery_sample(&mut rng, plant.battery_id, at), at)?;
        }
    }

    // A still-open problem: the last battery reports a BMS fault twice in
    // the last half hour, and an operator picks the ticket up.
    let last = fleet.last().context("demo fleet is empty")?;
    let mut opened = None;
    for minutes in [25, 3] {
        let at = now - Duration::minutes(minutes);
        let reading =
            battery_sample(&mut rng, last.battery_id, at).with_alarm_code(AlarmCode::BmsProblem);
        let outcome = monitor.ingest_at(&reading, at)?;
        opened = outcome.opened.into_iter().next().or(opened);
    }
    if let Some(ticket) = opened {
        lifecycle::set_ticket_status(monitor.store(), ticket.id, "IN PROGRESS")?;
    }

    let mut plants = Vec::with_capacity(fleet.len());
    for plant in &fleet {
        let record = monitor.store().get_plant(plant.plant_id)?;
        tracing::info!(
            plant = record.id,
            name = %record.name,
            status = record.status.as_str(),
            "plant state"
        );
        plants.push(record);
    }
    let alarms = monitor.store().list_alarms()?;
    let visible = alarms.iter().filter(|alarm| alarm.visible).count();
    tracing::info!(total = alarms.len(), visible, "alarm totals");

    let listing = serde_json::json!({
        "plants": plants,
        "alarms": alarms,
        "tickets": monitor.store().list_tickets()?,
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
