use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "solar-monitor",
    version,
    about = "Solar installation monitoring demo feed"
)]
pub struct Args {
    /// Database file; overrides MONITOR_DB_PATH when set.
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Number of demo plants to seed.
    #[arg(long, default_value_t = 2)]
    pub plants: u32,
    /// Scripted readings fed per unit.
    #[arg(long, default_value_t = 12)]
    pub readings: u32,
    /// Seed for the jittered part of the feed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}
