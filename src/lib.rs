pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod readings;
pub mod services;
pub mod store;
pub mod taxonomy;
pub mod time;
