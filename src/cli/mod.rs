//! CLI entry point for tripgate.

pub mod commands;
pub mod logging;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::search::{LocationSubType, TravelClass};
use crate::types::Domain;

/// tripgate CLI
#[derive(Parser, Debug)]
#[command(
    name = "tripgate",
    version,
    about = "Cached, deduplicating gateway to travel inventory APIs"
)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Read configuration from a TOML file instead of TRIPGATE_* variables
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a search against the upstream (cached)
    Search(SearchArgs),
    /// Durable cache maintenance
    Cache(CacheArgs),
    /// Print the effective configuration (secret redacted)
    Config,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    #[command(subcommand)]
    pub command: SearchCommands,
}

#[derive(Subcommand, Debug)]
pub enum SearchCommands {
    /// Airports and cities by keyword
    Location(LocationArgs),
    /// Activities around a point
    Activity(ActivityArgs),
    /// Flight offers
    Flight(FlightArgs),
    /// Hotel offers for known hotel ids
    Hotel(HotelArgs),
}

/// Arguments for `tripgate search location`.
#[derive(Parser, Debug)]
pub struct LocationArgs {
    #[arg(long)]
    pub keyword: String,

    /// Comma-separated: CITY, AIRPORT
    #[arg(long, value_delimiter = ',')]
    pub sub_type: Vec<LocationSubType>,

    #[arg(long)]
    pub country_code: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,
}

/// Arguments for `tripgate search activity`.
#[derive(Parser, Debug)]
pub struct ActivityArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Kilometres (0-20)
    #[arg(long)]
    pub radius: Option<u32>,
}

/// Arguments for `tripgate search flight`.
#[derive(Parser, Debug)]
pub struct FlightArgs {
    /// IATA code, e.g. MAD
    #[arg(long)]
    pub origin: String,

    #[arg(long)]
    pub destination: String,

    /// YYYY-MM-DD
    #[arg(long)]
    pub departure_date: NaiveDate,

    #[arg(long)]
    pub return_date: Option<NaiveDate>,

    #[arg(long, default_value_t = 1)]
    pub adults: u32,

    #[arg(long)]
    pub travel_class: Option<TravelClass>,

    #[arg(long)]
    pub non_stop: bool,

    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long)]
    pub max: Option<u32>,
}

/// Arguments for `tripgate search hotel`.
#[derive(Parser, Debug)]
pub struct HotelArgs {
    /// Comma-separated hotel ids
    #[arg(long, value_delimiter = ',', required = true)]
    pub hotel_ids: Vec<String>,

    #[arg(long)]
    pub check_in: Option<NaiveDate>,

    #[arg(long)]
    pub check_out: Option<NaiveDate>,

    #[arg(long)]
    pub adults: Option<u32>,

    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Delete expired records
    Sweep,
    /// Delete all records, or those of one domain
    Clear {
        #[arg(long)]
        domain: Option<Domain>,
    },
}
