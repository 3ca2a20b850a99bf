//! CLI command handlers.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::cache::{FileDurableStore, TieredCache};
use crate::cli::{
    ActivityArgs, CacheCommands, FlightArgs, HotelArgs, LocationArgs, SearchCommands,
};
use crate::config::GatewayConfig;
use crate::search::{
    ActivitySearch, FlightSearch, HotelSearch, LocationSearch, SearchService,
};
use crate::types::SearchPayload;
use crate::util::{GatewayStats, SystemClock};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Configuration from `--config-file`, or from the environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => GatewayConfig::load_file(path)?,
        None => GatewayConfig::from_env()?,
    };
    Ok(config)
}

/// Handle `tripgate search <domain> ...`.
pub async fn handle_search(config: &GatewayConfig, command: SearchCommands) -> CliResult {
    let service = SearchService::from_config(config)?;
    let payload = match command {
        SearchCommands::Location(args) => service.search(&location_query(args)).await?,
        SearchCommands::Activity(args) => service.search(&activity_query(args)).await?,
        SearchCommands::Flight(args) => service.search(&flight_query(args)).await?,
        SearchCommands::Hotel(args) => service.search(&hotel_query(args)).await?,
    };
    print_payload(&payload)?;
    tracing::debug!(stats = ?service.stats(), "Search finished");
    Ok(())
}

/// Handle `tripgate cache sweep|clear`.
pub async fn handle_cache(config: &GatewayConfig, command: CacheCommands) -> CliResult {
    let cache = TieredCache::new(
        Arc::new(FileDurableStore::new(config.cache_dir.clone())),
        config.cache,
        Arc::new(SystemClock),
        GatewayStats::new(),
    );
    let removed = match command {
        CacheCommands::Sweep => cache.sweep_expired().await?,
        CacheCommands::Clear { domain } => cache.clear(domain).await?,
    };
    tracing::info!(removed, dir = %config.cache_dir.display(), "Cache maintenance finished");
    println!("{}", serde_json::to_string_pretty(&json!({ "removed": removed }))?);
    Ok(())
}

/// Handle `tripgate config`.
pub fn handle_config(config: &GatewayConfig) -> CliResult {
    println!("{config:#?}");
    Ok(())
}

fn print_payload(payload: &SearchPayload) -> CliResult {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

fn location_query(args: LocationArgs) -> LocationSearch {
    let query = LocationSearch::builder()
        .keyword(args.keyword)
        .maybe_country_code(args.country_code)
        .maybe_page_limit(args.limit);
    if args.sub_type.is_empty() {
        query.build()
    } else {
        query.sub_type(args.sub_type).build()
    }
}

fn activity_query(args: ActivityArgs) -> ActivitySearch {
    ActivitySearch::builder()
        .latitude(args.latitude)
        .longitude(args.longitude)
        .maybe_radius(args.radius)
        .build()
}

fn flight_query(args: FlightArgs) -> FlightSearch {
    FlightSearch::builder()
        .origin_location_code(args.origin)
        .destination_location_code(args.destination)
        .departure_date(args.departure_date)
        .maybe_return_date(args.return_date)
        .adults(args.adults)
        .maybe_travel_class(args.travel_class)
        .maybe_non_stop(args.non_stop.then_some(true))
        .maybe_currency_code(args.currency)
        .maybe_max(args.max)
        .build()
}

fn hotel_query(args: HotelArgs) -> HotelSearch {
    HotelSearch::builder()
        .hotel_ids(args.hotel_ids)
        .maybe_check_in_date(args.check_in)
        .maybe_check_out_date(args.check_out)
        .maybe_adults(args.adults)
        .maybe_currency(args.currency)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{LocationSubType, SearchQuery};

    #[test]
    fn location_query_keeps_default_sub_types_when_none_given() {
        let query = location_query(LocationArgs {
            keyword: "Rome".into(),
            sub_type: Vec::new(),
            country_code: Some("IT".into()),
            limit: None,
        });
        assert_eq!(
            query.sub_type,
            vec![LocationSubType::City, LocationSubType::Airport]
        );
        assert_eq!(query.country_code.as_deref(), Some("IT"));
        assert_eq!(query.path(), "/v1/reference-data/locations");
    }

    #[test]
    fn flight_query_only_sends_non_stop_when_set() {
        let args = FlightArgs {
            origin: "MAD".into(),
            destination: "JFK".into(),
            departure_date: chrono::NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            return_date: None,
            adults: 1,
            travel_class: None,
            non_stop: false,
            currency: None,
            max: None,
        };
        assert_eq!(flight_query(args).non_stop, None);
    }
}
