//! Typed search queries for each upstream domain.

use std::time::Duration;

use bon::Builder;
use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::{GatewayError, Result};
use crate::types::Domain;

/// A lookup the [`SearchService`](super::SearchService) can cache and
/// deduplicate.
pub trait SearchQuery: Send + Sync {
    fn domain(&self) -> Domain;

    /// Endpoint path relative to the upstream base URL.
    fn path(&self) -> &str;

    fn method(&self) -> Method {
        Method::GET
    }

    /// Parameters in upstream naming. For `GET` they form the query string.
    fn params(&self) -> Result<Value>;

    fn body(&self) -> Option<Value> {
        None
    }

    /// Overrides the domain's default cache lifetime.
    fn ttl(&self) -> Option<Duration> {
        None
    }

    /// Overrides the executor's default deadline.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LocationSubType {
    Airport,
    City,
}

/// Flight offers between two airports or cities.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tripgate::search::{FlightSearch, SearchQuery};
///
/// let query = FlightSearch::builder()
///     .origin_location_code("MAD")
///     .destination_location_code("JFK")
///     .departure_date(NaiveDate::from_ymd_opt(2026, 12, 1).unwrap())
///     .adults(1)
///     .build();
/// assert_eq!(query.path(), "/v2/shopping/flight-offers");
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearch {
    #[builder(into)]
    pub origin_location_code: String,
    #[builder(into)]
    pub destination_location_code: String,
    pub departure_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_class: Option<TravelClass>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_airline_codes: Vec<String>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_airline_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_stop: Option<bool>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl SearchQuery for FlightSearch {
    fn domain(&self) -> Domain {
        Domain::Flight
    }

    fn path(&self) -> &str {
        "/v2/shopping/flight-offers"
    }

    fn params(&self) -> Result<Value> {
        require_code("originLocationCode", &self.origin_location_code)?;
        require_code("destinationLocationCode", &self.destination_location_code)?;
        if !(1..=9).contains(&self.adults) {
            return Err(GatewayError::InvalidArgument(format!(
                "adults must be between 1 and 9, got {}",
                self.adults
            )));
        }
        if self.return_date.is_some_and(|ret| ret < self.departure_date) {
            return Err(GatewayError::InvalidArgument(
                "returnDate must not be before departureDate".into(),
            ));
        }
        Ok(serde_json::to_value(self)?)
    }
}

/// Offers for a set of known hotels.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelSearch {
    pub hotel_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_quantity: Option<u32>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_rate_only: Option<bool>,
}

impl SearchQuery for HotelSearch {
    fn domain(&self) -> Domain {
        Domain::Hotel
    }

    fn path(&self) -> &str {
        "/v3/shopping/hotel-offers"
    }

    fn params(&self) -> Result<Value> {
        if self.hotel_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(GatewayError::InvalidArgument(
                "hotelIds must contain at least one id".into(),
            ));
        }
        if let (Some(check_in), Some(check_out)) = (self.check_in_date, self.check_out_date) {
            if check_out <= check_in {
                return Err(GatewayError::InvalidArgument(
                    "checkOutDate must be after checkInDate".into(),
                ));
            }
        }
        Ok(serde_json::to_value(self)?)
    }
}

/// Airports and cities matching a keyword.
///
/// # Example
/// ```
/// use tripgate::search::{LocationSearch, LocationSubType, SearchQuery};
///
/// let query = LocationSearch::builder()
///     .keyword("Paris")
///     .sub_type(vec![LocationSubType::City, LocationSubType::Airport])
///     .build();
/// let params = query.params().unwrap();
/// assert_eq!(params["subType"], serde_json::json!(["CITY", "AIRPORT"]));
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearch {
    #[builder(into)]
    pub keyword: String,
    #[builder(default = vec![LocationSubType::City, LocationSubType::Airport])]
    pub sub_type: Vec<LocationSubType>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "page[limit]", skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    #[serde(rename = "page[offset]", skip_serializing_if = "Option::is_none")]
    pub page_offset: Option<u32>,
}

impl SearchQuery for LocationSearch {
    fn domain(&self) -> Domain {
        Domain::Location
    }

    fn path(&self) -> &str {
        "/v1/reference-data/locations"
    }

    fn params(&self) -> Result<Value> {
        if self.keyword.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("keyword must not be empty".into()));
        }
        if self.sub_type.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "subType must name at least one location type".into(),
            ));
        }
        Ok(serde_json::to_value(self)?)
    }
}

/// Tours and activities around a point.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySearch {
    pub latitude: f64,
    pub longitude: f64,
    /// Kilometres, 0 to 20 upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
}

impl SearchQuery for ActivitySearch {
    fn domain(&self) -> Domain {
        Domain::Activity
    }

    fn path(&self) -> &str {
        "/v1/shopping/activities"
    }

    fn params(&self) -> Result<Value> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GatewayError::InvalidArgument(format!(
                "coordinates out of range: {}, {}",
                self.latitude, self.longitude
            )));
        }
        if self.radius.is_some_and(|r| r > 20) {
            return Err(GatewayError::InvalidArgument(
                "radius must be at most 20 km".into(),
            ));
        }
        Ok(serde_json::to_value(self)?)
    }
}

/// Any endpoint, with caller-supplied parameters.
///
/// # Example
/// ```
/// use serde_json::json;
/// use tripgate::search::{RawQuery, SearchQuery};
/// use tripgate::types::Domain;
///
/// let query = RawQuery::builder()
///     .domain(Domain::Location)
///     .path("/v1/reference-data/locations/cities")
///     .params(json!({"keyword": "PAR"}))
///     .build();
/// assert_eq!(query.method(), reqwest::Method::GET);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct RawQuery {
    pub domain: Domain,
    #[builder(into)]
    pub path: String,
    #[builder(default = Method::GET)]
    pub method: Method,
    #[builder(default = Value::Object(Default::default()))]
    pub params: Value,
    pub body: Option<Value>,
    pub ttl: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl SearchQuery for RawQuery {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> Method {
        self.method.clone()
    }

    fn params(&self) -> Result<Value> {
        match &self.params {
            Value::Object(_) | Value::Null => Ok(self.params.clone()),
            other => Err(GatewayError::InvalidArgument(format!(
                "query parameters must be an object, got {other}"
            ))),
        }
    }

    fn body(&self) -> Option<Value> {
        self.body.clone()
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn require_code(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn flight_params_use_upstream_names() {
        let query = FlightSearch::builder()
            .origin_location_code("MAD")
            .destination_location_code("JFK")
            .departure_date(date(2026, 12, 1))
            .adults(2)
            .non_stop(true)
            .included_airline_codes(vec!["IB".into(), "AA".into()])
            .build();

        assert_eq!(
            query.params().unwrap(),
            json!({
                "originLocationCode": "MAD",
                "destinationLocationCode": "JFK",
                "departureDate": "2026-12-01",
                "adults": 2,
                "includedAirlineCodes": ["IB", "AA"],
                "nonStop": true,
            })
        );
    }

    #[test]
    fn flight_rejects_bad_passenger_counts_and_dates() {
        let too_many = FlightSearch::builder()
            .origin_location_code("MAD")
            .destination_location_code("JFK")
            .departure_date(date(2026, 12, 1))
            .adults(10)
            .build();
        assert!(matches!(too_many.params(), Err(GatewayError::InvalidArgument(_))));

        let backwards = FlightSearch::builder()
            .origin_location_code("MAD")
            .destination_location_code("JFK")
            .departure_date(date(2026, 12, 10))
            .return_date(date(2026, 12, 1))
            .adults(1)
            .build();
        assert!(backwards.params().is_err());
    }

    #[test]
    fn location_defaults_to_cities_and_airports() {
        let query = LocationSearch::builder().keyword("Paris").page_limit(5).build();
        assert_eq!(
            query.params().unwrap(),
            json!({
                "keyword": "Paris",
                "subType": ["CITY", "AIRPORT"],
                "page[limit]": 5,
            })
        );
        assert!(LocationSearch::builder().keyword(" ").build().params().is_err());
    }

    #[test]
    fn hotel_requires_ids_and_ordered_dates() {
        let empty = HotelSearch::builder().hotel_ids(Vec::new()).build();
        assert!(empty.params().is_err());

        let inverted = HotelSearch::builder()
            .hotel_ids(vec!["MCLONGHM".into()])
            .check_in_date(date(2026, 12, 3))
            .check_out_date(date(2026, 12, 3))
            .build();
        assert!(inverted.params().is_err());
    }

    #[test]
    fn activity_validates_coordinates() {
        let ok = ActivitySearch::builder()
            .latitude(41.397158)
            .longitude(2.160873)
            .radius(1)
            .build();
        assert_eq!(
            ok.params().unwrap(),
            json!({"latitude": 41.397158, "longitude": 2.160873, "radius": 1})
        );
        let bad = ActivitySearch::builder().latitude(123.0).longitude(0.0).build();
        assert!(bad.params().is_err());
    }

    #[test]
    fn raw_query_rejects_non_object_params() {
        let query = RawQuery::builder()
            .domain(Domain::Activity)
            .path("/v1/shopping/activities/by-square")
            .params(json!([1, 2]))
            .build();
        assert!(query.params().is_err());
    }

    #[test]
    fn travel_class_parses_case_insensitively() {
        assert_eq!("business".parse::<TravelClass>().unwrap(), TravelClass::Business);
        assert_eq!(TravelClass::PremiumEconomy.to_string(), "PREMIUM_ECONOMY");
    }
}
