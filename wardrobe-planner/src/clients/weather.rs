//! Weather lookup
//!
//! Lookups never fail past this module: providers return `None` and log a
//! warning instead.

use super::{build_http_client, check_status, ClientError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use wardrobe_common::models::WeatherSnapshot;

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Where to look up weather
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherLocation {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl fmt::Display for WeatherLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherLocation::City(name) => f.write_str(name),
            WeatherLocation::Coords { lat, lon } => write!(f, "{:.4},{:.4}", lat, lon),
        }
    }
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    /// Temperature in °C
    pub temp: f64,
    /// Normalized condition: clear, cloudy, rainy, snowy, ...
    pub condition: String,
    pub description: String,
    /// Relative humidity in percent
    pub humidity: f64,
    pub wind_speed: f64,
    pub location: String,
}

impl WeatherReport {
    /// Part of the report used by outfit generation
    pub fn snapshot(&self) -> WeatherSnapshot {
        WeatherSnapshot {
            temp: self.temp,
            condition: self.condition.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!("{}, temp={}C", self.description, self.temp)
    }
}

/// Clothing hints derived from a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecommendation {
    pub outerwear: bool,
    pub light_clothes: bool,
    pub rain_gear: bool,
    pub layers: bool,
}

pub fn recommend(report: &WeatherReport) -> WeatherRecommendation {
    WeatherRecommendation {
        outerwear: report.temp < 15.0,
        light_clothes: report.temp > 25.0,
        rain_gear: report.condition == "rainy",
        layers: (15.0..=25.0).contains(&report.temp),
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Look up current weather; `None` when unavailable for any reason
    async fn fetch_weather(&self, location: &WeatherLocation) -> Option<WeatherReport>;
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    #[serde(default)]
    weather: Vec<OwCondition>,
    main: OwMain,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    name: String,
}

/// Map an OpenWeather condition group to the planner's vocabulary
fn normalize_condition(main: &str) -> String {
    match main.to_ascii_lowercase().as_str() {
        "rain" | "drizzle" | "thunderstorm" => "rainy".to_string(),
        "clouds" => "cloudy".to_string(),
        "snow" => "snowy".to_string(),
        "clear" => "clear".to_string(),
        other => other.to_string(),
    }
}

/// OpenWeather current-conditions client (metric units)
pub struct OpenWeatherClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Query current weather, surfacing the failure reason
    pub async fn lookup(&self, location: &WeatherLocation) -> Result<WeatherReport, ClientError> {
        let url = format!("{}/weather", self.base_url.trim_end_matches('/'));
        let mut query: Vec<(&str, String)> = vec![
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        match location {
            WeatherLocation::City(name) => query.push(("q", name.clone())),
            WeatherLocation::Coords { lat, lon } => {
                query.push(("lat", lat.to_string()));
                query.push(("lon", lon.to_string()));
            }
        }

        debug!(location = %location, "Querying OpenWeather");
        let response = self.http_client.get(&url).query(&query).send().await?;
        let body: OwResponse = check_status(response).await?.json().await?;

        let (condition, description) = match body.weather.first() {
            Some(w) => (normalize_condition(&w.main), w.description.clone()),
            None => ("clear".to_string(), String::new()),
        };
        let location_name = if body.name.is_empty() {
            location.to_string()
        } else {
            body.name
        };

        Ok(WeatherReport {
            temp: body.main.temp,
            condition,
            description,
            humidity: body.main.humidity,
            wind_speed: body.wind.speed,
            location: location_name,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_weather(&self, location: &WeatherLocation) -> Option<WeatherReport> {
        match self.lookup(location).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("OpenWeather lookup for {} failed: {}", location, e);
                None
            }
        }
    }
}

/// Built-in weather table for offline use
#[derive(Debug, Clone, Default)]
pub struct StaticWeatherProvider;

impl StaticWeatherProvider {
    const TABLE: &'static [(&'static str, f64, &'static str, &'static str, f64, f64, &'static str)] = &[
        ("new york", 18.0, "cloudy", "Partly Cloudy", 65.0, 12.0, "New York"),
        ("london", 12.0, "rainy", "Light Rain", 80.0, 15.0, "London"),
        ("paris", 16.0, "clear", "Clear Sky", 55.0, 8.0, "Paris"),
        ("tokyo", 22.0, "clear", "Sunny", 60.0, 10.0, "Tokyo"),
        ("mumbai", 28.0, "clear", "Hot and Sunny", 70.0, 5.0, "Mumbai"),
    ];

    fn pleasant(location: String) -> WeatherReport {
        WeatherReport {
            temp: 20.0,
            condition: "clear".to_string(),
            description: "Pleasant Weather".to_string(),
            humidity: 60.0,
            wind_speed: 10.0,
            location,
        }
    }

    pub fn lookup(&self, location: &WeatherLocation) -> WeatherReport {
        match location {
            WeatherLocation::City(name) => {
                let key = name.trim().to_lowercase();
                Self::TABLE
                    .iter()
                    .find(|row| row.0 == key)
                    .map(
                        |&(_, temp, condition, description, humidity, wind_speed, display)| {
                            WeatherReport {
                                temp,
                                condition: condition.to_string(),
                                description: description.to_string(),
                                humidity,
                                wind_speed,
                                location: display.to_string(),
                            }
                        },
                    )
                    .unwrap_or_else(|| Self::pleasant(name.clone()))
            }
            WeatherLocation::Coords { .. } => Self::pleasant("Your Location".to_string()),
        }
    }
}

#[async_trait]
impl WeatherProvider for StaticWeatherProvider {
    async fn fetch_weather(&self, location: &WeatherLocation) -> Option<WeatherReport> {
        Some(self.lookup(location))
    }
}
