//! Forecast data model: one immutable record per `(location, timestamp)`,
//! plus the ordered collection [`ForecastCollection`] returned by
//! [`crate::forecast::client::ForecastClient::fetch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single hourly forecast, normalized to `Asia/Tokyo` at parse time.
///
/// `datetime` is stored as `DateTime<Utc>` (an absolute instant); the
/// timezone normalization this type's invariant refers to is about *which*
/// wall-clock hour a JSON timestamp was interpreted against when parsed,
/// not about the storage representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub datetime: DateTime<Utc>,
    pub temperature: f64,
    pub weather_code: String,
    pub weather_description: String,
    pub precipitation_mm: f64,
    pub humidity_pct: f64,
    pub wind_speed_mps: f64,
    pub wind_direction_deg: f64,
}

impl Forecast {
    /// All numeric fields finite, per the data-model invariant.
    pub fn is_valid(&self) -> bool {
        self.temperature.is_finite()
            && self.precipitation_mm.is_finite()
            && self.humidity_pct.is_finite()
            && self.wind_speed_mps.is_finite()
            && self.wind_direction_deg.is_finite()
    }
}

/// An ordered sequence of forecasts for one location. Invariant: strictly
/// increasing datetimes, no duplicates — enforced by [`ForecastCollection::new`],
/// which sorts and dedups on construction rather than trusting callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCollection {
    pub location_name: String,
    pub forecasts: Vec<Forecast>,
}

impl ForecastCollection {
    pub fn new(location_name: impl Into<String>, mut forecasts: Vec<Forecast>) -> Self {
        forecasts.sort_by_key(|f| f.datetime);
        forecasts.dedup_by_key(|f| f.datetime);
        Self {
            location_name: location_name.into(),
            forecasts,
        }
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.forecasts.windows(2).all(|w| w[0].datetime < w[1].datetime)
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(hour: u32, temp: f64) -> Forecast {
        Forecast {
            datetime: "2026-07-29T00:00:00Z"
                .parse::<DateTime<Utc>>()
                .unwrap()
                + chrono::Duration::hours(hour as i64),
            temperature: temp,
            weather_code: "100".to_string(),
            weather_description: "sunny".to_string(),
            precipitation_mm: 0.0,
            humidity_pct: 50.0,
            wind_speed_mps: 1.0,
            wind_direction_deg: 180.0,
        }
    }

    #[test]
    fn new_sorts_and_dedups() {
        let collection = ForecastCollection::new("東京", vec![f(2, 1.0), f(1, 2.0), f(1, 2.0)]);
        assert_eq!(collection.forecasts.len(), 2);
        assert!(collection.is_strictly_increasing());
    }

    #[test]
    fn is_valid_rejects_non_finite_fields() {
        let mut forecast = f(0, f64::NAN);
        assert!(!forecast.is_valid());
        forecast.temperature = 10.0;
        assert!(forecast.is_valid());
    }
}
