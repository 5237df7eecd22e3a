use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Number of calendar days shown in the forecast view.
pub const MAX_FORECAST_DAYS: usize = 5;

/// A latitude/longitude pair. Values are passed through as given; no range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Whether both coordinates render identically at 4 decimal places.
    pub fn same_display_position(&self, other: &Coordinate) -> bool {
        format!("{:.4}", self.latitude) == format!("{:.4}", other.latitude)
            && format!("{:.4}", self.longitude) == format!("{:.4}", other.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {:.4}, Lon: {:.4}", self.latitude, self.longitude)
    }
}

/// One weather condition reported by the provider (OpenWeather returns a list, first is primary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub code: u32,
    pub icon: String,
    pub description: String,
}

impl Condition {
    pub fn icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}@2x.png", self.icon)
    }

    pub fn small_icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}.png", self.icon)
    }
}

/// Current weather at a coordinate. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub coordinate: Coordinate,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: f64,
    pub wind_speed_mps: f64,
    pub visibility_m: Option<u32>,
    pub conditions: Vec<Condition>,
    pub observation_time: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn display_name(&self) -> &str {
        if self.location_name.trim().is_empty() {
            "Unknown Location"
        } else {
            &self.location_name
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }

    /// Visibility in kilometres; zero or missing visibility is not shown.
    pub fn visibility_km(&self) -> Option<f64> {
        self.visibility_m.filter(|m| *m > 0).map(|m| f64::from(m) / 1000.0)
    }
}

/// One 3-hour step of the 5-day forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: f64,
    pub wind_speed_mps: f64,
    pub visibility_m: Option<u32>,
    pub conditions: Vec<Condition>,
}

impl ForecastEntry {
    pub fn condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    pub name: String,
    pub country: String,
    pub coordinate: Coordinate,
    /// Shift in seconds from UTC, as reported by the provider.
    pub utc_offset_secs: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city: ForecastCity,
    pub entries: Vec<ForecastEntry>,
}

/// Forecast entries folded into one card per calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    /// First entry of the day; supplies icon, description, humidity and wind for the card.
    pub representative: ForecastEntry,
}

impl ForecastSeries {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.city.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    /// Group entries by the city's local calendar day, in order of first appearance.
    pub fn daily_summaries(&self) -> Vec<DailySummary> {
        let offset = self.offset();
        let mut days: Vec<DailySummary> = Vec::new();

        for entry in &self.entries {
            let date = entry.time.with_timezone(&offset).date_naive();
            let temp = entry.temperature_c;

            match days.iter_mut().find(|d| d.date == date) {
                Some(day) => {
                    day.min_temp_c = day.min_temp_c.min(temp);
                    day.max_temp_c = day.max_temp_c.max(temp);
                }
                None => days.push(DailySummary {
                    date,
                    min_temp_c: temp,
                    max_temp_c: temp,
                    representative: entry.clone(),
                }),
            }
        }

        days.truncate(MAX_FORECAST_DAYS);
        days
    }

    /// Chart points: entry time and temperature rounded to whole degrees.
    pub fn temperature_series(&self) -> Vec<(DateTime<Utc>, i64)> {
        self.entries.iter().map(|e| (e.time, e.temperature_c.round() as i64)).collect()
    }

    /// Convert a UTC instant to the city's local time.
    pub fn local_time(&self, time: DateTime<Utc>) -> DateTime<FixedOffset> {
        time.with_timezone(&self.offset())
    }
}

/// One match of a place-name search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCandidate {
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub coordinate: Coordinate,
}

impl CityCandidate {
    pub fn label(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}

impl fmt::Display for CityCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(ts: i64, temp: f64, icon: &str) -> ForecastEntry {
        ForecastEntry {
            time: Utc.timestamp_opt(ts, 0).unwrap(),
            temperature_c: temp,
            feels_like_c: temp,
            humidity_pct: 50,
            pressure_hpa: 1012.0,
            wind_speed_mps: 3.0,
            visibility_m: None,
            conditions: vec![Condition {
                code: 800,
                icon: icon.to_string(),
                description: "clear sky".to_string(),
            }],
        }
    }

    fn series(offset: i32, entries: Vec<ForecastEntry>) -> ForecastSeries {
        ForecastSeries {
            city: ForecastCity {
                name: "Pretoria".into(),
                country: "ZA".into(),
                coordinate: Coordinate::new(-25.7458, 28.1859),
                utc_offset_secs: offset,
            },
            entries,
        }
    }

    #[test]
    fn coordinate_displays_four_decimals() {
        let c = Coordinate::new(-25.745_812, 28.185_94);
        assert_eq!(c.to_string(), "Lat: -25.7458, Lon: 28.1859");
    }

    #[test]
    fn same_display_position_ignores_sub_display_noise() {
        let a = Coordinate::new(51.505_01, -0.090_01);
        let b = Coordinate::new(51.505_02, -0.090_02);
        assert!(a.same_display_position(&b));
        assert!(!a.same_display_position(&Coordinate::new(51.506, -0.09)));
    }

    #[test]
    fn daily_summaries_track_min_max_and_first_entry() {
        // 2024-01-01 00:00 UTC and following 3h steps
        let base = 1_704_067_200;
        let s = series(
            0,
            vec![
                entry(base, 20.0, "01d"),
                entry(base + 3 * 3600, 25.5, "02d"),
                entry(base + 6 * 3600, 18.2, "03d"),
                entry(base + 24 * 3600, 10.0, "10d"),
            ],
        );

        let days = s.daily_summaries();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].min_temp_c, 18.2);
        assert_eq!(days[0].max_temp_c, 25.5);
        assert_eq!(days[0].representative.condition().unwrap().icon, "01d");
        assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn daily_summaries_use_city_offset() {
        // 22:00 UTC is already the next day at UTC+2
        let base = 1_704_067_200 + 22 * 3600;
        let s = series(7200, vec![entry(base, 15.0, "01n")]);

        let days = s.daily_summaries();
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn daily_summaries_cap_at_five_days() {
        let base = 1_704_067_200;
        let entries = (0..7).map(|d| entry(base + d * 86_400, 10.0, "01d")).collect();
        assert_eq!(series(0, entries).daily_summaries().len(), MAX_FORECAST_DAYS);
    }

    #[test]
    fn temperature_series_rounds() {
        let s = series(0, vec![entry(1_704_067_200, 20.6, "01d"), entry(1_704_078_000, -0.4, "01d")]);
        let points: Vec<i64> = s.temperature_series().into_iter().map(|(_, t)| t).collect();
        assert_eq!(points, vec![21, 0]);
    }

    #[test]
    fn snapshot_display_helpers() {
        let snapshot = WeatherSnapshot {
            location_name: String::new(),
            coordinate: Coordinate::new(0.0, 0.0),
            temperature_c: 1.0,
            feels_like_c: 1.0,
            humidity_pct: 1,
            pressure_hpa: 1000.0,
            wind_speed_mps: 1.0,
            visibility_m: Some(0),
            conditions: vec![],
            observation_time: Utc::now(),
        };

        assert_eq!(snapshot.display_name(), "Unknown Location");
        assert_eq!(snapshot.visibility_km(), None);
        assert!(snapshot.condition().is_none());

        let with_visibility = WeatherSnapshot { visibility_m: Some(8500), ..snapshot };
        assert_eq!(with_visibility.visibility_km(), Some(8.5));
    }

    #[test]
    fn candidate_label_skips_missing_state() {
        let mut c = CityCandidate {
            name: "Springfield".into(),
            state: Some("Illinois".into()),
            country: "US".into(),
            coordinate: Coordinate::new(39.8, -89.64),
        };
        assert_eq!(c.label(), "Springfield, Illinois, US");

        c.state = None;
        assert_eq!(c.to_string(), "Springfield, US");
    }

    #[test]
    fn icon_urls() {
        let c = Condition { code: 500, icon: "10d".into(), description: "light rain".into() };
        assert_eq!(c.icon_url(), "https://openweathermap.org/img/wn/10d@2x.png");
        assert_eq!(c.small_icon_url(), "https://openweathermap.org/img/wn/10d.png");
    }
}
