//! Text rendering of the info panel, forecast view and map marker.

use weathermap_core::{
    AppState, Coordinate, DailySummary, ForecastPanel, ForecastSeries, Palette, Panel, Theme,
    WeatherSnapshot,
};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// ANSI styling from the theme palette. Disabled when `NO_COLOR` is set or output is piped.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    palette: Palette,
    color: bool,
}

impl Style {
    pub fn new(theme: Theme, color: bool) -> Self {
        Self {
            palette: theme.palette(),
            color,
        }
    }

    fn paint(&self, hex: &str, text: &str) -> String {
        match (self.color, hex_rgb(hex)) {
            (true, Some((r, g, b))) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            _ => text.to_string(),
        }
    }

    fn accent(&self, text: &str) -> String {
        self.paint(self.palette.accent, text)
    }

    fn text(&self, text: &str) -> String {
        self.paint(self.palette.text, text)
    }
}

fn hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn round(value: f64) -> i64 {
    value.round() as i64
}

pub fn weather_panel(state: &AppState, style: &Style) -> String {
    let mut out = String::new();

    if let Some(notice) = &state.notice {
        out.push_str(&style.text(&format!("note: {notice}")));
        out.push('\n');
    }

    match state.panel() {
        Panel::Loading => out.push_str("Loading..."),
        Panel::Error(message) => out.push_str(&format!("error: {message}")),
        Panel::Empty => out.push_str("Click on the map to see weather details"),
        Panel::Weather(weather) => out.push_str(&snapshot(weather, style)),
    }
    out
}

fn snapshot(w: &WeatherSnapshot, style: &Style) -> String {
    let mut lines = vec![style.accent(w.display_name())];

    let description = w.condition().map(|c| c.description.as_str()).unwrap_or("");
    lines.push(format!("{}°C  {}", round(w.temperature_c), description).trim_end().to_string());
    lines.push(format!("  Feels Like   {}°C", round(w.feels_like_c)));
    lines.push(format!("  Humidity     {}%", w.humidity_pct));
    lines.push(format!("  Wind Speed   {} m/s", w.wind_speed_mps));
    lines.push(format!("  Pressure     {} hPa", round(w.pressure_hpa)));
    if let Some(km) = w.visibility_km() {
        lines.push(format!("  Visibility   {km:.1} km"));
    }
    if let Some(c) = w.condition() {
        lines.push(format!("  Icon         {}", c.icon_url()));
    }
    lines.push(style.text(&w.coordinate.to_string()));

    lines.join("\n")
}

/// Marker popup for the selected location.
pub fn marker(position: Coordinate) -> String {
    format!(
        "Selected Location\nLat: {:.4}, Lng: {:.4}",
        position.latitude, position.longitude
    )
}

pub fn forecast_view(state: &AppState, style: &Style) -> Option<String> {
    Some(match state.forecast_panel()? {
        ForecastPanel::Loading => "Loading...".to_string(),
        ForecastPanel::Error(message) => format!("error: {message}"),
        ForecastPanel::Forecast(series) => forecast(series, style),
    })
}

fn forecast(series: &ForecastSeries, style: &Style) -> String {
    let mut out = vec![style.accent("5-Day Forecast")];

    let temps: Vec<i64> = series.temperature_series().into_iter().map(|(_, t)| t).collect();
    if !temps.is_empty() {
        out.push(format!("Temperature (°C)  {}", sparkline(&temps)));
    }

    for day in series.daily_summaries() {
        out.push(String::new());
        out.push(day_card(&day, style));
    }
    out.join("\n")
}

fn day_card(day: &DailySummary, style: &Style) -> String {
    let rep = &day.representative;
    let description = rep.condition().map(|c| c.description.as_str()).unwrap_or("");

    let mut lines = vec![
        style.accent(&day.date.format("%A, %b %-d").to_string()),
        format!("  {}°C / {}°C  {}", round(day.max_temp_c), round(day.min_temp_c), description)
            .trim_end()
            .to_string(),
        format!("  Humidity: {}%", rep.humidity_pct),
        format!("  Wind: {} m/s", rep.wind_speed_mps),
    ];
    if let Some(c) = rep.condition() {
        lines.push(format!("  Icon: {}", c.small_icon_url()));
    }
    lines.join("\n")
}

fn sparkline(values: &[i64]) -> String {
    let (Some(min), Some(max)) = (values.iter().min(), values.iter().max()) else {
        return String::new();
    };
    let span = (max - min).max(1) as f64;
    values
        .iter()
        .map(|v| {
            let idx = ((v - min) as f64 / span * (SPARK.len() - 1) as f64).round() as usize;
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect()
}

/// Status line for whatever is still in flight, most upstream first.
pub fn progress(state: &AppState) -> Option<&'static str> {
    if state.geolocating {
        Some("Getting your location...")
    } else if state.search_loading {
        Some("Searching...")
    } else if state.loading {
        Some("Loading weather...")
    } else if state.forecast_loading {
        Some("Loading forecast...")
    } else {
        None
    }
}

pub fn theme(theme: Theme) -> String {
    let tiles = theme.tile_source();
    format!(
        "Theme: {}\nTiles: {}\nAttribution: {}",
        theme.name(),
        tiles.url,
        tiles.attribution
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use weathermap_core::{Condition, ForecastEntry, model::ForecastCity};

    fn weather() -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: "Pretoria".into(),
            coordinate: Coordinate::new(-25.745_81, 28.185_94),
            temperature_c: 24.6,
            feels_like_c: 24.2,
            humidity_pct: 48,
            pressure_hpa: 1018.0,
            wind_speed_mps: 3.6,
            visibility_m: Some(10_000),
            conditions: vec![Condition {
                code: 801,
                icon: "02d".into(),
                description: "few clouds".into(),
            }],
            observation_time: Utc::now(),
        }
    }

    #[test]
    fn weather_panel_formats_readings() {
        let state = AppState {
            weather: Some(weather()),
            ..AppState::default()
        };
        let out = weather_panel(&state, &Style::new(Theme::Light, false));

        assert!(out.starts_with("Pretoria\n25°C  few clouds"));
        assert!(out.contains("Feels Like   24°C"));
        assert!(out.contains("Humidity     48%"));
        assert!(out.contains("Wind Speed   3.6 m/s"));
        assert!(out.contains("Pressure     1018 hPa"));
        assert!(out.contains("Visibility   10.0 km"));
        assert!(out.contains("02d@2x.png"));
        assert!(out.ends_with("Lat: -25.7458, Lon: 28.1859"));
    }

    #[test]
    fn weather_panel_priority() {
        let style = Style::new(Theme::Dark, false);
        let mut state = AppState {
            weather: Some(weather()),
            error: Some("City \"X\" not found".into()),
            ..AppState::default()
        };
        assert_eq!(weather_panel(&state, &style), "error: City \"X\" not found");

        state.loading = true;
        assert_eq!(weather_panel(&state, &style), "Loading...");

        let empty = AppState::default();
        assert_eq!(
            weather_panel(&empty, &style),
            "Click on the map to see weather details"
        );
    }

    #[test]
    fn notice_is_shown_above_panel() {
        let state = AppState {
            notice: Some("Geolocation is not supported on this system".into()),
            ..AppState::default()
        };
        let out = weather_panel(&state, &Style::new(Theme::Light, false));
        assert!(out.starts_with("note: Geolocation is not supported"));
    }

    #[test]
    fn forecast_view_renders_day_cards() {
        let entry = |ts: i64, temp: f64| ForecastEntry {
            time: Utc.timestamp_opt(ts, 0).unwrap(),
            temperature_c: temp,
            feels_like_c: temp,
            humidity_pct: 70,
            pressure_hpa: 1009.0,
            wind_speed_mps: 5.1,
            visibility_m: None,
            conditions: vec![Condition {
                code: 500,
                icon: "10d".into(),
                description: "light rain".into(),
            }],
        };
        let series = ForecastSeries {
            city: ForecastCity {
                name: "London".into(),
                country: "GB".into(),
                coordinate: Coordinate::new(51.5, -0.09),
                utc_offset_secs: 0,
            },
            // Monday 2024-01-01
            entries: vec![entry(1_704_096_000, 8.4), entry(1_704_106_800, 11.6)],
        };
        let state = AppState {
            forecast_open: true,
            forecast: Some(series),
            ..AppState::default()
        };

        let out = forecast_view(&state, &Style::new(Theme::Light, false)).unwrap();
        assert!(out.starts_with("5-Day Forecast"));
        assert!(out.contains("Monday, Jan 1"));
        assert!(out.contains("12°C / 8°C  light rain"));
        assert!(out.contains("Wind: 5.1 m/s"));
        assert!(out.contains("img/wn/10d.png"));
    }

    #[test]
    fn closed_forecast_renders_nothing() {
        assert_eq!(forecast_view(&AppState::default(), &Style::new(Theme::Light, false)), None);
    }

    #[test]
    fn sparkline_spans_range() {
        assert_eq!(sparkline(&[0, 7]), "▁█");
        assert_eq!(sparkline(&[3, 3]), "▁▁");
        assert_eq!(sparkline(&[]), "");
    }

    #[test]
    fn colors_follow_palette() {
        let style = Style::new(Theme::Dark, true);
        assert_eq!(style.accent("x"), "\x1b[38;2;144;202;249mx\x1b[0m");
        assert_eq!(hex_rgb("rgba(0,0,0,0.1)"), None);
    }

    #[test]
    fn marker_popup() {
        assert_eq!(
            marker(Coordinate::new(51.505, -0.09)),
            "Selected Location\nLat: 51.5050, Lng: -0.0900"
        );
    }

    #[test]
    fn progress_names_the_pending_step() {
        let mut state = AppState {
            geolocating: true,
            loading: true,
            ..AppState::default()
        };
        assert_eq!(progress(&state), Some("Getting your location..."));

        state.geolocating = false;
        assert_eq!(progress(&state), Some("Loading weather..."));

        state.loading = false;
        state.search_loading = true;
        assert_eq!(progress(&state), Some("Searching..."));

        state.search_loading = false;
        assert_eq!(progress(&state), None);
    }

    #[test]
    fn theme_lists_tiles() {
        assert!(theme(Theme::Dark).contains("dark_all"));
        assert!(theme(Theme::Light).starts_with("Theme: light"));
    }
}
