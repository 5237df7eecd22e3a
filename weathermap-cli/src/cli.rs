use std::{io::IsTerminal, process::ExitCode, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Select};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use weathermap_core::{
    Config, Coordinate, FileThemeStorage, GeolocationSource, LocationWorkflow, Phase, SearchOutcome,
    Store, ThemeStore, WorkflowError,
};

use crate::render::{self, Style};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathermap", version, about = "Weather map in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and startup location preferences.
    Configure,

    /// Locate this machine (or use the default position) and show the weather there.
    Show,

    /// Show weather at a coordinate, as if it was clicked on the map.
    Click {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Search for a city by name.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Pick the n-th candidate (starting at 1) instead of prompting.
        #[arg(long)]
        pick: Option<usize>,
    },

    /// Show the 5-day forecast for a coordinate, or for the startup location.
    Forecast {
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Show the map theme and its tile source.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ThemeAction {
    /// Switch between light and dark.
    Toggle,
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Command::Configure => configure(),
            Command::Theme { action } => {
                let themes = theme_store()?;
                if action == Some(ThemeAction::Toggle) {
                    themes.toggle();
                }
                println!("{}", render::theme(themes.theme()));
                Ok(ExitCode::SUCCESS)
            }
            Command::Show => Session::open()?.show().await,
            Command::Click { lat, lon } => Session::open()?.click(Coordinate::new(lat, lon)).await,
            Command::Search { query, pick } => Session::open()?.search(&query.join(" "), pick).await,
            Command::Forecast { lat, lon } => {
                let at = lat.zip(lon).map(|(lat, lon)| Coordinate::new(lat, lon));
                Session::open()?.forecast(at).await
            }
        }
    }
}

fn theme_store() -> Result<ThemeStore> {
    Ok(ThemeStore::new(FileThemeStorage::new(Config::theme_file_path()?)))
}

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn configure() -> Result<ExitCode> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    config.set_api_key(api_key);

    let sources = vec![
        "ip    - approximate position from this machine's IP address",
        "fixed - always start at a position you enter now",
        "none  - always start at the default position",
    ];
    let choice = Select::new("Startup location:", sources).raw_prompt()?;
    config.geolocation.source = match choice.index {
        0 => GeolocationSource::Ip,
        1 => GeolocationSource::Fixed,
        _ => GeolocationSource::None,
    };

    if config.geolocation.source == GeolocationSource::Fixed {
        let latitude = CustomType::<f64>::new("Latitude:").prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:").prompt()?;
        config.geolocation.position = Some(Coordinate::new(latitude, longitude));
    }

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

struct Session {
    workflow: LocationWorkflow,
    style: Style,
}

impl Session {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let workflow = LocationWorkflow::from_config(&config, Arc::new(Store::new()))?;
        let themes = theme_store()?;

        Ok(Self::new(workflow, Style::new(themes.theme(), use_color())))
    }

    fn new(workflow: LocationWorkflow, style: Style) -> Self {
        Self { workflow, style }
    }

    async fn show(&self) -> Result<ExitCode> {
        let progress = Progress::watch(self.workflow.store());
        let result = self.workflow.start().await.map(|_| ());
        drop(progress);

        Ok(exit(self.print_location(result)))
    }

    async fn click(&self, coordinate: Coordinate) -> Result<ExitCode> {
        let progress = Progress::watch(self.workflow.store());
        let result = self.workflow.map_click(coordinate).await;
        drop(progress);

        Ok(exit(self.print_location(result)))
    }

    /// Current weather and forecast are fetched independently; one failing does not skip the other.
    async fn forecast(&self, at: Option<Coordinate>) -> Result<ExitCode> {
        let progress = Progress::watch(self.workflow.store());
        // Both paths set the position before fetching, so the forecast has one even if weather failed.
        let located = match at {
            Some(coordinate) => self.workflow.map_click(coordinate).await,
            None => self.workflow.start().await.map(|_| ()),
        };
        let forecast = self.workflow.open_forecast().await;
        drop(progress);

        let location_ok = self.print_location(located);
        let state = self.workflow.store().snapshot();
        if let Some(view) = render::forecast_view(&state, &self.style) {
            println!("\n{view}");
        }
        Ok(exit(location_ok && succeeded(&forecast)))
    }

    async fn search(&self, query: &str, pick: Option<usize>) -> Result<ExitCode> {
        let progress = Progress::watch(self.workflow.store());
        let searched = self.workflow.search(query).await;
        drop(progress);

        let outcome = match searched {
            Ok(outcome) => outcome,
            Err(err) => return Ok(exit(self.print_location(Err(err)))),
        };

        match outcome {
            SearchOutcome::Blank => bail!("search query is empty"),
            SearchOutcome::NotFound | SearchOutcome::Resolved(_) => {
                Ok(exit(self.print_location(Ok(()))))
            }
            SearchOutcome::Ambiguous(candidates) => {
                let index = match pick {
                    Some(n) if (1..=candidates.len()).contains(&n) => n - 1,
                    Some(n) => bail!("--pick {n} is out of range (1..={})", candidates.len()),
                    None => {
                        Select::new("Several places match, pick one:", candidates)
                            .raw_prompt()
                            .context("no candidate selected")?
                            .index
                    }
                };

                let result = self.workflow.select(index).await.map(|_| ());
                Ok(exit(self.print_location(result)))
            }
        }
    }

    /// Print marker and info panel; the panel already carries any error message.
    /// Returns whether the location resolved cleanly.
    fn print_location(&self, result: Result<(), WorkflowError>) -> bool {
        let state = self.workflow.store().snapshot();

        if let Some(position) = state.position {
            println!("{}\n", render::marker(position));
        }
        println!("{}", render::weather_panel(&state, &self.style));

        succeeded(&result) && state.phase != Phase::Failed
    }
}

/// Echoes progress lines to stderr while a command waits on the network. Stops when dropped.
struct Progress(JoinHandle<()>);

impl Progress {
    fn watch(store: &Store) -> Self {
        let mut rx = store.subscribe();
        Self(tokio::spawn(async move {
            let mut shown = None;
            loop {
                match rx.recv().await {
                    Ok(state) => {
                        let line = render::progress(&state);
                        if let Some(text) = line.filter(|_| line != shown) {
                            eprintln!("{text}");
                        }
                        shown = line;
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn succeeded<T>(result: &Result<T, WorkflowError>) -> bool {
    if let Err(err) = result {
        tracing::debug!(error = %err, "command failed");
        return false;
    }
    true
}

fn exit(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
