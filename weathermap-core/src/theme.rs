//! Light/dark theme flag, persisted between sessions.

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use tokio::sync::watch;
use tracing::warn;

/// Key under which the flag is stored.
pub const THEME_STORAGE_KEY: &str = "darkMode";

/// Durable storage for the serialized theme flag.
pub trait ThemeStorage: Send + Sync + Debug {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<bool>>;
    fn store(&self, dark_mode: bool) -> Result<()>;
}

fn parse_flag(raw: &str) -> Result<Option<bool>> {
    let doc: serde_json::Value = serde_json::from_str(raw).context("theme flag is not valid JSON")?;
    match doc.get(THEME_STORAGE_KEY) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| anyhow!("`{THEME_STORAGE_KEY}` is not a boolean: {value}")),
    }
}

fn serialize_flag(dark_mode: bool) -> String {
    serde_json::json!({ THEME_STORAGE_KEY: dark_mode }).to_string()
}

/// JSON file holding `{"darkMode": <bool>}`.
#[derive(Debug, Clone)]
pub struct FileThemeStorage {
    path: PathBuf,
}

impl FileThemeStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ThemeStorage for FileThemeStorage {
    fn load(&self) -> Result<Option<bool>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read theme file: {}", self.path.display()))?;
        parse_flag(&raw)
    }

    fn store(&self, dark_mode: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        // Write-then-rename so a crash never leaves a half-written flag behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialize_flag(dark_mode))
            .with_context(|| format!("Failed to write theme file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace theme file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process storage; lives as long as the value, so a "reload" is a new [`ThemeStore`] over it.
#[derive(Debug, Default)]
pub struct MemoryThemeStorage {
    raw: Mutex<Option<String>>,
}

impl MemoryThemeStorage {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().clone()
    }
}

impl ThemeStorage for MemoryThemeStorage {
    fn load(&self) -> Result<Option<bool>> {
        match self.raw.lock().as_deref() {
            Some(raw) => parse_flag(raw),
            None => Ok(None),
        }
    }

    fn store(&self, dark_mode: bool) -> Result<()> {
        *self.raw.lock() = Some(serialize_flag(dark_mode));
        Ok(())
    }
}

impl<T: ThemeStorage + ?Sized> ThemeStorage for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<bool>> {
        (**self).load()
    }

    fn store(&self, dark_mode: bool) -> Result<()> {
        (**self).store(dark_mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode { Theme::Dark } else { Theme::Light }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn tile_source(&self) -> TileSource {
        match self {
            Theme::Light => TileSource {
                url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
                attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors",
            },
            Theme::Dark => TileSource {
                url: "https://cartodb-basemaps-{s}.global.ssl.fastly.net/dark_all/{z}/{x}/{y}.png",
                attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>",
            },
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                text: "#333333",
                accent: "#6b7073",
                fill: "rgba(107, 112, 115, 0.2)",
                surface: "#ffffff",
                grid: "rgba(0, 0, 0, 0.1)",
            },
            Theme::Dark => Palette {
                text: "#e0e0e0",
                accent: "#90caf9",
                fill: "rgba(144, 202, 249, 0.2)",
                surface: "#1e1e1e",
                grid: "rgba(255, 255, 255, 0.1)",
            },
        }
    }
}

/// Basemap tile endpoint (`{s}`, `{z}`, `{x}`, `{y}` placeholders) and its attribution HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSource {
    pub url: &'static str,
    pub attribution: &'static str,
}

/// Colors for panels and the forecast chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: &'static str,
    pub accent: &'static str,
    pub fill: &'static str,
    pub surface: &'static str,
    pub grid: &'static str,
}

/// Single owner of the theme flag. Consumers get it injected and observe changes via [`subscribe`].
///
/// [`subscribe`]: ThemeStore::subscribe
#[derive(Debug)]
pub struct ThemeStore {
    storage: Box<dyn ThemeStorage>,
    tx: watch::Sender<bool>,
}

impl ThemeStore {
    /// Read the persisted flag once. Missing or unreadable values start in light mode.
    pub fn new(storage: impl ThemeStorage + 'static) -> Self {
        let initial = match storage.load() {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable theme flag");
                false
            }
        };

        let (tx, _rx) = watch::channel(initial);
        Self {
            storage: Box::new(storage),
            tx,
        }
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn theme(&self) -> Theme {
        Theme::from_dark_mode(self.get())
    }

    /// Flip the flag, persist it, and return the new value.
    ///
    /// The write happens while the channel is locked, so concurrent toggles persist in the
    /// order they flip. A storage failure is logged; the in-memory value still changes.
    pub fn toggle(&self) -> bool {
        let mut next = false;
        self.tx.send_modify(|dark| {
            *dark = !*dark;
            next = *dark;
            if let Err(e) = self.storage.store(next) {
                warn!(error = %e, "failed to persist theme flag");
            }
        });
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
