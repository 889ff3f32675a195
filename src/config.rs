//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::epg::{DownloadConfig, ProgrammeOrder, ProgrammeWindow};
use crate::error::Result;

pub const APP_DIR: &str = "epg_viewer";
pub const CACHE_FILE: &str = "epg.xml";
pub const DEFAULT_EPG_URL: &str = "https://epg.ovh/pl.xml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_epg_url")]
    pub epg_url: String,
    /// Where the cached guide and preference files live; defaults to the config dir
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_look_back")]
    pub look_back_minutes: u32,
    /// 0 shows every upcoming programme
    #[serde(default)]
    pub look_ahead_hours: u32,
    #[serde(default)]
    pub sort_by_start: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
}

fn default_epg_url() -> String { DEFAULT_EPG_URL.to_string() }
fn default_look_back() -> u32 { 60 }
fn default_connect_timeout() -> u64 { 30 }
fn default_read_timeout() -> u64 { 120 }
fn default_attempts() -> u32 { 1 }
fn default_true() -> bool { true }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            epg_url: default_epg_url(),
            data_dir: None,
            look_back_minutes: 60,
            look_ahead_hours: 0,
            sort_by_start: false,
            connect_timeout_secs: 30,
            read_timeout_secs: 120,
            max_attempts: 1,
            user_agent: String::new(),
            dark_mode: true,
        }
    }
}

impl AppConfig {
    fn config_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_init(&Self::config_path())
    }

    /// Like `load_from`, but a missing file is created with the defaults
    /// so there is something to edit after the first run.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        match config.save_to(path) {
            Ok(()) => info!("wrote default config to {}", path.display()),
            Err(e) => warn!("could not write default config to {}: {}", path.display(), e),
        }
        config
    }

    /// Missing or unreadable files give the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::config_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir().join(CACHE_FILE)
    }

    pub fn download_config(&self) -> DownloadConfig {
        let mut download = DownloadConfig {
            max_attempts: self.max_attempts.max(1),
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            ..DownloadConfig::default()
        };
        if !self.user_agent.trim().is_empty() {
            download.user_agent = self.user_agent.trim().to_string();
        }
        download
    }

    pub fn programme_window(&self) -> ProgrammeWindow {
        ProgrammeWindow {
            look_back: chrono::Duration::minutes(i64::from(self.look_back_minutes)),
            look_ahead: match self.look_ahead_hours {
                0 => None,
                hours => Some(chrono::Duration::hours(i64::from(hours))),
            },
        }
    }

    pub fn programme_order(&self) -> ProgrammeOrder {
        if self.sort_by_start {
            ProgrammeOrder::StartTime
        } else {
            ProgrammeOrder::Document
        }
    }
}
