//! Configuration loading for irisbot.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::party::DuplicateScope;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the irisbot home directory (~/.irisbot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".irisbot"))
}

/// Get the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.irisbot/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from an explicit path, then apply environment overrides.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'irisbot init' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut settings: Settings = serde_json::from_str(&content)?;
    apply_env_overrides(&mut settings);
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default(path: Option<&Path>) -> Settings {
    let loaded = match path {
        Some(p) => load_settings_from(p),
        None => load_settings(),
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        settings
    })
}

/// Write settings as pretty JSON, creating the parent directory.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

/// `ADMIN_IDS` (comma separated) and the Naver credentials may come from the
/// environment, the way the bot host's `.env` file provides them.
fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(raw) = std::env::var("ADMIN_IDS") {
        for id in parse_admin_ids(&raw) {
            if !settings.admin_ids.contains(&id) {
                settings.admin_ids.push(id);
            }
        }
    }
    if settings.meme.naver_client_id.is_none() {
        settings.meme.naver_client_id = std::env::var("X_NAVER_CLIENT_ID").ok();
    }
    if settings.meme.naver_client_secret.is_none() {
        settings.meme.naver_client_secret = std::env::var("X_NAVER_CLIENT_SECRET").ok();
    }
}

/// Parse a comma separated id list, skipping blanks and junk.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if !(-12..=14).contains(&settings.timezone_offset_hours) {
        return Err(Error::Config(format!(
            "timezone_offset_hours {} is out of range",
            settings.timezone_offset_hours
        )));
    }
    if settings.party.normal_capacity < 2 || settings.party.raid_capacity < 2 {
        return Err(Error::Config("party capacities must be at least 2".to_string()));
    }
    for (name, rate) in [
        ("game369.join_rate", settings.game369.join_rate),
        ("game369.praise_rate", settings.game369.praise_rate),
        ("lottery.jackpot_chance", settings.lottery.jackpot_chance),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::Config(format!("{} must be within 0.0..=1.0", name)));
        }
    }
    crate::economy::scheduler::DrawSchedule::daily(&settings.lottery.draw_time)
        .map_err(|e| Error::Config(format!("lottery.draw_time: {}", e)))?;
    Ok(())
}

/// Party plugin configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PartyConfig {
    #[serde(default = "default_normal_capacity")]
    pub normal_capacity: usize,
    #[serde(default = "default_raid_capacity")]
    pub raid_capacity: usize,
    #[serde(default)]
    pub duplicate_scope: DuplicateScope,
}

fn default_normal_capacity() -> usize {
    4
}

fn default_raid_capacity() -> usize {
    8
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            normal_capacity: default_normal_capacity(),
            raid_capacity: default_raid_capacity(),
            duplicate_scope: DuplicateScope::default(),
        }
    }
}

/// Points economy configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EconomyConfig {
    #[serde(default = "default_checkin_reward")]
    pub checkin_reward: i64,
}

fn default_checkin_reward() -> i64 {
    10
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            checkin_reward: default_checkin_reward(),
        }
    }
}

/// Lottery configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LotteryConfig {
    /// Local wall-clock time of the daily draw, `HH:MM`.
    #[serde(default = "default_draw_time")]
    pub draw_time: String,
    #[serde(default = "default_first_prize")]
    pub first_prize: i64,
    #[serde(default = "default_second_prize")]
    pub second_prize: i64,
    /// Per-ticket chance that the ticket's own code becomes the winning code.
    #[serde(default = "default_jackpot_chance")]
    pub jackpot_chance: f64,
}

fn default_draw_time() -> String {
    "07:00".to_string()
}

fn default_first_prize() -> i64 {
    300
}

fn default_second_prize() -> i64 {
    150
}

fn default_jackpot_chance() -> f64 {
    0.01
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            draw_time: default_draw_time(),
            first_prize: default_first_prize(),
            second_prize: default_second_prize(),
            jackpot_chance: default_jackpot_chance(),
        }
    }
}

/// 369 game configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Game369Config {
    #[serde(default = "default_join_rate")]
    pub join_rate: f64,
    #[serde(default = "default_praise_rate")]
    pub praise_rate: f64,
}

fn default_join_rate() -> f64 {
    0.3
}

fn default_praise_rate() -> f64 {
    0.2
}

impl Default for Game369Config {
    fn default() -> Self {
        Self {
            join_rate: default_join_rate(),
            praise_rate: default_praise_rate(),
        }
    }
}

/// Meme plugin configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MemeConfig {
    /// Directory holding the template images.
    #[serde(default = "default_resource_dir")]
    pub resource_dir: PathBuf,
    pub naver_client_id: Option<String>,
    pub naver_client_secret: Option<String>,
    #[serde(default = "default_disallowed_hosts")]
    pub disallowed_substrings: Vec<String>,
}

fn default_resource_dir() -> PathBuf {
    PathBuf::from("res")
}

fn default_disallowed_hosts() -> Vec<String> {
    [
        "medium.com",
        "post.phinf.naver.net",
        ".gif",
        "imagedelivery.net",
        "clien.net",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for MemeConfig {
    fn default() -> Self {
        Self {
            resource_dir: default_resource_dir(),
            naver_client_id: None,
            naver_client_secret: None,
            disallowed_substrings: default_disallowed_hosts(),
        }
    }
}

/// irisbot settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "default_timezone_offset_hours")]
    pub timezone_offset_hours: i32,

    #[serde(default)]
    pub admin_ids: Vec<i64>,

    /// SQLite file; defaults to ~/.irisbot/iris.db
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub party: PartyConfig,

    #[serde(default)]
    pub economy: EconomyConfig,

    #[serde(default)]
    pub lottery: LotteryConfig,

    #[serde(default)]
    pub game369: Game369Config,

    #[serde(default)]
    pub meme: MemeConfig,
}

fn default_timezone_offset_hours() -> i32 {
    9
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone_offset_hours: default_timezone_offset_hours(),
            admin_ids: Vec::new(),
            database_path: None,
            party: PartyConfig::default(),
            economy: EconomyConfig::default(),
            lottery: LotteryConfig::default(),
            game369: Game369Config::default(),
            meme: MemeConfig::default(),
        }
    }
}

impl Settings {
    /// Local time zone used for calendar days and wall-clock schedules.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(get_home_dir()?.join("iris.db")),
        }
    }
}
