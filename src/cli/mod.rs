//! CLI commands for irisbot using clap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::bot::Bot;
use crate::chat::console::{run_console, ConsoleAnnouncer};
use crate::chat::{Announcer, Sender};
use crate::config::{self, Settings};
use crate::db::Database;
use crate::economy::{draw_and_announce, shop};

/// irisbot - party, 369, meme and points plugins for a KakaoTalk bot host.
#[derive(Parser)]
#[command(name = "irisbot")]
#[command(version = "0.1.0")]
#[command(about = "irisbot - chat plugins for the iris KakaoTalk host", long_about = None)]
pub struct Commands {
    /// Settings file (default: ~/.irisbot/settings.json)
    #[arg(long, global = true, env = "IRISBOT_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Chat with the plugins from the terminal
    Chat {
        /// Room id to start in
        #[arg(long, default_value_t = 1)]
        room: i64,

        /// Sender id to speak as
        #[arg(long, default_value_t = 1)]
        user: i64,

        /// Sender nickname
        #[arg(long, default_value = "User")]
        name: String,

        /// Where image replies are written
        #[arg(long, default_value = "memes")]
        image_dir: PathBuf,
    },

    /// Run the lottery draw now and print each room's result
    Draw,

    /// List the shop items
    Shop,

    /// Write a default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Chat {
                room,
                user,
                name,
                image_dir,
            } => cmd_chat(self.load_settings(), *room, Sender::new(*user, name.clone()), image_dir.clone()).await,
            Command::Draw => cmd_draw(self.load_settings()).await,
            Command::Shop => cmd_shop(self.load_settings()),
            Command::Init { force } => cmd_init(self.settings_path()?, *force),
        }
    }

    fn settings_path(&self) -> Result<PathBuf> {
        match &self.settings {
            Some(p) => Ok(p.clone()),
            None => Ok(config::get_settings_path()?),
        }
    }

    fn load_settings(&self) -> Settings {
        config::load_settings_or_default(self.settings.as_deref())
    }
}

// Command implementations

async fn cmd_chat(settings: Settings, room: i64, sender: Sender, image_dir: PathBuf) -> Result<()> {
    let mut bot = Bot::open(settings).context("Failed to start plugins")?;
    let announcer: Arc<dyn Announcer> = Arc::new(ConsoleAnnouncer);
    let background = bot.spawn_background(announcer);

    let result = run_console(&bot.router, room, sender, image_dir).await;
    for handle in background {
        handle.abort();
    }
    result?;
    Ok(())
}

fn open_db(settings: &Settings) -> Result<Database> {
    let path = settings.resolve_database_path()?;
    Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

async fn cmd_draw(settings: Settings) -> Result<()> {
    let db = open_db(&settings)?;
    let rooms = draw_and_announce(&db, &settings.lottery, &ConsoleAnnouncer).await?;
    if rooms == 0 {
        println!("No pending lottery tickets.");
    } else {
        println!("Drew {} room(s).", rooms);
    }
    Ok(())
}

fn cmd_shop(settings: Settings) -> Result<()> {
    let db = open_db(&settings)?;
    let items = db.with_conn(shop::list_items)?;
    println!("{}", shop::format_items(&items));
    Ok(())
}

fn cmd_init(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Settings already exist at {} (use --force to overwrite)",
            path.display()
        );
    }
    config::save_settings(&path, &Settings::default())?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}
