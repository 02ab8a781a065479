//! Wiring: database, plugins, and the background timer and lottery tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::{Announcer, Plugin, Router};
use crate::config::Settings;
use crate::db::Database;
use crate::economy::{run_lottery_daemon, EconomyPlugin};
use crate::error::Result;
use crate::game369::Game369Plugin;
use crate::meme::{ImageFetcher, MemePlugin, NaverImages, TemplateStore};
use crate::party::{run_timer_loop, PartyPlugin, PartyRegistry, TimerKey};

/// Everything a host needs to feed events in.
pub struct Bot {
    pub router: Router,
    pub db: Arc<Database>,
    pub parties: Arc<PartyRegistry>,
    settings: Settings,
    due: Option<mpsc::UnboundedReceiver<TimerKey>>,
}

impl Bot {
    /// Open the database from settings and build the plugin chain.
    pub fn open(settings: Settings) -> Result<Self> {
        let path = settings.resolve_database_path()?;
        let db = Arc::new(Database::open(&path)?);
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(NaverImages::new(&settings.meme)?);
        Ok(Self::with_parts(settings, db, fetcher))
    }

    pub fn with_parts(settings: Settings, db: Arc<Database>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let tz = settings.timezone();
        let (registry, due) = PartyRegistry::new(settings.party.clone());
        let parties = Arc::new(registry);

        // Economy first: it registers every sender before anyone else sees the event.
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(EconomyPlugin::new(db.clone(), &settings)),
            Arc::new(PartyPlugin::new(parties.clone(), tz)),
            Arc::new(MemePlugin::new(
                db.clone(),
                TemplateStore::new(settings.meme.resource_dir.clone()),
                fetcher,
                tz,
            )),
            Arc::new(Game369Plugin::new(settings.game369.clone())),
        ];
        let router = Router::new(plugins);
        tracing::info!(plugins = ?router.plugin_names(), "Plugins loaded");

        Self {
            router,
            db,
            parties,
            settings,
            due: Some(due),
        }
    }

    /// Start the party timer loop and the lottery daemon. Only the first call
    /// spawns the timer loop.
    pub fn spawn_background(&mut self, announcer: Arc<dyn Announcer>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(due) = self.due.take() {
            handles.push(tokio::spawn(run_timer_loop(
                self.parties.clone(),
                due,
                announcer.clone(),
            )));
        }

        let db = self.db.clone();
        let lottery = self.settings.lottery.clone();
        let tz = self.settings.timezone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_lottery_daemon(db, lottery, tz, announcer).await {
                tracing::error!("Lottery daemon error: {}", e);
            }
        }));
        handles
    }
}
