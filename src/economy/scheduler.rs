//! Daily lottery draw.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use tokio::time::sleep;

use crate::chat::{Announcer, RoomId};
use crate::config::LotteryConfig;
use crate::db::Database;
use crate::error::Result;

use super::lottery;

/// Wall-clock daily schedule.
#[derive(Debug, Clone)]
pub struct DrawSchedule {
    pub hour: u32,
    pub minute: u32,
    schedule: Schedule,
}

impl DrawSchedule {
    /// Parse `HH:MM`.
    pub fn daily(time: &str) -> std::result::Result<Self, String> {
        let (hour, minute) = time
            .split_once(':')
            .ok_or_else(|| "Invalid time format. Use HH:MM".to_string())?;
        let hour: u32 = hour.trim().parse().map_err(|_| "Invalid hour".to_string())?;
        let minute: u32 = minute.trim().parse().map_err(|_| "Invalid minute".to_string())?;
        if hour > 23 || minute > 59 {
            return Err("Invalid time. Hour must be 0-23, minute 0-59".to_string());
        }

        // sec min hour day-of-month month day-of-week
        let cron = format!("0 {} {} * * *", minute, hour);
        let schedule = Schedule::from_str(&cron).map_err(|e| format!("Invalid cron expression: {}", e))?;
        Ok(Self {
            hour,
            minute,
            schedule,
        })
    }

    /// First run strictly after `after`, in the same offset.
    pub fn next_after(&self, after: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.schedule.after(&after).next()
    }
}

/// Draw all rooms now and announce each result. Returns the number of rooms drawn.
pub async fn draw_and_announce(
    db: &Database,
    config: &LotteryConfig,
    announcer: &dyn Announcer,
) -> Result<usize> {
    let results = {
        let mut rng = rand::rng();
        db.transaction(|c| lottery::draw(c, config, &mut rng))?
    };

    for result in &results {
        let Ok(room) = result.room.parse::<RoomId>() else {
            tracing::warn!("Lottery room id {:?} is not numeric, result not sent", result.room);
            continue;
        };
        let text = lottery::format_draw(result, config);
        if let Err(e) = announcer.announce(room, &text).await {
            tracing::error!(room, "Failed to announce lottery result: {}", e);
        }
    }
    Ok(results.len())
}

/// Sleep until each scheduled draw, then draw. Runs until the task is dropped.
pub async fn run_lottery_daemon(
    db: Arc<Database>,
    config: LotteryConfig,
    tz: FixedOffset,
    announcer: Arc<dyn Announcer>,
) -> Result<()> {
    let schedule = DrawSchedule::daily(&config.draw_time).map_err(crate::error::Error::Config)?;
    tracing::info!("Lottery daemon started, draws daily at {:02}:{:02}", schedule.hour, schedule.minute);

    loop {
        let now = Utc::now().with_timezone(&tz);
        let Some(next) = schedule.next_after(now) else {
            tracing::error!("Lottery schedule has no upcoming run");
            return Ok(());
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!("Next lottery draw at {} ({:.1}s)", next, wait.as_secs_f64());
        sleep(wait).await;

        match draw_and_announce(&db, &config, announcer.as_ref()).await {
            Ok(rooms) => tracing::info!(rooms, "Scheduled lottery draw finished"),
            Err(e) => tracing::error!("Scheduled lottery draw failed: {}", e),
        }
    }
}
