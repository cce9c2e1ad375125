//! Periodic closing of stale chat sessions.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use counsel_db::Database;

/// Midnight (UTC) of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// End every chat session with messages from before today. Returns the
/// number of messages marked as ended.
pub async fn sweep_once(db: &Database) -> counsel_core::Result<u64> {
    let cutoff = start_of_day(Utc::now());
    let ended = db.chats.auto_end_before(cutoff).await?;
    if ended > 0 {
        info!(
            subsystem = "api",
            component = "sweeper",
            ended,
            cutoff = %cutoff,
            "Ended stale chat sessions"
        );
    } else {
        debug!(subsystem = "api", component = "sweeper", "No stale chat sessions");
    }
    Ok(ended)
}

/// Run [`sweep_once`] every `interval` until the task is aborted.
pub fn spawn_session_sweeper(db: Database, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_once(&db).await {
                error!(subsystem = "api", component = "sweeper", error = %e, "Session sweep failed");
            }
        }
    })
}
