//! # Daily Reminder
//!
//! Once a day, at a fixed UTC time, every chat that has written at least one
//! entry gets a nudge to write again.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::assistant::Assistant;
use crate::journal::{Journal, Outbox};
use crate::store::EntryStore;

/// First instant strictly after `now` whose UTC time of day is `at`
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the reminder forever on the tokio runtime
pub fn spawn_daily_reminder<S, A, O>(journal: Arc<Journal<S, A>>, outbox: Arc<O>, at: NaiveTime) -> JoinHandle<()>
where
    S: EntryStore + 'static,
    A: Assistant + 'static,
    O: Outbox + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Daily reminder scheduled");
            tokio::time::sleep(wait).await;

            match journal.send_daily_reminder(outbox.as_ref()).await {
                Ok(delivered) => info!(delivered, "Daily reminder finished"),
                Err(e) => error!(error = %e, "Daily reminder failed"),
            }
        }
    })
}
