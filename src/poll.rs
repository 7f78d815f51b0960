//! Periodic fetch → persist → broadcast loop.
//!
//! A [`PollLoop`] owns its session state: at most one scheduled task per
//! value, started with [`PollLoop::start`] and cancelled with
//! [`PollLoop::stop`]. The task runs a cycle as soon as it starts and then
//! once per period.
//!
//! Cycles never overlap. They run one after another inside the scheduled
//! task, and ticks that fall due while a slow cycle is still running are
//! skipped rather than queued. Stopping only cancels the wait for the next
//! tick, so a cycle already in flight finishes.
//!
//! A failed cycle is logged and the loop carries on; the next tick is the
//! only retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::CycleError;
use crate::hub::BroadcastHub;
use crate::models::FeedMessage;
use crate::scrapers::ListingSource;
use crate::store::ArticleStore;
use crate::utils::truncate_for_log;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_PAGE: u32 = 1;

/// Counts from one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub persisted: usize,
    pub delivered: usize,
}

/// Everything one cycle touches. Cheap to clone into the scheduled task.
#[derive(Clone)]
struct Cycle {
    source: Arc<dyn ListingSource>,
    store: ArticleStore,
    hub: BroadcastHub,
    page: u32,
}

impl Cycle {
    async fn run(&self) -> Result<CycleReport, CycleError> {
        let items = self.source.fetch(self.page).await?;
        let persisted = self.store.persist(&items).await?;

        for item in &items {
            debug!(rank = %item.rank, title = %truncate_for_log(&item.title, 80), "Scraped article");
        }

        let fetched = items.len();
        let delivered = self.hub.broadcast(&FeedMessage::NewArticles(items))?;

        Ok(CycleReport {
            fetched,
            persisted,
            delivered,
        })
    }

    async fn run_logged(&self) {
        match self.run().await {
            Ok(report) => info!(
                page = self.page,
                fetched = report.fetched,
                persisted = report.persisted,
                delivered = report.delivered,
                "Poll cycle complete"
            ),
            Err(e) => error!(page = self.page, error = %e, "Error in fetch and process"),
        }
    }
}

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owned poll session: the scheduled task plus what it needs to run.
pub struct PollLoop {
    cycle: Cycle,
    period: Duration,
    session: Mutex<Option<Session>>,
}

impl PollLoop {
    /// Build an idle loop polling `page` every `period`.
    pub fn new(
        source: Arc<dyn ListingSource>,
        store: ArticleStore,
        hub: BroadcastHub,
        page: u32,
        period: Duration,
    ) -> Self {
        Self {
            cycle: Cycle {
                source,
                store,
                hub,
                page,
            },
            period,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the schedule. Returns `false` and does nothing if already running.
    #[instrument(level = "info", skip(self), fields(page = self.cycle.page, period = ?self.period))]
    pub fn start(&self) -> bool {
        let mut session = self.session();
        if session.is_some() {
            debug!("Poll loop already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            self.cycle.clone(),
            self.period,
            cancel.clone(),
        ));
        *session = Some(Session { cancel, handle });

        info!("Poll loop started");
        true
    }

    /// Cancel the schedule. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        match self.session().take() {
            Some(session) => {
                session.cancel.cancel();
                info!("Poll loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session().is_some()
    }

    /// Cancel the schedule and wait for an in-flight cycle to finish.
    pub async fn shutdown(&self) {
        let session = self.session().take();
        if let Some(Session { cancel, handle }) = session {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "Poll task ended abnormally");
            }
            info!("Poll loop shut down");
        }
    }

    /// Run one cycle right now, outside the schedule.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        self.cycle.run().await
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_schedule(cycle: Cycle, period: Duration, cancel: CancellationToken) {
    // The first tick completes immediately, giving the initial cycle.
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }
        cycle.run_logged().await;
    }

    debug!(page = cycle.page, "Poll schedule exited");
}
