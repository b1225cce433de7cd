// src/ingest/scheduler.rs
//
// Periodic driver for the pipeline with manual-trigger coalescing. At most
// one cycle runs at a time: a trigger while a cycle is in flight is refused
// rather than queued, so a burst of POST /api/scrape calls costs one cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::ingest::{CycleReport, Pipeline};

/// Summary of the most recent completed cycle, kept for the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleHealth {
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub report: Option<CycleReport>,
}

#[derive(Default)]
pub struct ScrapeScheduler {
    running: AtomicBool,
    kick: Notify,
    last_cycle: Mutex<Option<CycleHealth>>,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

impl ScrapeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a scrape now. Returns true when the request was accepted and
    /// false when a cycle is already in flight, in which case no second
    /// cycle is queued behind it.
    pub fn request_scrape_now(&self) -> bool {
        if self.running.load(Ordering::SeqCst) {
            counter!("scrape_trigger_coalesced_total").increment(1);
            return false;
        }
        self.kick.notify_one();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn last_cycle(&self) -> Option<CycleHealth> {
        self.last_cycle.lock().ok().and_then(|g| (*g).clone())
    }

    /// When the most recent successful cycle finished. A failed cycle
    /// replaces `last_cycle` but leaves this timestamp in place.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at.lock().ok().and_then(|g| *g)
    }

    fn record(&self, health: CycleHealth) {
        if health.ok {
            if let Ok(mut guard) = self.last_success_at.lock() {
                *guard = Some(health.finished_at);
            }
        }
        if let Ok(mut guard) = self.last_cycle.lock() {
            *guard = Some(health);
        }
    }
}

/// Spawn the scrape loop: one cycle immediately on startup, then every
/// `interval_secs`, with manual triggers waking the loop early.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    scheduler: Arc<ScrapeScheduler>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // first tick fires immediately
            tokio::select! {
                _ = ticker.tick() => {}
                _ = scheduler.kick.notified() => {
                    // manual trigger; push the next scheduled tick out a full period
                    ticker.reset();
                }
            }

            scheduler.running.store(true, Ordering::SeqCst);
            let result = pipeline.run_cycle().await;
            scheduler.running.store(false, Ordering::SeqCst);

            counter!("scrape_cycles_total").increment(1);

            match result {
                Ok(report) => {
                    scheduler.record(CycleHealth {
                        finished_at: Utc::now(),
                        ok: true,
                        report: Some(report),
                    });
                }
                Err(err) => {
                    tracing::error!(error = %err, "scrape cycle failed");
                    scheduler.record(CycleHealth {
                        finished_at: Utc::now(),
                        ok: false,
                        report: None,
                    });
                }
            }
        }
    })
}
