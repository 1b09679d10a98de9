//! Fixed-interval, single-flight collection loop

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{ProductQuery, ProductSink, ProductSource};

/// Outcome of one pass over every query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub pages: usize,
    pub products: usize,
    /// Queries abandoned after an error
    pub failures: usize,
}

/// Totals for a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub skipped_ticks: usize,
}

/// Holds the in-flight flag for the lifetime of a cycle
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CollectorScheduler {
    source: Arc<dyn ProductSource>,
    sink: Arc<Mutex<Box<dyn ProductSink>>>,
    queries: Arc<Vec<ProductQuery>>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl CollectorScheduler {
    pub fn new(
        source: Arc<dyn ProductSource>,
        sink: Box<dyn ProductSink>,
        queries: Vec<ProductQuery>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink: Arc::new(Mutex::new(sink)),
            queries: Arc::new(queries),
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one cycle immediately, outside the ticker
    pub async fn run_once(&self) -> CycleSummary {
        run_cycle(self.source.as_ref(), &self.sink, &self.queries).await
    }

    /// Tick every interval until `shutdown` resolves or `max_cycles` cycles
    /// have been started. A tick that lands while a cycle is still running is
    /// skipped. The last cycle is allowed to finish before returning.
    pub async fn run<F>(&self, shutdown: F, max_cycles: Option<usize>) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut summary = RunSummary::default();
        let mut last_cycle = None;
        info!(
            "🚀 Collector started: {} queries every {:?}",
            self.queries.len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
                        summary.skipped_ticks += 1;
                        warn!("⏭️ Previous cycle still running, skipping tick");
                        continue;
                    };
                    summary.cycles += 1;
                    let cycle = summary.cycles;
                    let source = Arc::clone(&self.source);
                    let sink = Arc::clone(&self.sink);
                    let queries = Arc::clone(&self.queries);
                    last_cycle = Some(tokio::spawn(async move {
                        let _guard = guard;
                        let result = run_cycle(source.as_ref(), &sink, &queries).await;
                        info!(
                            "✅ Cycle {} done: {} pages, {} products, {} failed queries",
                            cycle, result.pages, result.products, result.failures
                        );
                        result
                    }));
                    if max_cycles.is_some_and(|limit| summary.cycles >= limit) {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = last_cycle {
            if let Err(e) = handle.await {
                warn!("Collector cycle task failed: {}", e);
            }
        }
        summary
    }
}

/// Walk every query's pages. An error abandons that query only.
async fn run_cycle(
    source: &dyn ProductSource,
    sink: &Mutex<Box<dyn ProductSink>>,
    queries: &[ProductQuery],
) -> CycleSummary {
    let mut summary = CycleSummary::default();
    let page_size = source.page_size();

    for query in queries {
        let mut page_index = 1u32;
        loop {
            let page = match source.fetch_page(query, page_index).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("❌ {} page {} failed: {}", query, page_index, e);
                    summary.failures += 1;
                    break;
                }
            };
            if let Err(e) = sink.lock().await.record(query, page_index, &page) {
                warn!("❌ Could not record {} page {}: {}", query, page_index, e);
                summary.failures += 1;
                break;
            }
            summary.pages += 1;
            summary.products += page.list.len();
            if page.is_last(page_index, page_size) {
                break;
            }
            page_index += 1;
        }
    }
    summary
}
