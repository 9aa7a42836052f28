use super::rate_limiter::RateLimiter;
use crate::app::ports::{PageRequest, RegistryClient};
use crate::constants::MAX_PAGE_SIZE;
use crate::error::Result;
use crate::types::RawRecord;
use metrics::counter;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Cooperative stop signal, checked between pages.
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trip the flag on the first Ctrl-C and exit with 130 on the second.
    /// Must be called inside a tokio runtime.
    pub fn listen_for_ctrl_c(&self) {
        self.listen(
            || async { tokio::signal::ctrl_c().await.is_ok() },
            || {
                std::process::exit(130);
            },
        );
    }

    /// Drive the flag from `next_signal`: the first signal trips it, the second
    /// calls `force`. A `false` from `next_signal` means no more signals.
    pub fn listen<S, Fut, F>(&self, mut next_signal: S, force: F) -> JoinHandle<()>
    where
        S: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let flag = self.clone();
        tokio::spawn(async move {
            if !next_signal().await {
                return;
            }
            info!("Interrupt received, finishing after the current page (press Ctrl-C again to quit)");
            flag.trigger();

            if next_signal().await {
                warn!("Second interrupt received, exiting");
                force();
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages: usize,
    /// True when pagination stopped because of an interrupt; `records` then
    /// holds whatever arrived before it.
    pub interrupted: bool,
}

pub struct PaginatedFetcher {
    client: Arc<dyn RegistryClient>,
    limiter: RateLimiter,
    page_size: usize,
}

impl PaginatedFetcher {
    pub fn new(client: Arc<dyn RegistryClient>, limiter: RateLimiter, page_size: usize) -> Self {
        Self {
            client,
            limiter,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Walk the registry cursor until it runs out, a page comes back empty,
    /// `limit` is reached or `interrupt` fires.
    ///
    /// A failed page request aborts the walk and the records accumulated so far
    /// are dropped with the error. Only an interrupt returns partial results.
    #[instrument(skip(self, requested_fields, interrupt))]
    pub async fn fetch_all(
        &self,
        query: &str,
        requested_fields: &[String],
        limit: Option<usize>,
        interrupt: &Interrupt,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        if limit == Some(0) {
            return Ok(outcome);
        }

        let page_size = match limit {
            Some(l) => self.page_size.min(l),
            None => self.page_size,
        };
        let mut page_token: Option<String> = None;
        let mut first_page = true;

        loop {
            if interrupt.is_triggered() {
                info!("Fetch interrupted, returning {} partial results", outcome.records.len());
                outcome.interrupted = true;
                break;
            }

            self.limiter.wait().await;
            let request = PageRequest {
                condition_query: query.to_string(),
                fields: requested_fields.to_vec(),
                page_size,
                page_token: page_token.take(),
            };
            debug!("Requesting registry page: {}", request.describe());

            let page = self.client.fetch_page(&request).await?;
            outcome.pages += 1;
            counter!("outreach_registry_pages_total").increment(1);

            if page.studies.is_empty() {
                if first_page {
                    warn!("No studies found in initial response");
                }
                break;
            }
            if first_page {
                first_page = false;
                info!(
                    "Found {} studies in first page (registry total: {:?})",
                    page.studies.len(),
                    page.total_count
                );
            }

            outcome.records.extend(page.studies);
            debug!("Retrieved {} studies so far", outcome.records.len());

            if let Some(limit) = limit {
                if outcome.records.len() >= limit {
                    info!("Reached specified limit of {} studies", limit);
                    outcome.records.truncate(limit);
                    break;
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        counter!("outreach_registry_records_total").increment(outcome.records.len() as u64);
        info!(
            "Total studies retrieved: {} over {} page(s)",
            outcome.records.len(),
            outcome.pages
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, Mutex};

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn first_signal_trips_flag_and_second_forces_exit() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let rx = Arc::new(Mutex::new(rx));
        let forced = Arc::new(AtomicBool::new(false));

        let interrupt = Interrupt::new();
        let forced_flag = Arc::clone(&forced);
        let handle = interrupt.listen(
            move || {
                let rx = Arc::clone(&rx);
                async move { rx.lock().await.recv().await.is_some() }
            },
            move || forced_flag.store(true, Ordering::SeqCst),
        );

        tx.send(()).unwrap();
        wait_until(|| interrupt.is_triggered()).await;
        assert!(interrupt.is_triggered());
        assert!(!forced.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(forced.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn closed_signal_source_leaves_flag_untouched() {
        let interrupt = Interrupt::new();
        let handle = interrupt.listen(|| async { false }, || {
            panic!("must not force");
        });
        handle.await.unwrap();
        assert!(!interrupt.is_triggered());
    }
}
