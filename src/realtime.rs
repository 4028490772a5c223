//! Debounced reloads driven by change notifications
//!
//! Realtime change feeds tend to deliver bursts: a bulk status update on ten
//! orders is ten notifications. [`DebouncedReloader`] collapses a burst into
//! one reload that runs once the feed has been quiet for a while, and never
//! runs two reloads at once.

use std::fmt::Display;
use std::future::{self, Future};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
enum Signal {
    Changed,
    Now,
}

/// Counters for what the reloader has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReloadStats {
    pub completed: u64,
    pub failed: u64,
    /// Firings dropped because the previous reload was still running.
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Handle to a running reloader.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) cancels any
/// pending timer. A reload that is already running finishes on its own.
#[derive(Debug)]
pub struct DebouncedReloader {
    name: &'static str,
    signals: mpsc::UnboundedSender<Signal>,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
    driver: JoinHandle<()>,
}

impl DebouncedReloader {
    /// Spawns the reloader onto the current tokio runtime.
    pub fn spawn<F, Fut, E>(name: &'static str, quiet_period: Duration, reload: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (signals, rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let runner = Runner { name, reload, in_flight: Arc::clone(&in_flight), counters: Arc::clone(&counters) };
        let driver = tokio::spawn(drive(rx, quiet_period, runner));
        Self { name, signals, in_flight, counters, driver }
    }

    /// Records a change. The reload fires `quiet_period` after the last call.
    pub fn notify(&self) { self.send(Signal::Changed); }

    /// Reloads immediately (still subject to the in-flight guard), e.g. for the first load.
    pub fn reload_now(&self) { self.send(Signal::Now); }

    pub fn is_reloading(&self) -> bool { self.in_flight.load(Ordering::Acquire) }

    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Stops the driver, dropping any pending timer.
    pub async fn shutdown(self) {
        let Self { name, signals, driver, .. } = self;
        drop(signals);
        if let Err(e) = driver.await { warn!(reloader = name, error = %e, "reloader driver ended abnormally"); }
    }

    fn send(&self, signal: Signal) {
        if self.signals.send(signal).is_err() { debug!(reloader = self.name, "reloader already stopped"); }
    }
}

struct Runner<F> {
    name: &'static str,
    reload: F,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<F, Fut, E> Runner<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    fn fire(&self) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(reloader = self.name, "reload skipped, previous one still running");
            return;
        }
        let (name, reload) = (self.name, (self.reload)());
        let in_flight = Arc::clone(&self.in_flight);
        let counters = Arc::clone(&self.counters);
        tokio::spawn(async move {
            match reload.await {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(reloader = name, "reload complete");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(reloader = name, error = %e, "reload failed");
                }
            }
            in_flight.store(false, Ordering::Release);
        });
    }
}

async fn drive<F, Fut, E>(mut rx: mpsc::UnboundedReceiver<Signal>, quiet_period: Duration, runner: Runner<F>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut deadline: Option<Instant> = None;
    loop {
        let timer = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => future::pending().await,
            }
        };
        tokio::select! {
            signal = rx.recv() => match signal {
                Some(Signal::Changed) => deadline = Some(Instant::now() + quiet_period),
                Some(Signal::Now) => runner.fire(),
                None => break,
            },
            () = timer => {
                deadline = None;
                runner.fire();
            }
        }
    }
    debug!(reloader = runner.name, pending = deadline.is_some(), "reloader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting(delay: Duration) -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<(), Infallible>> + Send>> + Send + Sync + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let reload = move || {
            let seen = Arc::clone(&seen);
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                sleep(delay).await;
                Ok::<(), Infallible>(())
            }) as std::pin::Pin<Box<dyn Future<Output = Result<(), Infallible>> + Send>>
        };
        (calls, reload)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_reload() {
        let (calls, reload) = counting(Duration::ZERO);
        let reloader = DebouncedReloader::spawn("test", Duration::from_millis(2500), reload);
        for _ in 0..5 {
            reloader.notify();
            sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloader.stats(), ReloadStats { completed: 1, failed: 0, skipped: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_reload_separately() {
        let (calls, reload) = counting(Duration::ZERO);
        let reloader = DebouncedReloader::spawn("test", Duration::from_secs(1), reload);
        reloader.notify();
        sleep(Duration::from_millis(1500)).await;
        reloader.notify();
        reloader.notify();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_firing_during_reload_is_skipped() {
        let (calls, reload) = counting(Duration::from_secs(10));
        let reloader = DebouncedReloader::spawn("test", Duration::from_secs(1), reload);
        reloader.notify();
        sleep(Duration::from_millis(1500)).await;
        assert!(reloader.is_reloading());
        reloader.notify();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(reloader.stats().skipped, 1);
        sleep(Duration::from_secs(20)).await;
        assert!(!reloader.is_reloading());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloader.stats(), ReloadStats { completed: 1, failed: 0, skipped: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_and_do_not_stop_the_reloader() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let reloader = DebouncedReloader::spawn("test", Duration::from_millis(100), move || {
            let attempt = seen.fetch_add(1, Ordering::SeqCst);
            async move { if attempt == 0 { Err("backend unavailable") } else { Ok(()) } }
        });
        reloader.notify();
        sleep(Duration::from_millis(200)).await;
        reloader.notify();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(reloader.stats(), ReloadStats { completed: 1, failed: 1, skipped: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_now_skips_the_timer() {
        let (calls, reload) = counting(Duration::ZERO);
        let reloader = DebouncedReloader::spawn("test", Duration::from_secs(60), reload);
        reloader.reload_now();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_timer() {
        let (calls, reload) = counting(Duration::ZERO);
        let reloader = DebouncedReloader::spawn("test", Duration::from_secs(1), reload);
        reloader.notify();
        sleep(Duration::from_millis(10)).await;
        reloader.shutdown().await;
        sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
