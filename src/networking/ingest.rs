use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use quick_cache::sync::Cache;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::errors::IngestError;
use crate::io::common::loader::{LoadError, SegmentLoader};
use crate::networking::retry::RetryPolicy;

const RATE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub received_bits: u64,
    pub sent_bits: u64,
    pub bits_per_second: u64,
}

#[derive(Debug, Default)]
pub struct NetworkStatsTracker {
    received_bits: AtomicU64,
    sent_bits: AtomicU64,
    recent: Mutex<VecDeque<(Instant, u64)>>,
}

impl NetworkStatsTracker {
    pub fn record(&self, received_bytes: usize, sent_bytes: u64) {
        let bits = received_bytes as u64 * 8;
        self.received_bits.fetch_add(bits, Ordering::AcqRel);
        self.sent_bits.fetch_add(sent_bytes * 8, Ordering::AcqRel);

        let mut recent = self.recent.lock().expect("Network stats lock");
        let now = Instant::now();
        recent.push_back((now, bits));
        while recent.front().is_some_and(|(at, _)| now.duration_since(*at) > RATE_WINDOW) {
            recent.pop_front();
        }
    }

    pub fn stats(&self) -> NetworkStats {
        let recent = self.recent.lock().expect("Network stats lock");
        let now = Instant::now();
        let window_bits: u64 = recent
            .iter()
            .filter(|(at, _)| now.duration_since(*at) <= RATE_WINDOW)
            .map(|(_, bits)| *bits)
            .sum();

        NetworkStats {
            received_bits: self.received_bits.load(Ordering::Acquire),
            sent_bits: self.sent_bits.load(Ordering::Acquire),
            bits_per_second: (window_bits as f64 / RATE_WINDOW.as_secs_f64()) as u64,
        }
    }
}

pub type RequestId = u64;

/// One segment of one representation, identified by its slot on the playback timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub seq: u64,
    pub set_index: usize,
    pub representation_index: usize,
    pub location: String,
    /// Asset time range the segment covers.
    pub start_time: f64,
    pub end_time: f64,
    /// Epoch of the requesting asset at enqueue time. A different epoch at completion makes the fetch moot.
    pub epoch: u64,
}

#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub data: Arc<Vec<u8>>,
    pub elapsed: Duration,
    pub from_cache: bool,
    pub from_network: bool,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub id: RequestId,
    pub request: FetchRequest,
    pub result: Result<FetchedSegment, IngestError>,
}

/// Fetches segments on the worker pool with retries, shared by every asset of an interface.
pub struct IngestClient {
    runtime: Handle,
    retry: RetryPolicy,
    cache: Cache<String, Arc<Vec<u8>>>,
    stats: Arc<NetworkStatsTracker>,
    next_request: AtomicU64,
    in_flight: AtomicUsize,
    connectivity: watch::Sender<u64>,
}

impl IngestClient {
    pub fn new(runtime: Handle, retry: RetryPolicy, cache_capacity: usize, stats: Arc<NetworkStatsTracker>) -> Self {
        let (connectivity, _) = watch::channel(0);
        Self {
            runtime,
            retry,
            cache: Cache::new(cache_capacity.max(1)),
            stats,
            next_request: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            connectivity,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Bumped by `signal_reconnect`, assets waiting in offline mode listen on it.
    pub fn subscribe_connectivity(&self) -> watch::Receiver<u64> {
        self.connectivity.subscribe()
    }

    pub fn signal_reconnect(&self) {
        self.connectivity.send_modify(|generation| *generation += 1);
    }

    /// Starts fetching `request` and returns immediately. The outcome is sent to `reply`, unless the receiver
    /// went away in the meantime.
    pub fn enqueue_fetch(
        self: &Arc<Self>,
        request: FetchRequest,
        loader: Arc<dyn SegmentLoader>,
        epoch: Arc<AtomicU64>,
        reply: mpsc::UnboundedSender<FetchOutcome>,
    ) -> RequestId {
        let id = self.next_request.fetch_add(1, Ordering::AcqRel);
        let client = self.clone();
        client.in_flight.fetch_add(1, Ordering::AcqRel);
        trace!("Request {} for slot {} set {}: {}", id, request.seq, request.set_index, request.location);

        self.runtime.spawn(async move {
            let result = client.fetch(&request, loader, &epoch).await;
            client.in_flight.fetch_sub(1, Ordering::AcqRel);
            // the asset may be gone, then nobody cares about the result
            let _ = reply.send(FetchOutcome { id, request, result });
        });

        id
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        loader: Arc<dyn SegmentLoader>,
        epoch: &AtomicU64,
    ) -> Result<FetchedSegment, IngestError> {
        let key = format!("{}{}", loader.describe(), request.location);
        if let Some(data) = self.cache.get(&key) {
            trace!("Segment cache hit for {}", key);
            return Ok(FetchedSegment {
                data,
                elapsed: Duration::ZERO,
                from_cache: true,
                from_network: false,
                attempts: 0,
            });
        }

        let remote = loader.is_remote();
        let (data, elapsed, attempts) = self
            .load_with_retry(loader, &request.location, || epoch.load(Ordering::Acquire) == request.epoch)
            .await?;
        let data = Arc::new(data);
        self.cache.insert(key, data.clone());

        Ok(FetchedSegment {
            data,
            elapsed,
            from_cache: false,
            from_network: remote,
            attempts,
        })
    }

    /// Loads `location` through the blocking loader, retrying transient failures with backoff.
    /// Gives up with `Cancelled` as soon as `still_wanted` turns false.
    pub async fn load_with_retry<F: Fn() -> bool>(
        &self,
        loader: Arc<dyn SegmentLoader>,
        location: &str,
        still_wanted: F,
    ) -> Result<(Vec<u8>, Duration, u32), IngestError> {
        let mut attempts = 0;
        loop {
            if !still_wanted() {
                return Err(IngestError::Cancelled);
            }

            attempts += 1;
            let started = Instant::now();
            let blocking_loader = loader.clone();
            let blocking_location = location.to_string();
            let result = tokio::task::spawn_blocking(move || blocking_loader.load(&blocking_location))
                .await
                .unwrap_or_else(|e| Err(LoadError::Fatal(format!("loader panicked: {}", e))));

            match result {
                Ok(loaded) => {
                    let elapsed = started.elapsed();
                    if loader.is_remote() {
                        self.stats.record(loaded.data.len(), loaded.sent_bytes);
                    }
                    return Ok((loaded.data, elapsed, attempts));
                }
                Err(LoadError::Fatal(reason)) => {
                    warn!("Fetching {} failed: {}", location, reason);
                    return Err(IngestError::Fatal { reason });
                }
                Err(LoadError::Transient(reason)) => {
                    if !self.retry.should_retry(attempts) {
                        warn!("Fetching {} failed {} times: {}", location, attempts, reason);
                        return Err(IngestError::Transient { attempts, reason });
                    }

                    let delay = self.retry.backoff(attempts);
                    debug!("Fetching {} failed ({}), retrying in {:?}", location, reason, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::common::loader::LoadedBytes;
    use std::sync::atomic::AtomicU32;

    /// Fails transiently a fixed number of times, then serves `location` as bytes.
    struct FlakyLoader {
        failures_left: AtomicU32,
        fatal: bool,
        calls: AtomicU32,
    }

    impl SegmentLoader for FlakyLoader {
        fn load(&self, location: &str) -> Result<LoadedBytes, LoadError> {
            self.calls.fetch_add(1, Ordering::AcqRel);
            if self.fatal {
                return Err(LoadError::Fatal("404".into()));
            }
            if self.failures_left.load(Ordering::Acquire) > 0 {
                self.failures_left.fetch_sub(1, Ordering::AcqRel);
                return Err(LoadError::Transient("timeout".into()));
            }
            Ok(LoadedBytes {
                data: location.as_bytes().to_vec(),
                sent_bytes: 10,
            })
        }

        fn describe(&self) -> String {
            "flaky://".into()
        }

        fn is_remote(&self) -> bool {
            true
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn request(location: &str) -> FetchRequest {
        FetchRequest {
            seq: 0,
            set_index: 0,
            representation_index: 0,
            location: location.into(),
            start_time: 0.0,
            end_time: 1.0,
            epoch: 1,
        }
    }

    fn loader(failures: u32, fatal: bool) -> Arc<FlakyLoader> {
        Arc::new(FlakyLoader {
            failures_left: AtomicU32::new(failures),
            fatal,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    pub async fn transient_failures_are_retried() {
        let client = Arc::new(IngestClient::new(
            Handle::current(),
            fast_retry(4),
            8,
            Arc::new(NetworkStatsTracker::default()),
        ));
        let flaky = loader(2, false);
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.enqueue_fetch(request("a.vseg"), flaky.clone(), Arc::new(AtomicU64::new(1)), tx.clone());
        let outcome = rx.recv().await.unwrap();
        let fetched = outcome.result.unwrap();
        assert_eq!(fetched.attempts, 3);
        assert_eq!(&fetched.data[..], b"a.vseg");

        // served from the segment cache the second time
        client.enqueue_fetch(request("a.vseg"), flaky.clone(), Arc::new(AtomicU64::new(1)), tx);
        assert!(rx.recv().await.unwrap().result.unwrap().from_cache);
        assert_eq!(flaky.calls.load(Ordering::Acquire), 3);
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    pub async fn retries_are_bounded_and_fatal_is_not_retried() {
        let stats = Arc::new(NetworkStatsTracker::default());
        let client = Arc::new(IngestClient::new(Handle::current(), fast_retry(3), 8, stats));
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.enqueue_fetch(request("b"), loader(10, false), Arc::new(AtomicU64::new(1)), tx.clone());
        assert_eq!(
            rx.recv().await.unwrap().result.unwrap_err(),
            IngestError::Transient {
                attempts: 3,
                reason: "timeout".into()
            }
        );

        let fatal = loader(0, true);
        client.enqueue_fetch(request("c"), fatal.clone(), Arc::new(AtomicU64::new(1)), tx);
        assert!(matches!(rx.recv().await.unwrap().result, Err(IngestError::Fatal { .. })));
        assert_eq!(fatal.calls.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    pub async fn stale_epochs_cancel() {
        let client = Arc::new(IngestClient::new(
            Handle::current(),
            fast_retry(4),
            8,
            Arc::new(NetworkStatsTracker::default()),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.enqueue_fetch(request("d"), loader(0, false), Arc::new(AtomicU64::new(2)), tx);
        assert_eq!(rx.recv().await.unwrap().result.unwrap_err(), IngestError::Cancelled);
    }

    #[test]
    pub fn stats_accumulate() {
        let stats = NetworkStatsTracker::default();
        stats.record(1000, 10);
        stats.record(1000, 10);
        let snapshot = stats.stats();
        assert_eq!(snapshot.received_bits, 16_000);
        assert_eq!(snapshot.sent_bits, 160);
        assert_eq!(snapshot.bits_per_second, 8_000);
    }
}
