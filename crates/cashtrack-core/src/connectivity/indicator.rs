use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ConnectivityProbe;
use crate::cache::CacheManager;
use crate::queue::PendingQueue;
use crate::store::KeyValueStore;

/// How often the pending indicator re-checks the queue.
pub const INDICATOR_POLL_SECS: u64 = 5;

/// Offline/sync banner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Online with nothing queued: show nothing
    Hidden,
    /// No network: working from the cache
    Offline,
    /// Online with pending writes waiting to be sent
    Syncing,
}

impl IndicatorState {
    pub fn evaluate<P, S>(probe: &P, cache: &CacheManager<S>) -> Self
    where
        P: ConnectivityProbe + ?Sized,
        S: KeyValueStore,
    {
        if !probe.is_online() {
            IndicatorState::Offline
        } else if PendingQueue::new(cache).has_pending() {
            IndicatorState::Syncing
        } else {
            IndicatorState::Hidden
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            IndicatorState::Hidden => None,
            IndicatorState::Offline => Some("Working offline"),
            IndicatorState::Syncing => Some("Syncing data..."),
        }
    }
}

/// Poll the indicator every [`INDICATOR_POLL_SECS`] seconds.
pub fn spawn_indicator<P, S>(
    probe: Arc<P>,
    cache: Arc<CacheManager<S>>,
) -> (JoinHandle<()>, watch::Receiver<IndicatorState>)
where
    P: ConnectivityProbe + 'static,
    S: KeyValueStore + 'static,
{
    spawn_indicator_with_period(probe, cache, Duration::from_secs(INDICATOR_POLL_SECS))
}

/// Poll the indicator on a custom period. The task ends once every receiver
/// is dropped.
pub fn spawn_indicator_with_period<P, S>(
    probe: Arc<P>,
    cache: Arc<CacheManager<S>>,
    period: Duration,
) -> (JoinHandle<()>, watch::Receiver<IndicatorState>)
where
    P: ConnectivityProbe + 'static,
    S: KeyValueStore + 'static,
{
    let initial = IndicatorState::evaluate(probe.as_ref(), cache.as_ref());
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let state = IndicatorState::evaluate(probe.as_ref(), cache.as_ref());
            let changed = tx.send_if_modified(|current| {
                if *current != state {
                    *current = state;
                    true
                } else {
                    false
                }
            });
            if changed {
                debug!(?state, "Indicator state changed");
            }
            if tx.is_closed() {
                break;
            }
        }
    });

    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::NetworkStatus;
    use crate::models::NewExpense;
    use crate::store::MemoryStore;

    #[test]
    fn test_evaluate_states() {
        let cache = CacheManager::new(MemoryStore::new());
        let status = NetworkStatus::online();
        assert_eq!(IndicatorState::evaluate(&status, &cache), IndicatorState::Hidden);

        PendingQueue::new(&cache).enqueue(NewExpense::new("u1", "Tea", 50.0, None, "2024-01-01"));
        assert_eq!(IndicatorState::evaluate(&status, &cache), IndicatorState::Syncing);

        status.set_online(false);
        assert_eq!(IndicatorState::evaluate(&status, &cache), IndicatorState::Offline);
        assert_eq!(IndicatorState::Offline.message(), Some("Working offline"));
        assert_eq!(IndicatorState::Hidden.message(), None);
    }

    #[tokio::test]
    async fn test_indicator_follows_flag() {
        let status = Arc::new(NetworkStatus::offline());
        let cache = Arc::new(CacheManager::new(MemoryStore::new()));

        let (handle, mut rx) = spawn_indicator_with_period(
            status.clone(),
            cache.clone(),
            Duration::from_millis(10),
        );
        assert_eq!(*rx.borrow(), IndicatorState::Offline);

        status.set_online(true);
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("indicator did not update")
            .unwrap();
        assert_eq!(*rx.borrow_and_update(), IndicatorState::Hidden);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("indicator task did not stop")
            .unwrap();
    }
}
