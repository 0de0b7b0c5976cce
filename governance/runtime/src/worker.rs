//! Runs the grouping pipeline off the async executor.

use crate::index::{process_search_results, GroupedPolicies, References, SearchResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
};
use tracing::{debug, info_span, warn, Instrument};

/// One grouping computation's inputs.
#[derive(Debug)]
pub struct Request {
    pub results: Vec<SearchResult>,
    pub references: Arc<References>,
}

pub type Results = watch::Receiver<Option<Arc<GroupedPolicies>>>;

/// Computes grouped policies on a dedicated task.
///
/// At most one computation runs at a time. Requests submitted while one is running replace each
/// other, so only the most recent is computed next. Dropping the worker stops its task.
#[derive(Debug)]
pub struct GroupingWorker {
    shared: Arc<Shared>,
    results: Results,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<Option<Request>>,
    notify: Notify,
}

// === impl GroupingWorker ===

impl GroupingWorker {
    pub fn spawn() -> Self {
        let shared = Arc::new(Shared::default());
        let (tx, results) = watch::channel(None);
        let task = tokio::spawn(run(shared.clone(), tx).instrument(info_span!("grouping")));
        Self {
            shared,
            results,
            task,
        }
    }

    /// Queues a request without waiting, replacing any request not yet started.
    pub fn submit(&self, request: Request) {
        if self.shared.pending.lock().replace(request).is_some() {
            debug!("Replaced pending grouping request");
        }
        self.shared.notify.notify_one();
    }

    /// Watches completed results. The value is `None` until the first computation finishes.
    pub fn subscribe(&self) -> Results {
        self.results.clone()
    }
}

impl Drop for GroupingWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(shared: Arc<Shared>, tx: watch::Sender<Option<Arc<GroupedPolicies>>>) {
    loop {
        shared.notify.notified().await;
        let pending = shared.pending.lock().take();
        let Some(Request {
            results,
            references,
        }) = pending
        else {
            continue;
        };

        let computed =
            tokio::task::spawn_blocking(move || process_search_results(results, &references))
                .await;
        match computed {
            Ok(grouped) => {
                debug!(groups = grouped.policy_items.len(), "Grouping completed");
                tx.send_replace(Some(Arc::new(grouped)));
            }
            Err(error) => warn!(%error, "Grouping failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DiscoveredPolicyItem;
    use tokio::time;

    fn request(name: &str) -> Request {
        Request {
            results: vec![SearchResult {
                items: vec![DiscoveredPolicyItem {
                    name: name.to_string(),
                    kind: "ConfigurationPolicy".to_string(),
                    apigroup: "policy.open-cluster-management.io".to_string(),
                    ..Default::default()
                }],
                related: vec![],
            }],
            references: Arc::new(References::default()),
        }
    }

    fn group_name(results: &Results) -> Option<String> {
        results
            .borrow()
            .as_ref()
            .map(|grouped| grouped.policy_items[0].name.clone())
    }

    #[tokio::test]
    async fn publishes_results() {
        let worker = GroupingWorker::spawn();
        let mut results = worker.subscribe();
        assert_eq!(group_name(&results), None);

        worker.submit(request("first"));
        results.changed().await.expect("worker must publish");
        assert_eq!(group_name(&results).as_deref(), Some("first"));

        worker.submit(request("second"));
        results.changed().await.expect("worker must publish");
        assert_eq!(group_name(&results).as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn latest_request_wins() {
        let worker = GroupingWorker::spawn();
        let mut results = worker.subscribe();

        // The worker task cannot run until this task yields.
        for name in ["a", "b", "c"] {
            worker.submit(request(name));
        }
        results.changed().await.expect("worker must publish");
        assert_eq!(group_name(&results).as_deref(), Some("c"));

        let more = time::timeout(time::Duration::from_millis(100), results.changed()).await;
        assert!(more.is_err(), "superseded requests must not be computed");
    }

    #[tokio::test]
    async fn drop_stops_worker() {
        let worker = GroupingWorker::spawn();
        let mut results = worker.subscribe();
        drop(worker);
        assert!(results.changed().await.is_err());
    }
}
