//! Feeds search exports to the grouping worker and publishes its results.

use crate::{
    index::{metrics::GroupingMetrics, SearchResult, SharedIndex},
    worker::{GroupingWorker, Request, Results},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Reads a JSON array of search results.
pub async fn read_search_results(path: &Path) -> Result<Vec<SearchResult>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to decode search results from {}", path.display()))
}

/// Periodically reads the search export and submits it, with a snapshot of the reference index,
/// to the worker. Read and decode failures are logged and leave the last published result in
/// place.
///
/// The worker is dropped, and with it any computation, when shutdown is signaled.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn poll(
    path: PathBuf,
    interval: Duration,
    index: SharedIndex,
    worker: GroupingWorker,
    drain: drain::Watch,
) {
    let mut timer = time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = drain.signaled();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = &mut shutdown => {
                debug!("Shutting down");
                return;
            }
        }

        let results = match read_search_results(&path).await {
            Ok(results) => results,
            Err(error) => {
                warn!(error = format_args!("{error:#}"), "Skipping grouping");
                continue;
            }
        };

        let references = index.read().references();
        debug!(results = results.len(), "Submitting search results");
        worker.submit(Request {
            results,
            references,
        });
    }
}

/// Records each completed result and, when `output` is set, writes it as JSON.
///
/// Completes once the worker is gone.
#[instrument(skip_all)]
pub async fn publish(mut results: Results, metrics: GroupingMetrics, output: Option<PathBuf>) {
    while results.changed().await.is_ok() {
        let latest = results.borrow_and_update().clone();
        let Some(grouped) = latest else {
            continue;
        };

        metrics.observe(&grouped);
        info!(
            groups = grouped.policy_items.len(),
            related = grouped.related_resources.len(),
            "Discovered policies grouped"
        );

        if let Some(path) = output.as_deref() {
            let json = match serde_json::to_vec_pretty(&*grouped) {
                Ok(json) => json,
                Err(error) => {
                    warn!(%error, "Failed to encode grouped policies");
                    continue;
                }
            };
            if let Err(error) = write_atomic(path, &json).await {
                warn!(error = format_args!("{error:#}"), "Failed to write grouped policies");
            }
        }
    }
}

/// Writes through a sibling temporary file so readers never see a partial document.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to rename {} to {}", tmp.display(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ocm-governance-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn reads_search_export() {
        let path = temp_path("export.json");
        tokio::fs::write(
            &path,
            r#"[{"items":[{"name":"p","kind":"ConfigurationPolicy","cluster":"c1"}],"related":[]}]"#,
        )
        .await
        .unwrap();

        let results = read_search_results(&path).await.expect("export must decode");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].items[0].name, "p");
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn read_errors_have_context() {
        let missing = temp_path("missing.json");
        let error = read_search_results(&missing).await.unwrap_err();
        assert!(format!("{error:#}").contains("failed to read"), "{error:#}");

        let invalid = temp_path("invalid.json");
        tokio::fs::write(&invalid, "{not json").await.unwrap();
        let error = read_search_results(&invalid).await.unwrap_err();
        assert!(format!("{error:#}").contains("failed to decode"), "{error:#}");
        tokio::fs::remove_file(&invalid).await.ok();
    }

    #[tokio::test]
    async fn publishes_to_output() {
        let export = temp_path("poll-export.json");
        let output = temp_path("poll-output.json");
        tokio::fs::write(
            &export,
            r#"[{"items":[{"name":"p","kind":"ConfigurationPolicy","apigroup":"policy.open-cluster-management.io","cluster":"c1","compliant":"Compliant"}]}]"#,
        )
        .await
        .unwrap();

        let worker = GroupingWorker::spawn();
        let publisher = tokio::spawn(publish(
            worker.subscribe(),
            GroupingMetrics::default(),
            Some(output.clone()),
        ));

        let (signal, watch) = drain::channel();
        let poller = tokio::spawn(poll(
            export.clone(),
            Duration::from_millis(10),
            Index::shared(),
            worker,
            watch,
        ));

        let mut written = None;
        for _ in 0..200 {
            if let Ok(json) = tokio::fs::read_to_string(&output).await {
                written = Some(json);
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        let written = written.expect("output must be written");
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["policyItems"][0]["name"], "p");

        signal.drain().await;
        poller.await.unwrap();
        // Dropping the worker with the poller ends publication.
        publisher.await.unwrap();

        tokio::fs::remove_file(&export).await.ok();
        tokio::fs::remove_file(&output).await.ok();
    }
}
