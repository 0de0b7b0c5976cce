use crate::{
    index::{self, metrics::GroupingMetrics},
    k8s::{Channel, HelmRelease, Resource, Subscription},
    poll,
    worker::GroupingWorker,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::{runtime::watcher, Client};
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "ocm-governance",
    about = "Groups discovered governance policies and explains their sources"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ocm_governance=info,warn",
        env = "OCM_GOVERNANCE_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// A JSON array of search results, re-read on every poll.
    #[clap(long, env = "OCM_GOVERNANCE_SEARCH_RESULTS")]
    search_results: PathBuf,

    /// Seconds between reads of the search results.
    #[clap(long, default_value = "15")]
    poll_interval: Seconds,

    /// Where to write the grouped policies as JSON.
    #[clap(long)]
    output: Option<PathBuf>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            search_results,
            poll_interval: Seconds(poll_interval),
            output,
        } = self;

        // The reference index holds the application resources that explain where externally
        // managed policies came from.
        let index = index::Index::shared();

        let mut prom = <Registry>::default();
        let governance = prom.sub_registry_with_prefix("ocm_governance");
        index::metrics::register(governance, index.clone());
        let grouping_metrics = GroupingMetrics::register(governance);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches. The application CRDs are optional; without them every
        // externally managed policy is reported as managed externally.

        if api_resource_exists::<Channel>(&runtime.client()).await {
            let channels = runtime.watch_all::<Channel>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), channels)
                    .instrument(info_span!("channels")),
            );
        } else {
            tracing::warn!(
                "channels.apps.open-cluster-management.io resource kind not found, skipping watches"
            );
        }

        if api_resource_exists::<Subscription>(&runtime.client()).await {
            let subscriptions = runtime.watch_all::<Subscription>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), subscriptions)
                    .instrument(info_span!("subscriptions")),
            );
        } else {
            tracing::warn!(
                "subscriptions.apps.open-cluster-management.io resource kind not found, skipping watches"
            );
        }

        if api_resource_exists::<HelmRelease>(&runtime.client()).await {
            let helm_releases = runtime.watch_all::<HelmRelease>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), helm_releases)
                    .instrument(info_span!("helmreleases")),
            );
        } else {
            tracing::warn!(
                "helmreleases.apps.open-cluster-management.io resource kind not found, skipping watches"
            );
        }

        // Group search results off the executor and publish each result.
        let worker = GroupingWorker::spawn();
        tokio::spawn(
            poll::publish(worker.subscribe(), grouping_metrics, output)
                .instrument(info_span!("publish")),
        );
        tokio::spawn(
            poll::poll(
                search_results,
                poll_interval,
                index,
                worker,
                runtime.shutdown_handle(),
            )
            .instrument(info_span!("poll")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Seconds(Duration);

impl std::str::FromStr for Seconds {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let secs = s.parse::<u64>()?;
        if secs == 0 {
            bail!("interval must be at least one second");
        }
        Ok(Self(Duration::from_secs(secs)))
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_poll_interval() {
        for (input, expected) in [
            ("15", Some(Duration::from_secs(15))),
            ("1", Some(Duration::from_secs(1))),
            ("0", None),
            ("-1", None),
            ("15s", None),
        ] {
            assert_eq!(
                input.parse::<Seconds>().ok().map(|Seconds(d)| d),
                expected,
                "{input}"
            );
        }
    }

    #[test]
    fn parses_defaults() {
        let args = Args::try_parse_from(["ocm-governance", "--search-results", "/tmp/results.json"])
            .expect("defaults must parse");
        assert_eq!(args.poll_interval, Seconds(Duration::from_secs(15)));
        assert_eq!(args.search_results, PathBuf::from("/tmp/results.json"));
        assert_eq!(args.output, None);
    }
}
