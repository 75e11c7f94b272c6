//! Fan-out of one collection cycle across every configured target
//!
//! Each target runs in its own task against a private result list. The
//! lists are concatenated here once every task has returned, so no state is
//! shared between targets while the cycle is in flight. All tasks observe
//! the same deadline, `global.timeout` after the cycle starts.

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::classifier;
use crate::collectors::{CollectContext, CollectorRegistry};
use crate::config::Config;
use crate::models::{Snapshot, TargetOutcome};
use crate::runner::CommandRunner;
use crate::target::{collect_target, TargetReport};

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<CollectorRegistry>,
    runner: Arc<dyn CommandRunner>,
    cycles_started: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(registry: Arc<CollectorRegistry>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            registry,
            runner,
            cycles_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Collects every target of `config` and returns the merged snapshot
    pub async fn run_cycle(&self, config: Arc<Config>) -> Snapshot {
        let cycle_id = Uuid::new_v4();
        let sequence = self.cycles_started.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("cycle", id = %cycle_id, sequence);
        self.fan_out(cycle_id, sequence, config).instrument(span).await
    }

    async fn fan_out(&self, cycle_id: Uuid, sequence: u64, config: Arc<Config>) -> Snapshot {
        let started = Instant::now();
        let deadline = started + config.global.timeout();
        let ctx = CollectContext {
            runner: self.runner.clone(),
            drive: config.global.drive.clone(),
            extra_args: config.global.extra_args().to_vec(),
        };

        let handles: Vec<_> = config
            .targets
            .iter()
            .map(|target| {
                let target = target.clone();
                let names = target.enabled_collectors(&config.global).to_vec();
                let registry = self.registry.clone();
                let ctx = ctx.clone();
                let span = info_span!("target", host = %target.host);
                tokio::spawn(
                    async move { collect_target(&target, &names, &registry, &ctx, deadline).await }
                        .instrument(span),
                )
            })
            .collect();

        let results = join_all(handles).await;

        let mut snapshot = Snapshot {
            cycle_id,
            sequence,
            target_count: config.targets.len(),
            ..Snapshot::empty()
        };
        let mut timed_out = 0usize;
        for (target, result) in config.targets.iter().zip(results) {
            let report = result.unwrap_or_else(|e| {
                error!(host = %target.host, error = %e, "target task aborted");
                TargetReport {
                    host: target.host.clone(),
                    outcomes: target
                        .enabled_collectors(&config.global)
                        .iter()
                        .map(|name| TargetOutcome {
                            host: target.host.clone(),
                            collector: name.clone(),
                            up: false,
                            duration: Duration::ZERO,
                        })
                        .collect(),
                    observations: vec![classifier::scrape_duration(
                        &target.host,
                        started.elapsed().as_secs_f64(),
                    )],
                    ..Default::default()
                }
            });
            debug!(
                host = %report.host,
                observations = report.observations.len(),
                "target merged"
            );
            if report.timed_out {
                timed_out += 1;
            }
            snapshot.observations.extend(report.observations);
            snapshot.outcomes.extend(report.outcomes);
        }

        snapshot.elapsed = started.elapsed();
        snapshot.completed_at = SystemTime::now();

        let down = snapshot.outcomes.iter().filter(|o| !o.up).count();
        info!(
            targets = snapshot.target_count,
            observations = snapshot.observations.len(),
            collectors_down = down,
            timed_out,
            elapsed_ms = snapshot.elapsed.as_millis() as u64,
            "collection cycle complete"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Family;
    use crate::config::parse_config;
    use crate::collectors::{CollectError, SubCollector};
    use crate::models::{MetricObservation, Target};
    use futures::future::BoxFuture;
    use ipmi_devkit::{fixtures, MockResponse, MockRunner};

    fn config(yaml: &str) -> Arc<Config> {
        Arc::new(parse_config(yaml, &CollectorRegistry::with_defaults()).unwrap())
    }

    fn orchestrator(runner: &MockRunner) -> Orchestrator {
        Orchestrator::new(
            Arc::new(CollectorRegistry::with_defaults()),
            Arc::new(runner.clone()),
        )
    }

    fn healthy_runner() -> MockRunner {
        MockRunner::new()
            .on("ipmimonitoring", MockResponse::output(fixtures::IPMIMONITORING))
            .on("ipmi-dcmi", MockResponse::output(fixtures::IPMI_DCMI))
            .on("ipmi-chassis", MockResponse::output(fixtures::IPMI_CHASSIS))
    }

    const TWO_TARGETS: &str = "
global:
  timeout: 10
targets:
  - host: bmc-1
    user: admin
    pwd: secret
  - host: bmc-2
    user: admin
    pwd: secret
";

    #[tokio::test]
    async fn test_empty_target_list() {
        let runner = MockRunner::new();
        let snapshot = orchestrator(&runner).run_cycle(config("")).await;
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.target_count, 0);
        assert!(!snapshot.cycle_id.is_nil());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_results_of_all_targets_are_merged() {
        let runner = healthy_runner();
        let snapshot = orchestrator(&runner).run_cycle(config(TWO_TARGETS)).await;

        assert_eq!(snapshot.target_count, 2);
        assert_eq!(snapshot.outcomes.len(), 6);
        assert!(snapshot.outcomes.iter().all(|o| o.up));
        let per_target = fixtures::IPMIMONITORING_ROWS * 2 + 1 + 3 + 1;
        assert_eq!(snapshot.observations.len(), per_target * 2);
        for host in ["bmc-1", "bmc-2"] {
            let count = snapshot
                .observations
                .iter()
                .filter(|o| o.label("host") == Some(host))
                .count();
            assert_eq!(count, per_target);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_target_does_not_stall_cycle() {
        let runner = healthy_runner().on_host(
            "ipmimonitoring",
            "bmc-2",
            MockResponse::output(fixtures::IPMIMONITORING).delayed(Duration::from_secs(600)),
        );
        let snapshot = orchestrator(&runner).run_cycle(config(TWO_TARGETS)).await;

        assert!(snapshot.elapsed < Duration::from_secs(11));
        let bmc2: Vec<_> = snapshot
            .outcomes
            .iter()
            .filter(|o| o.host == "bmc-2")
            .collect();
        assert_eq!(bmc2.len(), 3);
        assert!(bmc2.iter().all(|o| !o.up));
        assert!(snapshot
            .outcomes
            .iter()
            .filter(|o| o.host == "bmc-1")
            .all(|o| o.up));
        // the slow target still reports its scrape duration
        assert!(snapshot
            .observations
            .iter()
            .any(|o| o.family == Family::ScrapeDuration && o.label("host") == Some("bmc-2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_targets_run_concurrently() {
        let delay = Duration::from_secs(4);
        let runner = MockRunner::new()
            .on("ipmimonitoring", MockResponse::output(fixtures::IPMIMONITORING).delayed(delay))
            .on("ipmi-dcmi", MockResponse::output(fixtures::IPMI_DCMI))
            .on("ipmi-chassis", MockResponse::output(fixtures::IPMI_CHASSIS));
        let snapshot = orchestrator(&runner).run_cycle(config(TWO_TARGETS)).await;

        // sequential execution would take twice the delay
        assert!(snapshot.elapsed < delay * 2);
        assert!(snapshot.outcomes.iter().all(|o| o.up));
    }

    #[tokio::test]
    async fn test_per_target_collector_override() {
        let runner = healthy_runner();
        let yaml = "
global:
  collectors: [ipmimonitoring]
targets:
  - host: bmc-1
  - host: bmc-2
    collectors: [ipmi-dcmi, ipmi-chassis]
";
        let snapshot = orchestrator(&runner).run_cycle(config(yaml)).await;

        let programs_for = |host: &str| -> Vec<String> {
            runner
                .calls()
                .into_iter()
                .filter(|c| c.host() == Some(host))
                .map(|c| c.program)
                .collect()
        };
        assert_eq!(programs_for("bmc-1"), vec!["ipmimonitoring"]);
        assert_eq!(programs_for("bmc-2"), vec!["ipmi-dcmi", "ipmi-chassis"]);
        assert_eq!(snapshot.outcomes.len(), 3);
    }

    struct Panicking;

    impl SubCollector for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn collect<'a>(
            &'a self,
            _target: &'a Target,
            _ctx: &'a CollectContext,
        ) -> BoxFuture<'a, Result<Vec<MetricObservation>, CollectError>> {
            Box::pin(async { panic!("collector blew up") })
        }
    }

    #[tokio::test]
    async fn test_aborted_target_still_reports_duration() {
        let mut registry = CollectorRegistry::with_defaults();
        registry.register(Arc::new(Panicking));
        let yaml = "
targets:
  - host: bmc-1
    collectors: [panicking]
  - host: bmc-2
    collectors: [ipmi-dcmi]
";
        let config = Arc::new(parse_config(yaml, &registry).unwrap());
        let runner = healthy_runner();
        let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(runner));

        let snapshot = orchestrator.run_cycle(config).await;

        let bmc1: Vec<_> = snapshot
            .outcomes
            .iter()
            .filter(|o| o.host == "bmc-1")
            .collect();
        assert_eq!(bmc1.len(), 1);
        assert_eq!(bmc1[0].collector, "panicking");
        assert!(!bmc1[0].up);
        let durations = snapshot
            .observations
            .iter()
            .filter(|o| o.family == Family::ScrapeDuration && o.label("host") == Some("bmc-1"))
            .count();
        assert_eq!(durations, 1);
        // the other target is unaffected
        assert!(snapshot
            .outcomes
            .iter()
            .any(|o| o.host == "bmc-2" && o.collector == "ipmi-dcmi" && o.up));
    }

    #[tokio::test]
    async fn test_cycles_are_numbered_in_start_order() {
        let runner = healthy_runner();
        let orchestrator = orchestrator(&runner);
        let first = orchestrator.run_cycle(config(TWO_TARGETS)).await;
        let second = orchestrator.clone().run_cycle(config(TWO_TARGETS)).await;
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }
}
