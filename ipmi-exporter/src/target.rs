//! Runs the enabled sub-collectors for one target

use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::classifier;
use crate::collectors::{CollectContext, CollectorRegistry};
use crate::models::{MetricObservation, Target, TargetOutcome};

/// What one target contributed to a cycle
#[derive(Debug, Default)]
pub struct TargetReport {
    pub host: String,
    pub observations: Vec<MetricObservation>,
    pub outcomes: Vec<TargetOutcome>,
    pub timed_out: bool,
}

/// Runs `names` in order against `target`.
///
/// A failing sub-collector only marks itself down. Once `deadline` passes the
/// in-flight sub-collector is dropped (its child process with it) and it and
/// every sub-collector after it are reported down. The per-target
/// `ipmi_scrape_duration_seconds` sample is emitted in every case.
pub async fn collect_target(
    target: &Target,
    names: &[String],
    registry: &CollectorRegistry,
    ctx: &CollectContext,
    deadline: Instant,
) -> TargetReport {
    let started = Instant::now();
    let mut report = TargetReport {
        host: target.host.clone(),
        ..Default::default()
    };

    for name in names {
        if report.timed_out {
            report.outcomes.push(down(&target.host, name));
            continue;
        }
        let Some(collector) = registry.get(name) else {
            warn!(host = %target.host, collector = %name, "unknown collector, skipping");
            report.outcomes.push(down(&target.host, name));
            continue;
        };

        let sub_started = Instant::now();
        let up = match timeout_at(deadline, collector.collect(target, ctx)).await {
            Ok(Ok(observations)) => {
                debug!(
                    host = %target.host,
                    collector = %name,
                    count = observations.len(),
                    "collector finished"
                );
                report.observations.extend(observations);
                true
            }
            Ok(Err(e)) => {
                error!(host = %target.host, collector = %name, error = %e, "collector failed");
                report.observations.extend(e.into_partial());
                false
            }
            Err(_) => {
                warn!(host = %target.host, collector = %name, "deadline reached, target timed out");
                report.timed_out = true;
                false
            }
        };
        report.outcomes.push(TargetOutcome {
            host: target.host.clone(),
            collector: name.clone(),
            up,
            duration: sub_started.elapsed(),
        });
    }

    report.observations.push(classifier::scrape_duration(
        &target.host,
        started.elapsed().as_secs_f64(),
    ));
    report
}

fn down(host: &str, collector: &str) -> TargetOutcome {
    TargetOutcome {
        host: host.to_string(),
        collector: collector.to_string(),
        up: false,
        duration: Duration::ZERO,
    }
}
