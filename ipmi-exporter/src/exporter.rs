//! Prometheus adapter over a cached snapshot
//!
//! `SnapshotCollector` answers the description phase from the static family
//! table and the collection phase from one `Arc<Snapshot>`, taken once per
//! scrape. Gauges are rebuilt on every collect, so nothing from an earlier
//! cycle lingers after a target or sensor disappears.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::classifier::Family;
use crate::models::Snapshot;

pub struct SnapshotCollector {
    snapshot: Arc<Snapshot>,
    descs: Vec<Desc>,
}

impl SnapshotCollector {
    pub fn new(snapshot: Arc<Snapshot>) -> prometheus::Result<Self> {
        let descs = Family::ALL
            .iter()
            .map(|family| {
                let spec = family.spec();
                Desc::new(
                    spec.name.to_string(),
                    spec.help.to_string(),
                    spec.labels.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;
        Ok(Self { snapshot, descs })
    }

    fn set(vecs: &mut BTreeMap<Family, GaugeVec>, family: Family, labels: &[&str], value: f64) {
        if !vecs.contains_key(&family) {
            let spec = family.spec();
            match GaugeVec::new(Opts::new(spec.name, spec.help), spec.labels) {
                Ok(vec) => {
                    vecs.insert(family, vec);
                }
                Err(e) => {
                    warn!(family = spec.name, error = %e, "cannot build gauge");
                    return;
                }
            }
        }
        let Some(vec) = vecs.get(&family) else {
            return;
        };
        match vec.get_metric_with_label_values(labels) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(family = family.spec().name, error = %e, "dropping sample"),
        }
    }
}

impl Collector for SnapshotCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut vecs = BTreeMap::new();

        for obs in &self.snapshot.observations {
            let labels: Vec<&str> = obs.labels.iter().map(String::as_str).collect();
            Self::set(&mut vecs, obs.family, &labels, obs.value);
        }
        for outcome in &self.snapshot.outcomes {
            let labels = [outcome.collector.as_str(), outcome.host.as_str()];
            let up = if outcome.up { 1.0 } else { 0.0 };
            Self::set(&mut vecs, Family::Up, &labels, up);
            Self::set(
                &mut vecs,
                Family::CollectorDuration,
                &labels,
                outcome.duration.as_secs_f64(),
            );
        }

        vecs.values().flat_map(|vec| vec.collect()).collect()
    }
}

/// Encodes `snapshot` in the Prometheus text exposition format
pub fn render(snapshot: Arc<Snapshot>) -> prometheus::Result<String> {
    let registry = Registry::new();
    registry.register(Box::new(SnapshotCollector::new(snapshot)?))?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
