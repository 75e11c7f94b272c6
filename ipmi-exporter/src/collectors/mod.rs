//! Sub-collectors: one FreeIPMI invocation each
//!
//! A sub-collector runs a single diagnostic tool against one target and
//! turns its output into observations. They are looked up by name in the
//! `CollectorRegistry`, so the enabled list in the configuration decides
//! what runs and in which order.

mod chassis;
mod dcmi;
mod sensors;

pub use chassis::ChassisCollector;
pub use dcmi::DcmiCollector;
pub use sensors::SensorsCollector;

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{MetricObservation, Target};
use crate::parser::ParseError;
use crate::runner::{CommandError, CommandRunner};

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Some values were read before parsing failed
    #[error("{source} (after {} observations)", .partial.len())]
    Partial {
        partial: Vec<MetricObservation>,
        #[source]
        source: ParseError,
    },
}

impl CollectError {
    /// Observations gathered before the failure
    pub fn into_partial(self) -> Vec<MetricObservation> {
        match self {
            CollectError::Partial { partial, .. } => partial,
            _ => Vec::new(),
        }
    }
}

/// Per-cycle parameters shared by every sub-collection
#[derive(Clone)]
pub struct CollectContext {
    pub runner: Arc<dyn CommandRunner>,
    /// Value of `-D` (FreeIPMI driver type)
    pub drive: String,
    pub extra_args: Vec<String>,
}

impl CollectContext {
    /// Runs `program` against `target` with the common FreeIPMI arguments
    pub async fn invoke(
        &self,
        program: &str,
        target: &Target,
        tool_args: &[&str],
    ) -> Result<Vec<u8>, CommandError> {
        let mut args: Vec<String> = vec![
            "-D".into(),
            self.drive.clone(),
            "-h".into(),
            target.host.clone(),
            "-u".into(),
            target.user.clone(),
            "-p".into(),
            target.pwd.clone(),
        ];
        args.extend(tool_args.iter().map(|a| a.to_string()));
        args.extend(self.extra_args.iter().cloned());
        self.runner.run(program, &args).await
    }
}

/// Collects one subset of a target's readings
pub trait SubCollector: Send + Sync {
    /// Name used in configuration and in the `collector` label
    fn name(&self) -> &'static str;

    fn collect<'a>(
        &'a self,
        target: &'a Target,
        ctx: &'a CollectContext,
    ) -> BoxFuture<'a, Result<Vec<MetricObservation>, CollectError>>;
}

/// Name -> sub-collector lookup
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: BTreeMap<&'static str, Arc<dyn SubCollector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three FreeIPMI collectors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SensorsCollector));
        registry.register(Arc::new(DcmiCollector));
        registry.register(Arc::new(ChassisCollector));
        registry
    }

    pub fn register(&mut self, collector: Arc<dyn SubCollector>) {
        self.collectors.insert(collector.name(), collector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SubCollector>> {
        self.collectors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collectors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.keys().copied().collect()
    }
}
