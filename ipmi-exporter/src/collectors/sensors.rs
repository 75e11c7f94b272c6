//! `ipmimonitoring`: the full sensor table

use futures::future::BoxFuture;
use tracing::debug;

use super::{CollectContext, CollectError, SubCollector};
use crate::classifier::classify_sensor;
use crate::models::{MetricObservation, Target};
use crate::parser::parse_sensor_table;

pub struct SensorsCollector;

impl SubCollector for SensorsCollector {
    fn name(&self) -> &'static str {
        "ipmimonitoring"
    }

    fn collect<'a>(
        &'a self,
        target: &'a Target,
        ctx: &'a CollectContext,
    ) -> BoxFuture<'a, Result<Vec<MetricObservation>, CollectError>> {
        Box::pin(async move {
            let output = ctx.invoke("ipmimonitoring", target, &[]).await?;
            let readings = parse_sensor_table(&output)?;
            debug!(host = %target.host, sensors = readings.len(), "parsed sensor table");

            Ok(readings
                .iter()
                .flat_map(|reading| classify_sensor(reading, &target.host))
                .collect())
        })
    }
}
