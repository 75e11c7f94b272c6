//! `ipmi-dcmi`: instantaneous power draw

use futures::future::BoxFuture;

use super::{CollectContext, CollectError, SubCollector};
use crate::classifier::classify_scalar;
use crate::models::{MetricObservation, ScalarKind, ScalarReading, Target};
use crate::parser::current_power;

pub struct DcmiCollector;

impl SubCollector for DcmiCollector {
    fn name(&self) -> &'static str {
        "ipmi-dcmi"
    }

    fn collect<'a>(
        &'a self,
        target: &'a Target,
        ctx: &'a CollectContext,
    ) -> BoxFuture<'a, Result<Vec<MetricObservation>, CollectError>> {
        Box::pin(async move {
            let output = ctx
                .invoke("ipmi-dcmi", target, &["--get-system-power-statistics"])
                .await?;
            let reading = ScalarReading {
                kind: ScalarKind::PowerConsumption,
                value: current_power(&output)?,
            };
            Ok(vec![classify_scalar(&reading, &target.host)])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Family;
    use crate::parser::ParseError;
    use ipmi_devkit::{fixtures, MockResponse, MockRunner};
    use std::sync::Arc;

    fn ctx(runner: MockRunner) -> CollectContext {
        CollectContext {
            runner: Arc::new(runner),
            drive: "LAN_2_0".into(),
            extra_args: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_power_consumption() {
        let runner = MockRunner::new().on("ipmi-dcmi", MockResponse::output(fixtures::IPMI_DCMI));
        let target = Target {
            host: "bmc-1".into(),
            ..Default::default()
        };

        let obs = DcmiCollector.collect(&target, &ctx(runner)).await.unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].family, Family::PowerConsumption);
        assert_eq!(obs[0].labels, vec!["bmc-1"]);
        assert_eq!(obs[0].value, 145.0);
    }

    #[tokio::test]
    async fn test_missing_power_line() {
        let runner = MockRunner::new().on(
            "ipmi-dcmi",
            MockResponse::output("Power Measurement : Not Available\n"),
        );
        let target = Target {
            host: "bmc-1".into(),
            ..Default::default()
        };

        let err = DcmiCollector.collect(&target, &ctx(runner)).await.unwrap_err();
        assert!(matches!(err, CollectError::Parse(ParseError::ValueNotFound { .. })));
    }
}
