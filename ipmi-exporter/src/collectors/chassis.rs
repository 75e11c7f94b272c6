//! `ipmi-chassis`: power state and fault flags
//!
//! The three flags are read in order; when one is missing the ones read
//! before it are still returned alongside the error.

use futures::future::BoxFuture;
use regex::Regex;

use super::{CollectContext, CollectError, SubCollector};
use crate::classifier::classify_scalar;
use crate::models::{MetricObservation, ScalarKind, ScalarReading, Target};
use crate::parser::{chassis_flag, COOLING_FAULT, DRIVE_FAULT, SYSTEM_POWER};

pub struct ChassisCollector;

impl SubCollector for ChassisCollector {
    fn name(&self) -> &'static str {
        "ipmi-chassis"
    }

    fn collect<'a>(
        &'a self,
        target: &'a Target,
        ctx: &'a CollectContext,
    ) -> BoxFuture<'a, Result<Vec<MetricObservation>, CollectError>> {
        Box::pin(async move {
            let output = ctx
                .invoke("ipmi-chassis", target, &["--get-chassis-status"])
                .await?;

            let flags: [(ScalarKind, &Regex); 3] = [
                (ScalarKind::ChassisPower, &*SYSTEM_POWER),
                (ScalarKind::DriveFault, &*DRIVE_FAULT),
                (ScalarKind::CoolingFault, &*COOLING_FAULT),
            ];

            let mut observations = Vec::with_capacity(flags.len());
            for (kind, pattern) in flags {
                match chassis_flag(&output, pattern) {
                    Ok(value) => {
                        let reading = ScalarReading { kind, value };
                        observations.push(classify_scalar(&reading, &target.host));
                    }
                    Err(source) if observations.is_empty() => return Err(source.into()),
                    Err(source) => {
                        return Err(CollectError::Partial {
                            partial: observations,
                            source,
                        })
                    }
                }
            }
            Ok(observations)
        })
    }
}
