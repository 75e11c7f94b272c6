//! Metric families and the mapping from parsed readings onto them
//!
//! Every family the exporter can emit is declared once in `Family::spec`,
//! together with its help text and label schema. Sensor readings are routed
//! by unit: fan, temperature, current, voltage and power sensors get typed
//! families labelled `id, name, host`; anything else falls back to the
//! generic `ipmi_sensor_*` families, which carry the sensor type as well.

use tracing::{debug, warn};

use crate::models::{MetricObservation, ScalarKind, ScalarReading, SensorReading};

const GENERIC_LABELS: &[&str] = &["id", "name", "type", "host"];
const TYPED_LABELS: &[&str] = &["id", "name", "host"];
const HOST_LABELS: &[&str] = &["host"];
const COLLECTOR_LABELS: &[&str] = &["collector", "host"];

/// Static description of a metric family
#[derive(Debug)]
pub struct FamilySpec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    SensorValue,
    SensorState,
    FanSpeed,
    FanSpeedState,
    Temperature,
    TemperatureState,
    Voltage,
    VoltageState,
    Current,
    CurrentState,
    Power,
    PowerState,
    PowerConsumption,
    ChassisPowerState,
    ChassisDriveFault,
    ChassisCoolingFault,
    Up,
    CollectorDuration,
    ScrapeDuration,
}

impl Family {
    pub const ALL: [Family; 19] = [
        Family::SensorValue,
        Family::SensorState,
        Family::FanSpeed,
        Family::FanSpeedState,
        Family::Temperature,
        Family::TemperatureState,
        Family::Voltage,
        Family::VoltageState,
        Family::Current,
        Family::CurrentState,
        Family::Power,
        Family::PowerState,
        Family::PowerConsumption,
        Family::ChassisPowerState,
        Family::ChassisDriveFault,
        Family::ChassisCoolingFault,
        Family::Up,
        Family::CollectorDuration,
        Family::ScrapeDuration,
    ];

    pub fn spec(self) -> &'static FamilySpec {
        match self {
            Family::SensorValue => &FamilySpec {
                name: "ipmi_sensor_value",
                help: "Generic data read from an IPMI sensor of unknown type, relying on labels for context.",
                labels: GENERIC_LABELS,
            },
            Family::SensorState => &FamilySpec {
                name: "ipmi_sensor_state",
                help: "Indicates the severity of the state reported by an IPMI sensor (0=nominal, 1=warning, 2=critical).",
                labels: GENERIC_LABELS,
            },
            Family::FanSpeed => &FamilySpec {
                name: "ipmi_fan_speed_rpm",
                help: "Fan speed in rotations per minute.",
                labels: TYPED_LABELS,
            },
            Family::FanSpeedState => &FamilySpec {
                name: "ipmi_fan_speed_state",
                help: "Reported state of a fan speed sensor (0=nominal, 1=warning, 2=critical).",
                labels: TYPED_LABELS,
            },
            Family::Temperature => &FamilySpec {
                name: "ipmi_temperature_celsius",
                help: "Temperature reading in degree Celsius.",
                labels: TYPED_LABELS,
            },
            Family::TemperatureState => &FamilySpec {
                name: "ipmi_temperature_state",
                help: "Reported state of a temperature sensor (0=nominal, 1=warning, 2=critical).",
                labels: TYPED_LABELS,
            },
            Family::Voltage => &FamilySpec {
                name: "ipmi_voltage_volts",
                help: "Voltage reading in Volts.",
                labels: TYPED_LABELS,
            },
            Family::VoltageState => &FamilySpec {
                name: "ipmi_voltage_state",
                help: "Reported state of a voltage sensor (0=nominal, 1=warning, 2=critical).",
                labels: TYPED_LABELS,
            },
            Family::Current => &FamilySpec {
                name: "ipmi_current_amperes",
                help: "Current reading in Amperes.",
                labels: TYPED_LABELS,
            },
            Family::CurrentState => &FamilySpec {
                name: "ipmi_current_state",
                help: "Reported state of a current sensor (0=nominal, 1=warning, 2=critical).",
                labels: TYPED_LABELS,
            },
            Family::Power => &FamilySpec {
                name: "ipmi_power_watts",
                help: "Power reading in Watts.",
                labels: TYPED_LABELS,
            },
            Family::PowerState => &FamilySpec {
                name: "ipmi_power_state",
                help: "Reported state of a power sensor (0=nominal, 1=warning, 2=critical).",
                labels: TYPED_LABELS,
            },
            Family::PowerConsumption => &FamilySpec {
                name: "ipmi_dcmi_power_consumption_watts",
                help: "Current power consumption in Watts.",
                labels: HOST_LABELS,
            },
            Family::ChassisPowerState => &FamilySpec {
                name: "ipmi_chassis_power_state",
                help: "Current power state (1=on, 0=off).",
                labels: HOST_LABELS,
            },
            Family::ChassisDriveFault => &FamilySpec {
                name: "ipmi_chassis_drive_fault",
                help: "Current drive fault (1=false, 0=true).",
                labels: HOST_LABELS,
            },
            Family::ChassisCoolingFault => &FamilySpec {
                name: "ipmi_chassis_cooling_fault",
                help: "Current cooling fault (1=false, 0=true).",
                labels: HOST_LABELS,
            },
            Family::Up => &FamilySpec {
                name: "ipmi_up",
                help: "'1' if a scrape of the IPMI device was successful, '0' otherwise.",
                labels: COLLECTOR_LABELS,
            },
            Family::CollectorDuration => &FamilySpec {
                name: "ipmi_collector_duration_seconds",
                help: "Returns how long a single sub-collector took to complete in seconds.",
                labels: COLLECTOR_LABELS,
            },
            Family::ScrapeDuration => &FamilySpec {
                name: "ipmi_scrape_duration_seconds",
                help: "Returns how long the scrape took to complete in seconds.",
                labels: HOST_LABELS,
            },
        }
    }

    /// Value and state families for a sensor unit, `None` for the generic fallback
    fn typed_pair(unit: &str) -> Option<(Family, Family)> {
        match unit {
            "RPM" => Some((Family::FanSpeed, Family::FanSpeedState)),
            "C" => Some((Family::Temperature, Family::TemperatureState)),
            "A" => Some((Family::Current, Family::CurrentState)),
            "V" => Some((Family::Voltage, Family::VoltageState)),
            "W" => Some((Family::Power, Family::PowerState)),
            _ => None,
        }
    }
}

/// Severity code of a qualitative sensor state
pub fn severity(state: &str) -> f64 {
    match state {
        "Nominal" => 0.0,
        "Warning" => 1.0,
        "Critical" => 2.0,
        "N/A" => f64::NAN,
        other => {
            warn!(state = %other, "unknown sensor state");
            f64::NAN
        }
    }
}

/// Maps one sensor row onto its value and state observations
pub fn classify_sensor(reading: &SensorReading, host: &str) -> [MetricObservation; 2] {
    debug!(?reading, host, "classifying sensor");
    let state = severity(&reading.state);
    let id = reading.id.to_string();

    match Family::typed_pair(&reading.unit) {
        Some((value_family, state_family)) => {
            let labels = vec![id, reading.name.clone(), host.to_string()];
            [
                MetricObservation::new(value_family, labels.clone(), reading.value),
                MetricObservation::new(state_family, labels, state),
            ]
        }
        None => {
            let labels = vec![
                id,
                reading.name.clone(),
                reading.sensor_type.clone(),
                host.to_string(),
            ];
            [
                MetricObservation::new(Family::SensorValue, labels.clone(), reading.value),
                MetricObservation::new(Family::SensorState, labels, state),
            ]
        }
    }
}

/// Maps a scalar reading onto its dedicated host-labelled family
pub fn classify_scalar(reading: &ScalarReading, host: &str) -> MetricObservation {
    let family = match reading.kind {
        ScalarKind::PowerConsumption => Family::PowerConsumption,
        ScalarKind::ChassisPower => Family::ChassisPowerState,
        ScalarKind::DriveFault => Family::ChassisDriveFault,
        ScalarKind::CoolingFault => Family::ChassisCoolingFault,
    };
    MetricObservation::new(family, vec![host.to_string()], reading.value)
}

/// Synthetic per-target wall-clock observation
pub fn scrape_duration(host: &str, seconds: f64) -> MetricObservation {
    MetricObservation::new(Family::ScrapeDuration, vec![host.to_string()], seconds)
}
