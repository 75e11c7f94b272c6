//! Parsing of FreeIPMI tool output
//!
//! Two shapes are understood:
//! - the pipe-delimited sensor table printed by `ipmimonitoring`
//! - `Label : value` lines printed by `ipmi-dcmi` and `ipmi-chassis`
//!
//! The sensor table is read as comma-separated records and only the first
//! field of each record holds the pipe-delimited row. Every record must have
//! as many comma fields as the first one.
//!
//! Rows whose id column is not an integer (headers, banners) are skipped.
//! A row with an unparseable reading aborts the whole table: that means the
//! tool changed its format and the error should surface.

use regex::Regex;
use std::num::ParseFloatError;
use std::sync::LazyLock;

use crate::models::SensorReading;

pub static CURRENT_POWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Current Power\s*:\s*(?P<value>[0-9.]*)\s*Watts.*").expect("static regex")
});
pub static SYSTEM_POWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^System Power\s*:\s(?P<value>.*)").expect("static regex"));
pub static DRIVE_FAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Drive Fault\s*:\s(?P<value>.*)").expect("static regex"));
pub static COOLING_FAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Cooling/fan fault\s*:\s(?P<value>.*)").expect("static regex"));

const SENSOR_COLUMNS: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid reading {value:?} for sensor {id}: {source}")]
    InvalidReading {
        id: i64,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("sensor row {id} has {found} columns, expected 7")]
    TruncatedRow { id: i64, found: usize },
    #[error("record on line {line} has {found} comma fields, expected {expected}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("could not find value matching {pattern:?} in output")]
    ValueNotFound { pattern: String },
    #[error("invalid number {value:?}: {source}")]
    InvalidNumber {
        value: String,
        #[source]
        source: ParseFloatError,
    },
}

/// Parses `ipmimonitoring` output into sensor readings
pub fn parse_sensor_table(output: &[u8]) -> Result<Vec<SensorReading>, ParseError> {
    let text = String::from_utf8_lossy(output);
    let mut readings = Vec::new();
    let mut expected_fields = None;

    for (index, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let found = line.split(',').count();
        match expected_fields {
            None => expected_fields = Some(found),
            Some(expected) if expected != found => {
                return Err(ParseError::FieldCount {
                    line: index + 1,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        // only the first comma field carries the table row
        let record = line.split(',').next().unwrap_or_default();
        let fields: Vec<&str> = record.split('|').map(|f| f.trim_matches(' ')).collect();

        let Ok(id) = fields[0].parse::<i64>() else {
            continue;
        };
        if fields.len() < SENSOR_COLUMNS {
            return Err(ParseError::TruncatedRow { id, found: fields.len() });
        }

        let value = match fields[4] {
            "N/A" => f64::NAN,
            raw => raw.parse::<f64>().map_err(|source| ParseError::InvalidReading {
                id,
                value: raw.to_string(),
                source,
            })?,
        };

        readings.push(SensorReading {
            id,
            name: normalize_name(fields[1]),
            sensor_type: fields[2].to_string(),
            state: fields[3].to_string(),
            value,
            unit: fields[5].to_string(),
            event: fields[6].trim_matches('\'').to_string(),
        });
    }

    Ok(readings)
}

/// `Fan 1 Tach` -> `Fan_1_Tach`, `P1-DIMMA1 Temp` -> `DIMMA1_Temp`
fn normalize_name(raw: &str) -> String {
    let mut name = if raw.split_whitespace().count() > 1 {
        raw.replace(' ', "_").replace('/', "")
    } else {
        raw.to_string()
    };
    if name.find('-') == Some(2) {
        name = name[3..].replace('-', "_");
    }
    name
}

/// Returns the `value` capture of the first line matching `pattern`
pub fn extract_value(output: &[u8], pattern: &Regex) -> Result<String, ParseError> {
    let text = String::from_utf8_lossy(output);
    text.split('\n')
        .find_map(|line| pattern.captures(line)?.name("value").map(|m| m.as_str().to_string()))
        .ok_or_else(|| ParseError::ValueNotFound {
            pattern: pattern.as_str().to_string(),
        })
}

/// Instantaneous power draw from `ipmi-dcmi`, in watts
pub fn current_power(output: &[u8]) -> Result<f64, ParseError> {
    let value = extract_value(output, &CURRENT_POWER)?;
    value
        .parse::<f64>()
        .map_err(|source| ParseError::InvalidNumber { value, source })
}

/// `on` and `false` map to 1.0, any other word to 0.0
pub fn chassis_flag(output: &[u8], pattern: &Regex) -> Result<f64, ParseError> {
    let value = extract_value(output, pattern)?;
    Ok(match value.trim() {
        "on" | "false" => 1.0,
        _ => 0.0,
    })
}
