//! App-install record parsing
//!
//! One input line is `type<TAB>id<TAB>lat<TAB>lon<TAB>app,app,...`.
//! Parsing is pure: a line either becomes a [`Record`] or a [`RecordError`]
//! that the ingestor counts against the file's invalid-line budget.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const FIELD_COUNT: usize = 5;

/// Line-level validation failure. Never fatal for the file on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("expected 5 tab-separated fields, found {found}")]
    MalformedRecord { found: usize },

    #[error("invalid {axis} coordinate {value:?}")]
    InvalidCoordinate { axis: &'static str, value: String },

    #[error("unknown device type {0:?}")]
    UnknownDeviceType(String),

    #[error("empty device identifier")]
    MissingIdentifier,

    #[error("invalid app id {0:?}")]
    InvalidAppId(String),
}

/// Device identifier families accepted in the type column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Idfa,
    Gaid,
    Adid,
    Dvid,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Idfa,
        DeviceType::Gaid,
        DeviceType::Adid,
        DeviceType::Dvid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Idfa => "idfa",
            DeviceType::Gaid => "gaid",
            DeviceType::Adid => "adid",
            DeviceType::Dvid => "dvid",
        }
    }

    /// Prefix prepended to the raw identifier to build the normalized id
    pub fn prefix(self) -> &'static str {
        match self {
            DeviceType::Idfa => "",
            DeviceType::Gaid => "g",
            DeviceType::Adid => "a",
            DeviceType::Dvid => "d",
        }
    }
}

impl FromStr for DeviceType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idfa" => Ok(DeviceType::Idfa),
            "gaid" => Ok(DeviceType::Gaid),
            "adid" => Ok(DeviceType::Adid),
            "dvid" => Ok(DeviceType::Dvid),
            other => Err(RecordError::UnknownDeviceType(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated app-install event
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub device_type: DeviceType,
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<u32>,
}

impl Record {
    /// Identifier with the device-type prefix applied. Never empty.
    pub fn normalized_id(&self) -> String {
        let prefix = self.device_type.prefix();
        let mut normalized = String::with_capacity(prefix.len() + self.id.len());
        normalized.push_str(prefix);
        normalized.push_str(&self.id);
        normalized
    }

    /// Backend value: latitude then longitude, six decimal places each
    pub fn encode_value(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Parse a single input line. Only the trailing line terminator is stripped.
pub fn parse_record(line: &str) -> Result<Record, RecordError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(RecordError::MalformedRecord {
            found: fields.len(),
        });
    }

    let device_type: DeviceType = fields[0].parse()?;

    let id = fields[1];
    if id.is_empty() {
        return Err(RecordError::MissingIdentifier);
    }

    let lat = parse_coordinate("latitude", fields[2])?;
    let lon = parse_coordinate("longitude", fields[3])?;
    let apps = parse_apps(fields[4])?;

    Ok(Record {
        device_type,
        id: id.to_string(),
        lat,
        lon,
        apps,
    })
}

fn parse_coordinate(axis: &'static str, raw: &str) -> Result<f64, RecordError> {
    raw.parse::<f64>()
        .map_err(|_| RecordError::InvalidCoordinate {
            axis,
            value: raw.to_string(),
        })
}

// Empty tokens (blank field, trailing comma) are skipped; garbage rejects the record.
fn parse_apps(raw: &str) -> Result<Vec<u32>, RecordError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| RecordError::InvalidAppId(token.to_string()))
        })
        .collect()
}
