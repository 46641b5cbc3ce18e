//! Time-axis encoding for assembled datasets.
//!
//! Assembly works on raw step indices. A [`TimeAxis`] attaches the unit,
//! epoch and step length when the coordinate is written, so the encoded
//! values never carry an implicit unit.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// Calendar attribute written with every time coordinate.
pub const DEFAULT_CALENDAR: &str = "gregorian";

const EPOCH_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Numeric convention used for the time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEncoding {
    /// Hours elapsed since the epoch (0, 1, 2, ... at hourly steps).
    HourCounter,
    /// Seconds elapsed since the epoch.
    SecondsSinceEpoch,
}

impl Default for TimeEncoding {
    fn default() -> Self {
        Self::SecondsSinceEpoch
    }
}

impl TimeEncoding {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hours" | "hour" | "h" | "hour_counter" => Some(Self::HourCounter),
            "seconds" | "second" | "s" | "seconds_since_epoch" => Some(Self::SecondsSinceEpoch),
            _ => None,
        }
    }

    /// Unit word used in the CF-style units attribute.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::HourCounter => "hours",
            Self::SecondsSinceEpoch => "seconds",
        }
    }

    fn seconds_per_unit(&self) -> f64 {
        match self {
            Self::HourCounter => 3600.0,
            Self::SecondsSinceEpoch => 1.0,
        }
    }
}

impl std::fmt::Display for TimeEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unit())
    }
}

/// Maps step indices to encoded time values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAxis {
    pub encoding: TimeEncoding,
    pub epoch: DateTime<Utc>,
    /// Model time between consecutive step indices.
    pub step_seconds: u64,
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self {
            encoding: TimeEncoding::default(),
            epoch: default_epoch(),
            step_seconds: 3600,
        }
    }
}

/// 2024-01-01 00:00:00 UTC.
pub fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl TimeAxis {
    pub fn new(encoding: TimeEncoding, epoch: DateTime<Utc>, step_seconds: u64) -> Self {
        Self {
            encoding,
            epoch,
            step_seconds,
        }
    }

    pub fn validate(&self) -> MeshResult<()> {
        if self.step_seconds == 0 {
            return Err(MeshError::InvalidTimeUnits(
                "step_seconds must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Units attribute, e.g. "seconds since 2024-01-01 00:00:00".
    pub fn units(&self) -> String {
        format!("{} since {}", self.encoding.unit(), self.epoch.format(EPOCH_FORMAT))
    }

    /// Encoded value of one step index.
    pub fn value(&self, index: u64) -> f64 {
        (index * self.step_seconds) as f64 / self.encoding.seconds_per_unit()
    }

    /// Calendar instant of one step index.
    pub fn datetime(&self, index: u64) -> DateTime<Utc> {
        self.epoch + Duration::seconds((index * self.step_seconds) as i64)
    }

    /// Encode a sequence of step indices as a time coordinate.
    pub fn encode(&self, indices: &[u64]) -> MeshResult<TimeCoordinate> {
        self.validate()?;
        let values = indices.iter().map(|&i| self.value(i)).collect();
        TimeCoordinate::new(values, self.units(), DEFAULT_CALENDAR)
    }
}

/// Strictly increasing time values with their unit and calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCoordinate {
    values: Vec<f64>,
    units: String,
    calendar: String,
}

impl TimeCoordinate {
    pub fn new(
        values: Vec<f64>,
        units: impl Into<String>,
        calendar: impl Into<String>,
    ) -> MeshResult<Self> {
        let units = units.into();
        parse_units(&units)?;
        check_strictly_increasing(&values)?;
        Ok(Self {
            values,
            units,
            calendar: calendar.into(),
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn calendar(&self) -> &str {
        &self.calendar
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First and last value, if any.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.values.first()?, *self.values.last()?))
    }

    /// Calendar instant of the value at `i`.
    pub fn datetime(&self, i: usize) -> MeshResult<DateTime<Utc>> {
        let value = self.values.get(i).ok_or(MeshError::TimeIndexOutOfRange {
            index: i,
            len: self.values.len(),
        })?;
        let (encoding, epoch) = parse_units(&self.units)?;
        let seconds = value * encoding.seconds_per_unit();
        Ok(epoch + Duration::milliseconds((seconds * 1000.0).round() as i64))
    }
}

/// Fail unless every value is finite and greater than its predecessor.
pub fn check_strictly_increasing(values: &[f64]) -> MeshResult<()> {
    for (i, pair) in values.windows(2).enumerate() {
        if !(pair[1] > pair[0]) {
            return Err(MeshError::NonMonotonicTime {
                index: i + 1,
                previous: pair[0],
                value: pair[1],
            });
        }
    }
    if let Some(&v) = values.iter().find(|v| !v.is_finite()) {
        return Err(MeshError::NonMonotonicTime {
            index: 0,
            previous: v,
            value: v,
        });
    }
    Ok(())
}

/// Split a "<unit> since <epoch>" attribute into its encoding and epoch.
pub fn parse_units(units: &str) -> MeshResult<(TimeEncoding, DateTime<Utc>)> {
    let (unit, epoch) = units
        .split_once(" since ")
        .ok_or_else(|| MeshError::InvalidTimeUnits(units.to_string()))?;
    let encoding = TimeEncoding::from_str(unit.trim())
        .ok_or_else(|| MeshError::InvalidTimeUnits(units.to_string()))?;
    let epoch = parse_epoch(epoch.trim())?;
    Ok((encoding, epoch))
}

/// Parse an epoch given as RFC 3339, "YYYY-MM-DD HH:MM:SS", or a bare date.
pub fn parse_epoch(s: &str) -> MeshResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in [EPOCH_FORMAT, "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(MeshError::InvalidTimeUnits(format!("unparseable epoch '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_counter_encoding() {
        let axis = TimeAxis::new(TimeEncoding::HourCounter, default_epoch(), 3600);
        let coord = axis.encode(&[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(coord.values(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(coord.units(), "hours since 2024-01-01 00:00:00");
        assert_eq!(coord.calendar(), "gregorian");
    }

    #[test]
    fn test_seconds_encoding() {
        let axis = TimeAxis::default();
        let coord = axis.encode(&[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(coord.values(), &[0.0, 3600.0, 7200.0, 10800.0, 14400.0]);
        assert_eq!(coord.units(), "seconds since 2024-01-01 00:00:00");
    }

    #[test]
    fn test_rejects_duplicates() {
        let axis = TimeAxis::default();
        let err = axis.encode(&[0, 1, 1]).unwrap_err();
        assert!(matches!(err, MeshError::NonMonotonicTime { index: 2, .. }));
    }

    #[test]
    fn test_datetime_roundtrip() {
        let axis = TimeAxis::new(TimeEncoding::HourCounter, default_epoch(), 1800);
        let coord = axis.encode(&[0, 3]).unwrap();
        assert_eq!(coord.values(), &[0.0, 1.5]);
        assert_eq!(coord.datetime(1).unwrap(), axis.datetime(3));
    }

    #[test]
    fn test_datetime_out_of_range() {
        let coord = TimeAxis::default().encode(&[0, 1]).unwrap();
        let err = coord.datetime(2).unwrap_err();
        assert!(matches!(err, MeshError::TimeIndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_parse_units() {
        let (enc, epoch) = parse_units("seconds since 2024-01-01 00:00:00").unwrap();
        assert_eq!(enc, TimeEncoding::SecondsSinceEpoch);
        assert_eq!(epoch, default_epoch());

        let (enc, _) = parse_units("hours since 2024-01-01").unwrap();
        assert_eq!(enc, TimeEncoding::HourCounter);

        assert!(parse_units("fortnights since 2024-01-01").is_err());
        assert!(parse_units("seconds").is_err());
    }
}
