//! Ride recording data model and post-processing core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

pub mod fix_start;
pub mod metrics;
pub mod processor;
pub mod settings;

pub use fix_start::{FixStart, FixStartSummary, DEVELOPER_XDATA, POWER_FLOOR_WATTS};
pub use processor::{processor_for_name, processors, DataProcessor, ProcessorConfig};
pub use settings::{MemorySettings, Settings, FIX_START_SECONDS_DEFAULT, FIX_START_SECONDS_KEY};

#[derive(Error, Debug)]
pub enum RideFixError {
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),
    #[error("sample index {index} out of range ({len} samples)")]
    PointOutOfRange { index: usize, len: usize },
    #[error("no xdata series named {0}")]
    UnknownXData(String),
    #[error("xdata range {index}..{index}+{count} out of range ({len} points)")]
    XDataOutOfRange {
        index: usize,
        count: usize,
        len: usize,
    },
}

/// One timestamped reading in the ride's primary series. `watts == 0.0`
/// means no power signal. Channels other than time and power pass through
/// post-processing untouched.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Sample {
    pub secs: f64,
    pub watts: f64,
    pub hr: Option<f64>,
    pub cad: Option<f64>,
    pub km: Option<f64>,
    pub alt: Option<f64>,
}

/// One entry in an auxiliary named series, correlated to the primary
/// series by timestamp. The payload is opaque to processors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XDataPoint {
    pub secs: f64,
    pub value: JsonValue,
}

/// Named auxiliary series carried alongside the primary samples.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XDataSeries {
    pub name: String,
    pub points: Vec<XDataPoint>,
}

impl XDataSeries {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            points: Vec::new(),
        }
    }
}

/// In-memory ride recording: the primary sample series ordered by
/// ascending `secs`, auxiliary xdata series, the nominal recording
/// interval, and a key-value tag store. Sample indices are positional;
/// deleting index `i` shifts later samples down by one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RideFile {
    samples: Vec<Sample>,
    rec_int_secs: f64,
    xdata: HashMap<String, XDataSeries>,
    tags: HashMap<String, String>,
}

impl RideFile {
    pub fn new(rec_int_secs: f64) -> Self {
        Self {
            rec_int_secs,
            ..Self::default()
        }
    }

    pub fn with_samples(rec_int_secs: f64, samples: Vec<Sample>) -> Self {
        Self {
            samples,
            rec_int_secs,
            ..Self::default()
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).copied()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn rec_int_secs(&self) -> f64 {
        self.rec_int_secs
    }

    pub fn append_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn xdata(&self, name: &str) -> Option<&XDataSeries> {
        self.xdata.get(name)
    }

    pub fn add_xdata(&mut self, series: XDataSeries) {
        self.xdata.insert(series.name.clone(), series);
    }

    pub fn xdata_names(&self) -> impl Iterator<Item = &str> {
        self.xdata.keys().map(String::as_str)
    }

    pub fn set_tag(&mut self, name: &str, value: &str) {
        self.tags.insert(name.to_string(), value.to_string());
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

/// Mutation seam between processors and the host's edit machinery. A GUI
/// host implements this against its command history so a processor's edits
/// group into one undoable step; `RideFile` applies the edits directly.
/// Processors perform every mutation between `start_luw` and `end_luw`.
pub trait RideCommands {
    fn start_luw(&mut self, label: &str);
    fn end_luw(&mut self);
    fn delete_point(&mut self, index: usize) -> Result<(), RideFixError>;
    fn delete_xdata_points(
        &mut self,
        name: &str,
        index: usize,
        count: usize,
    ) -> Result<(), RideFixError>;
}

impl RideCommands for RideFile {
    fn start_luw(&mut self, label: &str) {
        debug!("start unit of work: {label}");
    }

    fn end_luw(&mut self) {
        debug!("end unit of work");
    }

    fn delete_point(&mut self, index: usize) -> Result<(), RideFixError> {
        if index >= self.samples.len() {
            return Err(RideFixError::PointOutOfRange {
                index,
                len: self.samples.len(),
            });
        }
        self.samples.remove(index);
        Ok(())
    }

    fn delete_xdata_points(
        &mut self,
        name: &str,
        index: usize,
        count: usize,
    ) -> Result<(), RideFixError> {
        let series = self
            .xdata
            .get_mut(name)
            .ok_or_else(|| RideFixError::UnknownXData(name.to_string()))?;
        let len = series.points.len();
        if index + count > len {
            return Err(RideFixError::XDataOutOfRange { index, count, len });
        }
        series.points.drain(index..index + count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(secs: f64, watts: f64) -> Sample {
        Sample {
            secs,
            watts,
            ..Sample::default()
        }
    }

    #[test]
    fn delete_point_shifts_later_samples() {
        let mut ride =
            RideFile::with_samples(1.0, vec![sample(0.0, 10.0), sample(1.0, 20.0), sample(2.0, 30.0)]);
        ride.delete_point(1).unwrap();
        assert_eq!(ride.sample_count(), 2);
        assert_eq!(ride.sample(1).unwrap().secs, 2.0);
    }

    #[test]
    fn delete_point_out_of_range() {
        let mut ride = RideFile::with_samples(1.0, vec![sample(0.0, 10.0)]);
        let err = ride.delete_point(3).unwrap_err();
        assert!(matches!(err, RideFixError::PointOutOfRange { index: 3, len: 1 }));
    }

    #[test]
    fn delete_xdata_points_drains_range() {
        let mut ride = RideFile::new(1.0);
        let mut series = XDataSeries::new("DEVELOPER");
        for i in 0..4 {
            series.points.push(XDataPoint {
                secs: i as f64,
                value: json!(i),
            });
        }
        ride.add_xdata(series);
        ride.delete_xdata_points("DEVELOPER", 1, 2).unwrap();
        let remaining: Vec<f64> = ride
            .xdata("DEVELOPER")
            .unwrap()
            .points
            .iter()
            .map(|p| p.secs)
            .collect();
        assert_eq!(remaining, vec![0.0, 3.0]);
    }

    #[test]
    fn delete_xdata_points_unknown_series() {
        let mut ride = RideFile::new(1.0);
        let err = ride.delete_xdata_points("DEVELOPER", 0, 1).unwrap_err();
        assert!(matches!(err, RideFixError::UnknownXData(_)));
    }

    #[test]
    fn tags_round_trip() {
        let mut ride = RideFile::new(1.0);
        ride.set_tag("Deleted Data Points", "3");
        assert_eq!(ride.tag("Deleted Data Points"), Some("3"));
        assert_eq!(ride.tag("missing"), None);
    }

    #[test]
    fn ride_serde_round_trip() {
        let mut ride = RideFile::with_samples(1.0, vec![sample(0.0, 100.0), sample(1.0, 110.0)]);
        let mut series = XDataSeries::new("DEVELOPER");
        series.points.push(XDataPoint {
            secs: 0.0,
            value: json!({"lap": 1}),
        });
        ride.add_xdata(series);
        ride.set_tag("Sport", "Bike");

        let text = serde_json::to_string(&ride).unwrap();
        let back: RideFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.sample_count(), 2);
        assert_eq!(back.rec_int_secs(), 1.0);
        assert_eq!(back.xdata("DEVELOPER").unwrap().points.len(), 1);
        assert_eq!(back.tag("Sport"), Some("Bike"));
    }
}
