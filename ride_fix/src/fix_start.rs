//! Removal of bad warm-up samples after recording start or pause/resume.

use tracing::debug;

use crate::processor::{DataProcessor, ProcessorConfig};
use crate::settings::{Settings, FIX_START_SECONDS_DEFAULT, FIX_START_SECONDS_KEY};
use crate::{RideCommands, RideFile, RideFixError};

/// Power floor separating real effort from warm-up noise. A sample that
/// opens a recording gap below this level is discarded.
pub const POWER_FLOOR_WATTS: f64 = 120.0;

/// Auxiliary series swept for annotations sharing a deleted timestamp.
pub const DEVELOPER_XDATA: &str = "DEVELOPER";

// Guarantees the first sample always registers as a gap.
const TIME_SENTINEL_SECS: f64 = -999.0;

/// Counters accumulated over one filter run. Min and max deleted power
/// start at 0.0 and only widen, so a single positive-power deletion leaves
/// the minimum at 0.0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FixStartSummary {
    pub deleted_points: usize,
    pub min_deleted_power: f64,
    pub max_deleted_power: f64,
}

/// Post-processor deleting bad values after activity start or resume.
#[derive(Debug)]
pub struct FixStart;

impl DataProcessor for FixStart {
    fn name(&self) -> &'static str {
        "Remove Bad Start Values"
    }

    fn description(&self) -> &'static str {
        "Delete zero-power samples and low-power samples that open a \
         recording gap, along with developer annotations sharing their \
         timestamps."
    }

    fn post_process(
        &self,
        ride: &mut RideFile,
        config: Option<&ProcessorConfig>,
        settings: &dyn Settings,
    ) -> Result<bool, RideFixError> {
        // Resolved on both invocation paths, but the deletion test below
        // only consults the power floor.
        let _seconds_to_process = match config {
            Some(cfg) => cfg.seconds_to_process,
            None => settings.value_f64(FIX_START_SECONDS_KEY, FIX_START_SECONDS_DEFAULT),
        };

        let summary = apply(ride)?;
        Ok(summary.deleted_points != 0)
    }
}

/// Run the start-gap filter over `ride` in place: a single forward pass
/// deleting zero-power samples and gap-opening samples below
/// [`POWER_FLOOR_WATTS`], then a sweep of the DEVELOPER series removing
/// annotations whose rounded timestamp matches a deleted sample. All
/// deletions happen inside one unit of work; the summary tags are written
/// after it closes.
pub fn apply(ride: &mut RideFile) -> Result<FixStartSummary, RideFixError> {
    // Fewer than two samples leaves nothing to gap-detect (e.g. manual
    // workouts).
    if ride.sample_count() < 2 {
        return Ok(FixStartSummary::default());
    }

    let mut summary = FixStartSummary::default();
    let mut last_point_secs = TIME_SENTINEL_SECS;
    let mut deleted_secs: Vec<i64> = Vec::new();

    ride.start_luw("Remove Bad Start Values");

    let mut position = 0;
    while let Some(point) = ride.sample(position) {
        let secos = point.secs.round() as i64;

        if point.watts == 0.0 {
            ride.delete_point(position)?;
            deleted_secs.push(secos);
            summary.deleted_points += 1;
            debug!("deleted point at {secos} s: no power signal");
            continue;
        }

        if point.secs > last_point_secs + ride.rec_int_secs() {
            // Recording start or pause/resume.
            debug!("detected gap at {secos} s");

            if point.watts < POWER_FLOOR_WATTS {
                ride.delete_point(position)?;
                deleted_secs.push(secos);
                summary.deleted_points += 1;
                if summary.min_deleted_power > point.watts {
                    summary.min_deleted_power = point.watts;
                }
                if summary.max_deleted_power < point.watts {
                    summary.max_deleted_power = point.watts;
                }
                debug!("deleted point at {secos} s: power {:.2}", point.watts);
                continue;
            }
        }

        last_point_secs = point.secs;
        position += 1;
    }

    let mut position = 0;
    loop {
        let xsecos = match ride
            .xdata(DEVELOPER_XDATA)
            .and_then(|series| series.points.get(position))
        {
            Some(point) => point.secs.round() as i64,
            None => break,
        };
        if deleted_secs.contains(&xsecos) {
            ride.delete_xdata_points(DEVELOPER_XDATA, position, 1)?;
            debug!("deleted developer point at {xsecos} s");
        } else {
            position += 1;
        }
    }

    ride.end_luw();

    ride.set_tag("Deleted Data Points", &summary.deleted_points.to_string());
    ride.set_tag(
        "Deleted Power Range Time",
        &format!(
            "{} - {}",
            summary.min_deleted_power, summary.max_deleted_power
        ),
    );

    Ok(summary)
}
