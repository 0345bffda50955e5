//! Ride metrics comparing efforts against a population reference model.

use crate::RideFile;

// Mean-athlete three-parameter power-duration model.
const TYPICAL_CP: f64 = 261.0;
const TYPICAL_W_PRIME: f64 = 15_500.0;
const TYPICAL_PMAX: f64 = 1_100.0;

/// Score an effort against the mean athlete for its duration: 100 is an
/// average effort, below 100 under it, above 100 over it. Returns 0 when
/// the reference model gives no sensible power for the duration.
///
/// P(t) = W' / (t - (W'/(CP - Pmax))) + CP
pub fn power_index(average_power: f64, duration_secs: f64) -> f64 {
    let typical_power =
        TYPICAL_W_PRIME / (duration_secs - TYPICAL_W_PRIME / (TYPICAL_CP - TYPICAL_PMAX))
            + TYPICAL_CP;

    if !(0.0..=2500.0).contains(&typical_power) {
        return 0.0;
    }

    100.0 * average_power / typical_power
}

/// Power index for a whole ride: average power over every sample, duration
/// from sample count and recording interval. `None` when the ride carries
/// no usable power data.
pub fn ride_power_index(ride: &RideFile) -> Option<f64> {
    let mut duration = 0.0;
    let mut average_power = 0.0;
    for sample in ride.samples() {
        duration += 1.0;
        average_power += sample.watts;
    }
    if duration > 0.0 {
        average_power /= duration;
        duration *= ride.rec_int_secs();
    }

    if duration <= 0.0 || average_power <= 0.0 {
        return None;
    }

    Some(power_index(average_power, duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;

    #[test]
    fn mean_effort_scores_one_hundred() {
        // Model power for a 300 s effort.
        let typical = TYPICAL_W_PRIME / (300.0 - TYPICAL_W_PRIME / (TYPICAL_CP - TYPICAL_PMAX))
            + TYPICAL_CP;
        let index = power_index(typical, 300.0);
        assert!((index - 100.0).abs() < 1e-9);
    }

    #[test]
    fn harder_effort_scores_higher() {
        assert!(power_index(400.0, 300.0) > power_index(250.0, 300.0));
    }

    #[test]
    fn nonsense_duration_scores_zero() {
        assert_eq!(power_index(250.0, -20.0), 0.0);
    }

    #[test]
    fn ride_without_samples_has_no_index() {
        let ride = RideFile::new(1.0);
        assert_eq!(ride_power_index(&ride), None);
    }

    #[test]
    fn ride_without_power_has_no_index() {
        let samples = vec![
            Sample {
                secs: 0.0,
                ..Sample::default()
            },
            Sample {
                secs: 1.0,
                ..Sample::default()
            },
        ];
        let ride = RideFile::with_samples(1.0, samples);
        assert_eq!(ride_power_index(&ride), None);
    }

    #[test]
    fn steady_ride_scores() {
        let samples: Vec<Sample> = (0..600)
            .map(|i| Sample {
                secs: i as f64,
                watts: 280.0,
                ..Sample::default()
            })
            .collect();
        let ride = RideFile::with_samples(1.0, samples);
        let index = ride_power_index(&ride).unwrap();
        assert!(index > 0.0);
        assert!(index < 200.0);
    }
}
