//! Green-time policy and scheduler configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler configuration
///
/// Durations (de)serialize as seconds, so `{"base_green": 12.5}` is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Green time granted to an empty lane before clamping
    #[serde(with = "duration_secs")]
    pub base_green: Duration,
    /// Extra green time per waiting vehicle
    #[serde(with = "duration_secs")]
    pub per_vehicle: Duration,
    /// Lower bound on any green grant
    #[serde(with = "duration_secs")]
    pub min_green: Duration,
    /// Upper bound on any occupancy-derived green grant
    #[serde(with = "duration_secs")]
    pub max_green: Duration,
    /// Length of the safety phase between Green and Red
    #[serde(with = "duration_secs")]
    pub yellow_duration: Duration,
    /// Floor applied when the granted lane carries an ambulance
    #[serde(with = "duration_secs")]
    pub ambulance_min_green: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            base_green: Duration::from_secs(10),
            per_vehicle: Duration::from_secs(2),
            min_green: Duration::from_secs(10),
            max_green: Duration::from_secs(60),
            yellow_duration: Duration::from_secs(3),
            ambulance_min_green: Duration::from_secs(15),
        }
    }
}

impl SchedulerConfig {
    /// Configuration for saturated arterials: longer phases, fewer switches
    pub fn rush_hour() -> Self {
        SchedulerConfig {
            base_green: Duration::from_secs(15),
            per_vehicle: Duration::from_secs(3),
            min_green: Duration::from_secs(15),
            max_green: Duration::from_secs(90),
            ..Self::default()
        }
    }

    /// Duration policy derived from this configuration
    pub fn policy(&self) -> DurationPolicy {
        DurationPolicy {
            base: self.base_green,
            per_vehicle: self.per_vehicle,
            min_green: self.min_green,
            max_green: self.max_green,
        }
    }
}

/// Green time as `clamp(base + per_vehicle * vehicle_count, min_green, max_green)`
///
/// Total and monotonic non-decreasing in `vehicle_count`. Arithmetic saturates
/// instead of overflowing.
#[inline]
pub fn compute_green(
    vehicle_count: u32,
    base: Duration,
    per_vehicle: Duration,
    min_green: Duration,
    max_green: Duration,
) -> Duration {
    let raw = base.saturating_add(per_vehicle.saturating_mul(vehicle_count));
    // max-then-min rather than Ord::clamp, which panics when min > max
    raw.max(min_green).min(max_green)
}

/// Occupancy-proportional duration policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationPolicy {
    pub base: Duration,
    pub per_vehicle: Duration,
    pub min_green: Duration,
    pub max_green: Duration,
}

impl DurationPolicy {
    #[inline]
    pub fn compute(&self, vehicle_count: u32) -> Duration {
        compute_green(
            vehicle_count,
            self.base,
            self.per_vehicle,
            self.min_green,
            self.max_green,
        )
    }

    /// Green time for a lane at the moment it is granted right-of-way
    pub fn grant(&self, vehicle_count: u32, has_ambulance: bool, ambulance_min: Duration) -> Duration {
        let green = self.compute(vehicle_count);
        if has_ambulance {
            green.max(ambulance_min)
        } else {
            green
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_compute_green_formula() {
        let policy = SchedulerConfig::default().policy();

        assert_eq!(policy.compute(0), secs(10));
        assert_eq!(policy.compute(5), secs(20));
        // clamp(10 + 2 * 20, 10, 60)
        assert_eq!(policy.compute(20), secs(50));
        assert_eq!(policy.compute(40), secs(60));
    }

    #[test]
    fn test_compute_green_lower_bound() {
        let green = compute_green(0, secs(5), secs(2), secs(10), secs(60));
        assert_eq!(green, secs(10));
    }

    #[test]
    fn test_compute_green_saturates() {
        let green = compute_green(u32::MAX, Duration::MAX, Duration::MAX, secs(10), secs(60));
        assert_eq!(green, secs(60));
    }

    #[test]
    fn test_ambulance_floor() {
        let config = SchedulerConfig::default();
        let policy = config.policy();

        assert_eq!(policy.grant(0, true, config.ambulance_min_green), secs(15));
        assert_eq!(policy.grant(0, false, config.ambulance_min_green), secs(10));
        // Floor never shortens a longer grant
        assert_eq!(policy.grant(20, true, config.ambulance_min_green), secs(50));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"base_green": 12.5, "yellow_duration": 4}"#).unwrap();

        assert_eq!(config.base_green, Duration::from_millis(12_500));
        assert_eq!(config.yellow_duration, secs(4));
        assert_eq!(config.max_green, secs(60));
    }

    #[test]
    fn test_config_rejects_negative_duration() {
        let parsed: Result<SchedulerConfig, _> = serde_json::from_str(r#"{"min_green": -1}"#);
        assert!(parsed.is_err());
    }

    proptest! {
        #[test]
        fn prop_compute_green_monotonic_and_bounded(
            n1 in 0u32..10_000,
            n2 in 0u32..10_000,
            base in 0u64..120,
            per in 0u64..10,
            min in 0u64..60,
            span in 0u64..120,
        ) {
            let (lo, hi) = if n1 <= n2 { (n1, n2) } else { (n2, n1) };
            let max = min + span;
            let g_lo = compute_green(lo, secs(base), secs(per), secs(min), secs(max));
            let g_hi = compute_green(hi, secs(base), secs(per), secs(min), secs(max));

            prop_assert!(g_lo <= g_hi);
            prop_assert!(g_lo >= secs(min) && g_lo <= secs(max));
            prop_assert!(g_hi >= secs(min) && g_hi <= secs(max));
        }
    }
}
