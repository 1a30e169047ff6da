//! Next-fire computation for encounter schedules.

use std::time::Duration;

use chrono::{DateTime, Days, TimeDelta, TimeZone};
use rand::Rng;

use crate::definition::{EncounterDefinition, Schedule};

/// Decides when a definition should next start on its own.
///
/// The clock is stateless: after every fire (successful or suppressed) the
/// scheduler asks again with the current time, so missed slots are dropped
/// instead of queued.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncounterClock;

impl EncounterClock {
    pub fn new() -> Self {
        Self
    }

    /// Next automatic start for `definition`, or `None` when it never fires
    /// (manual schedule or disabled definition).
    pub fn next_fire_time<Tz: TimeZone>(
        &self,
        definition: &EncounterDefinition,
        now: &DateTime<Tz>,
    ) -> Option<DateTime<Tz>> {
        if !definition.enabled {
            return None;
        }
        self.next_fire_time_with(&definition.schedule, now, &mut rand::thread_rng())
    }

    /// Same as [`Self::next_fire_time`] for a bare schedule with an explicit RNG.
    ///
    /// A random interval too large to add to `now` yields `None`.
    pub fn next_fire_time_with<Tz: TimeZone, R: Rng>(
        &self,
        schedule: &Schedule,
        now: &DateTime<Tz>,
        rng: &mut R,
    ) -> Option<DateTime<Tz>> {
        match schedule {
            Schedule::Manual => None,
            Schedule::Random { min, max } => {
                let low = u64::try_from(min.as_millis()).ok()?;
                let high = u64::try_from(max.as_millis()).ok()?;
                let jitter = if low >= high {
                    low
                } else {
                    rng.gen_range(low..=high)
                };
                let delta = TimeDelta::try_milliseconds(i64::try_from(jitter).ok()?)?;
                now.clone().checked_add_signed(delta)
            }
            Schedule::Fixed(times) => {
                let tz = now.timezone();
                let today = now.date_naive();
                // Two days ahead covers a slot skipped by a DST gap tomorrow.
                (0..=2u64)
                    .filter_map(|offset| today.checked_add_days(Days::new(offset)))
                    .flat_map(|day| times.iter().map(move |time| day.and_time(*time)))
                    .filter_map(|local| tz.from_local_datetime(&local).earliest())
                    .filter(|candidate| candidate > now)
                    .min()
            }
        }
    }

    /// Wall-clock wait until `fire`, zero when it is already due.
    pub fn delay_until<Tz: TimeZone>(fire: &DateTime<Tz>, now: &DateTime<Tz>) -> Duration {
        fire.clone()
            .signed_duration_since(now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
