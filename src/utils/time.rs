//! Hour-slot helpers.

use chrono::{Duration, DurationRound, NaiveDateTime};

/// The start of the hour after `now`: readings recorded during an hour are
/// filed under the upcoming slot.
pub fn next_hour_slot(now: NaiveDateTime) -> NaiveDateTime {
    let floored = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    floored + Duration::hours(1)
}
