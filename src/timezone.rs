use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// The UTC offset of `canonical_timezone` (e.g. "Pacific/Auckland") at `at`.
///
/// Returns `None` if the name is not a known canonical timezone.
pub fn get_offset_at(canonical_timezone: &str, at: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone).map(|tz| tz.get_offset_utc(&at).to_utc())
}
