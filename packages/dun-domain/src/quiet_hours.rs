use time::{OffsetDateTime, UtcOffset};

use dun_config::QuietHours;

/// Hour of day at `now` shifted by a whole-hour UTC offset.
pub fn local_hour(now: OffsetDateTime, utc_offset_hours: i8) -> u8 {
	let utc_hour = now.to_offset(UtcOffset::UTC).hour() as i32;

	(utc_hour + utc_offset_hours as i32).rem_euclid(24) as u8
}

/// `[start_hour, end_hour)`, wrapping past midnight when `start_hour > end_hour`.
pub fn hour_in_window(hour: u8, start_hour: u8, end_hour: u8) -> bool {
	if start_hour == end_hour {
		return false;
	}
	if start_hour < end_hour {
		return hour >= start_hour && hour < end_hour;
	}

	hour >= start_hour || hour < end_hour
}

/// Whole-run gate. This is a single-offset approximation; recipients in other timezones are not
/// considered.
pub fn is_quiet(cfg: &QuietHours, now: OffsetDateTime) -> bool {
	if !cfg.enabled {
		return false;
	}

	hour_in_window(local_hour(now, cfg.utc_offset_hours), cfg.start_hour, cfg.end_hour)
}
