//! Hard bounds on engine inputs. Everything user-supplied is checked
//! against these before it reaches the WAL.

use crate::model::Ms;

pub const MAX_ROOMS_PER_LOCATION: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 1_024;
pub const MAX_EQUIPMENT_ITEMS: usize = 64;
pub const MAX_CUSTOM_ATTRS: usize = 64;

/// 1970-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A series may cover at most three years of calendar days.
pub const MAX_SERIES_DAYS: i64 = 1_096;
pub const MAX_EXCLUDED_DAYS: usize = 366;

/// Availability / occupancy / negotiation windows: three years.
pub const MAX_QUERY_WINDOW_MS: Ms = MAX_SERIES_DAYS * 24 * 3_600_000;

pub const MAX_RESTRICTIONS: usize = 4_096;
pub const MAX_NEGOTIATION_STEPS: usize = 100_000;

pub const MAX_LOCATIONS: usize = 256;
pub const MAX_LOCATION_NAME_LEN: usize = 128;
