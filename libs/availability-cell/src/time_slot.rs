// libs/availability-cell/src/time_slot.rs
//
// Time-slot primitives shared by the stores, the resolver and the HTTP layer.
// Rule and override times live on a whole-hour grid; resolved windows and
// blocked spans are absolute UTC intervals.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use shared_config::SchedulingConfig;

use crate::error::SchedulingError;

const MINUTES_PER_DAY: u16 = 24 * 60;

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // HH:MM with optional :SS, which is how Postgres renders `time` columns
    PATTERN.get_or_init(|| Regex::new(r"^(\d{2}):(\d{2})(?::(\d{2}))?$").expect("static regex"))
}

/// True iff the half-open intervals `[a_start, a_end)` and `[b_start, b_end)` intersect.
/// Touching endpoints do not count.
pub fn overlaps<T: Ord>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

// ==============================================================================
// CLOCK HOUR (grid tick)
// ==============================================================================

/// A whole-hour tick, `00:00` through `24:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockHour(u8);

impl ClockHour {
    pub const MIDNIGHT: ClockHour = ClockHour(0);
    pub const END_OF_DAY: ClockHour = ClockHour(24);

    pub fn new(hour: u8) -> Result<Self, SchedulingError> {
        if hour > 24 {
            return Err(SchedulingError::Validation(format!(
                "Hour {} is outside 00:00-24:00",
                hour
            )));
        }
        Ok(Self(hour))
    }

    pub fn hour(&self) -> u8 {
        self.0
    }

    /// The absolute instant this tick denotes on `date`. `24:00` is the next midnight.
    pub fn on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(self.0 as i64)
    }
}

impl fmt::Display for ClockHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

impl FromStr for ClockHour {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = clock_pattern().captures(s.trim()).ok_or_else(|| {
            SchedulingError::Validation(format!("'{}' is not a HH:MM time", s))
        })?;

        let hour: u8 = caps[1].parse().map_err(|_| {
            SchedulingError::Validation(format!("'{}' is not a HH:MM time", s))
        })?;
        let sub_hour_nonzero = &caps[2] != "00" || caps.get(3).is_some_and(|sec| sec.as_str() != "00");

        if sub_hour_nonzero {
            return Err(SchedulingError::Validation(format!(
                "'{}' is not on the hourly grid",
                s
            )));
        }

        Self::new(hour)
    }
}

impl Serialize for ClockHour {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ClockHour {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// ==============================================================================
// DAY TIME (minute precision, for resolved output)
// ==============================================================================

/// Minutes since midnight, `00:00` through `24:00`. Resolved windows are not
/// grid-aligned once appointments are carved out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayTime(u16);

impl DayTime {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    /// Position of `instant` within the calendar day `date`, clamped to the day.
    pub fn within(date: NaiveDate, instant: DateTime<Utc>) -> Self {
        let day_start = ClockHour::MIDNIGHT.on(date);
        let minutes = (instant - day_start).num_minutes().clamp(0, MINUTES_PER_DAY as i64);
        Self(minutes as u16)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl From<ClockHour> for DayTime {
    fn from(hour: ClockHour) -> Self {
        Self(hour.0 as u16 * 60)
    }
}

impl From<NaiveTime> for DayTime {
    fn from(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl fmt::Display for DayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for DayTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DayTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (h, m) = raw
            .split_once(':')
            .ok_or_else(|| de::Error::custom(format!("'{}' is not a HH:MM time", raw)))?;
        let h: u16 = h.parse().map_err(de::Error::custom)?;
        let m: u16 = m.get(..2).unwrap_or(m).parse().map_err(de::Error::custom)?;
        if m >= 60 {
            return Err(de::Error::custom(format!("'{}' has invalid minutes", raw)));
        }
        DayTime::from_minutes(h * 60 + m)
            .ok_or_else(|| de::Error::custom(format!("'{}' is past 24:00", raw)))
    }
}

// ==============================================================================
// TIME GRID
// ==============================================================================

/// The enumerable set of ticks rules and overrides may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeGrid {
    first: ClockHour,
    last: ClockHour,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::from_config(&SchedulingConfig::default())
    }
}

impl TimeGrid {
    pub fn new(first_hour: u8, last_hour: u8) -> Result<Self, SchedulingError> {
        let first = ClockHour::new(first_hour)?;
        let last = ClockHour::new(last_hour)?;
        if first >= last {
            return Err(SchedulingError::Validation(format!(
                "Grid start {} must precede grid end {}",
                first, last
            )));
        }
        Ok(Self { first, last })
    }

    pub fn from_config(config: &SchedulingConfig) -> Self {
        // SchedulingConfig::from_env already repairs an inverted or oversized grid
        Self::new(config.grid_start_hour, config.grid_end_hour).unwrap_or(Self {
            first: ClockHour(8),
            last: ClockHour(20),
        })
    }

    pub fn first(&self) -> ClockHour {
        self.first
    }

    pub fn last(&self) -> ClockHour {
        self.last
    }

    pub fn contains(&self, hour: ClockHour) -> bool {
        self.first <= hour && hour <= self.last
    }

    pub fn ticks(&self) -> Vec<ClockHour> {
        (self.first.0..=self.last.0).map(ClockHour).collect()
    }

    pub fn is_valid_grid_time(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }

    /// Both ends on the grid and `start` strictly before `end`.
    pub fn is_ordered(&self, start: ClockHour, end: ClockHour) -> bool {
        self.contains(start) && self.contains(end) && start < end
    }

    pub fn parse(&self, raw: &str) -> Result<ClockHour, SchedulingError> {
        let hour: ClockHour = raw.parse()?;
        if !self.contains(hour) {
            return Err(SchedulingError::Validation(format!(
                "{} is outside the {}-{} grid",
                hour, self.first, self.last
            )));
        }
        Ok(hour)
    }

    pub fn validate_range(&self, start: ClockHour, end: ClockHour) -> Result<(), SchedulingError> {
        for hour in [start, end] {
            if !self.contains(hour) {
                return Err(SchedulingError::Validation(format!(
                    "{} is outside the {}-{} grid",
                    hour, self.first, self.last
                )));
            }
        }
        if start >= end {
            return Err(SchedulingError::Validation(format!(
                "Start time {} must be before end time {}",
                start, end
            )));
        }
        Ok(())
    }

    /// Parse and validate a `start`/`end` pair in one go.
    pub fn parse_range(&self, start: &str, end: &str) -> Result<(ClockHour, ClockHour), SchedulingError> {
        let start = self.parse(start)?;
        let end = self.parse(end)?;
        self.validate_range(start, end)?;
        Ok((start, end))
    }
}

// ==============================================================================
// ABSOLUTE INTERVALS
// ==============================================================================

/// Half-open `[start, end)` span of absolute time. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The calendar day `[date 00:00, date+1 00:00)`.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: ClockHour::MIDNIGHT.on(date),
            end: ClockHour::END_OF_DAY.on(date),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn clamp_to(&self, bounds: &Interval) -> Option<Interval> {
        Interval::new(self.start.max(bounds.start), self.end.min(bounds.end))
    }

    /// What remains of `self` after removing every interval in `cuts`.
    pub fn subtract(&self, cuts: &[Interval]) -> Vec<Interval> {
        let mut remaining = vec![*self];
        for cut in cuts {
            remaining = remaining
                .into_iter()
                .flat_map(|piece| {
                    if !piece.intersects(cut) {
                        return vec![piece];
                    }
                    [
                        Interval::new(piece.start, cut.start),
                        Interval::new(cut.end, piece.end),
                    ]
                    .into_iter()
                    .flatten()
                    .collect()
                })
                .collect();
            if remaining.is_empty() {
                break;
            }
        }
        remaining
    }

    /// Union of the given intervals, sorted. Touching intervals are joined.
    pub fn merge(mut intervals: Vec<Interval>) -> Vec<Interval> {
        intervals.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for next in intervals {
            match merged.last_mut() {
                Some(last) if next.start <= last.end => last.end = last.end.max(next.end),
                _ => merged.push(next),
            }
        }
        merged
    }

    pub fn subtract_all(windows: Vec<Interval>, cuts: &[Interval]) -> Vec<Interval> {
        windows.iter().flat_map(|w| w.subtract(cuts)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn iv(sh: u32, sm: u32, eh: u32, em: u32) -> Interval {
        Interval::new(at(sh, sm), at(eh, em)).unwrap()
    }

    #[test]
    fn test_clock_hour_parsing() {
        assert_eq!("09:00".parse::<ClockHour>().unwrap().hour(), 9);
        assert_eq!("17:00:00".parse::<ClockHour>().unwrap().hour(), 17);
        assert_eq!("24:00".parse::<ClockHour>().unwrap(), ClockHour::END_OF_DAY);
        assert_matches!("09:30".parse::<ClockHour>(), Err(SchedulingError::Validation(_)));
        assert_matches!("9:00".parse::<ClockHour>(), Err(SchedulingError::Validation(_)));
        assert_matches!("25:00".parse::<ClockHour>(), Err(SchedulingError::Validation(_)));
        assert_matches!("09:00:30".parse::<ClockHour>(), Err(SchedulingError::Validation(_)));
    }

    #[test]
    fn test_clock_hour_serde_uses_hh_mm() {
        let hour = ClockHour::new(8).unwrap();
        assert_eq!(serde_json::to_value(hour).unwrap(), serde_json::json!("08:00"));
        let back: ClockHour = serde_json::from_value(serde_json::json!("08:00:00")).unwrap();
        assert_eq!(back, hour);
    }

    #[test]
    fn test_grid_membership() {
        let grid = TimeGrid::default();
        assert!(grid.is_valid_grid_time("08:00"));
        assert!(grid.is_valid_grid_time("20:00"));
        assert!(!grid.is_valid_grid_time("07:00"));
        assert!(!grid.is_valid_grid_time("21:00"));
        assert!(!grid.is_valid_grid_time("08:30"));
        assert_eq!(grid.ticks().len(), 13);
    }

    #[test]
    fn test_grid_ordering() {
        let grid = TimeGrid::new(8, 24).unwrap();
        let nine = ClockHour::new(9).unwrap();
        let ten = ClockHour::new(10).unwrap();
        assert!(grid.is_ordered(nine, ten));
        assert!(!grid.is_ordered(ten, nine));
        assert!(!grid.is_ordered(nine, nine));
        assert!(grid.is_ordered(nine, ClockHour::END_OF_DAY));
        assert!(TimeGrid::new(10, 10).is_err());
    }

    #[test]
    fn test_parse_range_rejects_inverted() {
        let grid = TimeGrid::default();
        assert!(grid.parse_range("09:00", "12:00").is_ok());
        assert_matches!(grid.parse_range("12:00", "09:00"), Err(SchedulingError::Validation(_)));
        assert_matches!(grid.parse_range("09:00", "09:00"), Err(SchedulingError::Validation(_)));
    }

    #[test]
    fn test_overlaps_is_half_open() {
        assert!(!overlaps(9, 10, 10, 11));
        assert!(overlaps(9, 11, 10, 12));
        assert!(overlaps(9, 12, 10, 11));
        assert!(!overlaps(12, 13, 9, 10));
    }

    #[test]
    fn test_subtract_splits_window() {
        let window = iv(8, 0, 12, 0);
        let left = window.subtract(&[iv(10, 0, 11, 0)]);
        assert_eq!(left, vec![iv(8, 0, 10, 0), iv(11, 0, 12, 0)]);

        assert!(window.subtract(&[iv(7, 0, 13, 0)]).is_empty());
        assert_eq!(window.subtract(&[iv(12, 0, 13, 0)]), vec![window]);
    }

    #[test]
    fn test_merge_joins_overlapping_and_touching() {
        let merged = Interval::merge(vec![iv(11, 0, 12, 0), iv(8, 0, 9, 0), iv(9, 0, 10, 0), iv(9, 30, 10, 30)]);
        assert_eq!(merged, vec![iv(8, 0, 10, 30), iv(11, 0, 12, 0)]);
    }

    #[test]
    fn test_day_time_display() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(DayTime::within(date, at(14, 55)).to_string(), "14:55");
        assert_eq!(DayTime::within(date, ClockHour::END_OF_DAY.on(date)).to_string(), "24:00");
        assert_eq!(DayTime::from(ClockHour::new(8).unwrap()).to_string(), "08:00");
    }
}
