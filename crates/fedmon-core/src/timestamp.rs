//! Textual timestamps as stored in the local record.
//!
//! Local rows keep wall-clock times as text, `YYYY-MM-DD HH:MM:SS.mmm`.
//! The uploader turns them back into [`NaiveDateTime`] values for the remote
//! `timestamp` columns; anything that does not parse becomes `None`.

use chrono::{Local, NaiveDateTime};

/// Format used when writing timestamps into the local store.
pub const STORED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Accepts any fractional precision, including none.
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Render a timestamp in the stored text format.
pub fn format_stored(t: NaiveDateTime) -> String {
    t.format(STORED_FORMAT).to_string()
}

/// Parse a stored timestamp. Returns `None` for anything malformed.
pub fn parse_stored(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), PARSE_FORMAT).ok()
}

/// Current local wall-clock time.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Wall clock that never runs backwards.
///
/// If the system clock steps back (NTP correction, manual change) the last
/// issued timestamp is repeated until real time catches up.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Option<NaiveDateTime>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp using the current local time.
    pub fn now(&mut self) -> NaiveDateTime {
        self.observe(now_local())
    }

    /// Stamp an externally observed time, clamped to the last one issued.
    pub fn observe(&mut self, t: NaiveDateTime) -> NaiveDateTime {
        let stamped = match self.last {
            Some(last) if t < last => last,
            _ => t,
        };
        self.last = Some(stamped);
        stamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn format_uses_millisecond_precision() {
        assert_eq!(format_stored(at(10, 0, 5, 7)), "2024-05-01 10:00:05.007");
    }

    #[test]
    fn parse_accepts_stored_format() {
        assert_eq!(parse_stored("2024-05-01 10:00:05.007"), Some(at(10, 0, 5, 7)));
    }

    #[test]
    fn parse_accepts_other_fraction_widths() {
        assert_eq!(parse_stored("2024-05-01 10:00:05.5"), Some(at(10, 0, 5, 500)));
        assert_eq!(parse_stored("2024-05-01 10:00:05"), Some(at(10, 0, 5, 0)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_stored("10:00:00"), None);
        assert_eq!(parse_stored(""), None);
        assert_eq!(parse_stored("2024-13-01 10:00:00.000"), None);
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let mut clock = MonotonicClock::new();
        assert_eq!(clock.observe(at(10, 0, 1, 0)), at(10, 0, 1, 0));
        assert_eq!(clock.observe(at(9, 59, 59, 0)), at(10, 0, 1, 0));
        assert_eq!(clock.observe(at(10, 0, 2, 0)), at(10, 0, 2, 0));
    }
}
