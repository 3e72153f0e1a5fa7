use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Daily news/event window (UTC) during which trading is suppressed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlackoutWindow {
    pub hour: u32,
    pub minute: u32,
    pub duration_minutes: u32,
}

impl BlackoutWindow {
    pub fn new(hour: u32, minute: u32, duration_minutes: u32) -> Self {
        Self {
            hour,
            minute,
            duration_minutes,
        }
    }

    /// Whether `now` falls inside the window; windows may run past midnight
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let minute_of_day = (now.hour() * 60 + now.minute()) as i64;
        let start = (self.hour * 60 + self.minute) as i64;
        (minute_of_day - start).rem_euclid(MINUTES_PER_DAY) < self.duration_minutes as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlackoutCalendar {
    windows: Vec<BlackoutWindow>,
}

impl BlackoutCalendar {
    pub fn new(windows: Vec<BlackoutWindow>) -> Self {
        Self { windows }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.windows.iter().any(|w| w.is_active(now))
    }

    pub fn windows(&self) -> &[BlackoutWindow] {
        &self.windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let nfp = BlackoutWindow::new(13, 30, 30);
        assert!(!nfp.is_active(at(13, 29)));
        assert!(nfp.is_active(at(13, 30)));
        assert!(nfp.is_active(at(13, 59)));
        assert!(!nfp.is_active(at(14, 0)));
    }

    #[test]
    fn test_window_past_midnight() {
        let late = BlackoutWindow::new(23, 50, 20);
        assert!(late.is_active(at(23, 55)));
        assert!(late.is_active(at(0, 5)));
        assert!(!late.is_active(at(0, 10)));
    }

    #[test]
    fn test_calendar() {
        let calendar = BlackoutCalendar::new(vec![
            BlackoutWindow::new(8, 0, 15),
            BlackoutWindow::new(14, 0, 15),
        ]);
        assert!(calendar.is_active(at(14, 10)));
        assert!(!calendar.is_active(at(12, 0)));
        assert!(!BlackoutCalendar::default().is_active(at(8, 0)));
    }
}
