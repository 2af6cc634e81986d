use std::{fmt, time};

use crate::v4l_sys::timeval;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Timestamp consisting of a seconds and a microseconds component
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    /// Returns a timestamp representation
    ///
    /// # Arguments
    ///
    /// * `sec` - Seconds
    /// * `usec` - Microseconds
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Timestamp;
    /// let ts = Timestamp::new(5, 5);
    /// ```
    pub const fn new(sec: i64, usec: i64) -> Self {
        Timestamp { sec, usec }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let floating: f64 = self.sec as f64 + self.usec as f64 / 1_000_000.0;
        write!(f, "{} [s]", floating)
    }
}

impl From<timeval> for Timestamp {
    fn from(tv: timeval) -> Self {
        Timestamp {
            sec: tv.tv_sec as i64,
            usec: tv.tv_usec as i64,
        }
    }
}

impl From<Timestamp> for time::Duration {
    fn from(ts: Timestamp) -> Self {
        time::Duration::from_secs(ts.sec.max(0) as u64)
            + time::Duration::from_micros(ts.usec.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_duration() {
        let ts = Timestamp::new(2, 500_000);
        assert_eq!(time::Duration::from(ts), time::Duration::from_millis(2500));
        assert_eq!(ts.to_string(), "2.5 [s]");
    }
}
