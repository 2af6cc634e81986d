use std::fmt;

use crate::v4l_sys::v4l2_fract;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Fraction used for timing settings, e.g. seconds per frame
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    /// Returns a fraction representation
    ///
    /// # Arguments
    ///
    /// * `num` - Numerator
    /// * `denom` - Denominator
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Fraction;
    /// let frac = Fraction::new(1, 30);
    /// ```
    pub const fn new(num: u32, denom: u32) -> Self {
        Fraction {
            numerator: num,
            denominator: denom,
        }
    }

    /// Frames per second when the fraction is a frame interval
    ///
    /// Drivers without frame interval support report 0/0, which yields `None`.
    pub fn frames_per_second(&self) -> Option<f64> {
        if self.numerator == 0 || self.denominator == 0 {
            None
        } else {
            Some(f64::from(self.denominator) / f64::from(self.numerator))
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<v4l2_fract> for Fraction {
    fn from(frac: v4l2_fract) -> Self {
        Self {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

impl From<Fraction> for v4l2_fract {
    fn from(fraction: Fraction) -> Self {
        Self {
            numerator: fraction.numerator,
            denominator: fraction.denominator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_to_rate() {
        assert_eq!(Fraction::new(1, 30).frames_per_second(), Some(30.0));
        assert_eq!(Fraction::new(1001, 30000).to_string(), "1001/30000");
        assert_eq!(Fraction::default().frames_per_second(), None);
    }
}
