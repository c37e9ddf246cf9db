/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn advanced(self, dt_s: f64) -> Time {
        Time(self.0 + dt_s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn starting_at(start: Time, duration_s: f64) -> Self {
        Self {
            start,
            end: Time(start.0 + duration_s.max(0.0)),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    /// Fraction of the span elapsed at `t`, clamped to `[0, 1]`.
    ///
    /// Zero-length spans are complete as soon as `t` reaches `start`.
    pub fn progress(&self, t: Time) -> f64 {
        let d = self.duration();
        if d <= 0.0 {
            return if t.0 >= self.start.0 { 1.0 } else { 0.0 };
        }
        ((t.0 - self.start.0) / d).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, t: Time) -> bool {
        t.0 >= self.end.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Time, TimeSpan};

    #[test]
    fn progress_is_clamped() {
        let span = TimeSpan::starting_at(Time(1.0), 2.0);
        assert_eq!(span.progress(Time(0.0)), 0.0);
        assert_eq!(span.progress(Time(2.0)), 0.5);
        assert_eq!(span.progress(Time(9.0)), 1.0);
        assert!(!span.is_finished(Time(2.9)));
        assert!(span.is_finished(Time(3.0)));
    }

    #[test]
    fn zero_length_span_completes_immediately() {
        let span = TimeSpan::starting_at(Time(4.0), 0.0);
        assert_eq!(span.duration(), 0.0);
        assert_eq!(span.progress(Time(3.0)), 0.0);
        assert_eq!(span.progress(Time(4.0)), 1.0);
    }
}
