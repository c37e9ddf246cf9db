use foundation::time::Time;

/// Deterministic frame metadata.
///
/// Animation code advances by whole frames of fixed `dt_s`, so the same number
/// of frames always produces the same camera motion regardless of how late a
/// tick fired.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time (seconds).
    pub dt_s: f64,
    /// Time at the start of the frame (seconds since the ticker started).
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    pub fn from_rate(index: u64, frames_per_second: u32) -> Self {
        Self::new(index, 1.0 / frames_per_second.max(1) as f64)
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 1.0 / 60.0);
        let b = Frame::new(10, 1.0 / 60.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(10.0 / 60.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, 0.5);
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }

    #[test]
    fn from_rate_guards_zero() {
        assert_eq!(Frame::from_rate(0, 0).dt_s, 1.0);
        assert_eq!(Frame::from_rate(0, 4).dt_s, 0.25);
    }
}
