use std::ops::RangeBounds;

pub trait WithinExt {
    fn within(&self, range: impl RangeBounds<Self>) -> bool;
}

impl <T: PartialOrd<T>> WithinExt for T {
    fn within(&self, range: impl RangeBounds<Self>) -> bool {
        range.contains(self)
    }
}

pub trait SelectionExt {
    /// Moves a selection index by `delta`, staying within `0..len`.
    fn step_within(self, delta: isize, len: usize) -> usize;
}

impl SelectionExt for usize {
    fn step_within(self, delta: isize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.saturating_add_signed(delta).min(len - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_half_open_range() {
        assert!(0usize.within(0..3));
        assert!(2usize.within(0..3));
        assert!(!3usize.within(0..3));
        assert!(!0usize.within(0..0));
    }

    #[test]
    fn step_stays_in_bounds() {
        assert_eq!(0usize.step_within(-1, 3), 0);
        assert_eq!(1usize.step_within(1, 3), 2);
        assert_eq!(2usize.step_within(1, 3), 2);
        assert_eq!(5usize.step_within(0, 3), 2);
        assert_eq!(4usize.step_within(1, 0), 0);
    }
}
