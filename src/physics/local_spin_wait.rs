use std::hint;
use std::thread;

/// Behaves like a framework SpinWait, but never voluntarily relinquishes the timeslice to off-core threads.
///
/// The locks it backs guard a handful of scalar fields on an island member and are held for a few
/// instructions at most, so a short exponential spin followed by yields is all that's ever needed.
/// Sleeping would widen the set of schedulable threads to ones not native to the current core and
/// stall the candidacy pass for far longer than the lock is ever held.
pub(crate) struct LocalSpinWait {
    pub wait_count: i32,
}

impl LocalSpinWait {
    // A contended member lock is released within nanoseconds; anything longer means the holder was
    // preempted, and yielding gives it the core back.
    pub const YIELD_THRESHOLD: i32 = 3;

    #[inline(always)]
    pub fn new() -> Self {
        Self { wait_count: 0 }
    }

    #[inline(always)]
    pub fn spin_once(&mut self) {
        if self.wait_count >= Self::YIELD_THRESHOLD {
            thread::yield_now();
        } else {
            let spin_count = 1 << self.wait_count;
            for _ in 0..spin_count {
                hint::spin_loop();
            }
            self.wait_count += 1;
        }
    }
}
