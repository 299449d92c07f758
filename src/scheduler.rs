use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

/// Identifies one pending one-shot timer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TimerToken(pub u64);

/// One-shot deferred execution. A timer fires once; the owner re-arms it from
/// inside its own handler to get a periodic task.
pub trait Scheduler {
    fn after(&mut self, delay: Duration) -> TimerToken;

    fn cancel(&mut self, token: TimerToken);
}

/// Deadline-ordered timers for a single-threaded host loop.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_token: u64,
    pending: BinaryHeap<Reverse<(Instant, TimerToken)>>,
    cancelled: HashSet<TimerToken>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule_at(&mut self, deadline: Instant) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending.push(Reverse((deadline, token)));
        token
    }

    /// Deadline of the earliest live timer.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.drop_cancelled();
        self.pending.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Pops the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerToken> {
        self.drop_cancelled();
        match self.pending.peek() {
            Some(Reverse((deadline, _))) if *deadline <= now => {
                self.pending.pop().map(|Reverse((_, token))| token)
            }
            _ => None,
        }
    }

    pub fn is_empty(&mut self) -> bool {
        self.next_deadline().is_none()
    }

    fn drop_cancelled(&mut self) {
        while let Some(Reverse((_, token))) = self.pending.peek() {
            if !self.cancelled.remove(token) {
                break;
            }
            self.pending.pop();
        }
    }
}

impl Scheduler for TimerQueue {
    fn after(&mut self, delay: Duration) -> TimerToken {
        self.schedule_at(Instant::now() + delay)
    }

    fn cancel(&mut self, token: TimerToken) {
        if self
            .pending
            .iter()
            .any(|Reverse((_, pending))| *pending == token)
        {
            self.cancelled.insert(token);
        }
    }
}
