//! Timer handles, the scheduler operations that mutate them, and the two
//! integration points the surrounding event loop calls each iteration.
//!
//! The model is single-threaded and run-to-completion: the loop refreshes its
//! time snapshot, asks [`TimerDriver::wait_budget`] how long it may block on
//! I/O, and after polling calls [`TimerDriver::run_expired`] to fire every
//! timer due at the snapshot. Callbacks run synchronously and may re-enter any
//! scheduler operation, including on the timer currently firing; the firing
//! pass unlinks and rearms a timer before its callback runs, so the callback
//! always observes consistent state.

use std::rc::Rc;

use crate::{
    heap::{Deadline, TimerHeap},
    TimerError,
};

/// Handle to a timer slot owned by a [`TimerDriver`].
///
/// Ids are never reused; a closed timer's id stays inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) usize);

impl TimerId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Timer callback, invoked synchronously from [`TimerDriver::run_expired`].
///
/// The driver is passed back in so the callback can stop, restart, or rearm
/// timers (itself included) while firing.
pub type TimerCallback = Rc<dyn Fn(&mut TimerDriver, TimerId)>;

#[derive(Default)]
struct TimerSlot {
    callback: Option<TimerCallback>,
    deadline: u64,
    repeat: u64,
    active: bool,
    closing: bool,
}

/// How long the I/O backend may block before the next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitBudget {
    /// No timers are scheduled; block with no timeout.
    Indefinite,
    /// An expired timer already exists; do not block at all.
    Immediate,
    /// Block at most this long, in the loop's clock units.
    Duration(u64),
}

impl WaitBudget {
    /// Collapses the budget into the timeout convention of poll-style
    /// backends: -1 blocks indefinitely, 0 returns at once, positive values
    /// are clamped to what an `i32` can carry.
    pub fn poll_timeout(self) -> i32 {
        match self {
            WaitBudget::Indefinite => -1,
            WaitBudget::Immediate => 0,
            WaitBudget::Duration(d) => d.min(i32::MAX as u64) as i32,
        }
    }
}

/// Loop-scoped timer state: the clock snapshot, the sequence counter, the
/// deadline heap, and the slot arena handles index into.
///
/// One driver per event loop; independent loops stay fully isolated.
#[derive(Default)]
pub struct TimerDriver {
    now: u64,
    seq: u64,
    heap: TimerHeap,
    slots: Vec<TimerSlot>,
    active: usize,
}

impl TimerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, inactive timer slot. No heap interaction.
    pub fn init(&mut self) -> TimerId {
        let id = TimerId(self.slots.len());
        self.slots.push(TimerSlot::default());
        id
    }

    /// Arms `id` to fire once `delay` has elapsed from the current snapshot,
    /// then every `repeat` thereafter (`repeat = 0` means one-shot).
    ///
    /// An already-active timer is rescheduled, not duplicated. A delay that
    /// would overflow the clock clamps the deadline to `u64::MAX`. Fails only
    /// if the handle is closing.
    pub fn start(
        &mut self,
        id: TimerId,
        callback: TimerCallback,
        delay: u64,
        repeat: u64,
    ) -> Result<(), TimerError> {
        if self.slots[id.index()].closing {
            return Err(TimerError::ClosingHandle);
        }
        if self.slots[id.index()].active {
            self.stop(id);
        }

        let deadline = self.now.saturating_add(delay);
        let seq = self.seq;
        self.seq += 1;

        let slot = &mut self.slots[id.index()];
        slot.callback = Some(callback);
        slot.deadline = deadline;
        slot.repeat = repeat;
        slot.active = true;

        self.heap.insert(id, Deadline { at: deadline, seq });
        self.active += 1;
        log::trace!("timer {id:?} armed: deadline={deadline} repeat={repeat}");
        Ok(())
    }

    /// Disarms `id`. Idempotent; stopping an inactive timer is a no-op.
    pub fn stop(&mut self, id: TimerId) {
        if !self.slots[id.index()].active {
            return;
        }
        self.heap.remove(id);
        self.slots[id.index()].active = false;
        self.active -= 1;
        log::trace!("timer {id:?} stopped");
    }

    /// Rearms `id` using its stored repeat interval as both the new delay and
    /// the new interval. Fails if the timer has no callback or is one-shot.
    pub fn again(&mut self, id: TimerId) -> Result<(), TimerError> {
        let slot = &self.slots[id.index()];
        let callback = slot.callback.clone().ok_or(TimerError::MissingCallback)?;
        if slot.repeat == 0 {
            return Err(TimerError::RepeatNotSet);
        }
        let repeat = slot.repeat;
        self.start(id, callback, repeat, repeat)
    }

    /// Sets the repeat interval for future rearms. The currently scheduled
    /// deadline, if any, is left untouched.
    pub fn set_repeat(&mut self, id: TimerId, repeat: u64) {
        self.slots[id.index()].repeat = repeat;
    }

    pub fn repeat(&self, id: TimerId) -> u64 {
        self.slots[id.index()].repeat
    }

    /// The absolute deadline `id` was last armed with.
    pub fn deadline(&self, id: TimerId) -> u64 {
        self.slots[id.index()].deadline
    }

    /// True while `id` occupies a slot in the deadline heap.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.slots[id.index()].active
    }

    /// Number of currently armed timers, for loop-liveness decisions.
    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn has_active(&self) -> bool {
        self.active > 0
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Refreshes the loop's time snapshot. Called once per loop iteration,
    /// before [`Self::run_expired`]; the clock never runs backwards.
    pub fn update_time(&mut self, now: u64) {
        debug_assert!(now >= self.now, "loop clock must not run backwards");
        self.now = now;
    }

    /// How long the loop may block on I/O before the next deadline.
    ///
    /// Read-only; consulted before every blocking wait.
    pub fn wait_budget(&self) -> WaitBudget {
        match self.heap.peek() {
            None => WaitBudget::Indefinite,
            Some((key, _)) if key.at <= self.now => WaitBudget::Immediate,
            Some((key, _)) => WaitBudget::Duration(key.at - self.now),
        }
    }

    /// Fires every timer whose deadline is at or before the current snapshot.
    ///
    /// Each iteration re-peeks the heap fresh, since the callback just run may
    /// have rescheduled anything. A due timer is stopped first, rearmed if
    /// repeating, and only then invoked; a rearmed deadline lands strictly
    /// after the snapshot, so no timer fires twice in one pass.
    pub fn run_expired(&mut self) {
        loop {
            let (key, id) = match self.heap.peek() {
                Some(min) => min,
                None => break,
            };
            if key.at > self.now {
                break;
            }

            self.stop(id);
            // schedule the next occurrence; errors just mean one-shot
            let _ = self.again(id);

            log::trace!("timer {id:?} fired at {}", self.now);
            if let Some(callback) = self.slots[id.index()].callback.clone() {
                callback(self, id);
            }
        }
    }

    /// Terminal step before the surrounding lifecycle code releases a handle:
    /// guarantees the timer is unlinked from the heap and refuses any further
    /// scheduling of this id.
    pub fn close(&mut self, id: TimerId) {
        self.stop(id);
        let slot = &mut self.slots[id.index()];
        slot.closing = true;
        slot.callback = None;
    }
}
