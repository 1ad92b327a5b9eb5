use std::collections::BTreeSet;
use std::ops::Bound;
use std::time::Duration;

use web_time::Instant;

use crate::source::{LiveSource, TargetSource};
use crate::spatial::RegionPos;

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Wall-clock allowance for one tick, measured from the scheduler's tick start.
pub struct TickBudget<'a> {
    tick_start: Instant,
    limit: Duration,
    clock: &'a dyn Clock,
}

impl<'a> TickBudget<'a> {
    pub fn new(tick_start: Instant, limit: Duration, clock: &'a dyn Clock) -> Self {
        Self {
            tick_start,
            limit,
            clock,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.clock.now().saturating_duration_since(self.tick_start) >= self.limit
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerStep {
    pub scanned: usize,
    /// The budget ran out before every pending region was looked at.
    pub exhausted: bool,
}

/// A region is ready once the target has it and the live world has it plus all eight neighbours.
pub fn region_ready(region: RegionPos, target: &dyn TargetSource, live: &dyn LiveSource) -> bool {
    target.is_region_generated(region)
        && region
            .neighborhood()
            .all(|neighbor| live.is_region_generated(neighbor))
}

/// Pending regions not yet scanned.
///
/// Regions are visited round-robin from a cursor that persists across ticks,
/// so regions that stay unloaded do not starve the ones behind them.
#[derive(Clone, Debug, Default)]
pub struct AvailabilityTracker {
    pending: BTreeSet<RegionPos>,
    total: usize,
    cursor: Option<RegionPos>,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset<I: IntoIterator<Item = RegionPos>>(&mut self, regions: I) {
        self.pending = regions.into_iter().collect();
        self.total = self.pending.len();
        self.cursor = None;
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.total = 0;
        self.cursor = None;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn total_count(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.pending.iter().copied()
    }

    fn next_pending(&self) -> Option<RegionPos> {
        let after = match self.cursor {
            Some(cursor) => self
                .pending
                .range((Bound::Excluded(cursor), Bound::Unbounded))
                .next(),
            None => None,
        };
        after.or_else(|| self.pending.iter().next()).copied()
    }

    /// Visit pending regions until the budget runs out or each has been looked at once.
    pub fn step<R, S>(&mut self, budget: &TickBudget<'_>, mut is_ready: R, mut scan: S) -> TrackerStep
    where
        R: FnMut(RegionPos) -> bool,
        S: FnMut(RegionPos),
    {
        let mut report = TrackerStep::default();
        let to_visit = self.pending.len();
        let mut visited = 0;

        while visited < to_visit {
            if budget.exhausted() {
                report.exhausted = true;
                break;
            }
            let Some(region) = self.next_pending() else {
                break;
            };
            visited += 1;
            self.cursor = Some(region);

            if is_ready(region) {
                scan(region);
                self.pending.remove(&region);
                report.scanned += 1;
            }
        }

        report
    }
}

/// Clock that moves forward by a fixed step every time it is read.
#[cfg(test)]
pub(crate) struct SteppingClock {
    now: std::cell::Cell<Instant>,
    step: Duration,
}

#[cfg(test)]
impl SteppingClock {
    pub(crate) fn new(step: Duration) -> Self {
        Self {
            now: std::cell::Cell::new(Instant::now()),
            step,
        }
    }

    pub(crate) fn peek(&self) -> Instant {
        self.now.get()
    }
}

#[cfg(test)]
impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        let next = self.now.get() + self.step;
        self.now.set(next);
        next
    }
}
