use std::collections::BTreeSet;

use crate::spatial::Position;

/// Queue of positions reported as changed after the initial scan finished.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    queue: BTreeSet<Position>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `pos`. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, pos: Position) -> bool {
        self.queue.insert(pos)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.queue.contains(&pos)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Recheck every queued position that `is_loaded` accepts; the rest stay queued.
    pub fn drain<L, R>(&mut self, mut is_loaded: L, mut recheck: R) -> usize
    where
        L: FnMut(Position) -> bool,
        R: FnMut(Position),
    {
        let mut rechecked = 0;
        self.queue.retain(|&pos| {
            if is_loaded(pos) {
                recheck(pos);
                rechecked += 1;
                false
            } else {
                true
            }
        });
        rechecked
    }
}
