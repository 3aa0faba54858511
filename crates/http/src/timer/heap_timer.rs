//! Indexed binary min-heap of timers.
//!
//! Nodes live in a `Vec` ordered as a min-heap by expiry. Callers never see slot positions:
//! they address timers by a stable id, and an `id -> slot` map is updated on every swap so it
//! always tells where a node currently sits. That makes updating or cancelling a timer
//! `O(log n)` instead of a linear scan.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Callback run once when a timer expires.
pub type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

const INIT_HEAP_CAPACITY: usize = 64;

struct TimerNode<Id> {
    id: Id,
    expires: Instant,
    callback: TimeoutCallback,
}

/// A min-heap of timers addressed by id.
pub struct HeapTimer<Id = u64> {
    heap: Vec<TimerNode<Id>>,
    slots: HashMap<Id, usize>,
}

impl<Id> fmt::Debug for HeapTimer<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapTimer").field("len", &self.heap.len()).finish_non_exhaustive()
    }
}

impl<Id> Default for HeapTimer<Id>
where
    Id: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self { heap: Vec::with_capacity(INIT_HEAP_CAPACITY), slots: HashMap::with_capacity(INIT_HEAP_CAPACITY) }
    }
}

impl<Id> HeapTimer<Id>
where
    Id: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: Id) -> bool {
        self.slots.contains_key(&id)
    }

    /// Adds a timer for `id`, or replaces the expiry and callback of the existing one.
    pub fn add<F>(&mut self, id: Id, timeout: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_at(Instant::now(), id, timeout, callback);
    }

    /// Same as [`HeapTimer::add`] with an explicit notion of "now".
    pub fn add_at<F>(&mut self, now: Instant, id: Id, timeout: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let expires = now + timeout;
        match self.slots.get(&id).copied() {
            None => {
                let index = self.heap.len();
                self.slots.insert(id, index);
                self.heap.push(TimerNode { id, expires, callback: Box::new(callback) });
                self.sift_up(index);
            }
            Some(index) => {
                let node = &mut self.heap[index];
                node.expires = expires;
                node.callback = Box::new(callback);
                // an update may move the node either way
                if !self.sift_down(index, self.heap.len()) {
                    self.sift_up(index);
                }
            }
        }
    }

    /// Moves the expiry of an existing timer to `now + timeout`, keeping its callback.
    ///
    /// Returns `false` if no timer exists for `id`.
    pub fn adjust(&mut self, id: Id, timeout: Duration) -> bool {
        self.adjust_at(Instant::now(), id, timeout)
    }

    pub fn adjust_at(&mut self, now: Instant, id: Id, timeout: Duration) -> bool {
        let Some(index) = self.slots.get(&id).copied() else {
            return false;
        };
        self.heap[index].expires = now + timeout;
        if !self.sift_down(index, self.heap.len()) {
            self.sift_up(index);
        }
        true
    }

    /// Removes the timer for `id` without running its callback.
    pub fn cancel(&mut self, id: Id) -> bool {
        match self.slots.get(&id).copied() {
            Some(index) => {
                self.delete(index);
                true
            }
            None => false,
        }
    }

    /// Runs the callback of `id` right away and removes the timer.
    pub fn do_work(&mut self, id: Id) -> bool {
        match self.slots.get(&id).copied() {
            Some(index) => {
                let node = self.delete(index);
                (node.callback)();
                true
            }
            None => false,
        }
    }

    /// Fires every timer whose expiry is not in the future. Returns how many fired.
    pub fn tick(&mut self) -> usize {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(root) = self.heap.first() {
            if root.expires > now {
                break;
            }
            let node = self.delete(0);
            (node.callback)();
            fired += 1;
        }
        fired
    }

    /// Fires overdue timers, then returns how long until the next one expires.
    ///
    /// `None` means there is no timer at all; a timer that is already due yields
    /// `Duration::ZERO`.
    pub fn next_tick(&mut self) -> Option<Duration> {
        self.next_tick_at(Instant::now())
    }

    pub fn next_tick_at(&mut self, now: Instant) -> Option<Duration> {
        self.tick_at(now);
        self.heap.first().map(|root| root.expires.saturating_duration_since(now))
    }

    /// Removes the earliest timer without running it.
    pub fn pop(&mut self) {
        if !self.heap.is_empty() {
            self.delete(0);
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.slots.clear();
    }

    fn delete(&mut self, index: usize) -> TimerNode<Id> {
        let node = self.heap.swap_remove(index);
        self.slots.remove(&node.id);

        if index < self.heap.len() {
            // the former last node now sits at `index`
            self.slots.insert(self.heap[index].id, index);
            if !self.sift_down(index, self.heap.len()) {
                self.sift_up(index);
            }
        }
        node
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[parent].expires <= self.heap[index].expires {
                break;
            }
            self.swap_node(index, parent);
            index = parent;
        }
    }

    /// Sifts the node at `index` down within `[0, bound)`. Returns whether it moved.
    fn sift_down(&mut self, index: usize, bound: usize) -> bool {
        let mut i = index;
        let mut child = 2 * i + 1;
        while child < bound {
            if child + 1 < bound && self.heap[child + 1].expires < self.heap[child].expires {
                child += 1;
            }
            if self.heap[child].expires >= self.heap[i].expires {
                break;
            }
            self.swap_node(i, child);
            i = child;
            child = 2 * i + 1;
        }
        i > index
    }

    fn swap_node(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.slots.insert(self.heap[i].id, i);
        self.slots.insert(self.heap[j].id, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn assert_heap_valid<Id: Copy + Eq + Hash + fmt::Debug>(timer: &HeapTimer<Id>) {
        assert_eq!(timer.heap.len(), timer.slots.len());
        for (index, node) in timer.heap.iter().enumerate() {
            assert_eq!(timer.slots.get(&node.id), Some(&index), "slot map out of date for {:?}", node.id);
            if index > 0 {
                let parent = &timer.heap[(index - 1) / 2];
                assert!(parent.expires <= node.expires, "heap order broken at {index}");
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(u64) -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let make = move |id: u64| -> Box<dyn FnOnce() + Send> {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(id))
        };
        (fired, make)
    }

    #[test]
    fn tick_fires_expired_in_order() {
        let now = Instant::now();
        let (fired, make) = recorder();
        let mut timer = HeapTimer::new();

        for (id, timeout) in [(1, 50), (2, 10), (3, 30), (4, 70), (5, 20)] {
            timer.add_at(now, id, ms(timeout), make(id));
        }
        assert_heap_valid(&timer);

        assert_eq!(timer.tick_at(now + ms(30)), 3);
        assert_eq!(*fired.lock().unwrap(), vec![2, 5, 3]);
        assert_eq!(timer.len(), 2);
        assert!(!timer.contains(3));
        assert_heap_valid(&timer);
    }

    #[test]
    fn update_moves_node_both_ways() {
        let now = Instant::now();
        let mut timer = HeapTimer::new();
        for id in 0..10u64 {
            timer.add_at(now, id, ms(100 + id * 10), || {});
        }

        // earlier than everyone: must surface to the root
        timer.add_at(now, 9, ms(1), || {});
        assert_heap_valid(&timer);
        assert_eq!(timer.heap[0].id, 9);

        // later than everyone: must sink away from the root
        timer.add_at(now, 9, ms(1000), || {});
        assert_heap_valid(&timer);
        assert_eq!(timer.heap[0].id, 0);

        assert!(timer.adjust_at(now, 0, ms(2000)));
        assert_heap_valid(&timer);
        assert_eq!(timer.heap[0].id, 1);
        assert!(!timer.adjust_at(now, 42, ms(1)));
    }

    #[test]
    fn update_replaces_callback() {
        let now = Instant::now();
        let (fired, make) = recorder();
        let mut timer = HeapTimer::new();

        timer.add_at(now, 7, ms(10), make(1));
        timer.add_at(now, 7, ms(10), make(2));

        assert_eq!(timer.len(), 1);
        timer.tick_at(now + ms(10));
        assert_eq!(*fired.lock().unwrap(), vec![2]);
    }

    #[test]
    fn cancel_does_not_run_callback() {
        let now = Instant::now();
        let (fired, make) = recorder();
        let mut timer = HeapTimer::new();
        timer.add_at(now, 1, ms(10), make(1));
        timer.add_at(now, 2, ms(20), make(2));

        assert!(timer.cancel(1));
        assert!(!timer.cancel(1));
        assert_heap_valid(&timer);

        timer.tick_at(now + ms(100));
        assert_eq!(*fired.lock().unwrap(), vec![2]);
    }

    #[test]
    fn do_work_runs_immediately() {
        let now = Instant::now();
        let (fired, make) = recorder();
        let mut timer = HeapTimer::new();
        timer.add_at(now, 1, ms(10_000), make(1));
        timer.add_at(now, 2, ms(10_000), make(2));

        assert!(timer.do_work(2));
        assert!(!timer.do_work(2));
        assert_eq!(*fired.lock().unwrap(), vec![2]);
        assert_eq!(timer.len(), 1);
    }

    #[test]
    fn next_tick_reports_remaining_time() {
        let now = Instant::now();
        let mut timer: HeapTimer<u64> = HeapTimer::new();
        assert_eq!(timer.next_tick_at(now), None);

        timer.add_at(now, 1, ms(40), || {});
        timer.add_at(now, 2, ms(15), || {});
        assert_eq!(timer.next_tick_at(now), Some(ms(15)));
        assert_eq!(timer.next_tick_at(now + ms(20)), Some(ms(20)));
        assert_eq!(timer.len(), 1);

        assert_eq!(timer.next_tick_at(now + ms(100)), None);
        assert!(timer.is_empty());
    }

    #[test]
    fn random_operations_keep_min_at_root() {
        let now = Instant::now();
        let mut timer = HeapTimer::new();
        let mut expiries: HashMap<u64, u64> = HashMap::new();
        let mut seed = 0x2545_f491_4f6c_dd1d_u64;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        let mut clock = 0;
        for _ in 0..2000 {
            let id = next() % 64;
            match next() % 4 {
                0 | 1 => {
                    let timeout = clock + next() % 500;
                    timer.add_at(now, id, ms(timeout), || {});
                    expiries.insert(id, timeout);
                }
                2 => {
                    assert_eq!(timer.cancel(id), expiries.remove(&id).is_some());
                }
                _ => {
                    clock += next() % 20;
                    timer.tick_at(now + ms(clock));
                    expiries.retain(|_, expiry| *expiry > clock);
                }
            }

            assert_heap_valid(&timer);
            assert_eq!(timer.len(), expiries.len());
            if let Some(min) = expiries.values().min() {
                assert_eq!(timer.heap[0].expires, now + ms(*min));
            }
        }
    }

    #[test]
    fn pop_and_clear() {
        let now = Instant::now();
        let mut timer = HeapTimer::new();
        timer.add_at(now, 1u32, ms(5), || {});
        timer.add_at(now, 2u32, ms(1), || {});

        timer.pop();
        assert!(!timer.contains(2));
        assert_heap_valid(&timer);

        timer.clear();
        assert!(timer.is_empty());
        timer.pop();
    }
}
