// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parked-waiter bookkeeping for [`Cond`](crate::locking::Cond).
//!
//! Each caller inside `Ticket::wait` owns a [`Wakeup`] that is linked into the
//! Cond's [`WaiterList`]. Wakers unlink and fire it; a cancelled waiter
//! unlinks itself through its [`WaiterHandle`]. Whichever side unlinks first
//! wins, and the other side's unlink is a no-op.

use crate::error::Result;
use crate::locking::cancellation::CancellationToken;
use crate::locking::parking::Parking;
use std::sync::Arc;

/// One-shot wakeup shared between a parked waiter and the waiter list.
#[derive(Debug, Clone)]
pub(crate) struct Wakeup {
    fired: Arc<Parking<bool>>,
}

impl Wakeup {
    pub(crate) fn new() -> Self {
        Self {
            fired: Arc::new(Parking::new(false)),
        }
    }

    /// Fires the wakeup. Returns false if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        {
            let mut fired = self.fired.lock();
            if *fired {
                return false;
            }
            *fired = true;
        }
        self.fired.notify_one();
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        *self.fired.lock()
    }

    /// Blocks until fired or until `token` fires. A fired wakeup always wins.
    pub(crate) fn wait(&self, token: &CancellationToken) -> Result<()> {
        self.fired.wait_while(token, |fired| !*fired).map(|_| ())
    }
}

/// Stable position of a wakeup inside a [`WaiterList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node {
    wakeup: Option<Wakeup>,
    generation: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// FIFO of parked wakeups with O(1) push, pop and removal by handle.
///
/// Nodes live in a slab whose freed slots are reused; the generation stamp
/// on every handle makes removal through a stale handle a no-op.
#[derive(Debug, Default)]
pub(crate) struct WaiterList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    generation: u64,
}

impl WaiterList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn push_back(&mut self, wakeup: Wakeup) -> WaiterHandle {
        self.generation += 1;
        let node = Node {
            wakeup: Some(wakeup),
            generation: self.generation,
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        WaiterHandle {
            index,
            generation: self.generation,
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<Wakeup> {
        let head = self.head?;
        self.unlink(head)
    }

    /// Removes the wakeup behind `handle`; false if it was already removed.
    pub(crate) fn remove(&mut self, handle: WaiterHandle) -> bool {
        let linked = self.nodes.get(handle.index).is_some_and(|node| {
            node.generation == handle.generation && node.wakeup.is_some()
        });
        linked && self.unlink(handle.index).is_some()
    }

    /// Empties the list, returning wakeups oldest first.
    pub(crate) fn drain(&mut self) -> Vec<Wakeup> {
        let mut drained = Vec::with_capacity(self.len);
        while let Some(wakeup) = self.pop_front() {
            drained.push(wakeup);
        }
        drained
    }

    fn unlink(&mut self, index: usize) -> Option<Wakeup> {
        let node = &mut self.nodes[index];
        let wakeup = node.wakeup.take()?;
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }

        self.free.push(index);
        self.len -= 1;
        Some(wakeup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelError;
    use std::thread;
    use std::time::Duration;

    fn ids(list: &mut WaiterList, wakeups: &[Wakeup]) -> Vec<usize> {
        list.drain()
            .into_iter()
            .map(|drained| {
                wakeups
                    .iter()
                    .position(|w| Arc::ptr_eq(&w.fired, &drained.fired))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut list = WaiterList::new();
        let wakeups: Vec<Wakeup> = (0..4).map(|_| Wakeup::new()).collect();
        for wakeup in &wakeups {
            list.push_back(wakeup.clone());
        }

        let first = list.pop_front().unwrap();
        assert!(Arc::ptr_eq(&first.fired, &wakeups[0].fired));
        assert_eq!(list.len(), 3);
        assert_eq!(ids(&mut list, &wakeups), vec![1, 2, 3]);
        assert!(list.is_empty());
        assert!(list.pop_front().is_none());
    }

    #[test]
    fn removes_from_the_middle_and_ends() {
        let mut list = WaiterList::new();
        let wakeups: Vec<Wakeup> = (0..5).map(|_| Wakeup::new()).collect();
        let handles: Vec<WaiterHandle> = wakeups
            .iter()
            .map(|wakeup| list.push_back(wakeup.clone()))
            .collect();

        assert!(list.remove(handles[2]));
        assert!(list.remove(handles[0]));
        assert!(list.remove(handles[4]));
        assert_eq!(ids(&mut list, &wakeups), vec![1, 3]);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut list = WaiterList::new();
        let handle = list.push_back(Wakeup::new());

        assert!(list.remove(handle));
        assert!(!list.remove(handle));
        assert!(list.is_empty());
    }

    #[test]
    fn removal_after_pop_is_a_no_op() {
        let mut list = WaiterList::new();
        let handle = list.push_back(Wakeup::new());
        list.push_back(Wakeup::new());

        assert!(list.pop_front().is_some());
        assert!(!list.remove(handle));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn stale_handle_does_not_remove_reused_slot() {
        let mut list = WaiterList::new();
        let stale = list.push_back(Wakeup::new());
        assert!(list.remove(stale));

        let fresh = list.push_back(Wakeup::new());
        assert_eq!(fresh.index, stale.index);
        assert!(!list.remove(stale));
        assert_eq!(list.len(), 1);
        assert!(list.remove(fresh));
    }

    #[test]
    fn wakeup_fires_once() {
        let wakeup = Wakeup::new();
        assert!(!wakeup.is_fired());
        assert!(wakeup.fire());
        assert!(!wakeup.fire());
        assert!(wakeup.is_fired());
        assert_eq!(wakeup.wait(&CancellationToken::new()), Ok(()));
    }

    #[test]
    fn fired_wakeup_wins_over_cancelled_token() {
        let wakeup = Wakeup::new();
        wakeup.fire();
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(wakeup.wait(&token), Ok(()));
    }

    #[test]
    fn wakeup_wait_observes_fire_from_another_thread() {
        let wakeup = Wakeup::new();
        let firer = wakeup.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(firer.fire());
        });

        assert_eq!(wakeup.wait(&CancellationToken::new()), Ok(()));
        handle.join().unwrap();
    }

    #[test]
    fn wakeup_wait_returns_cancellation() {
        let wakeup = Wakeup::new();
        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        assert_eq!(wakeup.wait(&token), Err(CancelError::DeadlineExceeded));
        assert!(!wakeup.is_fired());
    }
}
