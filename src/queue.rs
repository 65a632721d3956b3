// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-safe FIFO carrying accepted client connections from the acceptor
//! to the worker pool.
//!
//! A hand-rolled linked list behind a mutex plus a counting semaphore is
//! exactly what `crossbeam::channel` already is: an unbounded MPMC channel
//! gives strict FIFO ordering across producers and consumers, and a
//! blocking `recv()` that plays the role of the semaphore wait.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors returned by queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("work queue has been invalidated")]
    Invalidated,
}

/// Blocking, invalidate-able FIFO queue.
pub struct WorkQueue<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
}

impl<T> WorkQueue<T> {
    /// Create an empty queue.
    pub fn create() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Link `item` at the tail. Non-blocking. Fails once the queue has been
    /// invalidated.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(sender) => sender.send(item).map_err(|_| QueueError::Invalidated),
            None => Err(QueueError::Invalidated),
        }
    }

    /// Block until an item is available, then unlink and return the head.
    /// Returns `None` once the queue has been invalidated and drained.
    pub fn dequeue(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Walk any items still linked, invoking `destroy` on each, then mark
    /// the queue invalidated so further `enqueue` calls fail and blocked
    /// `dequeue` calls return `None` once drained.
    pub fn invalidate(&self, mut destroy: impl FnMut(T)) {
        *self.sender.lock() = None;
        while let Ok(item) = self.receiver.try_recv() {
            destroy(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_single_producer_single_consumer() {
        let queue = WorkQueue::create();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.enqueue(3).unwrap();
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let queue = Arc::new(WorkQueue::create());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(50));
        queue.enqueue(42).unwrap();

        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn per_producer_order_preserved_across_many_producers_and_consumers() {
        let queue = Arc::new(WorkQueue::create());
        const PRODUCERS: usize = 4;
        const ITEMS_PER_PRODUCER: usize = 200;

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..ITEMS_PER_PRODUCER {
                        queue.enqueue((p, i)).unwrap();
                    }
                })
            })
            .collect();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for _ in 0..(PRODUCERS * ITEMS_PER_PRODUCER / 3) {
                        if let Some(item) = queue.dequeue() {
                            seen.lock().push(item);
                        }
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        // Drain whatever remains so the remaining consumer iterations complete.
        let remaining = PRODUCERS * ITEMS_PER_PRODUCER - seen.lock().len();
        for _ in 0..remaining {
            if let Some(item) = queue.dequeue() {
                seen.lock().push(item);
            }
        }
        for c in consumers {
            let _ = c.join();
        }

        let seen = seen.lock();
        for p in 0..PRODUCERS {
            let mut last = None;
            for &(pp, i) in seen.iter().filter(|&&(pp, _)| pp == p) {
                if let Some(prev) = last {
                    assert!(i > prev, "producer {p} order violated");
                }
                last = Some(i);
            }
        }
        assert_eq!(seen.len(), PRODUCERS * ITEMS_PER_PRODUCER);
    }

    #[test]
    fn invalidate_drains_remaining_items_and_rejects_further_enqueue() {
        let queue = WorkQueue::create();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        let destroyed = AtomicUsize::new(0);
        queue.invalidate(|_| {
            destroyed.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(queue.enqueue(3).unwrap_err(), QueueError::Invalidated);
        assert_eq!(queue.dequeue(), None);
    }
}
