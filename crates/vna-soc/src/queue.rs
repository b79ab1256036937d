// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded point queue and the DMA producer loop.
//!
//! The bounded FIFO carries three latches (`fetch`, `paused`, `exit`) alongside
//! it: the FIFO itself is a `crossbeam` channel, and the latches are small
//! `parking_lot`-backed condition variables.

use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::error::Error;

/// One acquired point: `(I_dut, Q_dut, I_ref, Q_ref)` volts.
pub type Point = (f64, f64, f64, f64);

/// Maximum queue size, `2^16 - 1`.
pub const QUEUE_CAPACITY: usize = (1 << 16) - 1;

/// How long `get_data` waits for additional data before flushing a short packet.
pub const GET_TIMEOUT: Duration = Duration::from_millis(50);

/// A simple set/clear/wait latch, used for the `paused` signal.
struct Latch {
    state: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    fn new(initial: bool) -> Self {
        Self {
            state: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.state.lock() = true;
        self.cv.notify_all();
    }

    fn clear(&self) {
        *self.state.lock() = false;
    }

    fn is_set(&self) -> bool {
        *self.state.lock()
    }

    fn wait_until_set(&self) {
        let mut guard = self.state.lock();
        while !*guard {
            self.cv.wait(&mut guard);
        }
    }
}

struct FetchOrExit {
    fetch: Mutex<bool>,
    exit: Mutex<bool>,
    cv: Condvar,
}

impl FetchOrExit {
    fn new() -> Self {
        Self {
            fetch: Mutex::new(false),
            exit: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn set_fetch(&self, value: bool) {
        *self.fetch.lock() = value;
        self.cv.notify_all();
    }

    fn set_exit(&self) {
        *self.exit.lock() = true;
        self.cv.notify_all();
    }

    fn fetch(&self) -> bool {
        *self.fetch.lock()
    }

    fn exit(&self) -> bool {
        *self.exit.lock()
    }

    /// Blocks until `fetch` or `exit` becomes true. Returns whether `exit` fired.
    fn wait_for_resume_or_exit(&self) -> bool {
        let mut fetch = self.fetch.lock();
        while !*fetch && !*self.exit.lock() {
            self.cv.wait(&mut fetch);
        }
        *self.exit.lock()
    }
}

/// Bounded FIFO of acquired points plus the producer/consumer control latches.
pub struct PointQueue {
    sender: Sender<Point>,
    receiver: Receiver<Point>,
    control: FetchOrExit,
    paused: Latch,
}

impl Default for PointQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PointQueue {
    /// Creates an empty queue, paused and not fetching.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(QUEUE_CAPACITY);
        Self {
            sender,
            receiver,
            control: FetchOrExit::new(),
            paused: Latch::new(true),
        }
    }

    /// Current number of buffered points.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if no points are buffered.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Queue size as the wire protocol's 2-byte big-endian unsigned integer.
    pub fn size_be_bytes(&self) -> [u8; 2] {
        (self.len() as u16).to_be_bytes()
    }

    /// Empties the queue. Producer must already be paused for this to be meaningful.
    pub fn flush(&self) {
        while self.receiver.try_recv().is_ok() {}
        debug_assert!(self.is_empty());
    }

    /// Blocking get with the wire protocol's per-point timeout.
    pub fn get(&self, timeout: Duration) -> Result<Point, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Resumes the producer.
    pub fn resume_fetch(&self) {
        self.control.set_fetch(true);
    }

    /// Pauses the producer (does not wait for it to observe the pause).
    pub fn request_pause(&self) {
        self.control.set_fetch(false);
    }

    /// Tells the producer to stop permanently.
    pub fn request_exit(&self) {
        self.control.set_exit();
    }

    /// True once the producer has observed a pause/exit request and finished in-flight work.
    pub fn is_paused(&self) -> bool {
        self.paused.is_set()
    }

    /// Blocks until the producer reports `paused`.
    pub fn wait_until_paused(&self) {
        self.paused.wait_until_set();
    }

    /// Runs the producer loop: repeatedly calls `fetch` to get a block of voltages (length a
    /// multiple of 4) and enqueues each point, honouring pause/resume/exit and signalling
    /// backpressure by pausing itself when the queue fills up.
    ///
    /// Intended to run on its own `std::thread`; returns only once `request_exit` has been
    /// called and observed.
    pub fn keep_fetching<F>(&self, mut fetch: F)
    where
        F: FnMut() -> Result<Vec<f64>, Error>,
    {
        loop {
            if self.control.exit() {
                self.paused.set();
                return;
            }
            if !self.control.fetch() {
                self.paused.set();
                if self.control.wait_for_resume_or_exit() {
                    self.paused.set();
                    return;
                }
                self.paused.clear();
            }

            let block = match fetch() {
                Ok(block) => block,
                Err(Error::Dma(crate::dma::Error::DmaNotAllowed)) => {
                    log::debug!("[queue] got DMA error when trying to fetch!");
                    continue;
                }
                Err(e) => {
                    log::error!("[queue] unexpected fetch error: {e}");
                    continue;
                }
            };

            if block.len() % 4 != 0 {
                log::error!("[queue] fetch() returned a non-integer amount of points!");
                continue;
            }

            for chunk in block.chunks_exact(4) {
                let point = (chunk[0], chunk[1], chunk[2], chunk[3]);
                if let Err(TrySendError::Full(_)) = self.sender.try_send(point) {
                    log::info!("[queue] queue is full! pausing DMA");
                    self.control.set_fetch(false);
                    self.paused.set();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_queue_is_empty_and_paused() {
        let q = PointQueue::new();
        assert_eq!(q.len(), 0);
        assert!(q.is_paused());
    }

    #[test]
    fn flush_empties_the_queue() {
        let q = PointQueue::new();
        for _ in 0..10 {
            q.sender.try_send((1.0, 2.0, 3.0, 4.0)).unwrap();
        }
        assert_eq!(q.len(), 10);
        q.flush();
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn producer_pauses_after_filling_the_queue() {
        // Small capacity substitute: exercise the real queue but only push a handful of
        // points via a fetch function, and confirm fetch is cleared once `try_send` fails.
        // We simulate a full queue by pre-filling it up to capacity, then running one
        // iteration of the production logic via a direct `try_send` probe.
        let q = PointQueue::new();
        for _ in 0..QUEUE_CAPACITY {
            q.sender.try_send((0.0, 0.0, 0.0, 0.0)).unwrap();
        }
        assert!(q.sender.try_send((0.0, 0.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn keep_fetching_exits_promptly_when_never_resumed() {
        let q = Arc::new(PointQueue::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let q2 = q.clone();
        let calls2 = calls.clone();
        let handle = thread::spawn(move || {
            q2.keep_fetching(|| {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1.0, 2.0, 3.0, 4.0])
            });
        });
        // Never resumed: exit immediately.
        q.request_exit();
        handle.join().unwrap();
        assert!(q.is_paused());
    }

    #[test]
    fn keep_fetching_enqueues_points_when_resumed() {
        let q = Arc::new(PointQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || {
            let mut done = false;
            q2.keep_fetching(|| {
                if done {
                    // Stall forever; the test will request exit once it has seen data.
                } else {
                    done = true;
                }
                Ok(vec![1.0, 2.0, 3.0, 4.0])
            });
        });
        q.resume_fetch();
        // Give the producer a moment to enqueue, then stop it.
        thread::sleep(Duration::from_millis(20));
        q.request_exit();
        q.resume_fetch(); // wake it if it is currently waiting on fetch/exit
        handle.join().unwrap();
        assert!(q.len() >= 1);
    }
}
