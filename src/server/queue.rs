/*
 * queue.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, an HTTP/1.1 client and server library.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Bounded FIFO handing parsed requests to blocking worker threads.
//!
//! A `None` element is the shutdown sentinel: a worker that pops it puts it
//! back for the next worker and exits. `push` never blocks the IO loop; a
//! full queue is reported to the caller (who answers 503).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

pub struct JobQueue<T> {
    jobs: Mutex<VecDeque<Option<T>>>,
    ready: Condvar,
    capacity: usize,
}

impl<T> JobQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue a job. False when the queue is full.
    pub fn push(&self, job: T) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.len() >= self.capacity {
            return false;
        }
        jobs.push_back(Some(job));
        drop(jobs);
        self.ready.notify_one();
        true
    }

    /// Enqueue the shutdown sentinel. Always accepted.
    pub fn push_sentinel(&self) {
        self.jobs.lock().unwrap().push_back(None);
        self.ready.notify_one();
    }

    /// Block until a job (Some) or the sentinel (None) is available.
    pub fn pop_or_wait(&self) -> Option<T> {
        let mut jobs = self.jobs.lock().unwrap();
        loop {
            if let Some(job) = jobs.pop_front() {
                return job;
            }
            jobs = self.ready.wait(jobs).unwrap();
        }
    }

    /// Drop all pending jobs (shutdown path).
    pub fn clear(&self) {
        self.jobs.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
