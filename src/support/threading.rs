//-
// Copyright (c) 2020, The Relaymail Developers
//
// This file is part of Relaymail.
//
// Relaymail is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Relaymail is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Relaymail. If not, see <http://www.gnu.org/licenses/>.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use lazy_static::lazy_static;
use log::error;

lazy_static! {
    static ref MAX_THREADS: usize = std::env::var("RELAYMAIL_MAX_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get)
        .max(1);
}

/// Upper bound on the number of bulk-load workers regardless of core count.
const WORKER_CAP: usize = 16;

/// The number of workers to use to process `items` files.
///
/// One worker per four files, at least one, and never more than the number of
/// cores (or 16, whichever is smaller).
pub fn pool_size(items: usize) -> usize {
    (items / 4).max(1).min((*MAX_THREADS).min(WORKER_CAP))
}

/// A bounded pool of scoped worker threads draining a shared queue.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
    pub workers: usize,
}

impl WorkerPool {
    /// A pool sized by `pool_size` for `items` inputs.
    pub fn for_items(items: usize) -> Self {
        WorkerPool {
            workers: pool_size(items),
        }
    }

    /// Run `mapper` over every input and collect the outputs.
    ///
    /// All inputs are queued up front; each worker pops inputs until the
    /// queue is empty and pushes its results to a shared output queue. Every
    /// worker has been joined by the time this returns, so from the caller's
    /// point of view the operation is synchronous.
    ///
    /// The order of the outputs is unspecified.
    pub fn run<I: Send, O: Send>(
        self,
        inputs: Vec<I>,
        mapper: impl Fn(I) -> O + Sync,
    ) -> Vec<O> {
        if inputs.is_empty() {
            return Vec::new();
        }

        let expected = inputs.len();
        let (input_send, input_recv) = channel::unbounded();
        for input in inputs {
            // Cannot fail; we still hold the receiver.
            let _ = input_send.send(input);
        }
        drop(input_send);

        let (output_send, output_recv) = channel::unbounded();
        let workers = self.workers.max(1).min(expected);

        crossbeam::scope(|s| {
            for _ in 0..workers {
                let input_recv = input_recv.clone();
                let output_send = output_send.clone();
                let mapper = &mapper;
                s.spawn(move |_| {
                    for input in input_recv.iter() {
                        let _ = output_send.send(mapper(input));
                    }
                });
            }
        })
        .expect("bulk worker panicked");
        drop(output_send);

        let mut outputs = Vec::with_capacity(expected);
        outputs.extend(output_recv.iter());
        outputs
    }
}

/// A one-shot completion signal.
///
/// Any number of clones may wait on the latch; `fire()` releases all current
/// and future waiters. Firing more than once has no further effect.
#[derive(Clone)]
pub struct Latch {
    inner: Arc<LatchInner>,
}

struct LatchInner {
    // Dropping the sender disconnects the channel, which is what wakes the
    // waiters. Nothing is ever sent.
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl Latch {
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Latch {
            inner: Arc::new(LatchInner {
                sender: Mutex::new(Some(sender)),
                receiver,
            }),
        }
    }

    pub fn fire(&self) {
        self.inner.sender.lock().unwrap().take();
    }

    /// Block until the latch fires.
    pub fn wait(&self) {
        let _ = self.inner.receiver.recv();
    }

    /// Block until the latch fires or `timeout` elapses.
    ///
    /// Returns whether the latch has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Latch::new()
    }
}

/// Run `task` on a new detached thread named `name`.
///
/// The thread is never joined; there is no way to cancel it.
pub fn spawn_detached(name: &str, task: impl FnOnce() + Send + 'static) {
    if let Err(e) = std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(task)
    {
        error!("Failed to spawn {} thread: {}", name, e);
    }
}
