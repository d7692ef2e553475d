// Copyright (c) 2017 Chef Software Inc. and/or applicable contributors
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

//! A cloneable notify-once primitive: the Rust equivalent of closing a
//! one-shot broadcast channel. `signal()` transitions pending -> signalled
//! exactly once; any number of clones can `wait()` on the same transition,
//! before or after it happens.

use std::sync::{Arc, Condvar, Mutex};

#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopHandle {
    pub fn new() -> Self {
        StopHandle {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Fires the signal. Idempotent: calling it more than once (which
    /// shouldn't happen given the `Service` stopping latch, but is safe
    /// regardless) just re-notifies waiters of the same `true` state.
    pub fn signal(&self) {
        let (lock, condvar) = &*self.inner;
        let mut signalled = lock.lock().expect("stop handle lock poisoned");
        *signalled = true;
        condvar.notify_all();
    }

    /// Blocks until `signal()` has been called, at most once, by anyone
    /// holding a clone of this handle. Returns immediately if it already
    /// has.
    pub fn wait(&self) {
        let (lock, condvar) = &*self.inner;
        let mut signalled = lock.lock().expect("stop handle lock poisoned");
        while !*signalled {
            signalled = condvar.wait(signalled).expect("stop handle lock poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_if_already_signalled() {
        let handle = StopHandle::new();
        handle.signal();
        handle.wait();
    }

    #[test]
    fn late_waiters_observe_a_prior_signal() {
        let handle = StopHandle::new();
        let signaller = handle.clone();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signaller.signal();
        });

        handle.wait();
    }

    #[test]
    fn all_clones_unblock_on_one_signal() {
        let handle = StopHandle::new();
        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        handle.signal();

        for waiter in waiters {
            waiter.join().expect("waiter thread panicked");
        }
    }
}
