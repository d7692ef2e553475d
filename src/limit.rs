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

//! A global admission gate on the number of concurrently running services.

use std::sync::Mutex;

/// `limit == 0` means unlimited; `current` never exceeds `limit` when
/// `limit > 0`, and never goes negative (it's unsigned, so an underflowing
/// decrement would panic in debug builds rather than silently go negative;
/// `decrement` guards against that, though it can't fire if increments and
/// decrements are paired correctly).
pub struct LimitCounter {
    limit: u32,
    current: Mutex<u32>,
}

impl LimitCounter {
    pub fn new(limit: u32) -> Self {
        LimitCounter {
            limit,
            current: Mutex::new(0),
        }
    }

    /// Atomically increments the counter iff there's room, and reports
    /// whether it did. Never blocks.
    pub fn try_increment(&self) -> bool {
        let mut current = self.current.lock().expect("limit counter lock poisoned");
        if self.limit == 0 || *current < self.limit {
            *current += 1;
            true
        } else {
            false
        }
    }

    /// Decrements the counter. A decrement that would underflow is a no-op;
    /// this should never happen if callers pair every successful
    /// `try_increment` with exactly one `decrement`.
    pub fn decrement(&self) {
        let mut current = self.current.lock().expect("limit counter lock poisoned");
        if *current > 0 {
            *current -= 1;
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> u32 {
        *self.current.lock().expect("limit counter lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_admits() {
        let counter = LimitCounter::new(0);
        for _ in 0..1000 {
            assert!(counter.try_increment());
        }
    }

    #[test]
    fn limit_is_enforced() {
        let counter = LimitCounter::new(2);
        assert!(counter.try_increment());
        assert!(counter.try_increment());
        assert!(!counter.try_increment());
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn decrement_frees_a_slot() {
        let counter = LimitCounter::new(1);
        assert!(counter.try_increment());
        assert!(!counter.try_increment());
        counter.decrement();
        assert!(counter.try_increment());
    }

    #[test]
    fn decrement_below_zero_is_a_no_op() {
        let counter = LimitCounter::new(1);
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.current(), 0);
    }
}
