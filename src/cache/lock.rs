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

//! Per-account write locks shared by every session of the process.
//!
//! The registry only holds weak references, so an account's lock disappears
//! once no store for that account is alive any more.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use crate::support::error::Error;

lazy_static! {
    static ref REGISTRY: Mutex<HashMap<String, Weak<AccountLock>>> =
        Mutex::new(HashMap::new());
}

/// Get the lock for the account identified by `key`, creating it if no live
/// lock exists.
pub fn account_lock(key: &str) -> Arc<AccountLock> {
    let mut registry = REGISTRY.lock().unwrap();
    registry.retain(|_, lock| lock.strong_count() > 0);

    if let Some(lock) = registry.get(key).and_then(Weak::upgrade) {
        return lock;
    }

    let lock = Arc::new(AccountLock::default());
    registry.insert(key.to_owned(), Arc::downgrade(&lock));
    lock
}

#[cfg(test)]
fn is_registered(key: &str) -> bool {
    let mut registry = REGISTRY.lock().unwrap();
    registry.retain(|_, lock| lock.strong_count() > 0);
    registry.contains_key(key)
}

/// A mutual-exclusion lock whose acquisition can time out.
#[derive(Debug, Default)]
pub struct AccountLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Proof that the holder has exclusive write access to an account.
#[derive(Debug)]
pub struct AccountGuard<'a> {
    lock: &'a AccountLock,
}

impl AccountLock {
    /// Acquire the lock, waiting at most `timeout`.
    pub fn lock(&self, timeout: Duration) -> Result<AccountGuard<'_>, Error> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().unwrap();

        while *held {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LockTimeout);
            }

            held = self.released.wait_timeout(held, deadline - now).unwrap().0;
        }

        *held = true;
        Ok(AccountGuard { lock: self })
    }
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        *self.lock.held.lock().unwrap() = false;
        self.lock.released.notify_one();
    }
}
