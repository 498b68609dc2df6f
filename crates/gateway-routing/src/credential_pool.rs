//! Credential pool with round-robin rotation and failure bookkeeping.
//!
//! The pool keeps an immutable snapshot of credentials and a cyclic cursor
//! behind one lock, and the per-credential failure counts behind another.
//! Both critical sections are O(1) (or O(n) over the snapshot for reloads)
//! and never span an await point.

use gateway_core::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One upstream API key
///
/// Cheap to clone. `Debug` and `Display` print a masked form so keys never
/// reach the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a raw key
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building backend requests
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form: first and last four characters
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Credentials partitioned by validity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatus {
    /// Credentials below the failure threshold, with their counts
    pub valid: HashMap<Credential, u32>,
    /// Credentials at the failure threshold, with their counts
    pub invalid: HashMap<Credential, u32>,
}

struct Ring {
    keys: Arc<[Credential]>,
    cursor: usize,
}

/// Shared pool of upstream credentials
pub struct CredentialPool {
    ring: Mutex<Ring>,
    failures: Mutex<HashMap<Credential, u32>>,
    max_failures: u32,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("size", &self.len())
            .field("max_failures", &self.max_failures)
            .finish_non_exhaustive()
    }
}

impl CredentialPool {
    /// Create a pool from configured keys
    ///
    /// Blank keys are ignored and duplicates collapse onto their first
    /// occurrence.
    ///
    /// # Errors
    /// Returns a configuration error if no usable key remains or
    /// `max_failures` is zero
    pub fn new<I, K>(keys: I, max_failures: u32) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        if max_failures == 0 {
            return Err(GatewayError::configuration(
                "max_failures must be at least 1",
            ));
        }

        let keys = normalize(keys)?;
        let failures = keys.iter().map(|c| (c.clone(), 0)).collect();

        info!(size = keys.len(), max_failures, "Credential pool initialized");

        Ok(Self {
            ring: Mutex::new(Ring {
                keys: keys.into(),
                cursor: 0,
            }),
            failures: Mutex::new(failures),
            max_failures,
        })
    }

    /// Number of credentials in the current snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().keys.len()
    }

    /// Always false: a pool is never empty after construction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Failure threshold at which a credential becomes invalid
    #[must_use]
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Current credential snapshot, in rotation order
    #[must_use]
    pub fn credentials(&self) -> Arc<[Credential]> {
        Arc::clone(&self.ring.lock().keys)
    }

    /// Look up a credential by its raw key
    #[must_use]
    pub fn find(&self, key: &str) -> Option<Credential> {
        self.credentials().iter().find(|c| c.expose() == key).cloned()
    }

    /// Return the credential at the cursor and advance the cursor by one
    pub fn next(&self) -> Credential {
        let mut ring = self.ring.lock();
        let credential = ring.keys[ring.cursor].clone();
        ring.cursor = (ring.cursor + 1) % ring.keys.len();
        credential
    }

    /// Rotate until a valid credential is found
    ///
    /// Visits at most one full cycle. When every credential is invalid the
    /// last visited one is returned anyway, so callers must expect to fail
    /// against it.
    pub fn next_working(&self) -> Credential {
        let size = self.len();
        let mut credential = self.next();

        for _ in 1..size {
            if self.is_valid(&credential) {
                return credential;
            }
            credential = self.next();
        }

        if !self.is_valid(&credential) {
            warn!(
                credential = %credential,
                pool_size = size,
                "No valid credential left, dispatching with an invalid one"
            );
        }
        credential
    }

    /// Whether a credential is below the failure threshold
    #[must_use]
    pub fn is_valid(&self, credential: &Credential) -> bool {
        self.failures
            .lock()
            .get(credential)
            .map_or(true, |count| *count < self.max_failures)
    }

    /// Failure count of a credential, `None` if it is not in the pool
    #[must_use]
    pub fn failure_count(&self, credential: &Credential) -> Option<u32> {
        self.failures.lock().get(credential).copied()
    }

    /// Count a failure against `credential` and pick a replacement
    ///
    /// The count saturates at `max_failures`. Returns the next working
    /// credential while `attempt < max_retries`, otherwise `None` to tell the
    /// caller to give up.
    pub fn record_failure(
        &self,
        credential: &Credential,
        attempt: u32,
        max_retries: u32,
    ) -> Option<Credential> {
        let count = {
            let mut failures = self.failures.lock();
            failures.get_mut(credential).map(|count| {
                *count = (*count + 1).min(self.max_failures);
                *count
            })
        };

        match count {
            Some(count) => warn!(
                credential = %credential,
                failures = count,
                max_failures = self.max_failures,
                attempt,
                "Credential failure recorded"
            ),
            None => debug!(
                credential = %credential,
                "Failure reported for a credential no longer in the pool"
            ),
        }

        if attempt < max_retries {
            Some(self.next_working())
        } else {
            None
        }
    }

    /// Clear the failure count of one credential
    ///
    /// Returns false, changing nothing, if the credential is unknown.
    pub fn reset(&self, credential: &Credential) -> bool {
        let mut failures = self.failures.lock();
        match failures.get_mut(credential) {
            Some(count) => {
                *count = 0;
                info!(credential = %credential, "Credential failure count reset");
                true
            }
            None => false,
        }
    }

    /// Clear every failure count
    pub fn reset_all(&self) {
        let mut failures = self.failures.lock();
        for count in failures.values_mut() {
            *count = 0;
        }
        info!(size = failures.len(), "All credential failure counts reset");
    }

    /// Partition the pool by validity
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let failures = self.failures.lock();
        let mut status = PoolStatus::default();
        for (credential, count) in failures.iter() {
            if *count < self.max_failures {
                status.valid.insert(credential.clone(), *count);
            } else {
                status.invalid.insert(credential.clone(), *count);
            }
        }
        status
    }

    /// Swap in a new credential list
    ///
    /// Failure counts carry over for keys present in both sets. The cursor
    /// moves to the first credential, searching the old order from the one
    /// the old cursor would have returned next, that survives the reload.
    ///
    /// # Errors
    /// Returns a configuration error, keeping the current state, if the new
    /// list has no usable key
    pub fn hot_reload<I, K>(&self, keys: I) -> GatewayResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys = normalize(keys)?;

        let mut ring = self.ring.lock();
        let mut failures = self.failures.lock();

        let carried: HashMap<Credential, u32> = keys
            .iter()
            .map(|c| {
                let count = failures.get(c).copied().unwrap_or(0);
                (c.clone(), count.min(self.max_failures))
            })
            .collect();
        let inherited = carried.values().filter(|count| **count > 0).count();

        let old = Arc::clone(&ring.keys);
        let cursor = (0..old.len())
            .map(|offset| &old[(ring.cursor + offset) % old.len()])
            .find_map(|candidate| keys.iter().position(|c| c == candidate))
            .unwrap_or(0);

        let size = keys.len();
        ring.keys = keys.into();
        ring.cursor = cursor;
        *failures = carried;

        info!(
            old_size = old.len(),
            new_size = size,
            cursor,
            inherited_failures = inherited,
            "Credential pool reloaded"
        );
        Ok(())
    }
}

fn normalize<I, K>(keys: I) -> GatewayResult<Vec<Credential>>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut seen = HashSet::new();
    let keys: Vec<Credential> = keys
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .map(Credential::new)
        .collect();

    if keys.is_empty() {
        return Err(GatewayError::configuration(
            "credential pool requires at least one key",
        ));
    }
    Ok(keys)
}
