//! # Reference Cache
//!
//! Memoizes the last result of one compiled reference for the duration of one
//! inbound event.
//!
//! ```text
//! EMPTY ──store(valid fp)──▶ VALID{fp, value}
//!   ▲                              │
//!   └──── store(invalid fp) ───────┘
//! ```
//!
//! A hit requires the stored fingerprint to equal the current one. A miss
//! recomputes, then either stores the new snapshot or clears the slot when the
//! current fingerprint is missing. The slot holds an immutable [`Snapshot`] behind
//! an `Arc` and is swapped as a unit, so concurrent readers never observe a
//! fingerprint paired with another evaluation's value.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::debug;

use crate::types::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CachingStrategy {
    /// Every evaluation recomputes.
    #[default]
    None,
    /// Reuse the result while the inbound event stays the same.
    Update,
}

/// Identity of the inbound event an evaluation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn of<H: Hash + ?Sized>(identity: &H) -> Self {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Snapshot {
    fingerprint: Fingerprint,
    value: Value,
}

#[derive(Debug)]
pub struct ReferenceCache {
    strategy: CachingStrategy,
    slot: RwLock<Option<Arc<Snapshot>>>,
}

impl ReferenceCache {
    pub fn new(strategy: CachingStrategy) -> Self {
        Self {
            strategy,
            slot: RwLock::new(None),
        }
    }

    pub fn strategy(&self) -> CachingStrategy {
        self.strategy
    }

    pub fn lookup(&self, fingerprint: Option<Fingerprint>) -> Option<Value> {
        if self.strategy == CachingStrategy::None {
            return None;
        }
        let fingerprint = fingerprint?;
        let snapshot = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        (snapshot.fingerprint == fingerprint).then(|| snapshot.value.clone())
    }

    pub fn store(&self, fingerprint: Option<Fingerprint>, value: &Value) {
        if self.strategy == CachingStrategy::None {
            return;
        }
        let next = fingerprint.map(|fingerprint| {
            Arc::new(Snapshot {
                fingerprint,
                value: value.clone(),
            })
        });
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Returns the cached value for `fingerprint`, or computes and records it.
    pub fn get_or_compute<E>(
        &self,
        fingerprint: Option<Fingerprint>,
        compute: impl FnOnce() -> Result<Value, E>,
    ) -> Result<Value, E> {
        if let Some(hit) = self.lookup(fingerprint) {
            debug!("reference cache hit for {:?}", fingerprint);
            return Ok(hit);
        }
        let value = compute()?;
        self.store(fingerprint, &value);
        Ok(value)
    }

    pub fn is_empty(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
