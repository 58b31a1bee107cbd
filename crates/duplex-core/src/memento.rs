//! Opaque, restorable state captures
//!
//! A [`Memento`] is an immutable byte blob produced by saving a machine or a
//! link endpoint. The type parameter records which originator produced it, so
//! a machine capture can never be handed to a link endpoint by mistake.
//!
//! Bytes are shared behind an `Arc`, making clones O(1): a history of several
//! hundred snapshots only pays for each capture once.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// An immutable state capture of an originator `T`
pub struct Memento<T> {
    bytes: Arc<[u8]>,
    // fn() -> T keeps Memento Send + Sync regardless of T
    _originator: PhantomData<fn() -> T>,
}

impl<T> Memento<T> {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            _originator: PhantomData,
        }
    }

    /// Capture a serializable state
    pub fn encode<S: Serialize>(state: &S) -> Result<Self> {
        let bytes = bincode::serialize(state).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Decode the captured state
    pub fn decode<S: DeserializeOwned>(&self) -> Result<S> {
        bincode::deserialize(&self.bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Raw captured bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the capture in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the capture is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Deterministic 64-bit FNV-1a checksum of the capture
    ///
    /// Stable across runs and platforms, so peers can compare it.
    pub fn checksum(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        self.bytes
            .iter()
            .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
    }
}

impl<T> Clone for Memento<T> {
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            _originator: PhantomData,
        }
    }
}

impl<T> PartialEq for Memento<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<T> Eq for Memento<T> {}

impl<T> fmt::Debug for Memento<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memento")
            .field("len", &self.bytes.len())
            .field("checksum", &format_args!("{:#018x}", self.checksum()))
            .finish()
    }
}
