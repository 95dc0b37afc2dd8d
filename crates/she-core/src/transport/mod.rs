// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zero-copy shared-memory transport: a single-producer/single-consumer
//! pair of regions (request, response), each headed by a [`csr::Csr`]
//! handshake word.
//!
//! Grounded on the teacher's `transport/shm` module (`segment.rs` for the
//! POSIX mmap wrapper, the same CSR-handshake discipline generalized from
//! the teacher's sequence-number head word to the four-field CSR this
//! protocol specifies).

pub mod channel;
pub mod csr;
pub mod segment;

pub use channel::{CacheOps, NoopCacheOps, ShmChannel, ShmRegion};
pub use segment::ShmSegment;

use std::io;

/// Transport-local failures. Never cross into the SHE error space (spec §7).
#[derive(Debug)]
pub enum ShmError {
    SegmentCreate(io::Error),
    SegmentOpen(io::Error),
    Mmap(io::Error),
    PayloadTooLarge { size: usize, capacity: usize },
    InvalidName(String),
    NotFound(String),
    /// The peer has not yet consumed the prior exchange on this region pair.
    NotReady,
    /// A caller-supplied length or buffer violates the region's contract.
    BadArgs,
}

impl std::fmt::Display for ShmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SegmentCreate(e) => write!(f, "failed to create shm segment: {e}"),
            Self::SegmentOpen(e) => write!(f, "failed to open shm segment: {e}"),
            Self::Mmap(e) => write!(f, "mmap failed: {e}"),
            Self::PayloadTooLarge { size, capacity } => {
                write!(f, "payload of {size} bytes exceeds region capacity {capacity}")
            }
            Self::InvalidName(name) => write!(f, "invalid segment name: {name}"),
            Self::NotFound(name) => write!(f, "segment not found: {name}"),
            Self::NotReady => write!(f, "transport not ready"),
            Self::BadArgs => write!(f, "bad transport arguments"),
        }
    }
}

impl std::error::Error for ShmError {}

pub type Result<T> = std::result::Result<T, ShmError>;
