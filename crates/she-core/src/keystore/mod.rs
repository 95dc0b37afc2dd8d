// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key store façade: the composite `KeyId`, on-disk metadata shape, and the
//! `KeyStore`/`KeyCache` collaborator traits.
//!
//! The NVM object store and the in-memory key cache are external
//! collaborators (spec §1, §4.3) -- this module defines the seam, the same
//! way [`crate::crypto::block_cipher`] defines the AES/CMAC seam. [`memory`]
//! provides a reference implementation used by the test suite and as the
//! default backing store for a standalone server.

pub mod memory;

pub use memory::MemoryKeyStore;

use std::fmt;

/// Discriminates the domain a [`KeyId`] belongs to. SHE keys are one domain
/// among several a real key store façade would serve; this crate only ever
/// constructs [`KeyType::She`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    She,
}

/// Reserved SHE key slots (4-bit slot field, spec §3 / §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySlot(pub u8);

impl KeySlot {
    pub const SECRET_KEY: KeySlot = KeySlot(0x0);
    pub const BOOT_MAC_KEY: KeySlot = KeySlot(0x1);
    pub const BOOT_MAC: KeySlot = KeySlot(0x2);
    pub const RAM_KEY: KeySlot = KeySlot(0xE);
    pub const PRNG_SEED: KeySlot = KeySlot(0xF);
}

/// Composite key identifier: `(KeyType, ClientId, KeySlot)`, packed on the
/// wire as `(type << 12) | (clientId << 4) | slot` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub key_type: KeyType,
    pub client_id: u8,
    pub slot: KeySlot,
}

impl KeyId {
    #[must_use]
    pub fn she(client_id: u8, slot: KeySlot) -> Self {
        Self {
            key_type: KeyType::She,
            client_id,
            slot,
        }
    }

    /// Pack this key id into the 16-bit wire form.
    #[must_use]
    pub fn to_wire(self) -> u16 {
        let type_bits = match self.key_type {
            KeyType::She => 0u16,
        };
        (type_bits << 12) | (u16::from(self.client_id) << 4) | u16::from(self.slot.0 & 0x0F)
    }

    /// Unpack a 16-bit wire key id, assuming the SHE domain and a given
    /// client id (the client id is carried out of band by the session, not
    /// the wire key id, per spec §6 -- callers combine it in).
    #[must_use]
    pub fn from_wire_she(client_id: u8, wire: u16) -> Self {
        Self::she(client_id, KeySlot((wire & 0x0F) as u8))
    }

    /// Fully decode a 16-bit wire key id: `(type<<12) | (clientId<<4) | slot`
    /// (spec §6), extracting the client id from the wire value itself
    /// rather than from session context. Used by the bulk AES handlers,
    /// which address a key purely by its wire id.
    #[must_use]
    pub fn from_wire(wire: u16) -> Self {
        let client_id = ((wire >> 4) & 0xFF) as u8;
        Self::she(client_id, KeySlot((wire & 0x0F) as u8))
    }
}

/// The 5-bit flag set plus 28-bit monotonic counter carried with every key.
///
/// `count` is stored big-endian in the high 28 bits of a 32-bit word; the
/// low 4 bits are reserved (spec §3). [`SheKeyLabel::pack`] /
/// [`SheKeyLabel::unpack`] are the single place that shifts by 4 -- per
/// spec §9 this boundary is a frequent bug site and must not be
/// re-implemented ad hoc elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SheKeyLabel {
    pub flags: KeyFlags,
    pub count: u32,
}

/// Flags carried in a [`SheKeyLabel`]. `boot_protect`, `debug_protect`, and
/// `key_usage` are stored and round-tripped but not enforced by any
/// operation in this crate (spec §3 SUPPLEMENT) -- there is no debug
/// interface or usage-restricted crypto path implemented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyFlags {
    pub write_protect: bool,
    pub boot_protect: bool,
    pub debug_protect: bool,
    pub key_usage: bool,
    pub wildcard: bool,
}

impl KeyFlags {
    const WRITE_PROTECT_BIT: u8 = 1 << 0;
    const BOOT_PROTECT_BIT: u8 = 1 << 1;
    const DEBUG_PROTECT_BIT: u8 = 1 << 2;
    const KEY_USAGE_BIT: u8 = 1 << 3;
    const WILDCARD_BIT: u8 = 1 << 4;

    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self {
            write_protect: bits & Self::WRITE_PROTECT_BIT != 0,
            boot_protect: bits & Self::BOOT_PROTECT_BIT != 0,
            debug_protect: bits & Self::DEBUG_PROTECT_BIT != 0,
            key_usage: bits & Self::KEY_USAGE_BIT != 0,
            wildcard: bits & Self::WILDCARD_BIT != 0,
        }
    }

    #[must_use]
    pub fn to_bits(self) -> u8 {
        let mut bits = 0u8;
        if self.write_protect {
            bits |= Self::WRITE_PROTECT_BIT;
        }
        if self.boot_protect {
            bits |= Self::BOOT_PROTECT_BIT;
        }
        if self.debug_protect {
            bits |= Self::DEBUG_PROTECT_BIT;
        }
        if self.key_usage {
            bits |= Self::KEY_USAGE_BIT;
        }
        if self.wildcard {
            bits |= Self::WILDCARD_BIT;
        }
        bits
    }
}

impl SheKeyLabel {
    /// Pack `flags` (low 4 bits, per spec `flags(4b)`) and `count` (28 bits)
    /// into a single big-endian 32-bit word: `counter(28b) || flags(4b)`.
    #[must_use]
    pub fn pack(self) -> u32 {
        (self.count << 4) | u32::from(self.flags.to_bits() & 0x0F)
    }

    #[must_use]
    pub fn unpack(word: u32) -> Self {
        Self {
            flags: KeyFlags::from_bits((word & 0x0F) as u8),
            count: word >> 4,
        }
    }
}

/// Metadata stored alongside every SHE key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMetadata {
    pub id: KeyId,
    pub len: u16,
    pub label: SheKeyLabel,
}

/// A complete key object: metadata plus the 128-bit key material.
#[derive(Debug, Clone, Copy)]
pub struct KeyRecord {
    pub meta: KeyMetadata,
    pub material: [u8; 16],
}

/// Key-store façade failures.
#[derive(Debug)]
pub enum KeyStoreError {
    NotFound,
    Io(String),
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Io(msg) => write!(f, "key store I/O error: {msg}"),
        }
    }
}

impl std::error::Error for KeyStoreError {}

/// NVM-backed key object store.
///
/// `read_key` transparently promotes NVM hits into the cache (spec §4.3);
/// `nvm_add_object` evicts any prior occupant of the same [`KeyId`] and is
/// expected to make the write durable before returning, so that a
/// subsequent `read_key` observes the persisted counter -- LOAD_KEY depends
/// on this to compute M4/M5 over the stored, not requested, counter.
pub trait KeyStore: Send + Sync {
    /// Read a key object, checking the cache first and falling back to NVM.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::NotFound`] if no object exists for `id`.
    fn read_key(&self, id: KeyId) -> Result<KeyRecord, KeyStoreError>;

    /// Persist a key object to NVM, replacing any prior object at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Io`] on a storage failure.
    fn nvm_add_object(&self, meta: KeyMetadata, material: [u8; 16]) -> Result<(), KeyStoreError>;
}

/// Small in-memory keyed buffer store backing RAM-scoped keys and NVM
/// read-through caching.
pub trait KeyCache: Send + Sync {
    /// Populate (or replace) the cached entry for `meta.id`.
    fn cache_key(&self, meta: KeyMetadata, material: [u8; 16]);

    /// Look up a cached entry, if present.
    fn cached_key(&self, id: KeyId) -> Option<KeyRecord>;
}

/// The combined NVM-plus-cache façade the dispatcher actually holds.
///
/// Blanket-implemented for any type providing both; [`MemoryKeyStore`]
/// satisfies it directly.
pub trait KeyFacade: KeyStore + KeyCache {}
impl<T: KeyStore + KeyCache> KeyFacade for T {}
