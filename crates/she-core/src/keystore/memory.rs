// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory reference implementation of [`KeyStore`] and [`KeyCache`].
//!
//! Not durable across process restarts -- intended for the test suite and
//! as the default backing store for a standalone server run without a
//! configured NVM path (spec §4.3 AMBIENT).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use super::{KeyCache, KeyFlags, KeyId, KeyMetadata, KeyRecord, KeySlot, KeyStore, KeyStoreError, SheKeyLabel};

/// Fixed-width on-disk record: `client_id(1) || slot(1) || len(2 LE) ||
/// count(4 LE) || flags(1) || material(16)`.
const JOURNAL_RECORD_LEN: usize = 1 + 1 + 2 + 4 + 1 + 16;

#[derive(Default)]
pub struct MemoryKeyStore {
    nvm: Mutex<HashMap<KeyId, KeyRecord>>,
    cache: Mutex<HashMap<KeyId, KeyRecord>>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nvm: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Seed an NVM object directly, bypassing the cache -- used by tests and
    /// by server bootstrap to provision a `SECRET_KEY`/`BOOT_MAC_KEY` before
    /// the first request arrives.
    pub fn seed(&self, meta: KeyMetadata, material: [u8; 16]) {
        self.nvm.lock().unwrap().insert(
            meta.id,
            KeyRecord {
                meta,
                material,
            },
        );
    }

    /// Load NVM objects from a flat journal file, or start empty if the
    /// file does not yet exist (spec §11 AMBIENT: optional file-journal
    /// mode, used when the server is configured with an NVM backing path).
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than "not found".
    pub fn load_journal(path: &Path) -> io::Result<Self> {
        let store = Self::new();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e),
        };
        for record in bytes.chunks_exact(JOURNAL_RECORD_LEN) {
            let client_id = record[0];
            let slot = KeySlot(record[1]);
            let len = u16::from_le_bytes([record[2], record[3]]);
            let count = u32::from_le_bytes(record[4..8].try_into().expect("4 bytes"));
            let flags = KeyFlags::from_bits(record[8]);
            let material: [u8; 16] = record[9..25].try_into().expect("16 bytes");
            store.seed(
                KeyMetadata {
                    id: KeyId::she(client_id, slot),
                    len,
                    label: SheKeyLabel { flags, count },
                },
                material,
            );
        }
        Ok(store)
    }

    /// Flush every NVM object to `path` as a flat journal file. Does not
    /// persist the cache, which is expected to be rebuilt via read-through.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from writing the file.
    pub fn save_journal(&self, path: &Path) -> io::Result<()> {
        let nvm = self.nvm.lock().unwrap();
        let mut buf = Vec::with_capacity(nvm.len() * JOURNAL_RECORD_LEN);
        for rec in nvm.values() {
            buf.push(rec.meta.id.client_id);
            buf.push(rec.meta.id.slot.0);
            buf.extend_from_slice(&rec.meta.len.to_le_bytes());
            buf.extend_from_slice(&rec.meta.label.count.to_le_bytes());
            buf.push(rec.meta.label.flags.to_bits());
            buf.extend_from_slice(&rec.material);
        }
        fs::write(path, buf)
    }
}

impl KeyStore for MemoryKeyStore {
    fn read_key(&self, id: KeyId) -> Result<KeyRecord, KeyStoreError> {
        if let Some(rec) = self.cache.lock().unwrap().get(&id) {
            return Ok(*rec);
        }
        let rec = *self
            .nvm
            .lock()
            .unwrap()
            .get(&id)
            .ok_or(KeyStoreError::NotFound)?;
        self.cache.lock().unwrap().insert(id, rec);
        Ok(rec)
    }

    fn nvm_add_object(&self, meta: KeyMetadata, material: [u8; 16]) -> Result<(), KeyStoreError> {
        let rec = KeyRecord { meta, material };
        self.nvm.lock().unwrap().insert(meta.id, rec);
        self.cache.lock().unwrap().insert(meta.id, rec);
        Ok(())
    }
}

impl KeyCache for MemoryKeyStore {
    fn cache_key(&self, meta: KeyMetadata, material: [u8; 16]) {
        self.cache
            .lock()
            .unwrap()
            .insert(meta.id, KeyRecord { meta, material });
    }

    fn cached_key(&self, id: KeyId) -> Option<KeyRecord> {
        self.cache.lock().unwrap().get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{KeySlot, SheKeyLabel};

    fn meta(id: KeyId) -> KeyMetadata {
        KeyMetadata {
            id,
            len: 16,
            label: SheKeyLabel::default(),
        }
    }

    #[test]
    fn read_key_misses_until_seeded() {
        let store = MemoryKeyStore::new();
        let id = KeyId::she(0, KeySlot::SECRET_KEY);
        assert!(matches!(store.read_key(id), Err(KeyStoreError::NotFound)));
    }

    #[test]
    fn nvm_add_object_promotes_into_cache() {
        let store = MemoryKeyStore::new();
        let id = KeyId::she(0, KeySlot::SECRET_KEY);
        store.nvm_add_object(meta(id), [0x42; 16]).unwrap();
        assert!(store.cached_key(id).is_some());
        assert_eq!(store.read_key(id).unwrap().material, [0x42; 16]);
    }

    #[test]
    fn nvm_add_object_replaces_prior_occupant() {
        let store = MemoryKeyStore::new();
        let id = KeyId::she(0, KeySlot::RAM_KEY);
        store.nvm_add_object(meta(id), [0x01; 16]).unwrap();
        store.nvm_add_object(meta(id), [0x02; 16]).unwrap();
        assert_eq!(store.read_key(id).unwrap().material, [0x02; 16]);
    }

    #[test]
    fn read_key_falls_back_to_nvm_when_cache_cold() {
        let store = MemoryKeyStore::new();
        let id = KeyId::she(1, KeySlot::BOOT_MAC_KEY);
        store.seed(meta(id), [0x55; 16]);
        assert!(store.cached_key(id).is_none());
        let rec = store.read_key(id).unwrap();
        assert_eq!(rec.material, [0x55; 16]);
        assert!(store.cached_key(id).is_some());
    }

    #[test]
    fn journal_round_trips_nvm_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("she.journal");

        let store = MemoryKeyStore::new();
        let id = KeyId::she(2, KeySlot::PRNG_SEED);
        let label = SheKeyLabel {
            flags: KeyFlags {
                write_protect: true,
                ..Default::default()
            },
            count: 7,
        };
        store.nvm_add_object(KeyMetadata { id, len: 16, label }, [0x9A; 16]).unwrap();
        store.save_journal(&path).unwrap();

        let loaded = MemoryKeyStore::load_journal(&path).unwrap();
        let rec = loaded.read_key(id).unwrap();
        assert_eq!(rec.material, [0x9A; 16]);
        assert_eq!(rec.meta.label, label);
    }

    #[test]
    fn load_journal_of_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.journal");
        let store = MemoryKeyStore::load_journal(&path).unwrap();
        assert!(matches!(
            store.read_key(KeyId::she(0, KeySlot::SECRET_KEY)),
            Err(KeyStoreError::NotFound)
        ));
    }
}
