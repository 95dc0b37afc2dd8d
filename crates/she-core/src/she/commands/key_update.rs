// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LOAD_KEY / LOAD_PLAIN_KEY / EXPORT_RAM_KEY (spec §4.5, §4.6).
//!
//! LOAD_KEY is the only handler in this crate that drives the full K1-K4
//! derivation chain; the others touch at most one or two subkeys.

use zeroize::Zeroizing;

use crate::crypto::constants::{KEY_UPDATE_ENC_C, KEY_UPDATE_MAC_C};
use crate::crypto::{cbc_decrypt, derive_subkey, CryptoBackend};
use crate::error::SheErrorCode;
use crate::keystore::{KeyFacade, KeyId, KeyMetadata, KeySlot, SheKeyLabel};
use crate::she::state::SheGlobalState;
use crate::she::wire::SheResponse;

/// `persisted_counter(28b) || 0b1000` packed into the high 4 bytes of a
/// 16-byte block, per M4's plaintext layout (spec §4.5 step 9).
fn counter_marker_block(persisted_counter: u32) -> [u8; 16] {
    let mut block = [0u8; 16];
    let word = (persisted_counter << 4) | 0b1000;
    block[0..4].copy_from_slice(&word.to_be_bytes());
    block
}

/// Authenticate and apply M1/M2/M3, returning M4/M5 on success (spec §4.5).
pub fn handle_load_key<C: CryptoBackend>(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    crypto: &mut C,
    m1: [u8; 16],
    m2: [u8; 32],
    m3: [u8; 16],
) -> SheResponse {
    let id_authid = m1[15];
    let target_slot = KeySlot(id_authid >> 4);
    let auth_slot = KeySlot(id_authid & 0x0F);

    let auth_key: Zeroizing<[u8; 16]> = match key_facade.read_key(KeyId::she(0, auth_slot)) {
        Ok(rec) => Zeroizing::new(rec.material),
        Err(_) => return SheResponse::error(SheErrorCode::KeyNotAvailable),
    };

    let k2 = Zeroizing::new(derive_subkey(crypto, &auth_key, &KEY_UPDATE_MAC_C));
    let mut authenticated = Vec::with_capacity(48);
    authenticated.extend_from_slice(&m1);
    authenticated.extend_from_slice(&m2);
    let expected_m3 = crypto.cmac(&k2, &authenticated);
    if expected_m3 != m3 {
        return SheResponse::error(SheErrorCode::KeyUpdateError);
    }

    let k1 = Zeroizing::new(derive_subkey(crypto, &auth_key, &KEY_UPDATE_ENC_C));
    let plain_m2: Zeroizing<Vec<u8>> = match cbc_decrypt(&k1, &[0u8; 16], &m2) {
        Ok(buf) => Zeroizing::new(buf),
        Err(_) => return SheResponse::error(SheErrorCode::GeneralError),
    };
    let label_word = u32::from_be_bytes(plain_m2[0..4].try_into().expect("4 bytes"));
    let label = SheKeyLabel::unpack(label_word);
    let new_key: Zeroizing<[u8; 16]> =
        Zeroizing::new(plain_m2[16..32].try_into().expect("16 bytes"));

    let target_id = KeyId::she(0, target_slot);
    let existing = key_facade.read_key(target_id).ok();

    if let Some(rec) = &existing {
        if rec.meta.label.flags.write_protect {
            return SheResponse::error(SheErrorCode::WriteProtected);
        }
    }

    let uid_field = &m1[0..15];
    if uid_field.iter().all(|&b| b == 0) {
        let wildcard = existing.as_ref().is_some_and(|rec| rec.meta.label.flags.wildcard);
        if !wildcard {
            return SheResponse::error(SheErrorCode::KeyUpdateError);
        }
    } else if uid_field != state.uid {
        return SheResponse::error(SheErrorCode::KeyUpdateError);
    }

    if let Some(rec) = &existing {
        if label.count <= rec.meta.label.count {
            return SheResponse::error(SheErrorCode::KeyUpdateError);
        }
    }

    let meta = KeyMetadata {
        id: target_id,
        len: 16,
        label,
    };

    let persisted_counter = if target_slot == KeySlot::RAM_KEY {
        key_facade.cache_key(meta, *new_key);
        meta.label.count
    } else {
        if key_facade.nvm_add_object(meta, *new_key).is_err() {
            return SheResponse::error(SheErrorCode::GeneralError);
        }
        match key_facade.read_key(target_id) {
            Ok(rec) => rec.meta.label.count,
            Err(_) => return SheResponse::error(SheErrorCode::GeneralError),
        }
    };

    let k3 = Zeroizing::new(derive_subkey(crypto, &new_key, &KEY_UPDATE_ENC_C));
    let mut m4_tail = counter_marker_block(persisted_counter);
    crypto.set_key(&k3);
    crypto.encrypt_block(&mut m4_tail);

    let mut m4 = [0u8; 32];
    m4[0..15].copy_from_slice(&state.uid);
    m4[15] = id_authid;
    m4[16..32].copy_from_slice(&m4_tail);

    let k4 = Zeroizing::new(derive_subkey(crypto, &new_key, &KEY_UPDATE_MAC_C));
    let m5 = crypto.cmac(&k4, &m4);

    if target_slot == KeySlot::RAM_KEY {
        state.ram_key_plain = false;
        state.ram_key_plain = true;
    }

    SheResponse::KeyUpdate {
        rc: SheErrorCode::NoError,
        m4,
        m5,
    }
}

/// Write a bare key straight into the RAM_KEY cache slot (spec §4.6).
pub fn handle_load_plain_key(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    key: [u8; 16],
) -> SheResponse {
    let meta = KeyMetadata {
        id: KeyId::she(0, KeySlot::RAM_KEY),
        len: 16,
        label: SheKeyLabel::default(),
    };
    key_facade.cache_key(meta, key);
    state.ram_key_plain = true;
    SheResponse::ok()
}

/// Export the current RAM key as a LOAD_KEY-shaped M1..M5, authenticated
/// under SECRET_KEY, with the exported counter fixed at `1` (spec §4.6).
pub fn handle_export_ram_key<C: CryptoBackend>(
    state: &SheGlobalState,
    key_facade: &dyn KeyFacade,
    crypto: &mut C,
) -> SheResponse {
    if !state.ram_key_plain {
        return SheResponse::error(SheErrorCode::KeyInvalid);
    }

    let ram_key: Zeroizing<[u8; 16]> = match key_facade.read_key(KeyId::she(0, KeySlot::RAM_KEY)) {
        Ok(rec) => Zeroizing::new(rec.material),
        Err(_) => return SheResponse::error(SheErrorCode::KeyInvalid),
    };
    let secret_key: Zeroizing<[u8; 16]> = match key_facade.read_key(KeyId::she(0, KeySlot::SECRET_KEY)) {
        Ok(rec) => Zeroizing::new(rec.material),
        Err(_) => return SheResponse::error(SheErrorCode::KeyNotAvailable),
    };

    let id_authid = (KeySlot::RAM_KEY.0 << 4) | KeySlot::SECRET_KEY.0;

    let mut m1 = [0u8; 16];
    m1[0..15].copy_from_slice(&state.uid);
    m1[15] = id_authid;

    let label = SheKeyLabel {
        flags: Default::default(),
        count: 1,
    };
    let mut plain_m2 = Zeroizing::new([0u8; 32]);
    plain_m2[0..4].copy_from_slice(&label.pack().to_be_bytes());
    plain_m2[16..32].copy_from_slice(&ram_key);

    let k1 = Zeroizing::new(derive_subkey(crypto, &secret_key, &KEY_UPDATE_ENC_C));
    let m2_vec = match crate::crypto::cbc_encrypt(&k1, &[0u8; 16], &plain_m2) {
        Ok(buf) => buf,
        Err(_) => return SheResponse::error(SheErrorCode::GeneralError),
    };
    let m2: [u8; 32] = m2_vec.try_into().expect("CBC over 32 bytes yields 32 bytes");

    let k2 = Zeroizing::new(derive_subkey(crypto, &secret_key, &KEY_UPDATE_MAC_C));
    let mut authenticated = Vec::with_capacity(48);
    authenticated.extend_from_slice(&m1);
    authenticated.extend_from_slice(&m2);
    let m3 = crypto.cmac(&k2, &authenticated);

    let k3 = Zeroizing::new(derive_subkey(crypto, &ram_key, &KEY_UPDATE_ENC_C));
    let mut m4_tail = counter_marker_block(1);
    crypto.set_key(&k3);
    crypto.encrypt_block(&mut m4_tail);
    let mut m4 = [0u8; 32];
    m4[0..15].copy_from_slice(&state.uid);
    m4[15] = id_authid;
    m4[16..32].copy_from_slice(&m4_tail);

    let k4 = Zeroizing::new(derive_subkey(crypto, &ram_key, &KEY_UPDATE_MAC_C));
    let m5 = crypto.cmac(&k4, &m4);

    SheResponse::RamKeyExport {
        rc: SheErrorCode::NoError,
        m1,
        m2,
        m3,
        m4,
        m5,
    }
}
