// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SECURE_BOOT_INIT / SECURE_BOOT_UPDATE / SECURE_BOOT_FINISH (spec §4.4).

use crate::crypto::CryptoBackend;
use crate::error::SheErrorCode;
use crate::keystore::{KeyFacade, KeyId, KeySlot};
use crate::she::state::{SecureBootState, SheGlobalState};
use crate::she::wire::SheResponse;

/// Absorb 12 zero bytes followed by the little-endian `bl_size` (spec §4.4:
/// "SECURE_BOOT_INIT first absorbs 12 zero bytes, then the little-endian
/// `bl_size`"). The endianness is pinned by spec.md §4.4's own wording, not
/// left to the implementer (see the REDESIGN FLAGS resolution).
fn boot_header(bl_size: u32) -> [u8; 16] {
    let mut header = [0u8; 16];
    header[12..16].copy_from_slice(&bl_size.to_le_bytes());
    header
}

pub fn handle_secure_boot_init(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    bl_size: u32,
) -> SheResponse {
    state.reset_secure_boot();
    state.bl_size = bl_size;

    let boot_mac_key_id = KeyId::she(0, KeySlot::BOOT_MAC_KEY);
    match key_facade.read_key(boot_mac_key_id) {
        Ok(rec) => {
            state.cmac_key_found = true;
            state.boot_mac_key = Some(rec.material);
            state.sb_absorbed.extend_from_slice(&boot_header(bl_size));
            state.sb_state = SecureBootState::Update;
            SheResponse::ok()
        }
        Err(_) => {
            log::warn!("[SHE] SECURE_BOOT_INIT: no BOOT_MAC_KEY provisioned");
            state.cmac_key_found = false;
            state.sb_state = SecureBootState::Success;
            SheResponse::error(SheErrorCode::NoSecureBoot)
        }
    }
}

pub fn handle_secure_boot_update(state: &mut SheGlobalState, chunk: &[u8]) -> SheResponse {
    if state.sb_state != SecureBootState::Update {
        return SheResponse::error(SheErrorCode::SequenceError);
    }

    let received = state.bl_size_received as u64 + chunk.len() as u64;
    if received > u64::from(state.bl_size) {
        return SheResponse::error(SheErrorCode::GeneralError);
    }

    state.sb_absorbed.extend_from_slice(chunk);
    state.bl_size_received = received as u32;

    if state.bl_size_received == state.bl_size {
        state.sb_state = SecureBootState::Finish;
    }
    SheResponse::ok()
}

pub fn handle_secure_boot_finish(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    crypto: &dyn CryptoBackend,
) -> SheResponse {
    if state.sb_state != SecureBootState::Finish {
        return SheResponse::error(SheErrorCode::SequenceError);
    }

    let boot_mac_id = KeyId::she(0, KeySlot::BOOT_MAC);
    let stored = match key_facade.read_key(boot_mac_id) {
        Ok(rec) => rec,
        Err(e) => {
            log::error!("[SHE] SECURE_BOOT_FINISH: BOOT_MAC unavailable: {e}");
            return SheResponse::error(SheErrorCode::GeneralError);
        }
    };

    let Some(boot_mac_key) = state.boot_mac_key else {
        return SheResponse::error(SheErrorCode::GeneralError);
    };
    let computed = crypto.cmac(&boot_mac_key, &state.sb_absorbed);

    if computed == stored.material {
        state.finish_secure_boot_success();
        SheResponse::ok()
    } else {
        log::warn!("[SHE] SECURE_BOOT_FINISH: boot MAC mismatch");
        state.fail_secure_boot();
        SheResponse::error(SheErrorCode::GeneralError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RustCryptoAes128;
    use crate::keystore::{KeyMetadata, MemoryKeyStore, SheKeyLabel};

    fn meta(id: KeyId) -> KeyMetadata {
        KeyMetadata {
            id,
            len: 16,
            label: SheKeyLabel::default(),
        }
    }

    #[test]
    fn init_without_boot_mac_key_succeeds_immediately_with_no_secure_boot() {
        let mut state = SheGlobalState::new();
        let store = MemoryKeyStore::new();
        let resp = handle_secure_boot_init(&mut state, &store, 1024);
        assert_eq!(resp.rc(), SheErrorCode::NoSecureBoot);
        assert_eq!(state.sb_state, SecureBootState::Success);
        assert_eq!(state.sreg(), 0x06);
    }

    #[test]
    fn full_boot_cycle_succeeds_when_mac_matches() {
        let mut state = SheGlobalState::new();
        let store = MemoryKeyStore::new();
        let cipher = RustCryptoAes128::new();
        let boot_key = [0x11u8; 16];
        store.seed(meta(KeyId::she(0, KeySlot::BOOT_MAC_KEY)), boot_key);

        let image = vec![0xABu8; 32];
        let mut absorbed = vec![0u8; 12];
        absorbed.extend_from_slice(&32u32.to_le_bytes());
        absorbed.extend_from_slice(&image);
        let expected_mac = cipher.cmac(&boot_key, &absorbed);
        store.seed(meta(KeyId::she(0, KeySlot::BOOT_MAC)), expected_mac);

        let resp = handle_secure_boot_init(&mut state, &store, 32);
        assert_eq!(resp.rc(), SheErrorCode::NoError);

        let resp = handle_secure_boot_update(&mut state, &image);
        assert_eq!(resp.rc(), SheErrorCode::NoError);
        assert_eq!(state.sb_state, SecureBootState::Finish);

        let resp = handle_secure_boot_finish(&mut state, &store, &cipher);
        assert_eq!(resp.rc(), SheErrorCode::NoError);
        assert_eq!(state.sb_state, SecureBootState::Success);
        assert_eq!(state.sreg(), 0x07);
    }

    #[test]
    fn corrupted_image_fails_boot_and_leaves_sreg_0x03() {
        let mut state = SheGlobalState::new();
        let store = MemoryKeyStore::new();
        let cipher = RustCryptoAes128::new();
        let boot_key = [0x22u8; 16];
        store.seed(meta(KeyId::she(0, KeySlot::BOOT_MAC_KEY)), boot_key);

        let mut absorbed = vec![0u8; 12];
        absorbed.extend_from_slice(&16u32.to_le_bytes());
        absorbed.extend_from_slice(&[0xCCu8; 16]);
        let expected_mac = cipher.cmac(&boot_key, &absorbed);
        store.seed(meta(KeyId::she(0, KeySlot::BOOT_MAC)), expected_mac);

        handle_secure_boot_init(&mut state, &store, 16);
        let mut corrupt_image = [0xCCu8; 16];
        corrupt_image[0] ^= 0x01;
        handle_secure_boot_update(&mut state, &corrupt_image);

        let resp = handle_secure_boot_finish(&mut state, &store, &cipher);
        assert_eq!(resp.rc(), SheErrorCode::GeneralError);
        assert_eq!(state.sb_state, SecureBootState::Failure);
        assert_eq!(state.sreg(), 0x03);
    }

    #[test]
    fn update_before_init_is_sequence_error() {
        let mut state = SheGlobalState::new();
        let resp = handle_secure_boot_update(&mut state, b"x");
        assert_eq!(resp.rc(), SheErrorCode::SequenceError);
    }
}
