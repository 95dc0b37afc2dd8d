// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios driven through the public [`Dispatcher`] API,
//! matching the literal scenarios enumerated in spec §8. Module-local
//! `#[cfg(test)]` blocks elsewhere in this crate exercise individual
//! handlers in isolation; this file drives the same flows the way a real
//! client session would, one `SheRequest` at a time.

use std::sync::Arc;

use she_core::crypto::constants::{KEY_UPDATE_ENC_C, KEY_UPDATE_MAC_C};
use she_core::crypto::{cbc_encrypt, derive_subkey, CryptoBackend, RustCryptoAes128};
use she_core::keystore::{KeyFacade, KeyFlags, KeyId, KeyMetadata, KeySlot, MemoryKeyStore, SheKeyLabel};
use she_core::{Dispatcher, SheErrorCode, SheRequest, SheResponse};

fn seed(store: &MemoryKeyStore, slot: KeySlot, material: [u8; 16]) {
    store.seed(
        KeyMetadata {
            id: KeyId::she(0, slot),
            len: 16,
            label: SheKeyLabel::default(),
        },
        material,
    );
}

fn new_dispatcher(store: MemoryKeyStore) -> Dispatcher<RustCryptoAes128> {
    let facade: Arc<dyn KeyFacade> = Arc::new(store);
    Dispatcher::new(facade, RustCryptoAes128::new())
}

/// Build a LOAD_KEY request's M1/M2/M3 the way a real client would,
/// authenticating under `auth_slot` and targeting `target_slot`.
fn build_load_key(
    crypto: &mut RustCryptoAes128,
    auth_key: [u8; 16],
    uid: [u8; 15],
    auth_slot: KeySlot,
    target_slot: KeySlot,
    new_key: [u8; 16],
    count: u32,
) -> ([u8; 16], [u8; 32], [u8; 16]) {
    let id_authid = (target_slot.0 << 4) | auth_slot.0;
    let mut m1 = [0u8; 16];
    m1[0..15].copy_from_slice(&uid);
    m1[15] = id_authid;

    let label = SheKeyLabel {
        flags: KeyFlags::default(),
        count,
    };
    let mut plain_m2 = [0u8; 32];
    plain_m2[0..4].copy_from_slice(&label.pack().to_be_bytes());
    plain_m2[16..32].copy_from_slice(&new_key);

    let k1 = derive_subkey(crypto, &auth_key, &KEY_UPDATE_ENC_C);
    let m2: [u8; 32] = cbc_encrypt(&k1, &[0u8; 16], &plain_m2)
        .unwrap()
        .try_into()
        .unwrap();

    let k2 = derive_subkey(crypto, &auth_key, &KEY_UPDATE_MAC_C);
    let mut authenticated = Vec::with_capacity(48);
    authenticated.extend_from_slice(&m1);
    authenticated.extend_from_slice(&m2);
    let m3 = crypto.cmac(&k2, &authenticated);

    (m1, m2, m3)
}

/// Scenario 1 (spec §8): INIT state, no `BOOT_MAC_KEY` provisioned.
/// SET_UID succeeds; SECURE_BOOT_INIT reports `NO_SECURE_BOOT` and jumps
/// straight to SUCCESS; GET_STATUS reports `BOOT_FINISHED | BOOT_OK = 0x06`.
#[test]
fn scenario_boot_with_no_boot_key() {
    let store = MemoryKeyStore::new();
    let mut dispatcher = new_dispatcher(store);

    let uid: [u8; 15] = (1..=15).collect::<Vec<u8>>().try_into().unwrap();
    let resp = dispatcher.dispatch(&SheRequest::SetUid { uid });
    assert_eq!(resp.rc(), SheErrorCode::NoError);

    let resp = dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 1024 });
    assert_eq!(resp.rc(), SheErrorCode::NoSecureBoot);

    let resp = dispatcher.dispatch(&SheRequest::GetStatus);
    let SheResponse::Status { rc, sreg } = resp else {
        panic!("expected Status response")
    };
    assert_eq!(rc, SheErrorCode::NoError);
    assert_eq!(sreg, 0x06);
}

/// Scenario 2 (spec §8): `BOOT_MAC_KEY`/`BOOT_MAC` provisioned so the
/// image's CMAC matches; INIT/UPDATE/FINISH succeed and GET_STATUS reports
/// `SECURE_BOOT | BOOT_FINISHED | BOOT_OK = 0x07`.
#[test]
fn scenario_boot_success() {
    let store = MemoryKeyStore::new();
    let boot_key = [0x11u8; 16];
    seed(&store, KeySlot::BOOT_MAC_KEY, boot_key);

    let cipher = RustCryptoAes128::new();
    let image = vec![0xABu8; 32];
    let mut absorbed = vec![0u8; 12];
    absorbed.extend_from_slice(&32u32.to_le_bytes());
    absorbed.extend_from_slice(&image);
    let boot_mac = cipher.cmac(&boot_key, &absorbed);
    seed(&store, KeySlot::BOOT_MAC, boot_mac);

    let mut dispatcher = new_dispatcher(store);

    let resp = dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 32 });
    assert_eq!(resp.rc(), SheErrorCode::NoError);
    let resp = dispatcher.dispatch(&SheRequest::SecureBootUpdate { chunk: image });
    assert_eq!(resp.rc(), SheErrorCode::NoError);
    let resp = dispatcher.dispatch(&SheRequest::SecureBootFinish);
    assert_eq!(resp.rc(), SheErrorCode::NoError);

    let resp = dispatcher.dispatch(&SheRequest::GetStatus);
    let SheResponse::Status { sreg, .. } = resp else {
        panic!("expected Status response")
    };
    assert_eq!(sreg, 0x07);
}

/// Scenario 3 (spec §8): same provisioning as scenario 2, but one byte of
/// the image is corrupted before FINISH. FINISH returns `GENERAL_ERROR` and
/// GET_STATUS reports `SECURE_BOOT | BOOT_FINISHED = 0x03` (not `BOOT_OK`).
#[test]
fn scenario_boot_failure() {
    let store = MemoryKeyStore::new();
    let boot_key = [0x22u8; 16];
    seed(&store, KeySlot::BOOT_MAC_KEY, boot_key);

    let cipher = RustCryptoAes128::new();
    let image = vec![0xCCu8; 16];
    let mut absorbed = vec![0u8; 12];
    absorbed.extend_from_slice(&16u32.to_le_bytes());
    absorbed.extend_from_slice(&image);
    let boot_mac = cipher.cmac(&boot_key, &absorbed);
    seed(&store, KeySlot::BOOT_MAC, boot_mac);

    let mut dispatcher = new_dispatcher(store);

    dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 16 });
    let mut corrupt_image = image;
    corrupt_image[0] ^= 0x01;
    dispatcher.dispatch(&SheRequest::SecureBootUpdate { chunk: corrupt_image });

    let resp = dispatcher.dispatch(&SheRequest::SecureBootFinish);
    assert_eq!(resp.rc(), SheErrorCode::GeneralError);

    let resp = dispatcher.dispatch(&SheRequest::GetStatus);
    let SheResponse::Status { sreg, .. } = resp else {
        panic!("expected Status response")
    };
    assert_eq!(sreg, 0x03);
}

/// Scenario 4 (spec §8): LOAD_KEY into slot 4 with counter=5 succeeds;
/// replaying counter=5 returns `KEY_UPDATE_ERROR`; counter=6 then succeeds.
#[test]
fn scenario_replay_defence() {
    let store = MemoryKeyStore::new();
    let auth_key = [0x33u8; 16];
    seed(&store, KeySlot::SECRET_KEY, auth_key);
    let uid = [0x09u8; 15];

    let mut dispatcher = new_dispatcher(store);
    dispatcher.dispatch(&SheRequest::SetUid { uid });
    // No BOOT_MAC_KEY provisioned: SECURE_BOOT_INIT jumps straight to
    // SUCCESS (scenario 1's path), unblocking the LOAD_KEY precondition.
    dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 0 });

    let target = KeySlot(4);
    let mut crypto = RustCryptoAes128::new();

    let (m1, m2, m3) = build_load_key(&mut crypto, auth_key, uid, KeySlot::SECRET_KEY, target, [0x01; 16], 5);
    let resp = dispatcher.dispatch(&SheRequest::LoadKey { m1, m2, m3 });
    assert_eq!(resp.rc(), SheErrorCode::NoError);

    let (m1, m2, m3) = build_load_key(&mut crypto, auth_key, uid, KeySlot::SECRET_KEY, target, [0x02; 16], 5);
    let resp = dispatcher.dispatch(&SheRequest::LoadKey { m1, m2, m3 });
    assert_eq!(resp.rc(), SheErrorCode::KeyUpdateError);

    let (m1, m2, m3) = build_load_key(&mut crypto, auth_key, uid, KeySlot::SECRET_KEY, target, [0x02; 16], 6);
    let resp = dispatcher.dispatch(&SheRequest::LoadKey { m1, m2, m3 });
    assert_eq!(resp.rc(), SheErrorCode::NoError);
}

/// Scenario 5 (spec §8): EXPORT_RAM_KEY before any RAM key has been loaded
/// returns `KEY_INVALID`; after LOAD_PLAIN_KEY it succeeds, with the
/// exported counter field equal to big-endian `1` in the packed label word.
#[test]
fn scenario_ram_export_gate() {
    let store = MemoryKeyStore::new();
    let secret_key = [0x44u8; 16];
    seed(&store, KeySlot::SECRET_KEY, secret_key);
    let uid = [0x0Au8; 15];

    let mut dispatcher = new_dispatcher(store);
    dispatcher.dispatch(&SheRequest::SetUid { uid });
    dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 0 });

    let resp = dispatcher.dispatch(&SheRequest::ExportRamKey);
    assert_eq!(resp.rc(), SheErrorCode::KeyInvalid);

    let resp = dispatcher.dispatch(&SheRequest::LoadPlainKey { key: [0u8; 16] });
    assert_eq!(resp.rc(), SheErrorCode::NoError);

    let resp = dispatcher.dispatch(&SheRequest::ExportRamKey);
    let SheResponse::RamKeyExport { rc, m2, .. } = resp else {
        panic!("expected RamKeyExport response")
    };
    assert_eq!(rc, SheErrorCode::NoError);

    // Decrypt M2 under the same K1 a peer holding SECRET_KEY would derive,
    // and check the packed label word's counter field is exactly 1.
    let mut crypto = RustCryptoAes128::new();
    let k1 = derive_subkey(&mut crypto, &secret_key, &KEY_UPDATE_ENC_C);
    let plain_m2 = she_core::crypto::cbc_decrypt(&k1, &[0u8; 16], &m2).unwrap();
    let label_word = u32::from_be_bytes(plain_m2[0..4].try_into().unwrap());
    let label = SheKeyLabel::unpack(label_word);
    assert_eq!(label.count, 1);
}

/// Scenario 6 (spec §8): INIT_RND after a prior successful INIT_RND returns
/// `SEQUENCE_ERROR`; RND continues to function using the already-derived
/// PRNG state.
#[test]
fn scenario_prng_double_init() {
    let store = MemoryKeyStore::new();
    seed(&store, KeySlot::SECRET_KEY, [0x55; 16]);
    seed(&store, KeySlot::PRNG_SEED, [0x66; 16]);
    let uid = [0x0Bu8; 15];

    let mut dispatcher = new_dispatcher(store);
    dispatcher.dispatch(&SheRequest::SetUid { uid });
    dispatcher.dispatch(&SheRequest::SecureBootInit { bl_size: 0 });

    let resp = dispatcher.dispatch(&SheRequest::InitRnd);
    assert_eq!(resp.rc(), SheErrorCode::NoError);

    let resp = dispatcher.dispatch(&SheRequest::InitRnd);
    assert_eq!(resp.rc(), SheErrorCode::SequenceError);

    let resp = dispatcher.dispatch(&SheRequest::Rnd);
    assert!(matches!(resp, SheResponse::Rnd { rc, .. } if rc == SheErrorCode::NoError));
}
