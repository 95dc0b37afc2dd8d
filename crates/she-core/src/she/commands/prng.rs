// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! INIT_RND / RND / EXTEND_SEED (spec §4.7).

use crate::crypto::constants::{PRNG_KEY_C, PRNG_SEED_KEY_C};
use crate::crypto::{aes_mp16, cbc_encrypt, derive_subkey, CryptoBackend};
use crate::error::SheErrorCode;
use crate::keystore::{KeyFacade, KeyId, KeySlot};
use crate::she::state::SheGlobalState;
use crate::she::wire::SheResponse;

pub fn handle_init_rnd<C: CryptoBackend>(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    crypto: &mut C,
) -> SheResponse {
    if state.rnd_inited {
        return SheResponse::error(SheErrorCode::SequenceError);
    }

    let secret_key = match key_facade.read_key(KeyId::she(0, KeySlot::SECRET_KEY)) {
        Ok(rec) => rec.material,
        Err(_) => return SheResponse::error(SheErrorCode::KeyNotAvailable),
    };

    let seed_id = KeyId::she(0, KeySlot::PRNG_SEED);
    let seed_rec = match key_facade.read_key(seed_id) {
        Ok(rec) => rec,
        Err(_) => return SheResponse::error(SheErrorCode::KeyNotAvailable),
    };

    let seed_key = derive_subkey(crypto, &secret_key, &PRNG_SEED_KEY_C);
    let new_seed_vec = match cbc_encrypt(&seed_key, &[0u8; 16], &seed_rec.material) {
        Ok(buf) => buf,
        Err(_) => return SheResponse::error(SheErrorCode::GeneralError),
    };
    let new_seed: [u8; 16] = new_seed_vec.try_into().expect("single block in, single block out");

    if key_facade.nvm_add_object(seed_rec.meta, new_seed).is_err() {
        return SheResponse::error(SheErrorCode::GeneralError);
    }

    state.prng_state = new_seed;
    state.prng_key = derive_subkey(crypto, &secret_key, &PRNG_KEY_C);
    state.rnd_inited = true;
    SheResponse::ok()
}

pub fn handle_rnd(state: &mut SheGlobalState) -> SheResponse {
    if !state.rnd_inited {
        return SheResponse::error(SheErrorCode::RngSeed);
    }
    let advanced = match cbc_encrypt(&state.prng_key, &[0u8; 16], &state.prng_state) {
        Ok(buf) => buf,
        Err(_) => return SheResponse::error(SheErrorCode::GeneralError),
    };
    state.prng_state = advanced.try_into().expect("single block in, single block out");
    SheResponse::Rnd {
        rc: SheErrorCode::NoError,
        value: state.prng_state,
    }
}

pub fn handle_extend_seed<C: CryptoBackend>(
    state: &mut SheGlobalState,
    key_facade: &dyn KeyFacade,
    crypto: &mut C,
    entropy: [u8; 16],
) -> SheResponse {
    let seed_id = KeyId::she(0, KeySlot::PRNG_SEED);
    let seed_rec = match key_facade.read_key(seed_id) {
        Ok(rec) => rec,
        Err(_) => return SheResponse::error(SheErrorCode::KeyNotAvailable),
    };

    let mut state_input = [0u8; 32];
    state_input[..16].copy_from_slice(&state.prng_state);
    state_input[16..].copy_from_slice(&entropy);
    state.prng_state = aes_mp16(crypto, &state_input);

    let mut seed_input = [0u8; 32];
    seed_input[..16].copy_from_slice(&seed_rec.material);
    seed_input[16..].copy_from_slice(&entropy);
    let new_seed = aes_mp16(crypto, &seed_input);

    if key_facade.nvm_add_object(seed_rec.meta, new_seed).is_err() {
        return SheResponse::error(SheErrorCode::GeneralError);
    }

    SheResponse::ok()
}
