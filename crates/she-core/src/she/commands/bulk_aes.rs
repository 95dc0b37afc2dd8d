// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ENC_ECB / ENC_CBC / DEC_ECB / DEC_CBC (spec §4.8).

use crate::crypto::{cbc_decrypt, cbc_encrypt, ecb_decrypt, ecb_encrypt};
use crate::error::SheErrorCode;
use crate::keystore::{KeyFacade, KeyId};
use crate::she::wire::SheResponse;

/// Truncate to the block-aligned prefix the protocol actually processes
/// (spec §4.8: `len' = len - (len mod 16)`, residual bytes discarded).
fn block_aligned_prefix(data: &[u8]) -> &[u8] {
    let aligned_len = data.len() - (data.len() % 16);
    &data[..aligned_len]
}

fn load_key(key_facade: &dyn KeyFacade, key_id: u16) -> Result<[u8; 16], SheResponse> {
    key_facade
        .read_key(KeyId::from_wire(key_id))
        .map(|rec| rec.material)
        .map_err(|_| SheResponse::error(SheErrorCode::KeyNotAvailable))
}

pub fn handle_enc_ecb(key_facade: &dyn KeyFacade, key_id: u16, data: &[u8]) -> SheResponse {
    let key = match load_key(key_facade, key_id) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match ecb_encrypt(&key, block_aligned_prefix(data)) {
        Ok(out) => SheResponse::Bulk {
            rc: SheErrorCode::NoError,
            data: out,
        },
        Err(_) => SheResponse::error(SheErrorCode::GeneralError),
    }
}

pub fn handle_dec_ecb(key_facade: &dyn KeyFacade, key_id: u16, data: &[u8]) -> SheResponse {
    let key = match load_key(key_facade, key_id) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match ecb_decrypt(&key, block_aligned_prefix(data)) {
        Ok(out) => SheResponse::Bulk {
            rc: SheErrorCode::NoError,
            data: out,
        },
        Err(_) => SheResponse::error(SheErrorCode::GeneralError),
    }
}

pub fn handle_enc_cbc(
    key_facade: &dyn KeyFacade,
    key_id: u16,
    iv: &[u8; 16],
    data: &[u8],
) -> SheResponse {
    let key = match load_key(key_facade, key_id) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match cbc_encrypt(&key, iv, block_aligned_prefix(data)) {
        Ok(out) => SheResponse::Bulk {
            rc: SheErrorCode::NoError,
            data: out,
        },
        Err(_) => SheResponse::error(SheErrorCode::GeneralError),
    }
}

pub fn handle_dec_cbc(
    key_facade: &dyn KeyFacade,
    key_id: u16,
    iv: &[u8; 16],
    data: &[u8],
) -> SheResponse {
    let key = match load_key(key_facade, key_id) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match cbc_decrypt(&key, iv, block_aligned_prefix(data)) {
        Ok(out) => SheResponse::Bulk {
            rc: SheErrorCode::NoError,
            data: out,
        },
        Err(_) => SheResponse::error(SheErrorCode::GeneralError),
    }
}
