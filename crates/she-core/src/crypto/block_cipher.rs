// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AES-128 / CMAC-AES collaborator traits and their RustCrypto-backed default
//! implementation.
//!
//! The underlying AES/CMAC primitive is explicitly out of scope for this
//! crate (spec §1) -- it is an external collaborator. This module defines
//! the seam as two small traits, the same way the teacher crate treats
//! `ring::aead` as its external AEAD collaborator (`security/crypto/aes_gcm.rs`):
//! the crate depends on the trait, and a concrete adapter wires in a real
//! crate.

use aes::cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
};
use aes::Aes128;
use cipher::block_padding::NoPadding;
use cmac::{Cmac, Mac};
use zeroize::Zeroize;

use crate::error::{SheCoreError, SheResult};

/// Single-block AES-128 ECB encryption, as used by AES-MP16 compression.
pub trait AesBlockCipher: Send + Sync {
    /// Install a new 128-bit key, replacing any previous key schedule.
    fn set_key(&mut self, key: &[u8; 16]);

    /// Encrypt one 16-byte block in place under the currently installed key.
    fn encrypt_block(&self, block: &mut [u8; 16]);
}

/// CMAC-AES (NIST SP 800-38B) authentication over an arbitrary-length message.
pub trait CmacAes: Send + Sync {
    /// Compute the 128-bit CMAC tag of `message` under `key`.
    fn cmac(&self, key: &[u8; 16], message: &[u8]) -> [u8; 16];
}

/// Combined AES/CMAC collaborator, the shape the dispatcher actually holds.
///
/// Blanket-implemented for any type providing both primitives so callers
/// never need to implement this directly.
pub trait CryptoBackend: AesBlockCipher + CmacAes {}
impl<T: AesBlockCipher + CmacAes> CryptoBackend for T {}

/// RustCrypto-backed implementation of [`AesBlockCipher`] and [`CmacAes`].
#[derive(Default)]
pub struct RustCryptoAes128 {
    key: Option<[u8; 16]>,
}

impl RustCryptoAes128 {
    #[must_use]
    pub fn new() -> Self {
        Self { key: None }
    }
}

impl Drop for RustCryptoAes128 {
    fn drop(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.zeroize();
        }
    }
}

impl AesBlockCipher for RustCryptoAes128 {
    fn set_key(&mut self, key: &[u8; 16]) {
        if let Some(mut old) = self.key.replace(*key) {
            old.zeroize();
        }
    }

    fn encrypt_block(&self, block: &mut [u8; 16]) {
        let key = self.key.expect("AesBlockCipher::encrypt_block called before set_key");
        let cipher = Aes128::new_from_slice(&key).expect("AES-128 key is always 16 bytes");
        let mut generic = (*block).into();
        cipher.encrypt_block(&mut generic);
        block.copy_from_slice(&generic);
    }
}

impl CmacAes for RustCryptoAes128 {
    fn cmac(&self, key: &[u8; 16], message: &[u8]) -> [u8; 16] {
        let mut mac = Cmac::<Aes128>::new_from_slice(key).expect("AES-128 key is always 16 bytes");
        mac.update(message);
        mac.finalize().into_bytes().into()
    }
}

/// AES-128-CBC encryption over block-aligned data (no padding -- every call
/// site in this protocol operates on whole 16-byte blocks).
///
/// # Errors
///
/// Returns [`SheCoreError::Crypto`] if `data.len()` is not a multiple of 16.
pub fn cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> SheResult<Vec<u8>> {
    if data.len() % 16 != 0 {
        return Err(SheCoreError::Crypto(
            "CBC encrypt requires block-aligned input".to_string(),
        ));
    }
    let mut buf = data.to_vec();
    let ct_len = cbc::Encryptor::<Aes128>::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, data.len())
        .map_err(|e| SheCoreError::Crypto(format!("CBC encrypt failed: {e}")))?
        .len();
    buf.truncate(ct_len);
    Ok(buf)
}

/// AES-128-CBC decryption over block-aligned data (no padding).
///
/// # Errors
///
/// Returns [`SheCoreError::Crypto`] if `data.len()` is not a multiple of 16.
pub fn cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> SheResult<Vec<u8>> {
    if data.len() % 16 != 0 {
        return Err(SheCoreError::Crypto(
            "CBC decrypt requires block-aligned input".to_string(),
        ));
    }
    let mut buf = data.to_vec();
    let pt_len = cbc::Decryptor::<Aes128>::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| SheCoreError::Crypto(format!("CBC decrypt failed: {e}")))?
        .len();
    buf.truncate(pt_len);
    Ok(buf)
}

/// AES-128-ECB encryption over block-aligned data, block by block with no
/// chaining (spec §4.8 bulk ENC_ECB).
///
/// # Errors
///
/// Returns [`SheCoreError::Crypto`] if `data.len()` is not a multiple of 16.
pub fn ecb_encrypt(key: &[u8; 16], data: &[u8]) -> SheResult<Vec<u8>> {
    if data.len() % 16 != 0 {
        return Err(SheCoreError::Crypto(
            "ECB encrypt requires block-aligned input".to_string(),
        ));
    }
    let cipher = Aes128::new_from_slice(key).expect("AES-128 key is always 16 bytes");
    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(16) {
        let block: [u8; 16] = chunk.try_into().expect("chunk is exactly 16 bytes");
        let mut generic = block.into();
        cipher.encrypt_block(&mut generic);
        chunk.copy_from_slice(&generic);
    }
    Ok(out)
}

/// AES-128-ECB decryption, the inverse of [`ecb_encrypt`] (spec §4.8 bulk DEC_ECB).
///
/// # Errors
///
/// Returns [`SheCoreError::Crypto`] if `data.len()` is not a multiple of 16.
pub fn ecb_decrypt(key: &[u8; 16], data: &[u8]) -> SheResult<Vec<u8>> {
    if data.len() % 16 != 0 {
        return Err(SheCoreError::Crypto(
            "ECB decrypt requires block-aligned input".to_string(),
        ));
    }
    let cipher = Aes128::new_from_slice(key).expect("AES-128 key is always 16 bytes");
    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(16) {
        let block: [u8; 16] = chunk.try_into().expect("chunk is exactly 16 bytes");
        let mut generic = block.into();
        cipher.decrypt_block(&mut generic);
        chunk.copy_from_slice(&generic);
    }
    Ok(out)
}
