// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cryptographic primitives: the AES/CMAC collaborator seam, AES-MP16
//! compression, and the fixed key-derivation tags.

mod aes_mp16;
pub mod block_cipher;
pub mod constants;

pub use aes_mp16::{aes_mp16, derive_subkey};
pub use block_cipher::{
    cbc_decrypt, cbc_encrypt, ecb_decrypt, ecb_encrypt, AesBlockCipher, CmacAes, CryptoBackend,
    RustCryptoAes128,
};
