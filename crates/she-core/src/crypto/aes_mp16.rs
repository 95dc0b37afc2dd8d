// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AES-MP16: Miyaguchi-Preneel one-way compression built from AES-128.
//!
//! Doubles as the key-update KDF (applied to `authKey || C_tag`) and as the
//! PRNG-state advance primitive for EXTEND_SEED. Zero-padding is applied to
//! the final short block; the hash chain starts from the all-zero state.
//!
//! ```text
//! H <- 0^128
//! for each 16-byte block B_i of M (zero-padded on the last short block):
//!     E <- AES-Encrypt(key = H, plaintext = B_i)
//!     H <- E xor B_i xor H
//! return H
//! ```

use zeroize::Zeroize;

use super::block_cipher::AesBlockCipher;

/// Compute AES-MP16(`data`) using the given block-cipher collaborator.
///
/// `cipher` is mutated in place (its key is re-set on every block); callers
/// should treat it as consumed-for-this-call, not reused concurrently.
pub fn aes_mp16(cipher: &mut dyn AesBlockCipher, data: &[u8]) -> [u8; 16] {
    let mut h = [0u8; 16];

    for chunk in data.chunks(16) {
        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);

        cipher.set_key(&h);
        let mut e = block;
        cipher.encrypt_block(&mut e);

        let mut next_h = [0u8; 16];
        for i in 0..16 {
            next_h[i] = e[i] ^ block[i] ^ h[i];
        }
        h.zeroize();
        h = next_h;
    }

    h
}

/// Convenience wrapper: AES-MP16 over `key || tag`, the shape every
/// key-derivation call site in the protocol uses (authKey/newKey concatenated
/// with one of the fixed `*_C` constants).
pub fn derive_subkey(cipher: &mut dyn AesBlockCipher, key: &[u8; 16], tag: &[u8; 16]) -> [u8; 16] {
    let mut input = [0u8; 32];
    input[..16].copy_from_slice(key);
    input[16..].copy_from_slice(tag);
    let out = aes_mp16(cipher, &input);
    input.zeroize();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::block_cipher::RustCryptoAes128;
    use crate::crypto::constants::KEY_UPDATE_ENC_C;

    #[test]
    fn single_zero_block_matches_seed_vector() {
        // AES-MP16 of one all-zero block: H starts at 0, E = AES(key=0, pt=0),
        // H' = E xor 0 xor 0 = E. So the output is exactly AES-Encrypt(0, 0).
        let mut cipher = RustCryptoAes128::new();
        let out = aes_mp16(&mut cipher, &[0u8; 16]);
        assert_eq!(
            out,
            [
                0x66, 0xe9, 0x4b, 0xd4, 0xef, 0x8a, 0x2c, 0x3b, 0x88, 0x4c, 0xfa, 0x59, 0xca,
                0x34, 0x2b, 0x2e,
            ]
        );
    }

    #[test]
    fn zero_padding_short_block() {
        let mut cipher = RustCryptoAes128::new();
        let short = [0x42u8; 5];
        let mut padded = [0u8; 16];
        padded[..5].copy_from_slice(&short);
        assert_eq!(aes_mp16(&mut cipher, &short), aes_mp16(&mut cipher, &padded));
    }

    #[test]
    fn multi_block_differs_from_single_block() {
        let mut cipher = RustCryptoAes128::new();
        let one_block = [0xAAu8; 16];
        let two_blocks = [0xAAu8; 32];
        assert_ne!(aes_mp16(&mut cipher, &one_block), aes_mp16(&mut cipher, &two_blocks));
    }

    #[test]
    fn derive_subkey_is_deterministic_and_tag_sensitive() {
        let mut cipher = RustCryptoAes128::new();
        let key = [0x11u8; 16];
        let k1 = derive_subkey(&mut cipher, &key, &KEY_UPDATE_ENC_C);
        let k2 = derive_subkey(&mut cipher, &key, &KEY_UPDATE_ENC_C);
        assert_eq!(k1, k2);

        let k3 = derive_subkey(&mut cipher, &key, &crate::crypto::constants::KEY_UPDATE_MAC_C);
        assert_ne!(k1, k3);
    }
}
