// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-exact constants used by the key-update and PRNG key-derivation chains.
//!
//! These are the fixed "C" tags absorbed alongside an `authKey` by AES-MP16
//! to derive purpose-specific subkeys (K1-K5 in spec terms). Every byte here
//! is mandated by the SHE specification -- do not reformat or reorder.

/// Tag used to derive the key-update encryption key (K1 / K3).
pub const KEY_UPDATE_ENC_C: [u8; 16] = [
    0x01, 0x01, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// Tag used to derive the key-update authentication key (K2 / K4).
pub const KEY_UPDATE_MAC_C: [u8; 16] = [
    0x01, 0x02, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// Tag used to derive the PRNG state-advance key.
pub const PRNG_KEY_C: [u8; 16] = [
    0x01, 0x04, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// Tag used to derive the PRNG seed-update key.
pub const PRNG_SEED_KEY_C: [u8; 16] = [
    0x01, 0x05, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];
