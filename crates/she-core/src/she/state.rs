// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `SheGlobalState`: the process-wide state the dispatcher mutates on every
//! command (spec §3). One instance lives for the server's lifetime, owned
//! by the caller and passed explicitly to [`super::dispatcher::Dispatcher`]
//! rather than held behind file-scope mutable statics (spec §9).

use zeroize::Zeroize;

/// Progress of the secure-boot sub-machine (spec §4.4):
/// `INIT -init-> UPDATE* -size reached-> FINISH -compare-> {SUCCESS | FAILURE}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureBootState {
    Init,
    Update,
    Finish,
    Success,
    Failure,
}

/// Process-wide SHE state (spec §3). `Default` gives the power-on value:
/// everything zeroed, `sb_state = Init`.
pub struct SheGlobalState {
    pub sb_state: SecureBootState,
    pub cmac_key_found: bool,
    pub ram_key_plain: bool,
    pub uid_set: bool,
    pub rnd_inited: bool,
    pub bl_size: u32,
    pub bl_size_received: u32,
    /// Bytes absorbed into the boot CMAC so far: 12 zero bytes, then
    /// little-endian `bl_size`, then each UPDATE chunk in order. Buffered
    /// rather than held in a streaming CMAC context because the
    /// [`crate::crypto::CmacAes`] collaborator contract is one-shot
    /// (spec §1 treats the CMAC primitive itself as external); FINISH
    /// computes the tag over this buffer in one call.
    pub sb_absorbed: Vec<u8>,
    /// `BOOT_MAC_KEY` material, captured at SECURE_BOOT_INIT and held until
    /// FINISH computes the CMAC over [`Self::sb_absorbed`] -- mirrors
    /// `sb_cmac_ctx` spanning INIT through FINISH (spec §5).
    pub boot_mac_key: Option<[u8; 16]>,
    pub prng_state: [u8; 16],
    pub prng_key: [u8; 16],
    pub uid: [u8; 15],
}

impl Default for SheGlobalState {
    fn default() -> Self {
        Self {
            sb_state: SecureBootState::Init,
            cmac_key_found: false,
            ram_key_plain: false,
            uid_set: false,
            rnd_inited: false,
            bl_size: 0,
            bl_size_received: 0,
            sb_absorbed: Vec::new(),
            boot_mac_key: None,
            prng_state: [0; 16],
            prng_key: [0; 16],
            uid: [0; 15],
        }
    }
}

impl SheGlobalState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the secure-boot sub-machine to `INIT` (spec §7: every
    /// SECURE_BOOT_{INIT,UPDATE,FINISH} error except `NO_SECURE_BOOT`
    /// resets here; a FINISH comparison failure does not -- it lands in
    /// `FAILURE` instead, via [`Self::fail_secure_boot`]).
    pub fn reset_secure_boot(&mut self) {
        self.sb_state = SecureBootState::Init;
        self.cmac_key_found = false;
        self.bl_size = 0;
        self.bl_size_received = 0;
        self.sb_absorbed.zeroize();
        self.sb_absorbed.clear();
        if let Some(mut key) = self.boot_mac_key.take() {
            key.zeroize();
        }
    }

    /// Transition to `FAILURE` on a boot-MAC mismatch at FINISH -- distinct
    /// from [`Self::reset_secure_boot`], which returns to `INIT`.
    pub fn fail_secure_boot(&mut self) {
        self.sb_state = SecureBootState::Failure;
        self.sb_absorbed.zeroize();
        self.sb_absorbed.clear();
        if let Some(mut key) = self.boot_mac_key.take() {
            key.zeroize();
        }
    }

    /// Release the boot CMAC context on a successful FINISH, mirroring the
    /// reset/fail paths (spec §5: "released on FINISH or on any error").
    pub fn finish_secure_boot_success(&mut self) {
        self.sb_state = SecureBootState::Success;
        self.sb_absorbed.zeroize();
        self.sb_absorbed.clear();
        if let Some(mut key) = self.boot_mac_key.take() {
            key.zeroize();
        }
    }

    /// Encode the four `GET_STATUS` bits (spec §4.4, §6).
    #[must_use]
    pub fn sreg(&self) -> u8 {
        const SECURE_BOOT: u8 = 0x01;
        const BOOT_FINISHED: u8 = 0x02;
        const BOOT_OK: u8 = 0x04;
        const RND_INIT: u8 = 0x20;

        let mut sreg = 0u8;
        if self.cmac_key_found {
            sreg |= SECURE_BOOT;
        }
        if matches!(
            self.sb_state,
            SecureBootState::Success | SecureBootState::Failure
        ) {
            sreg |= BOOT_FINISHED;
        }
        if self.sb_state == SecureBootState::Success {
            sreg |= BOOT_OK;
        }
        if self.rnd_inited {
            sreg |= RND_INIT;
        }
        sreg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_init_and_unbooted() {
        let state = SheGlobalState::new();
        assert_eq!(state.sb_state, SecureBootState::Init);
        assert_eq!(state.sreg(), 0);
    }

    #[test]
    fn sreg_encodes_success_as_0x07_when_boot_key_was_found() {
        let mut state = SheGlobalState::new();
        state.cmac_key_found = true;
        state.sb_state = SecureBootState::Success;
        assert_eq!(state.sreg(), 0x07);
    }

    #[test]
    fn sreg_encodes_no_boot_key_scenario_as_0x06() {
        let mut state = SheGlobalState::new();
        state.cmac_key_found = false;
        state.sb_state = SecureBootState::Success;
        assert_eq!(state.sreg(), 0x06);
    }

    #[test]
    fn sreg_encodes_failure_as_0x03_when_boot_key_was_found() {
        let mut state = SheGlobalState::new();
        state.cmac_key_found = true;
        state.sb_state = SecureBootState::Failure;
        assert_eq!(state.sreg(), 0x03);
    }

    #[test]
    fn reset_secure_boot_clears_counters_and_absorbed_buffer() {
        let mut state = SheGlobalState::new();
        state.sb_state = SecureBootState::Update;
        state.bl_size = 1024;
        state.bl_size_received = 512;
        state.cmac_key_found = true;
        state.sb_absorbed = vec![1, 2, 3];
        state.reset_secure_boot();
        assert_eq!(state.sb_state, SecureBootState::Init);
        assert_eq!(state.bl_size, 0);
        assert_eq!(state.bl_size_received, 0);
        assert!(!state.cmac_key_found);
        assert!(state.sb_absorbed.is_empty());
    }

    #[test]
    fn fail_secure_boot_transitions_to_failure_not_init() {
        let mut state = SheGlobalState::new();
        state.sb_state = SecureBootState::Finish;
        state.fail_secure_boot();
        assert_eq!(state.sb_state, SecureBootState::Failure);
    }
}
