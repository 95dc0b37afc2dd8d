// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `Dispatcher`: owns [`SheGlobalState`] and the key-store/crypto
//! collaborators, runs precondition gating before every handler, and
//! applies the secure-boot post-condition table afterwards (spec §4.4).
//! One instance lives for the server's lifetime and is driven by the
//! server's single-threaded run loop (spec §5: no handler may suspend, no
//! locks are required within the server).

use std::sync::Arc;

use crate::crypto::CryptoBackend;
use crate::keystore::KeyFacade;

use super::{commands, error_policy, state::SheGlobalState, wire::{SheRequest, SheResponse}};

pub struct Dispatcher<C: CryptoBackend> {
    state: SheGlobalState,
    key_facade: Arc<dyn KeyFacade>,
    crypto: C,
}

impl<C: CryptoBackend> Dispatcher<C> {
    pub fn new(key_facade: Arc<dyn KeyFacade>, crypto: C) -> Self {
        Self {
            state: SheGlobalState::new(),
            key_facade,
            crypto,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SheGlobalState {
        &self.state
    }

    /// Run one request through precondition gating, the matching handler,
    /// and -- for the three SECURE_BOOT_* actions -- the reset post-condition
    /// table (spec §4.4, §7, §9).
    pub fn dispatch(&mut self, req: &SheRequest) -> SheResponse {
        log::debug!("[SHE] dispatch {}", req.action_name());

        if let Some(rc) = error_policy::precondition_failure(&self.state, req) {
            log::warn!("[SHE] {} rejected by precondition: {rc}", req.action_name());
            return SheResponse::error(rc);
        }

        match req {
            SheRequest::SetUid { uid } => commands::handle_set_uid(&mut self.state, *uid),

            SheRequest::SecureBootInit { bl_size } => {
                let resp = commands::handle_secure_boot_init(
                    &mut self.state,
                    self.key_facade.as_ref(),
                    *bl_size,
                );
                self.apply_secure_boot_reset(resp.rc());
                resp
            }
            SheRequest::SecureBootUpdate { chunk } => {
                let resp = commands::handle_secure_boot_update(&mut self.state, chunk);
                self.apply_secure_boot_reset(resp.rc());
                resp
            }
            SheRequest::SecureBootFinish => {
                let resp = commands::handle_secure_boot_finish(
                    &mut self.state,
                    self.key_facade.as_ref(),
                    &self.crypto,
                );
                self.apply_secure_boot_reset(resp.rc());
                resp
            }

            SheRequest::GetStatus => commands::handle_get_status(&self.state),

            SheRequest::LoadKey { m1, m2, m3 } => commands::handle_load_key(
                &mut self.state,
                self.key_facade.as_ref(),
                &mut self.crypto,
                *m1,
                *m2,
                *m3,
            ),
            SheRequest::LoadPlainKey { key } => {
                commands::handle_load_plain_key(&mut self.state, self.key_facade.as_ref(), *key)
            }
            SheRequest::ExportRamKey => commands::handle_export_ram_key(
                &self.state,
                self.key_facade.as_ref(),
                &mut self.crypto,
            ),

            SheRequest::InitRnd => {
                commands::handle_init_rnd(&mut self.state, self.key_facade.as_ref(), &mut self.crypto)
            }
            SheRequest::Rnd => commands::handle_rnd(&mut self.state),
            SheRequest::ExtendSeed { entropy } => commands::handle_extend_seed(
                &mut self.state,
                self.key_facade.as_ref(),
                &mut self.crypto,
                *entropy,
            ),

            SheRequest::EncEcb { key_id, data } => {
                commands::handle_enc_ecb(self.key_facade.as_ref(), *key_id, data)
            }
            SheRequest::EncCbc { key_id, iv, data } => {
                commands::handle_enc_cbc(self.key_facade.as_ref(), *key_id, iv, data)
            }
            SheRequest::DecEcb { key_id, data } => {
                commands::handle_dec_ecb(self.key_facade.as_ref(), *key_id, data)
            }
            SheRequest::DecCbc { key_id, iv, data } => {
                commands::handle_dec_cbc(self.key_facade.as_ref(), *key_id, iv, data)
            }
        }
    }

    fn apply_secure_boot_reset(&mut self, rc: crate::error::SheErrorCode) {
        if error_policy::secure_boot_reset_policy(rc, &self.state) {
            self.state.reset_secure_boot();
        }
    }
}
