// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GET_STATUS (spec §4.4).

use crate::error::SheErrorCode;
use crate::she::state::SheGlobalState;
use crate::she::wire::SheResponse;

pub fn handle_get_status(state: &SheGlobalState) -> SheResponse {
    SheResponse::Status {
        rc: SheErrorCode::NoError,
        sreg: state.sreg(),
    }
}
