// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatch-time precondition gating and the secure-boot post-condition
//! table (spec §4.4, §7, §9 "model this as a post-condition table rather
//! than scattered resets in handlers").

use crate::error::SheErrorCode;
use crate::she::state::SheGlobalState;
use crate::she::wire::SheRequest;

/// Fail-fast precondition check, run before a handler is invoked (spec §4.4).
/// Returns the rejecting status code, or `None` if the request may proceed.
#[must_use]
pub fn precondition_failure(state: &SheGlobalState, req: &SheRequest) -> Option<SheErrorCode> {
    use crate::she::state::SecureBootState;

    if !req.is_precondition_exempt() && state.sb_state != SecureBootState::Success {
        return Some(SheErrorCode::SequenceError);
    }
    if !req.is_uid_exempt() && !state.uid_set {
        return Some(SheErrorCode::SequenceError);
    }
    None
}

/// Whether a SECURE_BOOT_{INIT,UPDATE,FINISH} result should reset the
/// sub-machine to `INIT`. Applies uniformly to all three actions: any
/// error other than `NO_SECURE_BOOT` resets (spec §7); a FINISH
/// comparison mismatch is excluded because the handler itself already
/// transitioned to `FAILURE` via [`SheGlobalState::fail_secure_boot`], and
/// the dispatcher must not clobber that with a reset back to `INIT`.
#[must_use]
pub fn secure_boot_reset_policy(rc: SheErrorCode, state_after: &SheGlobalState) -> bool {
    use crate::she::state::SecureBootState;

    rc != SheErrorCode::NoError
        && rc != SheErrorCode::NoSecureBoot
        && state_after.sb_state != SecureBootState::Failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::she::state::SecureBootState;

    #[test]
    fn non_exempt_action_before_boot_success_is_sequence_error() {
        let state = SheGlobalState::new();

        // GET_STATUS is exempt from the sb_state gate, but not from the
        // uid_set gate (spec §4.4 line 96: every action but SET_UID requires
        // uid_set), so it is still rejected before SET_UID runs.
        let req = SheRequest::GetStatus;
        assert_eq!(
            precondition_failure(&state, &req),
            Some(SheErrorCode::SequenceError)
        );

        let mut uid_set = state;
        uid_set.uid_set = true;
        assert!(precondition_failure(&uid_set, &req).is_none());

        let req = SheRequest::Rnd;
        assert_eq!(
            precondition_failure(&uid_set, &req),
            Some(SheErrorCode::SequenceError)
        );
    }

    #[test]
    fn set_uid_is_exempt_from_both_preconditions() {
        let state = SheGlobalState::new();
        let req = SheRequest::SetUid { uid: [0; 15] };
        assert!(precondition_failure(&state, &req).is_none());
    }

    #[test]
    fn reset_policy_resets_on_ordinary_error_but_not_on_fail_transition() {
        let mut success_path = SheGlobalState::new();
        success_path.sb_state = SecureBootState::Update;
        assert!(secure_boot_reset_policy(
            SheErrorCode::GeneralError,
            &success_path
        ));

        let mut failed = SheGlobalState::new();
        failed.fail_secure_boot();
        assert!(!secure_boot_reset_policy(SheErrorCode::GeneralError, &failed));
    }

    #[test]
    fn reset_policy_never_resets_on_no_secure_boot_or_success() {
        let state = SheGlobalState::new();
        assert!(!secure_boot_reset_policy(SheErrorCode::NoSecureBoot, &state));
        assert!(!secure_boot_reset_policy(SheErrorCode::NoError, &state));
    }
}
