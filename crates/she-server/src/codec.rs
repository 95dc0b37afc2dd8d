// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte framing for [`SheRequest`]/[`SheResponse`] (spec §6: "fixed-size
//! stub header ... followed by an action-specific fixed body, optionally
//! followed by variable trailing bytes ... their length is the declared
//! `sz` field").
//!
//! Per-session framing is an external collaborator to `she-core` (spec
//! §1) -- this module is that collaborator's one concrete instance, a
//! length-prefixed little-endian encoding chosen for this server since the
//! protocol does not itself pin a byte layout beyond "tag, fixed body,
//! length-prefixed trailer" (recorded as an Open Question resolution in
//! DESIGN.md).

use she_core::{SheRequest, SheResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("packet truncated")]
    Truncated,
    #[error("unknown action tag {0}")]
    UnknownTag(u8),
}

type Result<T> = std::result::Result<T, CodecError>;

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(CodecError::Truncated);
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn take_u16(buf: &mut &[u8]) -> Result<u16> {
    Ok(u16::from_le_bytes(take(buf, 2)?.try_into().expect("2 bytes")))
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_le_bytes(take(buf, 4)?.try_into().expect("4 bytes")))
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N]> {
    Ok(take(buf, N)?.try_into().expect("N bytes"))
}

/// Decode one request packet from `bytes` (the exact bytes a `recv_request`
/// call returned -- no extra length prefix of its own).
///
/// # Errors
///
/// Returns [`CodecError`] if the tag is unrecognized or the packet is
/// shorter than the action's fixed body requires.
pub fn decode_request(mut bytes: &[u8]) -> Result<SheRequest> {
    let buf = &mut bytes;
    let tag = take(buf, 1)?[0];
    Ok(match tag {
        0 => SheRequest::SetUid { uid: take_array(buf)? },
        1 => SheRequest::SecureBootInit { bl_size: take_u32(buf)? },
        2 => {
            let len = take_u16(buf)? as usize;
            SheRequest::SecureBootUpdate { chunk: take(buf, len)?.to_vec() }
        }
        3 => SheRequest::SecureBootFinish,
        4 => SheRequest::GetStatus,
        5 => SheRequest::LoadKey {
            m1: take_array(buf)?,
            m2: take_array(buf)?,
            m3: take_array(buf)?,
        },
        6 => SheRequest::LoadPlainKey { key: take_array(buf)? },
        7 => SheRequest::ExportRamKey,
        8 => SheRequest::InitRnd,
        9 => SheRequest::Rnd,
        10 => SheRequest::ExtendSeed { entropy: take_array(buf)? },
        11 => {
            let key_id = take_u16(buf)?;
            let len = take_u16(buf)? as usize;
            SheRequest::EncEcb { key_id, data: take(buf, len)?.to_vec() }
        }
        12 => {
            let key_id = take_u16(buf)?;
            let iv = take_array(buf)?;
            let len = take_u16(buf)? as usize;
            SheRequest::EncCbc { key_id, iv, data: take(buf, len)?.to_vec() }
        }
        13 => {
            let key_id = take_u16(buf)?;
            let len = take_u16(buf)? as usize;
            SheRequest::DecEcb { key_id, data: take(buf, len)?.to_vec() }
        }
        14 => {
            let key_id = take_u16(buf)?;
            let iv = take_array(buf)?;
            let len = take_u16(buf)? as usize;
            SheRequest::DecCbc { key_id, iv, data: take(buf, len)?.to_vec() }
        }
        other => return Err(CodecError::UnknownTag(other)),
    })
}

/// Encode a request the same way [`decode_request`] expects it (used by
/// the test suite and any in-process client harness).
#[must_use]
pub fn encode_request(req: &SheRequest) -> Vec<u8> {
    let mut out = Vec::new();
    match req {
        SheRequest::SetUid { uid } => {
            out.push(0);
            out.extend_from_slice(uid);
        }
        SheRequest::SecureBootInit { bl_size } => {
            out.push(1);
            out.extend_from_slice(&bl_size.to_le_bytes());
        }
        SheRequest::SecureBootUpdate { chunk } => {
            out.push(2);
            out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            out.extend_from_slice(chunk);
        }
        SheRequest::SecureBootFinish => out.push(3),
        SheRequest::GetStatus => out.push(4),
        SheRequest::LoadKey { m1, m2, m3 } => {
            out.push(5);
            out.extend_from_slice(m1);
            out.extend_from_slice(m2);
            out.extend_from_slice(m3);
        }
        SheRequest::LoadPlainKey { key } => {
            out.push(6);
            out.extend_from_slice(key);
        }
        SheRequest::ExportRamKey => out.push(7),
        SheRequest::InitRnd => out.push(8),
        SheRequest::Rnd => out.push(9),
        SheRequest::ExtendSeed { entropy } => {
            out.push(10);
            out.extend_from_slice(entropy);
        }
        SheRequest::EncEcb { key_id, data } => {
            out.push(11);
            out.extend_from_slice(&key_id.to_le_bytes());
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        SheRequest::EncCbc { key_id, iv, data } => {
            out.push(12);
            out.extend_from_slice(&key_id.to_le_bytes());
            out.extend_from_slice(iv);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        SheRequest::DecEcb { key_id, data } => {
            out.push(13);
            out.extend_from_slice(&key_id.to_le_bytes());
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        SheRequest::DecCbc { key_id, iv, data } => {
            out.push(14);
            out.extend_from_slice(&key_id.to_le_bytes());
            out.extend_from_slice(iv);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
    out
}

/// Encode a response for transmission over the response region.
#[must_use]
pub fn encode_response(resp: &SheResponse) -> Vec<u8> {
    let mut out = Vec::new();
    match resp {
        SheResponse::Ack { rc } => out.push(*rc as u8),
        SheResponse::Status { rc, sreg } => {
            out.push(*rc as u8);
            out.push(*sreg);
        }
        SheResponse::KeyUpdate { rc, m4, m5 } => {
            out.push(*rc as u8);
            out.extend_from_slice(m4);
            out.extend_from_slice(m5);
        }
        SheResponse::RamKeyExport { rc, m1, m2, m3, m4, m5 } => {
            out.push(*rc as u8);
            out.extend_from_slice(m1);
            out.extend_from_slice(m2);
            out.extend_from_slice(m3);
            out.extend_from_slice(m4);
            out.extend_from_slice(m5);
        }
        SheResponse::Rnd { rc, value } => {
            out.push(*rc as u8);
            out.extend_from_slice(value);
        }
        SheResponse::Bulk { rc, data } => {
            out.push(*rc as u8);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
    out
}
