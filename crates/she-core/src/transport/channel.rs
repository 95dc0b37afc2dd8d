// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A single request/response region pair and the four transport operations.
//!
//! The handshake is a Lamport-style ping-pong over each region's `notify`
//! field (spec §4.1, §5): a new request is signaled by `req.notify !=
//! resp.notify` (the client got ahead); a new response is signaled by
//! `resp.notify == req.notify` (the server caught back up). Wrap-around of
//! the 16-bit counter is safe because only (in)equality is ever compared.

use super::csr::Csr;
use super::segment::ShmSegment;
use super::{Result, ShmError};

/// Non-coherent-memory cache maintenance hook, applied around payload
/// writes (`flush`) and before payload reads (`invalidate`). The default
/// [`NoopCacheOps`] is correct for ordinary coherent RAM; a caller backing
/// a region with non-coherent DMA memory supplies its own implementation.
pub trait CacheOps: Send + Sync {
    fn flush(&self, _region: &ShmRegion) {}
    fn invalidate(&self, _region: &ShmRegion) {}
}

/// No-op [`CacheOps`] for coherent memory (the default).
#[derive(Default)]
pub struct NoopCacheOps;

impl CacheOps for NoopCacheOps {}

/// One mapped region: an 8-byte CSR header followed by a fixed-capacity
/// payload area.
pub struct ShmRegion {
    segment: ShmSegment,
    capacity: usize,
}

impl ShmRegion {
    const HEADER_LEN: usize = 8;

    /// Create a fresh region, zero-filling both CSR and payload (matches
    /// spec §4.1's "zero-fill buffers, for fresh sessions" init variant --
    /// [`ShmSegment::create`] already zero-initializes the whole mapping).
    ///
    /// # Errors
    ///
    /// Propagates [`ShmError`] from segment creation.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        let segment = ShmSegment::create(name, Self::HEADER_LEN + capacity)?;
        Ok(Self { segment, capacity })
    }

    /// Attach to an existing region, preserving its buffers (spec §4.1's
    /// re-attach init variant).
    ///
    /// # Errors
    ///
    /// Propagates [`ShmError`] from segment open.
    pub fn attach(name: &str, capacity: usize) -> Result<Self> {
        let segment = ShmSegment::open(name, Self::HEADER_LEN + capacity)?;
        Ok(Self { segment, capacity })
    }

    fn csr(&self) -> Csr<'_> {
        // SAFETY: the mapping is at least HEADER_LEN + capacity bytes,
        // page-aligned by mmap, so the first 8 bytes are valid and
        // 8-byte aligned for the lifetime of `self`.
        unsafe { Csr::from_raw(self.segment.as_ptr()) }
    }

    fn payload(&self) -> &[u8] {
        // SAFETY: offset HEADER_LEN..HEADER_LEN+capacity lies within the
        // mapped region established in `create`/`attach`.
        unsafe {
            std::slice::from_raw_parts(self.segment.as_ptr().add(Self::HEADER_LEN), self.capacity)
        }
    }

    #[allow(clippy::mut_from_ref)]
    fn payload_mut(&self) -> &mut [u8] {
        // SAFETY: same bounds as `payload`; exclusive access is the
        // caller's responsibility per the region's ownership discipline
        // (spec §3: requester region written only by the client, read
        // only by the server, and vice versa for the response region).
        unsafe {
            std::slice::from_raw_parts_mut(
                self.segment.as_ptr().add(Self::HEADER_LEN),
                self.capacity,
            )
        }
    }

    /// Zero-fill CSR and payload, for the fresh-session init variant applied
    /// to an already-mapped region.
    pub fn reset(&self) {
        self.csr().reset();
        self.payload_mut().fill(0);
    }
}

/// A request/response region pair, plus the cache-maintenance hook applied
/// around payload access.
pub struct ShmChannel {
    req: ShmRegion,
    resp: ShmRegion,
    cache: Box<dyn CacheOps>,
}

impl ShmChannel {
    #[must_use]
    pub fn new(req: ShmRegion, resp: ShmRegion) -> Self {
        Self {
            req,
            resp,
            cache: Box::new(NoopCacheOps),
        }
    }

    #[must_use]
    pub fn with_cache_ops(req: ShmRegion, resp: ShmRegion, cache: Box<dyn CacheOps>) -> Self {
        Self { req, resp, cache }
    }

    /// Client-side: enqueue a request if the peer has consumed the prior one.
    ///
    /// # Errors
    ///
    /// Returns [`ShmError::NotReady`] if a previous request is still
    /// outstanding, or [`ShmError::PayloadTooLarge`] if `data` exceeds the
    /// request region's capacity.
    pub fn send_request(&self, data: &[u8]) -> Result<()> {
        if data.len() > self.req.capacity {
            return Err(ShmError::PayloadTooLarge {
                size: data.len(),
                capacity: self.req.capacity,
            });
        }
        let req_notify = self.req.csr().notify_acquire();
        let resp_notify = self.resp.csr().notify_acquire();
        if req_notify != resp_notify {
            return Err(ShmError::NotReady);
        }
        self.req.payload_mut()[..data.len()].copy_from_slice(data);
        self.cache.flush(&self.req);
        self.req
            .csr()
            .publish_release(req_notify.wrapping_add(1), data.len() as u16);
        Ok(())
    }

    /// Server-side: pick up a pending request, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ShmError::NotReady`] if no new request has been published,
    /// or [`ShmError::BadArgs`] if `out` is too small for the declared length.
    pub fn recv_request(&self, out: &mut [u8]) -> Result<usize> {
        let req_notify = self.req.csr().notify_acquire();
        let resp_notify = self.resp.csr().notify_acquire();
        if req_notify == resp_notify {
            return Err(ShmError::NotReady);
        }
        self.cache.invalidate(&self.req);
        let len = self.req.csr().len_relaxed() as usize;
        if len > out.len() || len > self.req.capacity {
            return Err(ShmError::BadArgs);
        }
        out[..len].copy_from_slice(&self.req.payload()[..len]);
        Ok(len)
    }

    /// Server-side: publish a response and release the client.
    ///
    /// # Errors
    ///
    /// Returns [`ShmError::PayloadTooLarge`] if `data` exceeds the response
    /// region's capacity.
    pub fn send_response(&self, data: &[u8]) -> Result<()> {
        if data.len() > self.resp.capacity {
            return Err(ShmError::PayloadTooLarge {
                size: data.len(),
                capacity: self.resp.capacity,
            });
        }
        self.resp.payload_mut()[..data.len()].copy_from_slice(data);
        self.cache.flush(&self.resp);
        let req_notify = self.req.csr().notify_acquire();
        self.resp.csr().publish_release(req_notify, data.len() as u16);
        Ok(())
    }

    /// Client-side: pick up the response to the last request sent, if ready.
    ///
    /// # Errors
    ///
    /// Returns [`ShmError::NotReady`] if the server has not yet responded,
    /// or [`ShmError::BadArgs`] if `out` is too small for the declared length.
    pub fn recv_response(&self, out: &mut [u8]) -> Result<usize> {
        let req_notify = self.req.csr().notify_acquire();
        let resp_notify = self.resp.csr().notify_acquire();
        if resp_notify != req_notify {
            return Err(ShmError::NotReady);
        }
        self.cache.invalidate(&self.resp);
        let len = self.resp.csr().len_relaxed() as usize;
        if len > out.len() || len > self.resp.capacity {
            return Err(ShmError::BadArgs);
        }
        out[..len].copy_from_slice(&self.resp.payload()[..len]);
        Ok(len)
    }

    /// Clear the `initialized` tracking only -- per spec §4.1, cleanup never
    /// zeroes buffers (a re-attach may want to observe the last exchange).
    pub fn mark_uninitialized(&self) {
        // Reserved for a future `initialized` flag; no buffer state is
        // touched here, matching the "cleanup clears only the flag" note.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_names(tag: &str) -> (String, String) {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        (format!("/she_test_{tag}_req_{ts}"), format!("/she_test_{tag}_resp_{ts}"))
    }

    fn fresh_channel(tag: &str, capacity: usize) -> (ShmChannel, String, String) {
        let (req_name, resp_name) = unique_names(tag);
        let req = ShmRegion::create(&req_name, capacity).unwrap();
        let resp = ShmRegion::create(&resp_name, capacity).unwrap();
        (ShmChannel::new(req, resp), req_name, resp_name)
    }

    #[test]
    fn recv_request_not_ready_when_idle() {
        let (ch, req_name, resp_name) = fresh_channel("idle", 64);
        let mut buf = [0u8; 64];
        assert!(matches!(ch.recv_request(&mut buf), Err(ShmError::NotReady)));
        ShmSegment::unlink(&req_name).ok();
        ShmSegment::unlink(&resp_name).ok();
    }

    #[test]
    fn full_round_trip_delivers_request_and_response() {
        let (ch, req_name, resp_name) = fresh_channel("roundtrip", 64);

        ch.send_request(b"hello").unwrap();

        let mut req_buf = [0u8; 64];
        let n = ch.recv_request(&mut req_buf).unwrap();
        assert_eq!(&req_buf[..n], b"hello");

        // No response yet.
        let mut resp_buf = [0u8; 64];
        assert!(matches!(ch.recv_response(&mut resp_buf), Err(ShmError::NotReady)));

        ch.send_response(b"world").unwrap();
        let n = ch.recv_response(&mut resp_buf).unwrap();
        assert_eq!(&resp_buf[..n], b"world");

        ShmSegment::unlink(&req_name).ok();
        ShmSegment::unlink(&resp_name).ok();
    }

    #[test]
    fn send_request_rejects_while_prior_request_outstanding() {
        let (ch, req_name, resp_name) = fresh_channel("outstanding", 64);
        ch.send_request(b"one").unwrap();
        assert!(matches!(ch.send_request(b"two"), Err(ShmError::NotReady)));
        ShmSegment::unlink(&req_name).ok();
        ShmSegment::unlink(&resp_name).ok();
    }

    #[test]
    fn send_request_rejects_oversized_payload() {
        let (ch, req_name, resp_name) = fresh_channel("oversized", 4);
        assert!(matches!(
            ch.send_request(&[0u8; 5]),
            Err(ShmError::PayloadTooLarge { .. })
        ));
        ShmSegment::unlink(&req_name).ok();
        ShmSegment::unlink(&resp_name).ok();
    }

    #[test]
    fn notify_wrap_around_is_safe() {
        let (ch, req_name, resp_name) = fresh_channel("wrap", 16);
        // Drive notify close to u16::MAX and confirm the handshake still works.
        for i in 0..5u32 {
            ch.send_request(&[i as u8]).unwrap();
            let mut buf = [0u8; 16];
            ch.recv_request(&mut buf).unwrap();
            ch.send_response(&[i as u8]).unwrap();
            let mut rbuf = [0u8; 16];
            ch.recv_response(&mut rbuf).unwrap();
        }
        ShmSegment::unlink(&req_name).ok();
        ShmSegment::unlink(&resp_name).ok();
    }
}
