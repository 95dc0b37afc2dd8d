// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! POSIX shared memory segment management.
//!
//! Provides safe wrappers around `shm_open`, `ftruncate`, and `mmap`
//! for creating and mapping shared memory segments.
//!
//! # Segment Lifecycle
//!
//! 1. Writer creates segment with `ShmSegment::create()`
//! 2. Readers open segment with `ShmSegment::open()`
//! 3. Segment is automatically unmapped on drop
//! 4. Writer should call `ShmSegment::unlink()` on cleanup
//!
//! # Naming Convention
//!
//! Segment names must start with `/` and contain no other `/`.
//! Example: `/she_req_3f2a`, following the `/she_<role>_<session>` scheme.

use super::{Result, ShmError};
use std::ffi::CString;
use std::io;
use std::ptr;

/// POSIX shared memory segment wrapper.
///
/// Automatically unmaps the memory region on drop.
/// Does NOT automatically unlink the segment (caller's responsibility).
pub struct ShmSegment {
    /// Pointer to mapped memory region
    ptr: *mut u8,
    /// Size of the mapping
    size: usize,
    /// Segment name (for unlink)
    name: String,
}

// SAFETY: ShmSegment pointer points to shared memory that can be
// accessed from multiple threads/processes. The underlying data
// structures use atomic operations for synchronization.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Create a new shared memory segment.
    ///
    /// If a segment with this name already exists, it will be replaced.
    ///
    /// # Arguments
    ///
    /// * `name` - Segment name (must start with `/`, no other `/`)
    /// * `size` - Size in bytes
    ///
    /// # Errors
    ///
    /// Returns error if segment creation or mapping fails.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        Self::validate_name(name)?;

        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY:
        // - c_name is a valid null-terminated CString created above
        // - shm_unlink is safe to call with any valid path; errors are ignored
        // - shm_open with O_CREAT|O_RDWR|O_EXCL creates a new segment or fails if exists
        // - The mode 0o600 is a valid file permission mask
        // - shm_open returns a valid fd on success or -1 on error (checked below)
        let fd = unsafe {
            // Remove existing segment first (ignore errors)
            libc::shm_unlink(c_name.as_ptr());

            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600, // Owner read/write only
            )
        };

        if fd < 0 {
            return Err(ShmError::SegmentCreate(io::Error::last_os_error()));
        }

        // Set segment size
        // SAFETY:
        // - fd is a valid file descriptor from the successful shm_open call above
        // - size cast to off_t is safe as segment sizes are bounded by validate_name (max 255 char name)
        //   and practical memory limits; ftruncate will fail gracefully if size is too large
        let ret = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // SAFETY:
            // - fd is still valid from the successful shm_open call
            // - close is safe to call once on any valid fd; we're in an error path so fd won't be reused
            unsafe { libc::close(fd) };
            return Err(ShmError::SegmentCreate(err));
        }

        // Map the segment
        // SAFETY:
        // - First argument is null, letting the kernel choose the address (always valid)
        // - size is the user-provided segment size; mmap will fail if invalid
        // - PROT_READ | PROT_WRITE are valid protection flags for a read-write mapping
        // - MAP_SHARED creates a shared mapping visible to other processes
        // - fd is valid from successful shm_open and ftruncate above
        // - Offset 0 maps from the beginning of the segment
        // - mmap returns MAP_FAILED on error (checked below), otherwise a valid pointer
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        // Close fd (mapping keeps reference)
        // SAFETY:
        // - fd is valid from successful shm_open
        // - The mmap call above (success or failure) does not invalidate fd
        // - After mmap succeeds, the mapping holds a reference; closing fd is safe
        // - close is idempotent for error handling purposes
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(ShmError::Mmap(io::Error::last_os_error()));
        }

        // Zero-initialize the segment
        // SAFETY:
        // - ptr is valid and points to a memory region of exactly `size` bytes from successful mmap
        // - The mapping has PROT_WRITE permission, so writing is allowed
        // - ptr is properly aligned for u8 (alignment of 1)
        // - size bytes are within the mapped region bounds
        // - No other references exist to this memory yet (segment just created)
        unsafe {
            ptr::write_bytes(ptr as *mut u8, 0, size);
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            name: name.to_string(),
        })
    }

    /// Open an existing shared memory segment.
    ///
    /// # Arguments
    ///
    /// * `name` - Segment name
    /// * `size` - Expected size (must match or be smaller than actual)
    ///
    /// # Errors
    ///
    /// Returns error if segment doesn't exist or mapping fails.
    pub fn open(name: &str, size: usize) -> Result<Self> {
        Self::validate_name(name)?;

        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY:
        // - c_name is a valid null-terminated CString created above
        // - O_RDWR is a valid flag for opening an existing segment for read/write
        // - Mode 0 is ignored when O_CREAT is not specified
        // - shm_open returns a valid fd on success or -1 on error (checked below)
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::NotFound {
                return Err(ShmError::NotFound(name.to_string()));
            }
            return Err(ShmError::SegmentOpen(err));
        }

        // Map the segment
        // SAFETY:
        // - First argument is null, letting the kernel choose the address (always valid)
        // - size is the expected segment size; caller must ensure it matches or is smaller than actual
        // - PROT_READ | PROT_WRITE are valid protection flags
        // - MAP_SHARED creates a shared mapping visible to other processes
        // - fd is valid from successful shm_open above
        // - Offset 0 maps from the beginning of the segment
        // - mmap returns MAP_FAILED on error (checked below), otherwise a valid pointer
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        // Close fd (mapping keeps reference)
        // SAFETY:
        // - fd is valid from successful shm_open
        // - The mmap call above (success or failure) does not invalidate fd
        // - After mmap succeeds, the mapping holds a reference; closing fd is safe
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(ShmError::Mmap(io::Error::last_os_error()));
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            name: name.to_string(),
        })
    }

    /// Validate segment name follows POSIX rules
    fn validate_name(name: &str) -> Result<()> {
        if !name.starts_with('/') {
            return Err(ShmError::InvalidName(format!(
                "Segment name must start with '/': {name}"
            )));
        }
        if name.len() > 1 && name[1..].contains('/') {
            return Err(ShmError::InvalidName(format!(
                "Segment name cannot contain '/' after prefix: {name}"
            )));
        }
        if name.len() > 255 {
            return Err(ShmError::InvalidName(format!(
                "Segment name too long (max 255): {name}"
            )));
        }
        Ok(())
    }

    /// Unlink (delete) a shared memory segment by name.
    ///
    /// The segment will be removed once all processes unmap it.
    /// This should be called by the creator when cleaning up.
    ///
    /// # Errors
    ///
    /// Returns error if unlink fails (segment not found is not an error).
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY:
        // - c_name is a valid null-terminated CString created above
        // - shm_unlink removes the named shared memory object
        // - Safe to call even if segment doesn't exist (returns error, handled below)
        // - No memory safety issues; only affects the filesystem namespace
        let ret = unsafe { libc::shm_unlink(c_name.as_ptr()) };

        if ret < 0 {
            let err = io::Error::last_os_error();
            // Not found is OK (idempotent cleanup)
            if err.kind() != io::ErrorKind::NotFound {
                return Err(ShmError::SegmentOpen(err));
            }
        }

        Ok(())
    }

    /// Get raw pointer to the mapped memory
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Get the size of the mapping
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the segment name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a segment with the given name exists
    #[must_use]
    pub fn exists(name: &str) -> bool {
        let Ok(c_name) = CString::new(name) else {
            return false;
        };

        // SAFETY:
        // - c_name is a valid null-terminated CString created above
        // - O_RDONLY is a valid flag for read-only access check
        // - Mode 0 is ignored when O_CREAT is not specified
        // - shm_open returns a valid fd on success or -1 if segment doesn't exist
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };

        if fd >= 0 {
            // SAFETY:
            // - fd is valid (>= 0) from successful shm_open
            // - close is safe to call once on any valid fd
            // - fd is not used after this point
            unsafe { libc::close(fd) };
            true
        } else {
            false
        }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY:
        // - self.ptr was obtained from a successful mmap call in create() or open()
        // - self.size is the exact size that was passed to mmap
        // - The pointer has not been munmap'd before (Drop is called only once)
        // - munmap is safe to call on any valid mmap'd region
        // - After munmap, self.ptr becomes invalid, but the struct is being dropped
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
        // Note: We do NOT unlink here. The creator is responsible for cleanup.
    }
}

/// Remove any leftover `/she_*` segments under `/dev/shm`.
///
/// Intended for server startup, to clear segments abandoned by a crashed
/// prior instance before a fresh [`ShmSegment::create`] for the same name.
///
/// # Returns
///
/// Number of segments removed.
pub fn cleanup_stale_segments() -> usize {
    let mut cleaned = 0;

    let shm_dir = std::path::Path::new("/dev/shm");
    if !shm_dir.exists() {
        return 0;
    }

    let Ok(entries) = std::fs::read_dir(shm_dir) else {
        return 0;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if !name.starts_with("she_") {
            continue;
        }

        let segment_name = format!("/{name}");
        if ShmSegment::unlink(&segment_name).is_ok() {
            log::debug!("[SHM] cleaned up stale segment: {segment_name}");
            cleaned += 1;
        }
    }

    cleaned
}
