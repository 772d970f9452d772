//! Interrupt handling for in-progress destination files.
//!
//! While a destination file is being written, its path is registered in a
//! process-wide slot. A SIGINT arriving mid-write unlinks that artifact,
//! prints a newline, and exits with code 2, so an interrupted run never
//! leaves a half-written output behind. The slot holds at most one path;
//! batches register and clear it once per file.
//!
//! [`ArtifactGuard`] is the scoped front end: registering returns a guard
//! that clears the slot on drop, so every exit path (including `?` error
//! returns) restores the default SIGINT disposition.
//!
//! Only async-signal-safe calls are made inside the handler itself:
//! `unlink`, `write`, and `_exit`.

use std::ffi::CString;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use nix::sys::signal::{signal, SigHandler, Signal};

use crate::util::is_regular_file;

/// Path of the artifact currently being written, as a leaked C string.
/// Null when no artifact is registered. Written only by [`register`] and
/// [`clear`] on the main thread; the signal handler only reads it.
static ARTIFACT: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());

extern "C" fn int_handler(_sig: libc::c_int) {
    let path = ARTIFACT.load(Ordering::SeqCst);
    unsafe {
        if !path.is_null() {
            libc::unlink(path);
        }
        libc::write(2, b"\n".as_ptr() as *const libc::c_void, 1);
        libc::_exit(2);
    }
}

/// Installs the SIGINT handler with `path` as the artifact to delete.
///
/// Only regular files are registered: if `path` names anything else (or does
/// not exist yet) the slot is cleared instead, so the handler can never
/// unlink a device or directory.
fn register(path: &Path) {
    if !is_regular_file(path) {
        clear();
        return;
    }
    let Ok(cpath) = CString::new(path.as_os_str().as_encoded_bytes()) else {
        clear();
        return;
    };
    let raw = cpath.into_raw();
    let old = ARTIFACT.swap(raw, Ordering::SeqCst);
    release(old);
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::Handler(int_handler));
    }
}

/// Uninstalls the handler and empties the artifact slot. Idempotent.
fn clear() {
    let old = ARTIFACT.swap(ptr::null_mut(), Ordering::SeqCst);
    if !old.is_null() {
        unsafe {
            let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
        }
    }
    release(old);
}

fn release(old: *mut libc::c_char) {
    if !old.is_null() {
        // Retake ownership of the string leaked by `register`.
        unsafe {
            drop(CString::from_raw(old));
        }
    }
}

// ---------------------------------------------------------------------------
// Scoped guard
// ---------------------------------------------------------------------------

/// Registers a destination artifact for interrupt cleanup; clears the
/// registration when dropped.
///
/// Must be created only *after* the destination was opened successfully:
/// registering earlier could delete a pre-existing file the user then
/// declines to overwrite.
pub struct ArtifactGuard {
    armed: bool,
}

impl ArtifactGuard {
    pub fn register(path: &Path) -> Self {
        register(path);
        ArtifactGuard { armed: true }
    }

    /// Clears the registration early, before the guard goes out of scope.
    /// Used once the destination is complete and must survive an interrupt.
    pub fn disarm(&mut self) {
        if self.armed {
            clear();
            self.armed = false;
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

// ---------------------------------------------------------------------------
// Abort-path diagnostics
// ---------------------------------------------------------------------------

/// Installs handlers for SIGABRT/SIGFPE/SIGILL/SIGSEGV/SIGBUS that print a
/// stack trace to stderr, then re-raise the signal with its default
/// disposition. Independent of the artifact guard.
#[cfg(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple"))]
pub fn add_abort_handlers() {
    extern "C" fn abrt_handler(sig: libc::c_int) {
        const MAX_FRAMES: usize = 50;
        let mut frames = [ptr::null_mut::<libc::c_void>(); MAX_FRAMES];
        unsafe {
            let depth = libc::backtrace(frames.as_mut_ptr(), MAX_FRAMES as libc::c_int);
            if depth > 0 {
                libc::backtrace_symbols_fd(frames.as_ptr(), depth, 2);
            }
            libc::signal(sig, libc::SIG_DFL);
            libc::raise(sig);
        }
    }

    for sig in [
        Signal::SIGABRT,
        Signal::SIGFPE,
        Signal::SIGILL,
        Signal::SIGSEGV,
        Signal::SIGBUS,
    ] {
        unsafe {
            let _ = signal(sig, SigHandler::Handler(abrt_handler));
        }
    }
}

#[cfg(not(any(all(target_os = "linux", target_env = "gnu"), target_vendor = "apple")))]
pub fn add_abort_handlers() {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // The artifact slot is process-wide; serialize tests that touch it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn guard_registers_and_clears_regular_file() {
        let _lock = TEST_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifact.zst");
        File::create(&path).unwrap();

        {
            let _guard = ArtifactGuard::register(&path);
            assert!(!ARTIFACT.load(Ordering::SeqCst).is_null());
        }
        assert!(ARTIFACT.load(Ordering::SeqCst).is_null());
    }

    #[test]
    fn guard_ignores_non_regular_path() {
        let _lock = TEST_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let _guard = ArtifactGuard::register(dir.path());
        assert!(ARTIFACT.load(Ordering::SeqCst).is_null());
    }

    #[test]
    fn disarm_is_idempotent() {
        let _lock = TEST_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifact.zst");
        File::create(&path).unwrap();

        let mut guard = ArtifactGuard::register(&path);
        guard.disarm();
        guard.disarm();
        assert!(ARTIFACT.load(Ordering::SeqCst).is_null());
    }
}
