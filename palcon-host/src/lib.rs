//! Native host for sandboxed wasm guests that draw on a palette-indexed
//! screen.
//!
//! A [`Session`] owns the engine, store, and instance for one guest
//! module. The guest exports `memory`, `init`, and `render` (plus optional
//! audio and file-loading entry points); the host provides four import
//! families:
//!
//! - `screen.*`: the drawing bridge from `palcon-screen`. `init` is the
//!   handshake; every other screen import traps until the guest has
//!   called it.
//! - `hostfile.size` / `hostfile.read`: a case-insensitive, read-only
//!   store of named byte blobs the embedder loads up front.
//! - `hostclock.nanotime` / `hostclock.cpu_usage`: a monotonic clock.
//! - `wasi_snapshot_preview1.*`: just enough WASI for wasi-libc guests
//!   to instantiate; everything reports [`ERRNO_NOTSUP`] except `fd_write`
//!   (logged) and `proc_exit` (traps).
//!
//! Pointers cross the boundary as plain `u32` offsets into the guest's
//! linear memory; the host never hands out host addresses, and out-of-range
//! offsets trap the guest call that supplied them.

pub(crate) mod abi;
mod clock;
mod error;
mod files;
mod session;
mod wasi;

pub use clock::HostClock;
pub use error::HostError;
pub use files::FileStore;
pub use session::Session;
pub use wasi::{ERRNO_NOTSUP, ERRNO_SUCCESS};
