//! Minimal `wasi_snapshot_preview1` surface.
//!
//! Guests built against wasi-libc import a batch of preview1 syscalls even
//! when nothing calls them at runtime; this layer exists so such modules
//! instantiate at all. Every entry reports `ENOTSUP` except two: `fd_write`
//! really consumes its iovecs so `printf`-style diagnostics reach the host
//! log, and `proc_exit` traps, because there is no process here to end.

use tracing::{debug, trace};
use wasmtime::{Caller, Linker};

use crate::{
    abi,
    session::{self, HostState},
};

/// The operation is not supported.
pub const ERRNO_NOTSUP: i32 = 58;

/// No error occurred.
pub const ERRNO_SUCCESS: i32 = 0;

macro_rules! stub {
    ($linker:expr, $name:literal, ($($ty:ty),*)) => {
        $linker.func_wrap(abi::WASI_MODULE, $name, |$(_: $ty),*| -> i32 {
            trace!(syscall = $name, "unsupported; reporting ENOTSUP");
            ERRNO_NOTSUP
        })?;
    };
}

/// Registers the preview1 set in `linker`.
pub(crate) fn add_to_linker<S: 'static>(
    linker: &mut Linker<HostState<S>>,
) -> Result<(), wasmtime::Error> {
    stub!(linker, "args_get", (i32, i32));
    stub!(linker, "args_sizes_get", (i32, i32));
    stub!(linker, "clock_res_get", (i32, i32));
    stub!(linker, "clock_time_get", (i32, i64, i32));
    stub!(linker, "environ_get", (i32, i32));
    stub!(linker, "environ_sizes_get", (i32, i32));
    stub!(linker, "fd_advise", (i32, i64, i64, i32));
    stub!(linker, "fd_allocate", (i32, i64, i64));
    stub!(linker, "fd_close", (i32));
    stub!(linker, "fd_datasync", (i32));
    stub!(linker, "fd_fdstat_get", (i32, i32));
    stub!(linker, "fd_fdstat_set_flags", (i32, i32));
    stub!(linker, "fd_fdstat_set_rights", (i32, i64, i64));
    stub!(linker, "fd_filestat_get", (i32, i32));
    stub!(linker, "fd_filestat_set_size", (i32, i64));
    stub!(linker, "fd_filestat_set_times", (i32, i64, i64, i32));
    stub!(linker, "fd_pread", (i32, i32, i32, i64, i32));
    stub!(linker, "fd_prestat_dir_name", (i32, i32, i32));
    stub!(linker, "fd_prestat_get", (i32, i32));
    stub!(linker, "fd_pwrite", (i32, i32, i32, i64, i32));
    stub!(linker, "fd_read", (i32, i32, i32, i32));
    stub!(linker, "fd_readdir", (i32, i32, i32, i64, i32));
    stub!(linker, "fd_renumber", (i32, i32));
    stub!(linker, "fd_seek", (i32, i64, i32, i32));
    stub!(linker, "fd_sync", (i32));
    stub!(linker, "fd_tell", (i32, i32));
    stub!(linker, "path_create_directory", (i32, i32, i32));
    stub!(linker, "path_filestat_get", (i32, i32, i32, i32, i32));
    stub!(linker, "path_filestat_set_times", (i32, i32, i32, i32, i64, i64, i32));
    stub!(linker, "path_link", (i32, i32, i32, i32, i32, i32, i32));
    stub!(linker, "path_open", (i32, i32, i32, i32, i32, i64, i64, i32, i32));
    stub!(linker, "path_readlink", (i32, i32, i32, i32, i32, i32));
    stub!(linker, "path_remove_directory", (i32, i32, i32));
    stub!(linker, "path_rename", (i32, i32, i32, i32, i32, i32));
    stub!(linker, "path_symlink", (i32, i32, i32, i32, i32));
    stub!(linker, "path_unlink_file", (i32, i32, i32));
    stub!(linker, "poll_oneoff", (i32, i32, i32, i32));
    stub!(linker, "random_get", (i32, i32));
    stub!(linker, "sched_yield", ());
    stub!(linker, "sock_accept", (i32, i32, i32));
    stub!(linker, "sock_recv", (i32, i32, i32, i32, i32, i32));
    stub!(linker, "sock_send", (i32, i32, i32, i32, i32));
    stub!(linker, "sock_shutdown", (i32, i32));

    linker.func_wrap(
        abi::WASI_MODULE,
        "fd_write",
        |mut caller: Caller<'_, HostState<S>>,
         fd: i32,
         iovs: i32,
         iovs_len: i32,
         nwritten: i32|
         -> Result<i32, wasmtime::Error> {
            fd_write_impl(&mut caller, fd, iovs as u32, iovs_len as u32, nwritten as u32)
        },
    )?;

    linker.func_wrap(
        abi::WASI_MODULE,
        "proc_exit",
        |code: i32| -> Result<(), wasmtime::Error> {
            debug!(code, "guest requested exit");
            Err(wasmtime::Error::msg(format!("guest exited with code {code}")))
        },
    )?;

    Ok(())
}

/// Swallows the iovecs, reporting their summed length as written. Data sent
/// to fds 1 and 2 is logged instead of discarded.
fn fd_write_impl<S: 'static>(
    caller: &mut Caller<'_, HostState<S>>,
    fd: i32,
    iovs: u32,
    iovs_len: u32,
    nwritten: u32,
) -> Result<i32, wasmtime::Error> {
    let memory = session::guest_memory(caller)?;

    let mut total: u32 = 0;
    let mut payload = Vec::new();
    {
        let data = memory.data(&*caller);
        for i in 0..iovs_len {
            let entry = iovs.wrapping_add(i.wrapping_mul(8));
            let ptr = read_u32(data, entry)?;
            let len = read_u32(data, entry.wrapping_add(4))?;
            total = total.wrapping_add(len);
            if fd == 1 || fd == 2 {
                let start = ptr as usize;
                let bytes = start
                    .checked_add(len as usize)
                    .and_then(|end| data.get(start..end));
                if let Some(bytes) = bytes {
                    payload.extend_from_slice(bytes);
                }
            }
        }
    }
    if !payload.is_empty() {
        debug!(fd, text = %String::from_utf8_lossy(&payload), "guest wrote");
    }

    memory.write(&mut *caller, nwritten as usize, &total.to_le_bytes())?;
    Ok(ERRNO_SUCCESS)
}

fn read_u32(data: &[u8], at: u32) -> Result<u32, wasmtime::Error> {
    let start = at as usize;
    start
        .checked_add(4)
        .and_then(|end| data.get(start..end))
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| wasmtime::Error::msg("fd_write iovec out of bounds"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_reads_are_little_endian_and_bounded() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xff, 0xff];
        assert_eq!(read_u32(&data, 0).unwrap(), 1);
        assert!(read_u32(&data, 3).is_err());
        assert!(read_u32(&data, u32::MAX).is_err());
    }
}
