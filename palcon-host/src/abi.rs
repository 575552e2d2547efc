//! Wire-level names shared by the host and its guests.
//!
//! Everything crossing the sandbox boundary is addressed by these strings;
//! handles, offsets, and sizes cross as plain integers.

/// Module name for the palette-indexed screen imports.
pub const SCREEN_MODULE: &str = "screen";

/// Module name for the named read-only file imports.
pub const FILE_MODULE: &str = "hostfile";

/// Module name for the performance-clock imports.
pub const CLOCK_MODULE: &str = "hostclock";

/// Module name the guest's libc expects its syscalls under.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

// Screen imports. `init` is the handshake; every other screen import traps
// until the guest has called it.
pub const SCREEN_INIT: &str = "init";
pub const SCREEN_CREATE_BUFFER: &str = "create_buffer";
pub const SCREEN_DELETE_BUFFER: &str = "delete_buffer";
pub const SCREEN_UPDATE_BUFFER: &str = "update_buffer";
pub const SCREEN_CREATE_TEXTURE: &str = "create_texture";
pub const SCREEN_DELETE_TEXTURE: &str = "delete_texture";
pub const SCREEN_UPDATE_TEXTURE: &str = "update_texture";
pub const SCREEN_SET_PALETTE: &str = "set_palette";
pub const SCREEN_SET_COLOR: &str = "set_color";
pub const SCREEN_CLEAR: &str = "clear";
pub const SCREEN_DRAW: &str = "draw";

// File imports: paths are NUL-terminated strings in guest memory.
pub const FILE_SIZE: &str = "size";
pub const FILE_READ: &str = "read";

// Clock imports.
pub const CLOCK_NANOTIME: &str = "nanotime";
pub const CLOCK_CPU_USAGE: &str = "cpu_usage";

// Guest exports the host drives.
pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_INIT: &str = "init";
pub const EXPORT_RENDER: &str = "render";
pub const EXPORT_MIX: &str = "mix";
pub const EXPORT_GET_AUDIO_BUF: &str = "get_audio_buf";
pub const EXPORT_GET_FILE_BUF: &str = "get_file_buf";
pub const EXPORT_LOAD_FILE: &str = "load_file";
