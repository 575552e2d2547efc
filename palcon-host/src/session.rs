use palcon_screen::{BufferId, DrawMode, GuestMemory, Screen, TextureId, UsageHint};
use tracing::{debug, info, trace};
use wasmtime::{Caller, Engine, Linker, Memory, Module, Store, TypedFunc};

use crate::{abi, clock::HostClock, error::HostError, files::FileStore, wasi};

/// Everything the host-side imports can reach while the guest runs.
pub struct HostState<S> {
    screen: S,
    files: FileStore,
    clock: HostClock,
    /// Set by the screen `init` import; every other screen import traps
    /// until then.
    screen_ready: bool,
}

/// A loaded guest instance plus the services it draws against.
///
/// Owns the wasmtime store; the screen lives inside it so host imports can
/// reach it re-entrantly while guest code runs. [`Session::into_screen`]
/// hands the screen back for teardown.
pub struct Session<S: 'static> {
    store: Store<HostState<S>>,
    memory: Memory,
    init: TypedFunc<(), i32>,
    render: TypedFunc<(), ()>,
    mix: Option<TypedFunc<u32, ()>>,
    get_audio_buf: Option<TypedFunc<(), u32>>,
    get_file_buf: Option<TypedFunc<(), u32>>,
    load_file: Option<TypedFunc<u32, i32>>,
}

impl<S: Screen + 'static> Session<S> {
    /// Compiles, links, and instantiates a guest module against `screen`
    /// and `files`.
    ///
    /// # Errors
    /// Fails on invalid wasm, unknown imports, or missing `memory`,
    /// `init`, or `render` exports. Optional exports (`mix`,
    /// `get_audio_buf`, `get_file_buf`, `load_file`) may be absent.
    pub fn new(wasm_bytes: &[u8], screen: S, files: FileStore) -> Result<Self, HostError> {
        let engine = Engine::default();
        let module = Module::new(&engine, wasm_bytes).map_err(HostError::Module)?;

        let mut linker: Linker<HostState<S>> = Linker::new(&engine);
        link_screen(&mut linker).map_err(HostError::Linker)?;
        link_files(&mut linker).map_err(HostError::Linker)?;
        link_clock(&mut linker).map_err(HostError::Linker)?;
        wasi::add_to_linker(&mut linker).map_err(HostError::Linker)?;

        let state = HostState {
            screen,
            files,
            clock: HostClock::new(),
            screen_ready: false,
        };
        let mut store = Store::new(&engine, state);
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(HostError::Instantiate)?;

        let memory = instance
            .get_memory(&mut store, abi::EXPORT_MEMORY)
            .ok_or_else(|| {
                HostError::export(
                    abi::EXPORT_MEMORY,
                    wasmtime::Error::msg("no linear memory under that name"),
                )
            })?;
        let init = instance
            .get_typed_func(&mut store, abi::EXPORT_INIT)
            .map_err(|e| HostError::export(abi::EXPORT_INIT, e))?;
        let render = instance
            .get_typed_func(&mut store, abi::EXPORT_RENDER)
            .map_err(|e| HostError::export(abi::EXPORT_RENDER, e))?;
        let mix = instance.get_typed_func(&mut store, abi::EXPORT_MIX).ok();
        let get_audio_buf = instance
            .get_typed_func(&mut store, abi::EXPORT_GET_AUDIO_BUF)
            .ok();
        let get_file_buf = instance
            .get_typed_func(&mut store, abi::EXPORT_GET_FILE_BUF)
            .ok();
        let load_file = instance
            .get_typed_func(&mut store, abi::EXPORT_LOAD_FILE)
            .ok();

        info!(
            wasm_bytes = wasm_bytes.len(),
            audio = mix.is_some(),
            file_loading = load_file.is_some(),
            "guest instantiated"
        );

        Ok(Self {
            store,
            memory,
            init,
            render,
            mix,
            get_audio_buf,
            get_file_buf,
            load_file,
        })
    }

    /// Runs the guest's `init` export.
    ///
    /// # Errors
    /// Fails if the guest traps (including screen misuse) or reports
    /// failure by returning zero.
    pub fn init(&mut self) -> Result<(), HostError> {
        let ok = self
            .init
            .call(&mut self.store, ())
            .map_err(|e| HostError::guest(abi::EXPORT_INIT, e))?;
        if ok == 0 {
            return Err(HostError::InitFailed);
        }
        info!("guest initialized");
        Ok(())
    }

    /// Runs one guest `render` pass.
    ///
    /// # Errors
    /// Fails if the guest traps.
    pub fn render_frame(&mut self) -> Result<(), HostError> {
        self.render
            .call(&mut self.store, ())
            .map_err(|e| HostError::guest(abi::EXPORT_RENDER, e))
    }

    /// Copies a stored file into the guest's staging buffer and asks the
    /// guest to load it. The returned flag is the guest's own verdict.
    ///
    /// # Errors
    /// Fails when the file is unknown, the guest lacks the loading
    /// exports, or the guest traps.
    pub fn load_file(&mut self, name: &str) -> Result<bool, HostError> {
        let get_file_buf = self.get_file_buf.clone().ok_or_else(|| {
            HostError::export(
                abi::EXPORT_GET_FILE_BUF,
                wasmtime::Error::msg("guest does not export it"),
            )
        })?;
        let load_file = self.load_file.clone().ok_or_else(|| {
            HostError::export(
                abi::EXPORT_LOAD_FILE,
                wasmtime::Error::msg("guest does not export it"),
            )
        })?;

        let Some(data) = self.store.data().files.get(name).map(<[u8]>::to_vec) else {
            return Err(HostError::FileNotFound(name.to_string()));
        };

        let ptr = get_file_buf
            .call(&mut self.store, ())
            .map_err(|e| HostError::guest(abi::EXPORT_GET_FILE_BUF, e))?;
        self.memory
            .write(&mut self.store, ptr as usize, &data)
            .map_err(|e| HostError::guest(abi::EXPORT_LOAD_FILE, wasmtime::Error::new(e)))?;

        debug!(name, bytes = data.len(), "staged file into guest memory");
        let ok = load_file
            .call(&mut self.store, data.len() as u32)
            .map_err(|e| HostError::guest(abi::EXPORT_LOAD_FILE, e))?;
        Ok(ok != 0)
    }

    /// Whether the guest exports the audio entry points.
    pub fn supports_audio(&self) -> bool {
        self.mix.is_some() && self.get_audio_buf.is_some()
    }

    /// Asks the guest to synthesize `samples` stereo frames into its audio
    /// buffer. The host ships no audio pipeline; embedders that want sound
    /// call this and read the buffer back themselves.
    ///
    /// # Errors
    /// Fails when the guest lacks the export or traps.
    pub fn mix(&mut self, samples: u32) -> Result<(), HostError> {
        let mix = self.mix.clone().ok_or_else(|| {
            HostError::export(
                abi::EXPORT_MIX,
                wasmtime::Error::msg("guest does not export it"),
            )
        })?;
        mix.call(&mut self.store, samples)
            .map_err(|e| HostError::guest(abi::EXPORT_MIX, e))
    }

    /// Reads `samples` interleaved stereo frames from the guest's audio
    /// buffer, after a [`Session::mix`] call.
    ///
    /// # Errors
    /// Fails when the guest lacks the export, traps, or the buffer runs
    /// past the end of guest memory.
    pub fn audio_frames(&mut self, samples: u32) -> Result<Vec<i16>, HostError> {
        let get_audio_buf = self.get_audio_buf.clone().ok_or_else(|| {
            HostError::export(
                abi::EXPORT_GET_AUDIO_BUF,
                wasmtime::Error::msg("guest does not export it"),
            )
        })?;
        let ptr = get_audio_buf
            .call(&mut self.store, ())
            .map_err(|e| HostError::guest(abi::EXPORT_GET_AUDIO_BUF, e))?;

        let mut bytes = vec![0u8; samples as usize * 2 * size_of::<i16>()];
        self.memory
            .read(&self.store, ptr as usize, &mut bytes)
            .map_err(|e| HostError::guest(abi::EXPORT_GET_AUDIO_BUF, wasmtime::Error::new(e)))?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// The screen the guest draws against.
    pub fn screen(&self) -> &S {
        &self.store.data().screen
    }

    /// Mutable access to the screen, for host-side concerns such as
    /// viewport changes.
    pub fn screen_mut(&mut self) -> &mut S {
        &mut self.store.data_mut().screen
    }

    /// Mutable access to the file store, for adding files after startup.
    pub fn files_mut(&mut self) -> &mut FileStore {
        &mut self.store.data_mut().files
    }

    /// Consumes the session and hands the screen back for teardown.
    pub fn into_screen(self) -> S {
        self.store.into_data().screen
    }
}

/// Finds the guest's exported linear memory from inside a host import.
pub(crate) fn guest_memory<T: 'static>(caller: &mut Caller<'_, T>) -> Result<Memory, wasmtime::Error> {
    caller
        .get_export(abi::EXPORT_MEMORY)
        .and_then(wasmtime::Extern::into_memory)
        .ok_or_else(|| wasmtime::Error::msg("guest does not export linear memory"))
}

fn ensure_ready<S: 'static>(
    caller: &Caller<'_, HostState<S>>,
    op: &'static str,
) -> Result<(), wasmtime::Error> {
    if caller.data().screen_ready {
        Ok(())
    } else {
        Err(wasmtime::Error::msg(format!(
            "screen `{op}` called before `init`"
        )))
    }
}

fn link_screen<S: Screen + 'static>(
    linker: &mut Linker<HostState<S>>,
) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_INIT,
        |mut caller: Caller<'_, HostState<S>>| {
            debug!("screen handshake");
            caller.data_mut().screen_ready = true;
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_CREATE_BUFFER,
        |mut caller: Caller<'_, HostState<S>>| -> Result<u32, wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_CREATE_BUFFER)?;
            let id = caller
                .data_mut()
                .screen
                .create_buffer()
                .map_err(wasmtime::Error::new)?;
            debug!(handle = id.raw(), "buffer created");
            Ok(id.raw())
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_DELETE_BUFFER,
        |mut caller: Caller<'_, HostState<S>>, handle: u32| -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_DELETE_BUFFER)?;
            debug!(handle, "buffer deleted");
            caller
                .data_mut()
                .screen
                .delete_buffer(BufferId::from_raw(handle))
                .map_err(wasmtime::Error::new)
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_UPDATE_BUFFER,
        |mut caller: Caller<'_, HostState<S>>,
         handle: u32,
         offset: u32,
         float_count: u32,
         usage: u32|
         -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_UPDATE_BUFFER)?;
            trace!(handle, offset, float_count, usage, "buffer upload");
            let memory = guest_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            state
                .screen
                .update_buffer_from(
                    &*data,
                    BufferId::from_raw(handle),
                    offset,
                    float_count,
                    UsageHint::from_raw(usage),
                )
                .map_err(wasmtime::Error::new)
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_CREATE_TEXTURE,
        |mut caller: Caller<'_, HostState<S>>,
         width: u32,
         height: u32|
         -> Result<u32, wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_CREATE_TEXTURE)?;
            let id = caller
                .data_mut()
                .screen
                .create_texture(width, height)
                .map_err(wasmtime::Error::new)?;
            debug!(handle = id.raw(), width, height, "texture created");
            Ok(id.raw())
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_DELETE_TEXTURE,
        |mut caller: Caller<'_, HostState<S>>, handle: u32| -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_DELETE_TEXTURE)?;
            debug!(handle, "texture deleted");
            caller
                .data_mut()
                .screen
                .delete_texture(TextureId::from_raw(handle))
                .map_err(wasmtime::Error::new)
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_UPDATE_TEXTURE,
        |mut caller: Caller<'_, HostState<S>>,
         handle: u32,
         offset: u32,
         width: u32,
         height: u32|
         -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_UPDATE_TEXTURE)?;
            trace!(handle, offset, width, height, "texture upload");
            let memory = guest_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            state
                .screen
                .update_texture_from(&*data, TextureId::from_raw(handle), offset, width, height)
                .map_err(wasmtime::Error::new)
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_SET_PALETTE,
        |mut caller: Caller<'_, HostState<S>>,
         offset: u32,
         entry_count: u32|
         -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_SET_PALETTE)?;
            debug!(offset, entry_count, "palette update");
            let memory = guest_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            state
                .screen
                .set_palette_from(&*data, offset, entry_count)
                .map_err(wasmtime::Error::new)
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_SET_COLOR,
        |mut caller: Caller<'_, HostState<S>>, index: u32| -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_SET_COLOR)?;
            trace!(index, "foreground staged");
            caller.data_mut().screen.set_color(index as u8);
            Ok(())
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_CLEAR,
        |mut caller: Caller<'_, HostState<S>>| -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_CLEAR)?;
            trace!("clear");
            caller.data_mut().screen.clear();
            Ok(())
        },
    )?;

    linker.func_wrap(
        abi::SCREEN_MODULE,
        abi::SCREEN_DRAW,
        |mut caller: Caller<'_, HostState<S>>,
         texture: u32,
         buffer: u32,
         vertex_count: u32,
         mode: u32|
         -> Result<(), wasmtime::Error> {
            ensure_ready(&caller, abi::SCREEN_DRAW)?;
            trace!(texture, buffer, vertex_count, mode, "draw");
            let mode = DrawMode::try_from_raw(mode).map_err(wasmtime::Error::new)?;
            caller
                .data_mut()
                .screen
                .draw(
                    TextureId::from_raw(texture),
                    BufferId::from_raw(buffer),
                    vertex_count,
                    mode,
                )
                .map_err(wasmtime::Error::new)
        },
    )?;

    Ok(())
}

fn link_files<S: Screen + 'static>(
    linker: &mut Linker<HostState<S>>,
) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        abi::FILE_MODULE,
        abi::FILE_SIZE,
        |mut caller: Caller<'_, HostState<S>>, path_ptr: u32| -> Result<i32, wasmtime::Error> {
            let memory = guest_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            let path = data.read_cstr(path_ptr).map_err(wasmtime::Error::new)?;
            let name = String::from_utf8_lossy(&path);
            let size = state.files.get(&name).map_or(-1, |f| f.len() as i32);
            debug!(%name, size, "file size query");
            Ok(size)
        },
    )?;

    linker.func_wrap(
        abi::FILE_MODULE,
        abi::FILE_READ,
        |mut caller: Caller<'_, HostState<S>>,
         path_ptr: u32,
         dst_ptr: u32|
         -> Result<(), wasmtime::Error> {
            let memory = guest_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            let path = data.read_cstr(path_ptr).map_err(wasmtime::Error::new)?;
            let name = String::from_utf8_lossy(&path);
            let Some(file) = state.files.get(&name) else {
                return Err(wasmtime::Error::msg(format!(
                    "file read: no file matches `{name}`"
                )));
            };
            let start = dst_ptr as usize;
            let dst = start
                .checked_add(file.len())
                .and_then(|end| data.get_mut(start..end))
                .ok_or_else(|| {
                    wasmtime::Error::msg("file read destination past end of guest memory")
                })?;
            dst.copy_from_slice(file);
            debug!(%name, bytes = file.len(), "file copied into guest memory");
            Ok(())
        },
    )?;

    Ok(())
}

fn link_clock<S: Screen + 'static>(
    linker: &mut Linker<HostState<S>>,
) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        abi::CLOCK_MODULE,
        abi::CLOCK_NANOTIME,
        |caller: Caller<'_, HostState<S>>| -> u64 { caller.data().clock.nanotime() },
    )?;

    linker.func_wrap(
        abi::CLOCK_MODULE,
        abi::CLOCK_CPU_USAGE,
        |caller: Caller<'_, HostState<S>>| -> i32 { caller.data().clock.cpu_usage() },
    )?;

    Ok(())
}
