/// Errors from loading, instantiating, or driving a guest module.
///
/// Traps raised inside host-provided imports surface here through the
/// wasmtime error chain of the guest call that triggered them.
#[derive(thiserror::Error, Debug)]
pub enum HostError {
    /// The `.wasm` bytes failed to validate or compile.
    #[error("guest module rejected: {0}")]
    Module(wasmtime::Error),

    /// Registering a host import in the linker failed.
    #[error("host import registration failed: {0}")]
    Linker(wasmtime::Error),

    /// Instantiation failed, usually an import the host does not provide.
    #[error("guest instantiation failed: {0}")]
    Instantiate(wasmtime::Error),

    /// A required export is missing or has the wrong signature.
    #[error("guest export `{name}` missing or mistyped: {source}")]
    Export {
        /// Export name as it appears in the module.
        name: &'static str,
        /// Underlying lookup failure.
        source: wasmtime::Error,
    },

    /// The guest trapped while executing an exported function.
    #[error("guest `{name}` trapped: {source}")]
    Guest {
        /// Export name that was being called.
        name: &'static str,
        /// Trap carried up from the execution.
        source: wasmtime::Error,
    },

    /// The guest's `init` export ran but reported failure.
    #[error("guest init reported failure")]
    InitFailed,

    /// A file name the embedder asked to load is not in the store.
    #[error("no file named `{0}` in the store")]
    FileNotFound(String),

    /// Reading guest assets from disk failed.
    #[error("guest asset directory: {0}")]
    Assets(#[from] std::io::Error),
}

impl HostError {
    pub(crate) fn export(name: &'static str, source: wasmtime::Error) -> Self {
        Self::Export { name, source }
    }

    pub(crate) fn guest(name: &'static str, source: wasmtime::Error) -> Self {
        Self::Guest { name, source }
    }
}
