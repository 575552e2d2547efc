use crate::memory::MemoryAccessError;

/// Error categories for the screen bridge.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Shader compilation, linking, or program creation errors.
    #[error("Shader error: {0}")]
    Shader(String),

    /// GPU resource creation or management errors.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Operations on empty or out-of-range handle slots.
    #[error("Handle error: {0}")]
    Handle(String),

    /// Upload or draw-call arguments that violate the contract.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Out-of-range guest memory access.
    #[error(transparent)]
    Memory(#[from] MemoryAccessError),
}

impl Error {
    // Shader errors
    pub(crate) fn shader_creation_failed(detail: &str) -> Self {
        Self::Shader(format!("Shader creation failed: {detail}"))
    }

    pub(crate) fn shader_program_creation_failed() -> Self {
        Self::Shader("Shader program creation failed".to_string())
    }

    pub(crate) fn shader_compile_failed(stage: &str, log: String) -> Self {
        Self::Shader(format!("{stage} shader compilation failed: {log}"))
    }

    pub(crate) fn shader_link_failed(log: String) -> Self {
        Self::Shader(format!("Shader linking failed: {log}"))
    }

    // Resource errors
    pub(crate) fn buffer_creation_failed(detail: String) -> Self {
        Self::Resource(format!("Failed to create vertex buffer: {detail}"))
    }

    pub(crate) fn vertex_array_creation_failed(detail: String) -> Self {
        Self::Resource(format!("Failed to create vertex array object: {detail}"))
    }

    pub(crate) fn texture_creation_failed(detail: String) -> Self {
        Self::Resource(format!("Failed to create texture: {detail}"))
    }

    pub(crate) fn uniform_location_failed(name: &str) -> Self {
        Self::Resource(format!("Failed to get uniform location: {name}"))
    }

    // Handle errors
    pub(crate) fn empty_buffer_slot(index: u32) -> Self {
        Self::Handle(format!("buffer handle {index} does not name a live buffer"))
    }

    pub(crate) fn empty_texture_slot(index: u32) -> Self {
        Self::Handle(format!(
            "texture handle {index} does not name a live texture"
        ))
    }

    // Validation errors
    pub(crate) fn zero_texture_size(width: u32, height: u32) -> Self {
        Self::Validation(format!("texture dimensions {width}x{height} must be nonzero"))
    }

    pub(crate) fn texture_size_mismatch(
        expected: (u32, u32),
        got: (u32, u32),
    ) -> Self {
        Self::Validation(format!(
            "texture upload {}x{} does not match creation size {}x{}",
            got.0, got.1, expected.0, expected.1
        ))
    }

    pub(crate) fn texture_payload_mismatch(got: usize, expected: usize) -> Self {
        Self::Validation(format!(
            "texture upload of {got} bytes does not cover {expected} pixels"
        ))
    }

    pub(crate) fn palette_overflow(count: u32) -> Self {
        Self::Validation(format!("palette update of {count} entries exceeds 256"))
    }

    pub(crate) fn palette_not_rgb(len: usize) -> Self {
        Self::Validation(format!(
            "palette update of {len} bytes is not a whole number of RGB triplets"
        ))
    }

    pub(crate) fn buffer_underrun(needed: usize, have: usize) -> Self {
        Self::Validation(format!(
            "draw needs {needed} floats but the buffer holds {have}"
        ))
    }

    pub(crate) fn bad_vertex_count(count: u32) -> Self {
        Self::Validation(format!(
            "vertex count {count} is not a nonzero multiple of 3"
        ))
    }

    pub(crate) fn bad_draw_mode(raw: u32) -> Self {
        Self::Validation(format!("draw mode {raw} is not one of 0, 1, 2"))
    }
}
