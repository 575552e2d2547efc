//! Palette-indexed drawing surface for sandboxed guest modules.
//!
//! Resources are addressed by small integer handles, pixels by 8-bit palette
//! indices, and geometry by packed x/y/u/v vertices. [`GlScreen`] renders on
//! an OpenGL context; [`SoftScreen`] rasterizes in memory with identical
//! observable rules for headless runs and tests.

mod error;
mod gl;
mod handle;
mod memory;
mod palette;
mod screen;
mod soft;

pub use crate::{
    error::Error,
    gl::GlScreen,
    handle::{BufferId, TextureId},
    memory::{GuestMemory, MemoryAccessError, VecGuestMemory},
    screen::{
        DrawMode, FLOATS_PER_VERTEX, FgColor, INDEX_EPSILON, Screen, TexFilter, UsageHint,
    },
    soft::SoftScreen,
};

/// GL shader language target for version injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslVersion {
    /// WebGL2 / OpenGL ES 3.0: `#version 300 es`
    Es300,
    /// OpenGL 3.3 Core: `#version 330 core`
    Gl330,
}

impl GlslVersion {
    pub fn vertex_preamble(&self) -> &'static str {
        match self {
            Self::Es300 => "#version 300 es\nprecision highp float;\n",
            Self::Gl330 => "#version 330 core\n",
        }
    }

    pub fn fragment_preamble(&self) -> &'static str {
        match self {
            Self::Es300 => "#version 300 es\nprecision mediump float;\n",
            Self::Gl330 => "#version 330 core\n",
        }
    }
}
