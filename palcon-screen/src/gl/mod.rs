//! OpenGL backend.

mod context;
mod program;
mod screen;

pub use screen::GlScreen;
