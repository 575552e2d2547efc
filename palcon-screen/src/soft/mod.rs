//! Software backend.

mod raster;
mod screen;

pub use screen::SoftScreen;
