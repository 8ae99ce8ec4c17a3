//! Platform layer
//!
//! GLFW window owning an OpenGL 4.3 core context.

pub mod window;

pub use window::{GlWindow, WindowError, WindowResult};
