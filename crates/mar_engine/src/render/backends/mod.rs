//! Graphics backend implementations
//!
//! `OpenGlBackend` drives a GL 4.3 core context through `glow`;
//! `HeadlessBackend` records calls for tests and tools.

pub mod opengl;
pub mod headless;

pub use opengl::OpenGlBackend;
pub use headless::{HeadlessBackend, BackendCall};
