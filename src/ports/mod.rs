//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system. Implementations live in `src/adapters/`.

pub mod image_generator;
pub mod image_source;
pub mod object_store;

pub use image_generator::{GenerationRequest, ImageGenerator, InputImage};
pub use image_source::ImageSource;
pub use object_store::ObjectStore;
