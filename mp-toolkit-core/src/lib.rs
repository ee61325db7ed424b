//! Core types for the Mario Party Toolkit code injector.
//!
//! Everything here is a plain value: container kinds, classified images,
//! code lists and the error taxonomy shared by the engine and its frontends.

pub mod codes;
pub mod container;
pub mod error;
pub mod image;
pub mod tool;
pub mod util;

pub use codes::{CodeList, PATCH_INPUT_FILE_NAME, PATCH_MARKER};
pub use container::ContainerKind;
pub use error::InjectError;
pub use image::{GameImage, SUPPORTED_EXTENSIONS, classify, classify_parts};
pub use tool::Tool;
