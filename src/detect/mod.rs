mod backend;
mod backends;
mod factory;
pub mod labels;
pub mod postprocess;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use factory::{open_detector, DetectorSettings, MODEL_EXTENSION};
pub use labels::ClassNames;
pub use result::{BoundingBox, Detection, PixelBox};
