//! ProEdit Color - 3D LUTs and their cache.

pub mod error;
pub mod lut;
pub mod lut_cache;

pub use error::ColorError;
pub use lut::Lut3D;
pub use lut_cache::{load_lut, LutCache, LutResource};
