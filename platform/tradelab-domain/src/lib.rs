pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use error::EngineError;
