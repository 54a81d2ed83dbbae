pub use error::{Error, Result};

pub mod catalog;
pub mod download;
pub mod error;
pub mod manga;
pub mod store;
pub mod sync;
