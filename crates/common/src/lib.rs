//! Common types shared by the implicit login workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
