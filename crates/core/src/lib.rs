pub mod error;
pub mod id;

pub use error::*;
pub use id::*;
