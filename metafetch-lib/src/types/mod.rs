#![allow(unreachable_pub)]

mod batch_result;
mod completion;
mod error;
mod request;

pub use batch_result::{BatchResult, ErrorEntry};
pub use completion::{Completion, RemoteError};
pub use error::ErrorKind;
pub use request::{Fields, Key, Request};

/// The metafetch `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
