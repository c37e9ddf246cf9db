pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod tokens;
pub mod transport;
pub mod types;

pub use client::*;
pub use error::*;
pub use tokens::*;
pub use transport::*;
pub use types::*;
