//! Delimited-text table loading for arbor datasets.

mod error;
mod reader;

pub use error::IoError;
pub use reader::{TableReader, load};
