pub mod errors;

pub use errors::{FetchError, PlayerError};
