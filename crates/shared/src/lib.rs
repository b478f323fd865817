pub mod crypto;
pub mod env;
pub mod error;
pub mod logging;
pub mod test_utils;
