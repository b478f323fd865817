pub mod logic;
pub mod router;
pub mod service;

#[cfg(any(test, feature = "integration_test"))]
pub mod test;
