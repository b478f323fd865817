use std::sync::Once;

pub fn get_workspace_root() -> String {
    let crate_root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    crate_root
        .parent() // up from shared/
        .and_then(|p| p.parent()) // up from crates/
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub struct TestContext {
    pub workspace_root: String,
    pub crate_root: String,
}

pub static INIT_TEST_ONCE: Once = Once::new();

/// Installs logging and the rustls provider once per test binary and returns
/// paths callers can resolve fixtures against.
#[macro_export]
macro_rules! setup_test {
    () => {{
        $crate::test_utils::helpers::INIT_TEST_ONCE.call_once(|| {
            $crate::crypto::configure_crypto_provider().unwrap();
            $crate::logging::configure_logging("debug").unwrap();
        });

        $crate::test_utils::helpers::TestContext {
            workspace_root: $crate::test_utils::helpers::get_workspace_root(),
            crate_root: env!("CARGO_MANIFEST_DIR").to_string(),
        }
    }};
}

pub use setup_test;
