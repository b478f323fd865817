use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

/// Environment files consulted before flags are parsed, in load order.
/// Variables already present in the process environment are never overridden.
pub const ENV_FILES: [&str; 2] = [".env", ".env.secrets"];

fn find_env_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let candidate = dir.join(file_name);
    if candidate.exists() {
        trace!("Loading environment variables from: {}", candidate.display());
        Some(candidate)
    } else {
        trace!(
            "No environment variables file found with name: {:?} in {}",
            file_name,
            dir.display()
        );
        None
    }
}

fn load_optional_env_file(path: Option<PathBuf>) {
    let Some(path) = path else {
        return;
    };

    match dotenv::from_filename(&path) {
        Ok(_) => debug!("Loaded environment variables from: {}", path.display()),
        Err(e) => warn!(
            "Failed to load environment variables from {}: {}",
            path.display(),
            e
        ),
    }
}

pub fn load_optional_env_files_from(dir: &Path) {
    for file_name in ENV_FILES {
        load_optional_env_file(find_env_file(dir, file_name));
    }
}

pub fn configure_env() -> Result<(), anyhow::Error> {
    let cwd = std::env::current_dir()?;
    load_optional_env_files_from(&cwd);
    Ok(())
}
