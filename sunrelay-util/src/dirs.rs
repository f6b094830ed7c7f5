use std::path::PathBuf;

/// Return the application state directory
///
/// Channel history is persisted here unless a different data directory
/// is given on the command line.
pub fn state_dir() -> PathBuf {
    let dir = if let Some(state_dir) = dirs::state_dir() {
        state_dir
    } else {
        // Fallback to home directory if state dir is not available
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("state")
    };
    dir.join(env!("SUNRELAY_PKG_NAME"))
}
