use std::path::PathBuf;

/// Expands a leading `~` to the user's home directory.
/// Paths without one (or when no home directory is known) are returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Treats `None` and `""` the same way: absent. Anything else, whitespace
/// included, is kept byte for byte.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
