use std::path::{Path, PathBuf};

/// Expands `~` using `$HOME` and makes the path absolute.
pub fn resolve_path(arg: &str) -> PathBuf {
    let home = std::env::var("HOME").ok();
    absolutize(&expand_tilde(arg, home.as_deref()))
}

/// Leading `~` and every `/~/` segment are replaced by `home`.
/// Path is returned as is without a home directory.
pub fn expand_tilde(path: &str, home: Option<&str>) -> PathBuf {
    let home = match home {
        Some(home) if !home.is_empty() => home.trim_end_matches('/'),
        _ => return PathBuf::from(path),
    };

    let mut expanded = match path.strip_prefix('~') {
        Some(rest) => format!("{}/{}", home, rest.trim_start_matches('/')),
        None => path.to_owned(),
    };
    expanded = expanded.replace("/~/", &format!("{}/", home));
    PathBuf::from(expanded)
}

pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_owned();
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(err) => {
            tracing::warn!("Cannot resolve current directory: {}", err);
            path.to_owned()
        }
    }
}
