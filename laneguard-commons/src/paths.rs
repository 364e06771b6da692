use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

/// Normalize a path by resolving `.` and `..` components lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Canonicalize a path whose tail may not exist yet.
///
/// The deepest existing ancestor is resolved (following symlinks) and the
/// missing components are appended verbatim. A dangling symlink anywhere on the
/// way is rejected because its eventual target cannot be known.
pub fn canonicalize_allow_missing(path: &Path) -> io::Result<PathBuf> {
    let mut cursor = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match dunce::canonicalize(&cursor) {
            Ok(resolved) => {
                let mut result = resolved;
                for part in missing.iter().rev() {
                    result.push(part);
                }
                return Ok(result);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(&cursor).is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("dangling symlink at {}", cursor.display()),
                    ));
                }
                let Some(name) = cursor.file_name().map(|name| name.to_os_string()) else {
                    return Err(err);
                };
                missing.push(name);
                if !cursor.pop() {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Canonicalize a directory that is expected to exist, falling back to the
/// lexically normalized form when it does not.
pub fn canonicalize_root(root: &Path) -> PathBuf {
    dunce::canonicalize(root).unwrap_or_else(|error| {
        warn!(
            path = %root.display(),
            %error,
            "Failed to canonicalize installation root; falling back to normalized path"
        );
        normalize_path(root)
    })
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let Some(rest) = raw.strip_prefix('~') else {
        return PathBuf::from(raw);
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return PathBuf::from(raw);
    }
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches('/')),
        None => PathBuf::from(raw),
    }
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash_string(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir | Component::ParentDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Component-boundary prefix match on `/`-separated relative paths.
///
/// A prefix ending in `/` names a directory; any other prefix matches either
/// the exact path or anything beneath it. `core/` never matches `corelib/x`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    let path = path.trim_start_matches("./");
    let prefix = prefix.trim_start_matches("./");
    if prefix.is_empty() {
        return false;
    }

    match prefix.strip_suffix('/') {
        Some(dir) => path == dir || path.starts_with(prefix),
        None => {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// Provides the directories a laneguard installation works inside.
pub trait InstallationPaths: Send + Sync {
    /// Absolute path of the installation root every governed write must stay in.
    fn installation_root(&self) -> &Path;

    /// Directory for engine-owned state (locks, backups).
    fn state_dir(&self) -> PathBuf;

    /// Resolve a possibly-relative path against the installation root.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.installation_root().join(path)
        }
    }

    /// Directory holding per-path advisory lock files.
    fn lock_dir(&self) -> PathBuf {
        self.state_dir().join("locks")
    }
}
