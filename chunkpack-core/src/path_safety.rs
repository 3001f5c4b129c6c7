use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, Debug, Default)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

fn unsafe_path(name: &str, reason: impl Into<String>) -> Error {
    Error::UnsafePath { name: name.to_string(), reason: reason.into() }
}

/// Turn a `/`-separated header name into a relative path made only of
/// normal components.
pub fn entry_rel_path(name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(unsafe_path(name, "empty name"));
    }
    if name.contains('\0') {
        return Err(unsafe_path(name, "contains a NUL byte"));
    }
    if name.starts_with('/') {
        return Err(unsafe_path(name, "absolute paths are not allowed"));
    }
    let mut rel = PathBuf::new();
    for seg in name.split('/') {
        let mut comps = Path::new(seg).components();
        match (comps.next(), comps.next()) {
            (Some(Component::Normal(c)), None) if c == seg => rel.push(seg),
            (Some(Component::ParentDir), None) => {
                return Err(unsafe_path(name, "parent traversal not allowed"))
            }
            _ => return Err(unsafe_path(name, format!("invalid path segment {:?}", seg))),
        }
    }
    Ok(rel)
}

/// Resolve entry `name` under `root`: no absolute, no `..`. Without
/// `follow_symlinks` any symlink along the way is rejected; with it every
/// symlink, the last component included, must resolve inside root.
pub fn validate_path(root: &Path, name: &str, policy: PathPolicy) -> Result<PathBuf> {
    let rel = entry_rel_path(name)?;
    let root_can = if policy.follow_symlinks {
        Some(std::fs::canonicalize(root).map_err(|e| Error::read(root, e))?)
    } else {
        None
    };
    let mut cur = root.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        let Ok(m) = std::fs::symlink_metadata(&cur) else {
            // nothing below a missing component can be a link yet
            break;
        };
        if !m.file_type().is_symlink() {
            continue;
        }
        let Some(root_can) = root_can.as_deref() else {
            return Err(unsafe_path(name, format!("symlink in path (not following): {:?}", cur)));
        };
        let target = std::fs::canonicalize(&cur)
            .map_err(|e| unsafe_path(name, format!("dangling symlink {:?}: {}", cur, e)))?;
        if !target.starts_with(root_can) {
            return Err(unsafe_path(name, format!("path escapes root via {:?}", cur)));
        }
    }
    Ok(root.join(rel))
}
