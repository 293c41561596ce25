use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

/// Map an object key onto a path under `root`.
///
/// Keys are `/`-separated; empty segments, `.`/`..`, absolute keys and
/// backslashes are rejected so a key can never escape `root`.
pub fn key_to_path(root: &Path, key: &str) -> Result<PathBuf> {
    if key.is_empty() {
        bail!("empty key");
    }
    if key.starts_with('/') {
        bail!("absolute keys are not allowed: {:?}", key);
    }
    if key.contains('\\') {
        bail!("backslash in key: {:?}", key);
    }
    let mut out = root.to_path_buf();
    for seg in key.split('/') {
        match seg {
            "" => bail!("empty segment in key: {:?}", key),
            "." | ".." => bail!("parent traversal not allowed: {:?}", key),
            s => out.push(s),
        }
    }
    // Drive prefixes and similar only show up as non-normal components.
    let rel = out.strip_prefix(root)?;
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        bail!("key is not a plain relative path: {:?}", key);
    }
    Ok(out)
}

/// Render `path` relative to `root` as a `/`-separated key.
///
/// Keys must map back to exactly one file, so non-UTF-8 names are an error
/// rather than being replaced lossily.
pub fn path_to_key(root: &Path, path: &Path) -> Result<String> {
    let Ok(rel) = path.strip_prefix(root) else {
        bail!("{:?} is not under {:?}", path, root);
    };
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(s) => match s.to_str() {
                Some(s) => parts.push(s),
                None => bail!("non-UTF-8 path component in {:?}", path),
            },
            Component::CurDir => {}
            _ => bail!("path escapes root: {:?}", path),
        }
    }
    if parts.is_empty() {
        bail!("path is the root itself: {:?}", path);
    }
    Ok(parts.join("/"))
}
