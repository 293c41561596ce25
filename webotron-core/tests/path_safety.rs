use std::path::Path;
use webotron_core::path_safety::{key_to_path, path_to_key};

#[test]
fn plain_keys_map_under_root() {
    let root = Path::new("/srv/bucket");
    assert_eq!(key_to_path(root, "a/b/c.txt").unwrap(), root.join("a").join("b").join("c.txt"));
}

#[test]
fn traversal_and_absolute_keys_are_rejected() {
    let root = Path::new("/srv/bucket");
    for bad in ["", "/etc/passwd", "../x", "a/../../x", "a//b", "./a", "a\\b", "a/"] {
        let err = key_to_path(root, bad);
        assert!(err.is_err(), "accepted {bad:?}");
    }
    let msg = format!("{:#}", key_to_path(root, "a/../b").unwrap_err());
    assert!(msg.contains("parent traversal"), "unexpected error: {msg}");
}

#[test]
fn keys_use_forward_slashes() {
    let root = Path::new("site");
    let p = root.join("css").join("site.css");
    assert_eq!(path_to_key(root, &p).unwrap(), "css/site.css");
}

#[test]
fn root_itself_has_no_key() {
    let root = Path::new("site");
    assert!(path_to_key(root, root).is_err());
}

#[cfg(target_family = "unix")]
#[test]
fn non_utf8_component_is_rejected() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let root = Path::new("site");
    let p = root.join(OsStr::from_bytes(b"x\xff"));
    let msg = format!("{:#}", path_to_key(root, &p).unwrap_err());
    assert!(msg.contains("non-UTF-8"), "unexpected error: {msg}");
}
