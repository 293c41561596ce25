use globset::{Glob, GlobSetBuilder};
use std::fs;
use webotron_core::walk::{DirWalker, LocalFile, Walker};
use webotron_core::SyncError;

fn collect(w: &DirWalker, root: &std::path::Path) -> Vec<LocalFile> {
    w.walk(root).unwrap().map(|f| f.unwrap()).collect()
}

#[test]
fn yields_posix_keys_for_nested_files_only() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join("css/vendor")).unwrap();
    fs::create_dir_all(root.join("empty_dir")).unwrap();
    fs::write(root.join("index.html"), b"<html>").unwrap();
    fs::write(root.join("css/site.css"), b"").unwrap();
    fs::write(root.join("css/vendor/reset.css"), b"*{}").unwrap();

    let files = collect(&DirWalker::new(), root);
    let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, ["css/site.css", "css/vendor/reset.css", "index.html"]);
    let idx = files.iter().find(|f| f.key == "index.html").unwrap();
    assert_eq!(idx.size, 6);
    assert_eq!(idx.path, root.join("index.html"));
}

#[test]
fn excluded_keys_are_not_yielded() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join(".git/HEAD"), b"ref").unwrap();
    fs::write(root.join("a.txt"), b"a").unwrap();
    fs::write(root.join("b.tmp"), b"b").unwrap();

    let mut b = GlobSetBuilder::new();
    b.add(Glob::new(".git/**").unwrap());
    b.add(Glob::new("*.tmp").unwrap());
    let files = collect(&DirWalker::with_exclude(b.build().unwrap()), root);
    let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, ["a.txt"]);
}

#[test]
fn missing_root_is_a_walk_error() {
    let td = tempfile::tempdir().unwrap();
    let err = DirWalker::new().walk(&td.path().join("missing")).err().unwrap();
    assert!(matches!(err, SyncError::Walk { .. }));
}

#[test]
fn file_root_is_a_walk_error() {
    let td = tempfile::tempdir().unwrap();
    let f = td.path().join("file");
    fs::write(&f, b"x").unwrap();
    let err = DirWalker::new().walk(&f).err().unwrap();
    assert!(err.to_string().contains("not a directory"));
}

#[cfg(target_family = "unix")]
#[test]
fn symlinks_are_skipped_not_followed() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("root");
    let outside = td.path().join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("secret.txt"), b"s").unwrap();
    fs::write(root.join("real.txt"), b"r").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("linkdir")).unwrap();
    std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

    let files = collect(&DirWalker::new(), &root);
    let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, ["real.txt"]);
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_names_fail_the_walk() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    fs::write(root.join("ok.txt"), b"ok").unwrap();
    // Both would render as "x\u{FFFD}" if converted lossily.
    fs::write(root.join(OsStr::from_bytes(b"x\xff")), b"one").unwrap();
    fs::write(root.join(OsStr::from_bytes(b"x\xfe")), b"two").unwrap();

    let results: Vec<_> = DirWalker::new().walk(root).unwrap().collect();
    let keys: Vec<_> =
        results.iter().filter_map(|r| r.as_ref().ok()).map(|f| f.key.as_str()).collect();
    assert_eq!(keys, ["ok.txt"]);
    let errs: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(errs.len(), 2);
    for e in errs {
        assert!(matches!(e, SyncError::Walk { .. }));
        assert!(e.to_string().contains("non-UTF-8"), "unexpected: {e}");
    }
}
