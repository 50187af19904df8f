//! Host file fixtures for staging tests

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable "host binary" at `dir/name`
#[allow(dead_code)]
pub fn host_binary(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, Permissions::from_mode(0o755)).unwrap();
    path
}

/// A small host root with `bin/`, `lib/` and `etc/` content
#[allow(dead_code)]
pub fn host_root(root: &Path) -> PathBuf {
    let host = root.join("host");
    host_binary(&host.join("bin"), "busybox", b"\x7fELF busybox");
    std::os::unix::fs::symlink("busybox", host.join("bin/sh")).unwrap();
    std::fs::create_dir_all(host.join("lib/x86_64")).unwrap();
    std::fs::write(host.join("lib/x86_64/libc.so.6"), b"libc").unwrap();
    std::fs::create_dir_all(host.join("etc")).unwrap();
    std::fs::write(host.join("etc/passwd"), b"root:x:0:0::/root:/bin/sh\n").unwrap();
    host
}
