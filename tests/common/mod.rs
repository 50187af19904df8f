use fs_ownership::{lookup_identity, try_get_ownership, Identity, Privilege};
use std::path::Path;

pub mod fixtures;

/// Whether tests run as root
#[allow(dead_code)]
pub fn running_as_root() -> bool {
    Privilege::current().is_root()
}

/// The `nobody` identity, if this host has one
#[allow(dead_code)]
pub fn nobody() -> Option<Identity> {
    lookup_identity("nobody").ok()
}

/// Owner of `path` (following symlinks)
#[allow(dead_code)]
pub fn owner_of(path: &Path) -> Identity {
    let meta = std::fs::metadata(path).unwrap();
    try_get_ownership(&meta).unwrap()
}

/// Identity new files created by this process get
#[allow(dead_code)]
pub fn own_identity(scratch: &Path) -> Identity {
    let marker = scratch.join(".identity-marker");
    std::fs::write(&marker, b"").unwrap();
    let id = owner_of(&marker);
    std::fs::remove_file(&marker).unwrap();
    id
}
