//! UID/GID lookups against the local user and group databases.
//!
//! Thin wrappers over `uzers` that speak raw bytes, since names travel over
//! the wire as bytes and need not be UTF-8.

use std::ffi::OsStr;
use std::io;
use std::os::unix::ffi::OsStrExt;

/// Raw user ID type (u32 on all platforms for wire compatibility).
pub type RawUid = u32;

/// Raw group ID type (u32 on all platforms for wire compatibility).
pub type RawGid = u32;

/// Looks up the username for a given UID.
pub fn lookup_user_name(uid: RawUid) -> Result<Option<Vec<u8>>, io::Error> {
    Ok(uzers::get_user_by_uid(uid).map(|user| user.name().as_bytes().to_vec()))
}

/// Looks up the UID for a given username.
pub fn lookup_user_by_name(name: &[u8]) -> Result<Option<RawUid>, io::Error> {
    if name.is_empty() {
        return Ok(None);
    }
    Ok(uzers::get_user_by_name(OsStr::from_bytes(name)).map(|user| user.uid()))
}

/// Looks up the group name for a given GID.
pub fn lookup_group_name(gid: RawGid) -> Result<Option<Vec<u8>>, io::Error> {
    Ok(uzers::get_group_by_gid(gid).map(|group| group.name().as_bytes().to_vec()))
}

/// Looks up the GID for a given group name.
pub fn lookup_group_by_name(name: &[u8]) -> Result<Option<RawGid>, io::Error> {
    if name.is_empty() {
        return Ok(None);
    }
    Ok(uzers::get_group_by_name(OsStr::from_bytes(name)).map(|group| group.gid()))
}
