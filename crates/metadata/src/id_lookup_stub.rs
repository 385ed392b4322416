//! No-op UID/GID lookup stubs for non-Unix platforms.
//!
//! Without Unix-style user and group databases every lookup returns `None`,
//! so ids travel numerically.

use std::io;

/// Raw user ID type (u32 on all platforms for wire compatibility).
pub type RawUid = u32;

/// Raw group ID type (u32 on all platforms for wire compatibility).
pub type RawGid = u32;

/// Looks up the username for a given UID. Always `Ok(None)`.
pub fn lookup_user_name(_uid: RawUid) -> Result<Option<Vec<u8>>, io::Error> {
    Ok(None)
}

/// Looks up the UID for a given username. Always `Ok(None)`.
pub fn lookup_user_by_name(_name: &[u8]) -> Result<Option<RawUid>, io::Error> {
    Ok(None)
}

/// Looks up the group name for a given GID. Always `Ok(None)`.
pub fn lookup_group_name(_gid: RawGid) -> Result<Option<Vec<u8>>, io::Error> {
    Ok(None)
}

/// Looks up the GID for a given group name. Always `Ok(None)`.
pub fn lookup_group_by_name(_name: &[u8]) -> Result<Option<RawGid>, io::Error> {
    Ok(None)
}
