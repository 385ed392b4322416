//! Condensed POSIX ACLs and their transfer encoding.
//!
//! An ACL travels as a reference into a per-kind cache that both peers grow
//! in the same order. Access and default ACLs have separate caches.
//!
//! # Cache References
//!
//! The sender looks the ACL up in its [`AclList`], starting at the slot that
//! matched last and walking backward with wrap-around, since neighbouring
//! files tend to share an ACL. A hit is written as `index + 1`. A miss writes
//! `0`, appends the ACL to the cache and follows with the literal body: a flag
//! byte naming the present object slots, their values, then the named
//! user/group list. The receiver appends every literal it decodes, so the
//! same index names the same ACL on both sides.
//!
//! # Mode Folding
//!
//! Access ACLs overlap with the file mode. The sender strips the overlapping
//! slots ([`RsyncAcl::strip_perms`]) and the receiver compares with
//! [`RsyncAcl::equal_enough`], so plain permission changes are carried by
//! ordinary mode preservation.
//!
//! # Upstream Reference
//!
//! - `acls.c`: ACL data structures, `send_rsync_acl`, `recv_rsync_acl`
//!   and the `find_matching_rsync_acl` cursor search

mod cache;
mod constants;
mod entry;
mod error;
mod ids;
mod perms;
mod wire;

pub use cache::{AclCache, AclList};
pub use constants::*;
pub use entry::{AclType, IdAccess, IdaEntries, RsyncAcl};
pub use error::{AclProtocolError, STREAM_IO_EXIT_CODE};
pub use ids::{IdMapper, NumericIds};
pub use wire::{
    AclWireOptions, recv_ida_entries, recv_literal_acl, recv_rsync_acl, send_ida_entries,
    send_rsync_acl,
};

/// Tracing target shared by every ACL diagnostic.
pub const ACL_TARGET: &str = "rsync::acl";
