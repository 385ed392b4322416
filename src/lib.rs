#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! POSIX ACL preservation for rsync-compatible transfers.
//!
//! The work is split across two crates:
//!
//! - [`protocol`]: the condensed ACL model, mode folding, the per-kind dedup
//!   caches and the wire codec both peers must agree on.
//! - [`metadata`]: native ACL backends, the translation between native
//!   handles and the condensed model, and [`AclSession`], which drives
//!   sending, receiving and applying ACLs for one side of a transfer.
//!
//! Diagnostics are emitted through `tracing` under the [`ACL_TARGET`] target.

pub use metadata;
pub use protocol;

#[cfg(all(feature = "acl", any(target_os = "linux", target_os = "freebsd")))]
pub use metadata::ExaclBackend;
pub use metadata::{
    AclApplyStatus, AclBackend, AclError, AclFileEntry, AclOptions, AclSession, AclStep,
    FileAclIndices, FileAcls, LocalIdMapper, MemoryBackend, MetadataError, PlatformTraits,
};
pub use protocol::acl::{
    ACL_TARGET, AclProtocolError, AclType, IdAccess, IdMapper, NumericIds, RsyncAcl,
};
