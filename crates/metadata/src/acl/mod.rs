//! POSIX ACL preservation.
//!
//! # Layers
//!
//! - [`native`]: the owned [`NativeAcl`] handle, [`PlatformTraits`] and the
//!   [`AclBackend`] capability trait.
//! - [`unpack_acl`] and [`pack_acl`]: native handle to condensed ACL and back.
//! - Backends: [`ExaclBackend`] (with the `acl` feature on Linux and FreeBSD)
//!   and [`MemoryBackend`].
//! - [`AclSession`]: the per-transfer caches driving send, receive and apply.
//!
//! The condensed model, the dedup cache and the wire codec live in
//! [`protocol::acl`].
//!
//! # Upstream Reference
//!
//! - `acls.c`: `get_acl`, `send_acl`, `receive_acl`, `set_acl`, `cache_acl`,
//!   `match_acl_ids`, `default_perms_for_dir`
//! - `lib/sysacls.c`: the `sys_acl_*` primitives the backends stand in for

mod apply;
mod convert;
#[cfg(all(feature = "acl", any(target_os = "linux", target_os = "freebsd")))]
mod exacl_backend;
mod memory;
pub mod native;
mod session;

pub use apply::change_acl_perms;
pub use convert::{pack_acl, unpack_acl};
#[cfg(all(feature = "acl", any(target_os = "linux", target_os = "freebsd")))]
pub use exacl_backend::ExaclBackend;
pub use memory::MemoryBackend;
pub use native::{AclBackend, AclTag, NativeAcl, NativeEntry, PlatformTraits};
pub use session::{
    AclApplyStatus, AclFileEntry, AclSession, CachedAcl, FileAclIndices, FileAcls,
};
