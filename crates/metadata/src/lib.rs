#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Native ACL handling and per-file ACL orchestration.
//!
//! This crate sits between the filesystem and the wire codec in
//! [`protocol::acl`]. It reads ACLs through an [`AclBackend`], folds them into
//! the condensed model, drives the per-transfer dedup caches through
//! [`AclSession`], and applies received ACLs back onto destination paths.
//!
//! # Examples
//!
//! Apply a received default ACL to a directory held by the in-memory backend.
//!
//! ```
//! use std::path::Path;
//!
//! use metadata::{AclApplyStatus, AclOptions, AclSession, FileAclIndices, MemoryBackend};
//! use protocol::acl::{AclType, IdAccess, NumericIds, RsyncAcl};
//!
//! let backend = MemoryBackend::new();
//! backend.insert_file("dir", 0o040755);
//!
//! let mut default = RsyncAcl::from_mode(0o750);
//! default.mask_obj = 7;
//! default.names.push(IdAccess::user(1000, 7));
//! let acls = metadata::FileAcls {
//!     mode: 0o040755,
//!     access: None,
//!     default: Some(default.clone()),
//! };
//!
//! let mut sender = AclSession::new(&backend, AclOptions::new());
//! let mut wire = Vec::new();
//! sender.send_acl(&mut wire, acls, &mut NumericIds).unwrap();
//!
//! let mut receiver = AclSession::new(&backend, AclOptions::new());
//! let mut entry = FileAclIndices::new(0o040755);
//! receiver.receive_acl(&mut wire.as_slice(), &mut entry, &mut NumericIds).unwrap();
//!
//! let mut dest = receiver.get_acl(Path::new("dir"), 0o040755).unwrap();
//! let status = receiver.set_acl(Some(Path::new("dir")), &entry, &mut dest);
//! assert!(matches!(status, AclApplyStatus::Changed));
//! assert_eq!(backend.acl(Path::new("dir"), AclType::Default), Some(default));
//! ```

pub mod acl;
mod error;
#[cfg_attr(not(unix), path = "id_lookup_stub.rs")]
pub mod id_lookup;
mod ids;
mod options;

#[cfg(all(feature = "acl", any(target_os = "linux", target_os = "freebsd")))]
#[cfg_attr(
    docsrs,
    doc(cfg(all(feature = "acl", any(target_os = "linux", target_os = "freebsd"))))
)]
pub use acl::ExaclBackend;
pub use acl::{
    AclApplyStatus, AclBackend, AclFileEntry, AclSession, AclTag, CachedAcl, FileAclIndices,
    FileAcls, MemoryBackend, NativeAcl, NativeEntry, PlatformTraits, change_acl_perms, pack_acl,
    unpack_acl,
};
pub use error::{AclError, AclStep, MetadataError, is_unsupported_error};
pub use ids::LocalIdMapper;
pub use options::AclOptions;
