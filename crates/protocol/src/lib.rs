#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Wire-level building blocks for preserving POSIX ACLs across an rsync
//! session.
//!
//! The crate owns everything both peers must agree on byte for byte: the
//! variable-length integer primitive, the condensed ACL model, the per-kind
//! dedup caches, and the ACL codec. Native ACL handling and filesystem access
//! live in the `metadata` crate.
//!
//! # Examples
//!
//! Send the same default ACL twice; the second send is a one-byte cache
//! reference.
//!
//! ```
//! use protocol::acl::{AclCache, AclType, AclWireOptions, IdAccess, NumericIds, RsyncAcl, send_rsync_acl};
//!
//! let mut acl = RsyncAcl::new();
//! acl.user_obj = 7;
//! acl.group_obj = 5;
//! acl.mask_obj = 7;
//! acl.other_obj = 0;
//! acl.names.push(IdAccess::user(1000, 7));
//!
//! let mut cache = AclCache::new();
//! let mut wire = Vec::new();
//! for _ in 0..2 {
//!     send_rsync_acl(&mut wire, acl.clone(), AclType::Default, &mut cache, &mut NumericIds, AclWireOptions::new())
//!         .expect("writing to a Vec succeeds");
//! }
//! assert_eq!(wire.last(), Some(&0x01));
//! assert_eq!(cache.list(AclType::Default).len(), 1);
//! ```

pub mod acl;
mod varint;

pub use varint::{
    decode_varint, encode_varint_to_vec, read_byte, read_varint, write_byte, write_varint,
};
