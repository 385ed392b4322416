//! Per-transfer ACL state: the sender and receiver caches plus the backend.
//!
//! Both peers build their caches in the order entries travel over the wire, so
//! one [`AclSession`] exists per peer and per transfer. Nothing is global;
//! several sessions can coexist in one process.

use std::borrow::Borrow;
use std::io::{Read, Write};
use std::path::Path;

use protocol::acl::{
    ACL_TARGET, AclCache, AclProtocolError, AclType, IdMapper, RsyncAcl, recv_rsync_acl,
    send_rsync_acl,
};
use tracing::{error, trace};

use super::convert::unpack_acl;
use super::native::{AclBackend, NativeAcl};
use crate::error::{AclError, MetadataError};
use crate::options::AclOptions;

pub(crate) const S_IFMT: u32 = 0o170000;
pub(crate) const S_IFDIR: u32 = 0o040000;

pub(crate) const fn is_dir(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}

/// File-list entry fields the ACL code reads and writes.
///
/// Indices refer to the receiver cache of the matching kind. The default
/// index is only meaningful for directories.
pub trait AclFileEntry {
    /// Returns the entry's `st_mode` as sent by the peer.
    fn mode(&self) -> u32;

    /// Returns the access ACL cache index.
    fn acl_index(&self) -> Option<u32>;

    /// Records the access ACL cache index.
    fn set_acl_index(&mut self, index: Option<u32>);

    /// Returns the default ACL cache index.
    fn default_acl_index(&self) -> Option<u32>;

    /// Records the default ACL cache index.
    fn set_default_acl_index(&mut self, index: Option<u32>);
}

/// Minimal [`AclFileEntry`]: a mode plus the two cache indices.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileAclIndices {
    /// The entry's mode.
    pub mode: u32,
    /// Access ACL cache index.
    pub access: Option<u32>,
    /// Default ACL cache index (directories only).
    pub default: Option<u32>,
}

impl FileAclIndices {
    /// Creates an entry with no ACL indices.
    pub const fn new(mode: u32) -> Self {
        Self {
            mode,
            access: None,
            default: None,
        }
    }
}

impl AclFileEntry for FileAclIndices {
    fn mode(&self) -> u32 {
        self.mode
    }

    fn acl_index(&self) -> Option<u32> {
        self.access
    }

    fn set_acl_index(&mut self, index: Option<u32>) {
        self.access = index;
    }

    fn default_acl_index(&self) -> Option<u32> {
        self.default
    }

    fn set_default_acl_index(&mut self, index: Option<u32>) {
        self.default = index;
    }
}

/// ACLs read from one path, together with the mode they were read under.
///
/// On the receiving side this describes the destination and
/// [`AclSession::set_acl`] updates `mode` after writing an access ACL.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileAcls {
    /// `st_mode` of the path.
    pub mode: u32,
    /// Access ACL, if read.
    pub access: Option<RsyncAcl>,
    /// Default ACL, if read (directories only).
    pub default: Option<RsyncAcl>,
}

impl FileAcls {
    /// Creates a record with no ACLs.
    pub const fn new(mode: u32) -> Self {
        Self {
            mode,
            access: None,
            default: None,
        }
    }

    /// Returns true if the recorded mode is a directory.
    pub const fn is_dir(&self) -> bool {
        is_dir(self.mode)
    }
}

/// Receiver cache slot: the condensed ACL and its native handle.
///
/// The handle is built the first time the slot is applied and reused for
/// every later file that references the same slot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CachedAcl {
    acl: RsyncAcl,
    native: Option<NativeAcl>,
}

impl CachedAcl {
    /// Returns the condensed ACL.
    pub const fn acl(&self) -> &RsyncAcl {
        &self.acl
    }

    /// Returns the native handle, once built.
    pub const fn native(&self) -> Option<&NativeAcl> {
        self.native.as_ref()
    }

    pub(crate) fn parts_mut(&mut self) -> (&RsyncAcl, &mut Option<NativeAcl>) {
        (&self.acl, &mut self.native)
    }
}

impl From<RsyncAcl> for CachedAcl {
    fn from(acl: RsyncAcl) -> Self {
        Self { acl, native: None }
    }
}

impl Borrow<RsyncAcl> for CachedAcl {
    fn borrow(&self) -> &RsyncAcl {
        &self.acl
    }
}

/// Outcome of applying a file's ACLs.
#[derive(Debug)]
pub enum AclApplyStatus {
    /// Destination ACLs already matched.
    Unchanged,
    /// At least one ACL differed (and was written unless only checking).
    Changed,
    /// Writing failed; the first failure is kept.
    Failed(MetadataError),
}

impl AclApplyStatus {
    /// Returns true unless the status is [`Unchanged`](Self::Unchanged).
    pub const fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// Returns true for [`Failed`](Self::Failed).
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the failure, if any.
    pub fn into_error(self) -> Option<MetadataError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// ACL state for one side of one transfer.
#[derive(Debug)]
pub struct AclSession<B> {
    pub(crate) backend: B,
    pub(crate) options: AclOptions,
    sent: AclCache<RsyncAcl>,
    pub(crate) received: AclCache<CachedAcl>,
}

impl<B: AclBackend> AclSession<B> {
    /// Creates a session with empty caches.
    pub fn new(backend: B, options: AclOptions) -> Self {
        Self {
            backend,
            options,
            sent: AclCache::new(),
            received: AclCache::new(),
        }
    }

    /// Returns the native backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the session policy.
    pub const fn options(&self) -> &AclOptions {
        &self.options
    }

    /// Returns the cache of ACLs already sent.
    pub const fn sent_cache(&self) -> &AclCache<RsyncAcl> {
        &self.sent
    }

    /// Returns the cache of ACLs received (or cached locally).
    pub const fn received_cache(&self) -> &AclCache<CachedAcl> {
        &self.received
    }

    fn read_acl(&self, path: &Path, acl_type: AclType) -> Result<RsyncAcl, AclError> {
        let native = self.backend.get_file(path, acl_type)?;
        unpack_acl(&native, self.backend.traits())
    }

    /// Reads the access ACL of `path`, and the default ACL if `mode` is a
    /// directory.
    ///
    /// Without ACL support the access ACL is synthesized from `mode` and the
    /// default ACL is empty.
    pub fn get_acl(&self, path: &Path, mode: u32) -> Result<FileAcls, MetadataError> {
        let read = |acl_type: AclType| match self.read_acl(path, acl_type) {
            Ok(acl) => Ok(acl),
            Err(AclError::Unsupported) => Ok(match acl_type {
                AclType::Access => RsyncAcl::from_mode(mode),
                AclType::Default => RsyncAcl::new(),
            }),
            Err(err) => {
                error!(
                    target: ACL_TARGET,
                    path = %path.display(),
                    %acl_type,
                    "get_acl: {err}"
                );
                Err(MetadataError::from_acl("read ACL", path, err))
            }
        };

        let access = read(AclType::Access)?;
        let default = if is_dir(mode) {
            Some(read(AclType::Default)?)
        } else {
            None
        };

        Ok(FileAcls {
            mode,
            access: Some(access),
            default,
        })
    }

    /// Sends the ACLs of one file-list entry.
    ///
    /// The access ACL loses its mode-derived slots first; the default ACL of
    /// a directory is sent as read. A missing access ACL is synthesized from
    /// the mode.
    pub fn send_acl<W, M>(
        &mut self,
        writer: &mut W,
        acls: FileAcls,
        ids: &mut M,
    ) -> std::io::Result<()>
    where
        W: Write + ?Sized,
        M: IdMapper + ?Sized,
    {
        let wire = self.options.wire_options();
        let is_dir = acls.is_dir();
        let FileAcls {
            mode,
            access,
            default,
        } = acls;

        let mut access = access.unwrap_or_else(|| RsyncAcl::from_mode(mode));
        access.strip_perms();
        send_rsync_acl(writer, access, AclType::Access, &mut self.sent, ids, wire)?;

        if is_dir {
            let default = default.unwrap_or_default();
            send_rsync_acl(writer, default, AclType::Default, &mut self.sent, ids, wire)?;
        }
        Ok(())
    }

    /// Receives the ACL references for `entry` and stores the indices on it.
    pub fn receive_acl<R, E, M>(
        &mut self,
        reader: &mut R,
        entry: &mut E,
        ids: &mut M,
    ) -> Result<(), AclProtocolError>
    where
        R: Read + ?Sized,
        E: AclFileEntry + ?Sized,
        M: IdMapper + ?Sized,
    {
        let wire = self.options.wire_options();
        let index = recv_rsync_acl(reader, AclType::Access, &mut self.received, ids, wire)?;
        entry.set_acl_index(Some(index as u32));

        if is_dir(entry.mode()) {
            let index = recv_rsync_acl(reader, AclType::Default, &mut self.received, ids, wire)?;
            entry.set_default_acl_index(Some(index as u32));
        }
        Ok(())
    }

    /// Caches locally read ACLs and stores the indices on `entry`.
    ///
    /// Used when this side reads ACLs itself instead of receiving them. A
    /// missing ACL leaves its index unset.
    pub fn cache_acl<E>(&mut self, entry: &mut E, acls: FileAcls)
    where
        E: AclFileEntry + ?Sized,
    {
        let is_dir = acls.is_dir();
        let index = self.cache_one(acls.access, AclType::Access);
        entry.set_acl_index(index);

        if is_dir {
            let index = self.cache_one(acls.default, AclType::Default);
            entry.set_default_acl_index(index);
        }
    }

    fn cache_one(&mut self, acl: Option<RsyncAcl>, acl_type: AclType) -> Option<u32> {
        let acl = acl?;
        let index = match self.received.find(&acl, acl_type) {
            Some(index) => index,
            None => self.received.store(CachedAcl::from(acl), acl_type),
        };
        Some(index as u32)
    }

    /// Remaps every named id in the receiver caches.
    ///
    /// Called once after a non-incremental file list has arrived, when the
    /// peer's names are known. Native handles built so far are discarded.
    pub fn match_acl_ids<M>(&mut self, ids: &mut M)
    where
        M: IdMapper + ?Sized,
    {
        for acl_type in [AclType::Access, AclType::Default] {
            for cached in self.received.list_mut(acl_type).iter_mut() {
                for ida in cached.acl.names.iter_mut() {
                    ida.id = if ida.is_user() {
                        ids.match_uid(ida.id)
                    } else {
                        ids.match_gid(ida.id)
                    };
                }
                cached.native = None;
            }
            trace!(target: ACL_TARGET, %acl_type, "remapped cached ACL ids");
        }
    }
}
