//! In-process ACL backend.
//!
//! Keeps a per-path table of mode bits and native ACLs. Receivers use it for
//! dry runs against a snapshot, and the tests use it to exercise the apply
//! logic with injected failures on any platform.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};

use protocol::acl::{AclType, RsyncAcl};
use rustc_hash::{FxHashMap, FxHashSet};

use super::convert::{pack_acl, unpack_acl};
use super::native::{AclBackend, AclTag, NativeAcl, PlatformTraits};
use crate::error::{AclError, AclStep};

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;

#[derive(Clone, Debug, Default)]
struct MemoryFile {
    mode: u32,
    access: Option<NativeAcl>,
    default: Option<NativeAcl>,
}

/// ACL backend that stores everything in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    traits: PlatformTraits,
    unsupported: bool,
    files: RefCell<FxHashMap<PathBuf, MemoryFile>>,
    failing: RefCell<FxHashSet<PathBuf>>,
    set_calls: Cell<usize>,
    delete_calls: Cell<usize>,
}

impl MemoryBackend {
    /// Creates an empty backend with plain POSIX traits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the platform traits reported to callers.
    #[must_use]
    pub fn with_traits(mut self, traits: PlatformTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Makes every read report that ACLs are unsupported.
    #[must_use]
    pub fn unsupported(mut self) -> Self {
        self.unsupported = true;
        self
    }

    /// Registers `path` with the given `st_mode`.
    pub fn insert_file(&self, path: impl Into<PathBuf>, mode: u32) {
        self.files.borrow_mut().insert(
            path.into(),
            MemoryFile {
                mode,
                ..MemoryFile::default()
            },
        );
    }

    /// Replaces the mode of a registered path.
    pub fn set_mode(&self, path: &Path, mode: u32) {
        if let Some(file) = self.files.borrow_mut().get_mut(path) {
            file.mode = mode;
        }
    }

    /// Returns the current mode of `path`.
    pub fn mode(&self, path: &Path) -> Option<u32> {
        self.files.borrow().get(path).map(|file| file.mode)
    }

    /// Stores `acl` on `path` as if set by another tool.
    ///
    /// Unlike [`AclBackend::set_file`] this does not touch the mode.
    pub fn seed_acl(&self, path: &Path, acl_type: AclType, acl: &RsyncAcl) -> Result<(), AclError> {
        let native = pack_acl(acl, self.traits)?;
        let mut files = self.files.borrow_mut();
        let file = files.entry(path.to_path_buf()).or_default();
        match acl_type {
            AclType::Access => file.access = Some(native),
            AclType::Default => file.default = Some(native),
        }
        Ok(())
    }

    /// Returns the stored ACL of `path`, if one was ever set.
    pub fn acl(&self, path: &Path, acl_type: AclType) -> Option<RsyncAcl> {
        let files = self.files.borrow();
        let file = files.get(path)?;
        let native = match acl_type {
            AclType::Access => file.access.as_ref(),
            AclType::Default => file.default.as_ref(),
        }?;
        unpack_acl(native, self.traits).ok()
    }

    /// Makes every write to `path` fail with `EACCES`.
    pub fn fail_writes(&self, path: impl Into<PathBuf>) {
        self.failing.borrow_mut().insert(path.into());
    }

    /// Returns the number of successful `set_file` calls.
    pub fn set_calls(&self) -> usize {
        self.set_calls.get()
    }

    /// Returns the number of successful `delete_default` calls.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.get()
    }

    fn check_writable(&self, path: &Path, step: AclStep) -> Result<(), AclError> {
        if self.failing.borrow().contains(path) {
            return Err(AclError::from_io(
                step,
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(())
    }
}

fn not_found(step: AclStep) -> AclError {
    AclError::from_io(step, io::Error::from(io::ErrorKind::NotFound))
}

/// Permission word the kernel derives from an access ACL.
fn mode_from_native(native: &NativeAcl) -> u32 {
    let perms = |tag: AclTag| {
        native
            .entries()
            .iter()
            .find(|entry| entry.tag == tag)
            .map(|entry| entry.perms)
    };
    let user = perms(AclTag::UserObj).unwrap_or(0);
    let group = perms(AclTag::Mask)
        .or_else(|| perms(AclTag::GroupObj))
        .unwrap_or(0);
    let other = perms(AclTag::Other).unwrap_or(0);
    (user << 6) | (group << 3) | other
}

impl AclBackend for MemoryBackend {
    fn traits(&self) -> PlatformTraits {
        self.traits
    }

    fn get_file(&self, path: &Path, acl_type: AclType) -> Result<NativeAcl, AclError> {
        if self.unsupported {
            return Err(AclError::Unsupported);
        }
        let files = self.files.borrow();
        let file = files.get(path).ok_or_else(|| not_found(AclStep::GetFile))?;
        let stored = match acl_type {
            AclType::Access => file.access.clone(),
            AclType::Default => file.default.clone(),
        };
        match (stored, acl_type) {
            (Some(native), _) => Ok(native),
            (None, AclType::Access) => pack_acl(&RsyncAcl::from_mode(file.mode), self.traits),
            (None, AclType::Default) => Ok(NativeAcl::default()),
        }
    }

    fn set_file(&self, path: &Path, acl_type: AclType, acl: &NativeAcl) -> Result<(), AclError> {
        if self.unsupported {
            return Err(AclError::Unsupported);
        }
        self.check_writable(path, AclStep::SetFile)?;

        let mut files = self.files.borrow_mut();
        let file = files
            .get_mut(path)
            .ok_or_else(|| not_found(AclStep::SetFile))?;
        match acl_type {
            AclType::Access => {
                let mut mode = (file.mode & !0o777) | mode_from_native(acl);
                if self.traits.loses_special_mode_bits {
                    mode &= !(S_ISUID | S_ISGID | S_ISVTX);
                }
                file.mode = mode;
                file.access = Some(acl.clone());
            }
            AclType::Default => file.default = Some(acl.clone()),
        }
        self.set_calls.set(self.set_calls.get() + 1);
        Ok(())
    }

    fn delete_default(&self, path: &Path) -> Result<(), AclError> {
        if self.unsupported {
            return Err(AclError::Unsupported);
        }
        self.check_writable(path, AclStep::DeleteDefFile)?;

        let mut files = self.files.borrow_mut();
        let file = files
            .get_mut(path)
            .ok_or_else(|| not_found(AclStep::DeleteDefFile))?;
        file.default = None;
        self.delete_calls.set(self.delete_calls.get() + 1);
        Ok(())
    }
}
