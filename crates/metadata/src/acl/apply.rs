//! Applying received ACLs to destination paths.

use std::io;
use std::path::Path;

use protocol::acl::{ACL_TARGET, AclType, NO_ENTRY, RsyncAcl};
use tracing::{debug, error};

use super::convert::{pack_acl, unpack_acl};
use super::native::{AclBackend, AclTag, NativeAcl, PlatformTraits};
use super::session::{AclApplyStatus, AclFileEntry, AclSession, CachedAcl, FileAcls, is_dir};
use crate::error::{AclError, MetadataError};

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;
const SPECIAL_BITS: u32 = S_ISUID | S_ISGID | S_ISVTX;
const CHMOD_BITS: u32 = 0o7777;
const ACCESSPERMS: u32 = 0o777;

/// Writes the sender's permission bits into a native access ACL.
///
/// The owner, other and (when present or required) mask entries always take
/// their bits from `mode`; the owning-group entry only when the condensed ACL
/// left it to the mode. Group and other bits are withheld while a directory
/// gains the sticky bit or a file drops setuid or setgid, so the new ACL never
/// takes effect together with stale special bits. The later chmod restores
/// them.
///
/// Returns the mode the path will have once the ACL is written. On platforms
/// where setting an ACL clears special bits they are dropped from the result
/// whenever they would otherwise compare equal, so the chmod step still runs.
pub fn change_acl_perms(
    native: &mut NativeAcl,
    acl: &RsyncAcl,
    old_mode: u32,
    mode: u32,
    traits: PlatformTraits,
) -> Result<u32, AclError> {
    let mut old_mode = old_mode;
    let mut mode = mode;

    if is_dir(mode) {
        let gains_sticky = if traits.loses_special_mode_bits {
            mode & S_ISVTX != 0
        } else {
            mode & S_ISVTX != 0 && old_mode & S_ISVTX == 0
        };
        if gains_sticky {
            mode &= !0o077;
        }
    } else if !traits.loses_special_mode_bits {
        let drops = |bit: u32| old_mode & bit != 0 && mode & bit == 0;
        if drops(S_ISUID) || drops(S_ISGID) {
            mode &= !0o077;
        }
    }

    let updates: Vec<(usize, u32)> = native
        .entries()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let bits = match entry.tag {
                AclTag::UserObj => (mode >> 6) & 7,
                AclTag::GroupObj if acl.group_obj == NO_ENTRY => (mode >> 3) & 7,
                AclTag::Mask if traits.needs_mask || acl.mask_obj != NO_ENTRY => (mode >> 3) & 7,
                AclTag::Other => mode & 7,
                _ => return None,
            };
            Some((index, bits))
        })
        .collect();
    for (index, bits) in updates {
        native.set_perms(index, bits)?;
    }

    if traits.loses_special_mode_bits
        && old_mode & SPECIAL_BITS != 0
        && old_mode & CHMOD_BITS == mode & CHMOD_BITS
    {
        old_mode &= !SPECIAL_BITS;
    }

    Ok((old_mode & !ACCESSPERMS) | (mode & ACCESSPERMS))
}

fn set_rsync_acl<B: AclBackend>(
    backend: &B,
    path: &Path,
    cached: &mut CachedAcl,
    acl_type: AclType,
    dest: &mut FileAcls,
    mode: u32,
) -> Result<(), MetadataError> {
    let traits = backend.traits();
    let (acl, slot) = cached.parts_mut();

    if acl_type == AclType::Default && acl.user_obj == NO_ENTRY {
        return backend.delete_default(path).map_err(|err| {
            error!(target: ACL_TARGET, path = %path.display(), "set_acl: {err}");
            MetadataError::from_acl("delete default ACL", path, err)
        });
    }

    let fail = |err: AclError| {
        error!(target: ACL_TARGET, path = %path.display(), %acl_type, "set_acl: {err}");
        MetadataError::from_acl("set ACL", path, err)
    };

    let native = match slot.take() {
        Some(native) => native,
        None => pack_acl(acl, traits).map_err(fail)?,
    };
    let native = slot.insert(native);

    let mut new_mode = dest.mode;
    if acl_type == AclType::Access {
        new_mode = change_acl_perms(native, acl, dest.mode, mode, traits).map_err(fail)?;
    }

    backend.set_file(path, acl_type, native).map_err(fail)?;

    if acl_type == AclType::Access {
        dest.mode = new_mode;
    }
    Ok(())
}

impl<B: AclBackend> AclSession<B> {
    /// Applies `entry`'s cached ACLs to `path`, whose current state is `dest`.
    ///
    /// The access ACL is compared with [`RsyncAcl::equal_enough`] so that
    /// differences carried by the mode do not count; the default ACL of a
    /// directory must match exactly. A cached default without an owner entry
    /// removes the destination's default ACL. With `path` set to `None`, or
    /// during a dry run, nothing is written and only the difference is
    /// reported.
    ///
    /// Writing an access ACL also sets the permission bits, so `dest.mode` is
    /// updated to the mode now on disk.
    pub fn set_acl<E>(
        &mut self,
        path: Option<&Path>,
        entry: &E,
        dest: &mut FileAcls,
    ) -> AclApplyStatus
    where
        E: AclFileEntry + ?Sized,
    {
        if self.options.forbids_writes() {
            let path = path.unwrap_or_else(|| Path::new("."));
            return AclApplyStatus::Failed(MetadataError::new(
                "set ACL",
                path,
                io::Error::from(io::ErrorKind::ReadOnlyFilesystem),
            ));
        }

        let write_to = if self.options.is_dry_run() { None } else { path };
        let mode = entry.mode();
        let Self {
            backend, received, ..
        } = self;
        let mut status = AclApplyStatus::Unchanged;

        let cached = entry
            .acl_index()
            .and_then(|index| received.get_mut(AclType::Access, index as usize));
        if let Some(cached) = cached {
            let eq = dest
                .access
                .as_ref()
                .is_some_and(|current| current.equal_enough(cached.acl(), mode));
            if !eq {
                status = AclApplyStatus::Changed;
                if let Some(path) = write_to
                    && let Err(err) =
                        set_rsync_acl(&*backend, path, cached, AclType::Access, dest, mode)
                {
                    status = AclApplyStatus::Failed(err);
                }
            }
        }

        if !dest.is_dir() {
            return status;
        }

        let cached = entry
            .default_acl_index()
            .and_then(|index| received.get_mut(AclType::Default, index as usize));
        if let Some(cached) = cached
            && dest.default.as_ref() != Some(cached.acl())
        {
            if !status.is_changed() {
                status = AclApplyStatus::Changed;
            }
            if let Some(path) = write_to
                && let Err(err) =
                    set_rsync_acl(&*backend, path, cached, AclType::Default, dest, mode)
            {
                if status.is_failed() {
                    error!(target: ACL_TARGET, "{err}");
                } else {
                    status = AclApplyStatus::Failed(err);
                }
            }
        }

        status
    }

    /// Returns the permission bits a new entry created in `dir` receives.
    ///
    /// Starts from `0o777` less the process umask and lets the directory's
    /// default ACL override it. `None` means the current directory.
    pub fn default_perms_for_dir(&self, dir: Option<&Path>) -> u32 {
        let dir = dir.unwrap_or_else(|| Path::new("."));
        let perms = ACCESSPERMS & !self.options.umask();

        let native = match self.backend.get_file(dir, AclType::Default) {
            Ok(native) => native,
            Err(AclError::Unsupported) => return perms,
            Err(AclError::Native { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound && self.options.is_dry_run() =>
            {
                return perms;
            }
            Err(err) => {
                error!(
                    target: ACL_TARGET,
                    dir = %dir.display(),
                    "default_perms_for_dir: {err}, falling back on umask"
                );
                return perms;
            }
        };

        let acl = match unpack_acl(&native, self.backend.traits()) {
            Ok(acl) => acl,
            Err(err) => {
                error!(
                    target: ACL_TARGET,
                    dir = %dir.display(),
                    "default_perms_for_dir: {err}, falling back on umask"
                );
                return perms;
            }
        };

        if acl.user_obj == NO_ENTRY {
            return perms;
        }
        match acl.get_perms() {
            Some(acl_perms) => {
                debug!(
                    target: ACL_TARGET,
                    dir = %dir.display(),
                    "got ACL-based default perms {acl_perms:o}"
                );
                acl_perms
            }
            None => perms,
        }
    }
}
