//! POSIX.1e backend on top of the `exacl` crate.
//!
//! `exacl` exposes ACL entries with textual qualifiers: owner entries carry an
//! empty name and named entries carry a user or group name (or the decimal id
//! when the id has no name). This module maps those entries to and from
//! [`NativeAcl`] handles keyed by numeric id.

use std::path::Path;

use exacl::{AclEntry, AclEntryKind, AclOption, Flag, Perm};
use protocol::acl::{ACL_TARGET, AclType};
use tracing::trace;

use super::native::{AclBackend, AclTag, NativeAcl, NativeEntry, PlatformTraits};
use crate::error::{AclError, AclStep};
use crate::id_lookup::{lookup_group_by_name, lookup_user_by_name};

/// Backend reading and writing the platform's POSIX ACLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExaclBackend;

impl ExaclBackend {
    /// Creates the backend.
    pub const fn new() -> Self {
        Self
    }
}

const fn option_for(acl_type: AclType) -> AclOption {
    match acl_type {
        AclType::Access => AclOption::ACCESS_ACL,
        AclType::Default => AclOption::DEFAULT_ACL,
    }
}

fn perm_bits(perms: Perm) -> u32 {
    let mut bits = 0;
    if perms.contains(Perm::READ) {
        bits |= 4;
    }
    if perms.contains(Perm::WRITE) {
        bits |= 2;
    }
    if perms.contains(Perm::EXECUTE) {
        bits |= 1;
    }
    bits
}

fn perm_from_bits(bits: u32) -> Perm {
    let mut perms = Perm::empty();
    if bits & 4 != 0 {
        perms |= Perm::READ;
    }
    if bits & 2 != 0 {
        perms |= Perm::WRITE;
    }
    if bits & 1 != 0 {
        perms |= Perm::EXECUTE;
    }
    perms
}

/// Resolves an entry's qualifier text to a numeric id.
fn qualifier_id(name: &str, user: bool) -> Result<u32, AclError> {
    if let Ok(id) = name.parse::<u32>() {
        return Ok(id);
    }
    let found = if user {
        lookup_user_by_name(name.as_bytes())
    } else {
        lookup_group_by_name(name.as_bytes())
    };
    match found {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(AclError::invalid(
            AclStep::GetQualifier,
            "ACL qualifier names no known id",
        )),
        Err(error) => Err(AclError::from_io(AclStep::GetQualifier, error)),
    }
}

fn entry_from_exacl(entry: &AclEntry) -> Result<NativeEntry, AclError> {
    let perms = perm_bits(entry.perms);
    let (tag, qualifier) = match entry.kind {
        _ if !entry.allow => (AclTag::Unknown, None),
        AclEntryKind::User if entry.name.is_empty() => (AclTag::UserObj, None),
        AclEntryKind::User => (AclTag::User, Some(qualifier_id(&entry.name, true)?)),
        AclEntryKind::Group if entry.name.is_empty() => (AclTag::GroupObj, None),
        AclEntryKind::Group => (AclTag::Group, Some(qualifier_id(&entry.name, false)?)),
        AclEntryKind::Mask => (AclTag::Mask, None),
        AclEntryKind::Other => (AclTag::Other, None),
        _ => (AclTag::Unknown, None),
    };
    Ok(NativeEntry {
        tag,
        qualifier,
        perms,
    })
}

fn entry_to_exacl(entry: &NativeEntry, flags: Option<Flag>) -> Result<AclEntry, AclError> {
    let perms = perm_from_bits(entry.perms);
    let id_text = || {
        entry.qualifier.map(|id| id.to_string()).ok_or_else(|| {
            AclError::invalid(AclStep::SetQualifier, "named ACL entry without id")
        })
    };
    let converted = match entry.tag {
        AclTag::UserObj => AclEntry::allow_user("", perms, flags),
        AclTag::User => AclEntry::allow_user(&id_text()?, perms, flags),
        AclTag::GroupObj => AclEntry::allow_group("", perms, flags),
        AclTag::Group => AclEntry::allow_group(&id_text()?, perms, flags),
        AclTag::Mask => AclEntry::allow_mask(perms, flags),
        AclTag::Other => AclEntry::allow_other(perms, flags),
        AclTag::Unknown => {
            return Err(AclError::invalid(AclStep::SetTagType, "unknown ACL tag"));
        }
    };
    Ok(converted)
}

impl AclBackend for ExaclBackend {
    fn traits(&self) -> PlatformTraits {
        PlatformTraits::native()
    }

    fn get_file(&self, path: &Path, acl_type: AclType) -> Result<NativeAcl, AclError> {
        let entries = exacl::getfacl(path, option_for(acl_type))
            .map_err(|error| AclError::from_io(AclStep::GetFile, error))?;
        trace!(
            target: ACL_TARGET,
            path = %path.display(),
            %acl_type,
            count = entries.len(),
            "read native ACL"
        );
        let entries = entries
            .iter()
            .map(entry_from_exacl)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NativeAcl::from_entries(entries))
    }

    fn set_file(&self, path: &Path, acl_type: AclType, acl: &NativeAcl) -> Result<(), AclError> {
        let flags = match acl_type {
            AclType::Access => None,
            AclType::Default => Some(Flag::DEFAULT),
        };
        let entries = acl
            .entries()
            .iter()
            .map(|entry| entry_to_exacl(entry, flags))
            .collect::<Result<Vec<_>, _>>()?;
        exacl::setfacl(&[path], &entries, option_for(acl_type))
            .map_err(|error| AclError::from_io(AclStep::SetFile, error))
    }

    fn delete_default(&self, path: &Path) -> Result<(), AclError> {
        // An empty default list removes the default ACL.
        exacl::setfacl(&[path], &[], AclOption::DEFAULT_ACL)
            .map_err(|error| AclError::from_io(AclStep::DeleteDefFile, error))
    }
}
