//! Backend-neutral native ACL handle and the capability interface.
//!
//! A [`NativeAcl`] is the in-process image of a POSIX.1e `acl_t`: an ordered
//! list of tagged entries. Backends translate it to and from the platform's
//! representation; [`unpack_acl`](super::unpack_acl) and
//! [`pack_acl`](super::pack_acl) translate it to and from the condensed model.

use std::path::Path;

use protocol::acl::AclType;

use crate::error::{AclError, AclStep};

/// Tag of a native ACL entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AclTag {
    /// The owning user (`ACL_USER_OBJ`).
    UserObj,
    /// A named user (`ACL_USER`), qualified by uid.
    User,
    /// The owning group (`ACL_GROUP_OBJ`).
    GroupObj,
    /// A named group (`ACL_GROUP`), qualified by gid.
    Group,
    /// The mask (`ACL_MASK`).
    Mask,
    /// Everyone else (`ACL_OTHER`).
    Other,
    /// A tag this crate does not model; skipped on read.
    Unknown,
}

impl AclTag {
    /// Returns true for tags that carry an id qualifier.
    pub const fn is_named(self) -> bool {
        matches!(self, Self::User | Self::Group)
    }
}

/// One entry of a native ACL.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NativeEntry {
    /// Entry tag.
    pub tag: AclTag,
    /// Uid or gid for named entries.
    pub qualifier: Option<u32>,
    /// `rwx` permission bits.
    pub perms: u32,
}

/// Owned native ACL handle.
///
/// Dropping the handle releases it, so a partially built handle is freed on
/// every early return.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NativeAcl {
    entries: Vec<NativeEntry>,
}

impl NativeAcl {
    /// Allocates an empty handle with room for `count` entries (`acl_init`).
    pub fn with_capacity(count: usize) -> Self {
        Self {
            entries: Vec::with_capacity(count),
        }
    }

    /// Wraps entries read verbatim from a platform ACL.
    ///
    /// No validation happens here; the reader in
    /// [`unpack_acl`](super::unpack_acl) tolerates duplicates and unknown tags.
    pub const fn from_entries(entries: Vec<NativeEntry>) -> Self {
        Self { entries }
    }

    /// Returns the entries in native order.
    pub fn entries(&self) -> &[NativeEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the handle holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new entry and returns its position.
    ///
    /// Fails with the step a C backend would have failed at: an unknown tag
    /// at `acl_set_tag_type`, a missing or superfluous qualifier at
    /// `acl_set_qualifier`, and bits outside `rwx` at `acl_set_permset`.
    pub fn create_entry(
        &mut self,
        tag: AclTag,
        qualifier: Option<u32>,
        perms: u32,
    ) -> Result<usize, AclError> {
        if tag == AclTag::Unknown {
            return Err(AclError::invalid(AclStep::SetTagType, "unknown ACL tag"));
        }
        if tag.is_named() != qualifier.is_some() {
            return Err(AclError::invalid(
                AclStep::SetQualifier,
                "qualifier does not match tag",
            ));
        }
        check_perms(perms)?;

        self.entries.push(NativeEntry {
            tag,
            qualifier,
            perms,
        });
        Ok(self.entries.len() - 1)
    }

    /// Rewrites the permission bits of the entry at `index`.
    pub fn set_perms(&mut self, index: usize, perms: u32) -> Result<(), AclError> {
        check_perms(perms)?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| AclError::invalid(AclStep::GetEntry, "no such ACL entry"))?;
        entry.perms = perms;
        Ok(())
    }

    /// Checks POSIX.1e consistency (`acl_valid`).
    ///
    /// An empty handle is valid (it stands for "no default ACL"). Otherwise
    /// exactly one owner, owning-group and other entry must exist, a mask is
    /// required once named entries are present, and no id may repeat within
    /// its kind.
    pub fn validate(&self) -> Result<(), AclError> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let count = |tag: AclTag| self.entries.iter().filter(|e| e.tag == tag).count();
        let named = count(AclTag::User) + count(AclTag::Group);
        let masks = count(AclTag::Mask);

        let well_formed = count(AclTag::UserObj) == 1
            && count(AclTag::GroupObj) == 1
            && count(AclTag::Other) == 1
            && count(AclTag::Unknown) == 0
            && masks <= 1
            && (named == 0 || masks == 1)
            && !self.has_duplicate_qualifiers();

        if well_formed {
            Ok(())
        } else {
            Err(AclError::invalid(AclStep::Valid, "ACL is not valid"))
        }
    }

    fn has_duplicate_qualifiers(&self) -> bool {
        self.entries.iter().enumerate().any(|(i, a)| {
            a.tag.is_named()
                && self.entries[i + 1..]
                    .iter()
                    .any(|b| b.tag == a.tag && b.qualifier == a.qualifier)
        })
    }
}

fn check_perms(perms: u32) -> Result<(), AclError> {
    if perms & !0o7 != 0 {
        return Err(AclError::invalid(
            AclStep::SetPermset,
            "permission bits out of range",
        ));
    }
    Ok(())
}

/// Platform quirks the adapter and the apply step honor.
///
/// Computed once per backend instead of being scattered through the code as
/// conditional compilation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformTraits {
    /// Every native ACL must carry a mask entry.
    pub needs_mask: bool,
    /// Named entries must be grouped users first, each group sorted by id.
    pub needs_sort: bool,
    /// Setting an ACL clears setuid, setgid and sticky bits.
    pub loses_special_mode_bits: bool,
}

impl PlatformTraits {
    /// Plain POSIX.1e behavior: no forced mask, no sorting, special bits kept.
    pub const POSIX: Self = Self {
        needs_mask: false,
        needs_sort: false,
        loses_special_mode_bits: false,
    };

    /// Returns the traits of the platform this binary was built for.
    pub const fn native() -> Self {
        if cfg!(target_os = "freebsd") {
            Self {
                loses_special_mode_bits: true,
                ..Self::POSIX
            }
        } else {
            Self::POSIX
        }
    }
}

/// Capability interface over a platform's ACL primitives.
///
/// `get_file` reports [`AclError::Unsupported`] when the filesystem has no
/// ACLs; every other failure names the failing [`AclStep`].
pub trait AclBackend {
    /// Returns the quirks of this backend's platform.
    fn traits(&self) -> PlatformTraits;

    /// Reads `path`'s ACL of the given kind. A directory without a default
    /// ACL yields an empty handle.
    fn get_file(&self, path: &Path, acl_type: AclType) -> Result<NativeAcl, AclError>;

    /// Replaces `path`'s ACL of the given kind.
    fn set_file(&self, path: &Path, acl_type: AclType, acl: &NativeAcl) -> Result<(), AclError>;

    /// Removes `path`'s default ACL.
    fn delete_default(&self, path: &Path) -> Result<(), AclError>;
}

impl<B: AclBackend + ?Sized> AclBackend for &B {
    fn traits(&self) -> PlatformTraits {
        (**self).traits()
    }

    fn get_file(&self, path: &Path, acl_type: AclType) -> Result<NativeAcl, AclError> {
        (**self).get_file(path, acl_type)
    }

    fn set_file(&self, path: &Path, acl_type: AclType, acl: &NativeAcl) -> Result<(), AclError> {
        (**self).set_file(path, acl_type, acl)
    }

    fn delete_default(&self, path: &Path) -> Result<(), AclError> {
        (**self).delete_default(path)
    }
}
