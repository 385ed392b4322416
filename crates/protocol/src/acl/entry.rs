//! Condensed ACL representation shared by the sender and receiver.

use std::fmt;

use super::constants::{
    NAME_IS_USER, NO_ENTRY, XMIT_GROUP_OBJ, XMIT_MASK_OBJ, XMIT_NAME_LIST, XMIT_OTHER_OBJ,
    XMIT_USER_OBJ,
};

/// ACL kind; each kind has its own dedup cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AclType {
    /// Access ACL governing the entry itself.
    Access,
    /// Default ACL a directory imposes on new children.
    Default,
}

impl AclType {
    /// Returns the upstream spelling used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "SMB_ACL_TYPE_ACCESS",
            Self::Default => "SMB_ACL_TYPE_DEFAULT",
        }
    }
}

impl fmt::Display for AclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named user or group entry: numeric id plus access bits.
///
/// `access` holds the `rwx` bits; [`NAME_IS_USER`] is set for user entries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdAccess {
    /// Numeric uid or gid.
    pub id: u32,
    /// Permission bits, with [`NAME_IS_USER`] marking user entries.
    pub access: u32,
}

impl IdAccess {
    /// Creates a named-user entry.
    pub const fn user(id: u32, perms: u32) -> Self {
        Self {
            id,
            access: perms | NAME_IS_USER,
        }
    }

    /// Creates a named-group entry.
    pub const fn group(id: u32, perms: u32) -> Self {
        Self {
            id,
            access: perms & !NAME_IS_USER,
        }
    }

    /// Returns true when the id denotes a user.
    pub const fn is_user(&self) -> bool {
        self.access & NAME_IS_USER != 0
    }

    /// Returns the permission bits without the user marker.
    pub const fn perms(&self) -> u32 {
        self.access & !NAME_IS_USER
    }
}

/// Ordered list of named entries.
///
/// An empty list is a valid state; "no list present" is expressed by the
/// absence of [`XMIT_NAME_LIST`] on the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdaEntries {
    entries: Vec<IdAccess>,
}

impl IdaEntries {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates an empty list with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry, preserving insertion order.
    pub fn push(&mut self, entry: IdAccess) {
        self.entries.push(entry);
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, IdAccess> {
        self.entries.iter()
    }

    /// Returns a mutable iterator over the entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, IdAccess> {
        self.entries.iter_mut()
    }

    /// Returns the entries as a slice.
    pub fn as_slice(&self) -> &[IdAccess] {
        &self.entries
    }

    /// Orders user entries before group entries, each by ascending id.
    ///
    /// Platforms that require sorted native ACLs rely on this ordering when
    /// packing (see `id_access_sorter` upstream).
    pub fn sort_users_first(&mut self) {
        self.entries
            .sort_by(|a, b| b.is_user().cmp(&a.is_user()).then(a.id.cmp(&b.id)));
    }
}

impl From<Vec<IdAccess>> for IdaEntries {
    fn from(entries: Vec<IdAccess>) -> Self {
        Self { entries }
    }
}

impl FromIterator<IdAccess> for IdaEntries {
    fn from_iter<T: IntoIterator<Item = IdAccess>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a IdaEntries {
    type Item = &'a IdAccess;
    type IntoIter = std::slice::Iter<'a, IdAccess>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Condensed ACL: four object slots plus the named-entry list.
///
/// Each slot holds a permission value `0..=7` or [`NO_ENTRY`]. Two condensed
/// ACLs are cache-equal exactly when they compare equal with `==`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RsyncAcl {
    /// Named user/group entries.
    pub names: IdaEntries,
    /// Owner permissions.
    pub user_obj: u8,
    /// Owning-group permissions.
    pub group_obj: u8,
    /// Mask permissions.
    pub mask_obj: u8,
    /// Other permissions.
    pub other_obj: u8,
}

impl Default for RsyncAcl {
    fn default() -> Self {
        Self::new()
    }
}

impl RsyncAcl {
    /// Creates an empty ACL with every slot set to [`NO_ENTRY`].
    pub const fn new() -> Self {
        Self {
            names: IdaEntries::new(),
            user_obj: NO_ENTRY,
            group_obj: NO_ENTRY,
            mask_obj: NO_ENTRY,
            other_obj: NO_ENTRY,
        }
    }

    /// Returns true when no slot is set and the name list is empty.
    pub fn is_empty(&self) -> bool {
        self.user_obj == NO_ENTRY
            && self.group_obj == NO_ENTRY
            && self.mask_obj == NO_ENTRY
            && self.other_obj == NO_ENTRY
            && self.names.is_empty()
    }

    /// Returns true when the ACL carries a mask entry.
    pub const fn has_mask(&self) -> bool {
        self.mask_obj != NO_ENTRY
    }

    /// Moves the contents out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Computes the `XMIT_*` flag byte describing which parts are present.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.user_obj != NO_ENTRY {
            flags |= XMIT_USER_OBJ;
        }
        if self.group_obj != NO_ENTRY {
            flags |= XMIT_GROUP_OBJ;
        }
        if self.mask_obj != NO_ENTRY {
            flags |= XMIT_MASK_OBJ;
        }
        if self.other_obj != NO_ENTRY {
            flags |= XMIT_OTHER_OBJ;
        }
        if !self.names.is_empty() {
            flags |= XMIT_NAME_LIST;
        }
        flags
    }
}
