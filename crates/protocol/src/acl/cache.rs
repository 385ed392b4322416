//! Per-kind dedup caches of condensed ACLs.
//!
//! Both peers append ACLs in identical order, so an index into a cache means
//! the same ACL on either side. Index `n` travels as `n + 1`; `0` announces
//! literal data.

use std::borrow::Borrow;

use super::entry::{AclType, RsyncAcl};

/// Ordered, append-only registry of distinct ACLs of one kind.
///
/// Lookups remember the last match and search backward from it, wrapping
/// around the whole list, because consecutive entries usually share an ACL.
#[derive(Clone, Debug)]
pub struct AclList<T = RsyncAcl> {
    items: Vec<T>,
    last_match: Option<usize>,
}

impl<T> Default for AclList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AclList<T> {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            last_match: None,
        }
    }

    /// Returns the number of cached ACLs.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item stored at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns the item stored at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Appends `item` and returns its index.
    pub fn push(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Iterates over the cached items in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Iterates mutably over the cached items in index order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<T: Borrow<RsyncAcl>> AclList<T> {
    /// Finds the index of an ACL equal to `acl`.
    ///
    /// The search starts at the previous match (or the last index when there
    /// is none) and walks backward circularly. A miss resets the cursor.
    pub fn find(&mut self, acl: &RsyncAcl) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            self.last_match = None;
            return None;
        }

        let mut cursor = self
            .last_match
            .filter(|&index| index < len)
            .unwrap_or(len - 1);
        for _ in 0..len {
            if self.items[cursor].borrow() == acl {
                self.last_match = Some(cursor);
                return Some(cursor);
            }
            cursor = cursor.checked_sub(1).unwrap_or(len - 1);
        }

        self.last_match = None;
        None
    }
}

/// The pair of caches (access and default) used for one session role.
///
/// The sender stores bare [`RsyncAcl`] values; the receiver stores entries
/// that also carry a lazily built native ACL.
#[derive(Clone, Debug)]
pub struct AclCache<T = RsyncAcl> {
    access: AclList<T>,
    default: AclList<T>,
}

impl<T> Default for AclCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AclCache<T> {
    /// Creates empty caches for both kinds.
    pub const fn new() -> Self {
        Self {
            access: AclList::new(),
            default: AclList::new(),
        }
    }

    /// Returns the list for `acl_type`.
    pub const fn list(&self, acl_type: AclType) -> &AclList<T> {
        match acl_type {
            AclType::Access => &self.access,
            AclType::Default => &self.default,
        }
    }

    /// Returns the list for `acl_type` mutably.
    pub fn list_mut(&mut self, acl_type: AclType) -> &mut AclList<T> {
        match acl_type {
            AclType::Access => &mut self.access,
            AclType::Default => &mut self.default,
        }
    }

    /// Appends `item` to the `acl_type` list and returns its index.
    pub fn store(&mut self, item: T, acl_type: AclType) -> usize {
        self.list_mut(acl_type).push(item)
    }

    /// Appends to the access list.
    pub fn store_access(&mut self, item: T) -> usize {
        self.access.push(item)
    }

    /// Appends to the default list.
    pub fn store_default(&mut self, item: T) -> usize {
        self.default.push(item)
    }

    /// Returns the cached item of `acl_type` at `index`.
    pub fn get(&self, acl_type: AclType, index: usize) -> Option<&T> {
        self.list(acl_type).get(index)
    }

    /// Returns the cached item of `acl_type` at `index` mutably.
    pub fn get_mut(&mut self, acl_type: AclType, index: usize) -> Option<&mut T> {
        self.list_mut(acl_type).get_mut(index)
    }
}

impl<T: Borrow<RsyncAcl>> AclCache<T> {
    /// Looks up `acl` in the `acl_type` list.
    pub fn find(&mut self, acl: &RsyncAcl, acl_type: AclType) -> Option<usize> {
        self.list_mut(acl_type).find(acl)
    }

    /// Looks up `acl` among access ACLs.
    pub fn find_access(&mut self, acl: &RsyncAcl) -> Option<usize> {
        self.access.find(acl)
    }

    /// Looks up `acl` among default ACLs.
    pub fn find_default(&mut self, acl: &RsyncAcl) -> Option<usize> {
        self.default.find(acl)
    }
}
