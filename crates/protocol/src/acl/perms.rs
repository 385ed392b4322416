//! Folding between condensed ACLs and the mode word.
//!
//! The user, group and other permission entries of an access ACL duplicate
//! the file's mode bits, so the sender strips them and the receiver compares
//! against the mode instead of re-applying them.

use super::constants::NO_ENTRY;
use super::entry::RsyncAcl;

impl RsyncAcl {
    /// Synthesizes the three object slots from a mode word.
    ///
    /// Used when the filesystem does not support ACLs at all.
    pub const fn from_mode(mode: u32) -> Self {
        let mut acl = Self::new();
        acl.user_obj = ((mode >> 6) & 7) as u8;
        acl.group_obj = ((mode >> 3) & 7) as u8;
        acl.other_obj = (mode & 7) as u8;
        acl
    }

    /// Clears every slot that can be reconstructed from the mode.
    ///
    /// User and other always go. The group slot goes when there is no mask or
    /// when it equals the mask; the mask itself is cleared last.
    pub fn strip_perms(&mut self) {
        self.user_obj = NO_ENTRY;
        if self.mask_obj == NO_ENTRY {
            self.group_obj = NO_ENTRY;
        } else {
            if self.group_obj == self.mask_obj {
                self.group_obj = NO_ENTRY;
            }
            self.mask_obj = NO_ENTRY;
        }
        self.other_obj = NO_ENTRY;
    }

    /// Compares the extended (non-mode) parts of two access ACLs.
    ///
    /// `self` is a fully populated ACL read from disk; `condensed` may have
    /// slots cleared by [`strip_perms`](Self::strip_perms). Whatever remains
    /// unequal after this check is handled by ordinary mode preservation.
    pub fn equal_enough(&self, condensed: &Self, mode: u32) -> bool {
        if (self.mask_obj ^ condensed.mask_obj) & NO_ENTRY != 0 {
            return false;
        }

        if self.mask_obj != NO_ENTRY {
            // With a mask the group entry is an extended entry. A condensed
            // group is only absent when it matched the mode's group bits.
            if condensed.group_obj == NO_ENTRY {
                if u32::from(self.group_obj) != (mode >> 3) & 7 {
                    return false;
                }
            } else if self.group_obj != condensed.group_obj {
                return false;
            }
        }

        self.names == condensed.names
    }

    /// Rebuilds the 9-bit permission word from a populated ACL.
    ///
    /// The mask stands in for the group bits when present. Returns `None` if
    /// the user, group or other slot is absent.
    pub fn get_perms(&self) -> Option<u32> {
        if self.user_obj == NO_ENTRY || self.group_obj == NO_ENTRY || self.other_obj == NO_ENTRY {
            return None;
        }
        let group = if self.mask_obj == NO_ENTRY {
            self.group_obj
        } else {
            self.mask_obj
        };
        Some((u32::from(self.user_obj) << 6) | (u32::from(group) << 3) | u32::from(self.other_obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::IdAccess;

    fn full(user: u8, group: u8, mask: u8, other: u8) -> RsyncAcl {
        let mut acl = RsyncAcl::new();
        acl.user_obj = user;
        acl.group_obj = group;
        acl.mask_obj = mask;
        acl.other_obj = other;
        acl
    }

    #[test]
    fn from_mode_splits_permission_triplets() {
        let acl = RsyncAcl::from_mode(0o100_754);
        assert_eq!((acl.user_obj, acl.group_obj, acl.other_obj), (7, 5, 4));
        assert_eq!(acl.mask_obj, NO_ENTRY);
        assert!(acl.names.is_empty());
    }

    #[test]
    fn strip_without_mask_clears_everything() {
        let mut acl = full(7, 5, NO_ENTRY, 5);
        acl.strip_perms();
        assert!(acl.is_empty());
    }

    #[test]
    fn strip_keeps_group_that_differs_from_mask() {
        let mut acl = full(7, 7, 5, 0);
        acl.names.push(IdAccess::user(501, 7));
        acl.strip_perms();
        assert_eq!(acl.user_obj, NO_ENTRY);
        assert_eq!(acl.group_obj, 7);
        assert_eq!(acl.mask_obj, NO_ENTRY);
        assert_eq!(acl.other_obj, NO_ENTRY);
        assert_eq!(acl.names.len(), 1);
    }

    #[test]
    fn strip_drops_group_equal_to_mask() {
        let mut acl = full(6, 4, 4, 4);
        acl.strip_perms();
        assert_eq!(acl.group_obj, NO_ENTRY);
        assert_eq!(acl.mask_obj, NO_ENTRY);
    }

    #[test]
    fn equal_enough_rejects_mask_presence_mismatch() {
        let on_disk = full(7, 5, 5, 5);
        let condensed = RsyncAcl::new();
        assert!(!on_disk.equal_enough(&condensed, 0o755));
    }

    #[test]
    fn equal_enough_uses_mode_group_when_condensed_group_absent() {
        let mut on_disk = full(7, 5, 7, 5);
        on_disk.names.push(IdAccess::user(501, 7));
        let mut condensed = on_disk.clone();
        condensed.group_obj = NO_ENTRY;

        assert!(on_disk.equal_enough(&condensed, 0o755));
        assert!(!on_disk.equal_enough(&condensed, 0o775));
    }

    #[test]
    fn equal_enough_compares_names() {
        let mut on_disk = full(7, 5, 7, 5);
        on_disk.names.push(IdAccess::user(501, 7));
        let mut condensed = on_disk.clone();
        condensed.names = vec![IdAccess::user(502, 7)].into();
        assert!(!on_disk.equal_enough(&condensed, 0o755));
    }

    #[test]
    fn stripped_plain_acl_matches_fake_from_mode() {
        let original = full(7, 5, NO_ENTRY, 5);
        let mut stripped = original.clone();
        stripped.strip_perms();
        let rebuilt = RsyncAcl::from_mode(0o755);
        assert!(rebuilt.equal_enough(&stripped, 0o755));
        assert!(original.equal_enough(&stripped, 0o755));
    }

    #[test]
    fn get_perms_prefers_mask() {
        assert_eq!(full(7, 7, 5, 0).get_perms(), Some(0o750));
        assert_eq!(full(6, 4, NO_ENTRY, 4).get_perms(), Some(0o644));
        assert_eq!(RsyncAcl::new().get_perms(), None);
    }
}
