//! Identity mapping seam used while coding named ACL entries.
//!
//! The codec never touches the user and group databases itself. It asks an
//! [`IdMapper`] which name (if any) should accompany an id on the wire, and how
//! a received name or id translates to a local id.

/// Maps numeric ids to transmitted names and received names or ids to local
/// ids.
///
/// Implementations decide their own policy: whether a name is sent once per id
/// or never, and how unknown names fall back.
pub trait IdMapper {
    /// Returns the name to transmit alongside user `uid`, if any.
    fn user_name(&mut self, uid: u32) -> Option<String>;

    /// Returns the name to transmit alongside group `gid`, if any.
    fn group_name(&mut self, gid: u32) -> Option<String>;

    /// Resolves a received user name, falling back to the sender's `uid`.
    fn recv_user_name(&mut self, uid: u32, name: &[u8]) -> u32;

    /// Resolves a received group name, falling back to the sender's `gid`.
    fn recv_group_name(&mut self, gid: u32, name: &[u8]) -> u32;

    /// Remaps a sender uid that arrived without a name.
    fn match_uid(&mut self, uid: u32) -> u32;

    /// Remaps a sender gid that arrived without a name.
    fn match_gid(&mut self, gid: u32) -> u32;
}

/// Identity mapper: never sends names and keeps every id as-is.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NumericIds;

impl IdMapper for NumericIds {
    fn user_name(&mut self, _uid: u32) -> Option<String> {
        None
    }

    fn group_name(&mut self, _gid: u32) -> Option<String> {
        None
    }

    fn recv_user_name(&mut self, uid: u32, _name: &[u8]) -> u32 {
        uid
    }

    fn recv_group_name(&mut self, gid: u32, _name: &[u8]) -> u32 {
        gid
    }

    fn match_uid(&mut self, uid: u32) -> u32 {
        uid
    }

    fn match_gid(&mut self, gid: u32) -> u32 {
        gid
    }
}

impl<M: IdMapper + ?Sized> IdMapper for &mut M {
    fn user_name(&mut self, uid: u32) -> Option<String> {
        (**self).user_name(uid)
    }

    fn group_name(&mut self, gid: u32) -> Option<String> {
        (**self).group_name(gid)
    }

    fn recv_user_name(&mut self, uid: u32, name: &[u8]) -> u32 {
        (**self).recv_user_name(uid, name)
    }

    fn recv_group_name(&mut self, gid: u32, name: &[u8]) -> u32 {
        (**self).recv_group_name(gid, name)
    }

    fn match_uid(&mut self, uid: u32) -> u32 {
        (**self).match_uid(uid)
    }

    fn match_gid(&mut self, gid: u32) -> u32 {
        (**self).match_gid(gid)
    }
}
