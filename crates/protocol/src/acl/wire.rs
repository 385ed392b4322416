//! Encoder and decoder for ACL references and literal ACL bodies.
//!
//! Decoding applies the receiver's mask rules and rejects values and cache
//! references outside their legal range.

use std::io::{Read, Write};
use std::{io, iter};

use tracing::{error, trace};

use crate::varint::{read_byte, read_varint, write_byte, write_varint};

use super::ACL_TARGET;
use super::cache::AclCache;
use super::constants::{
    ACCESS_SHIFT, MAX_NAME_LEN, NAME_IS_USER, NO_ENTRY, VALID_NAME_BITS, VALID_OBJ_BITS,
    XFLAG_NAME_FOLLOWS, XFLAG_NAME_IS_USER, XMIT_GROUP_OBJ, XMIT_MASK_OBJ, XMIT_NAME_LIST,
    XMIT_OTHER_OBJ, XMIT_USER_OBJ,
};
use super::entry::{AclType, IdAccess, IdaEntries, RsyncAcl};
use super::error::AclProtocolError;
use super::ids::IdMapper;

/// Preallocation cap for received name lists; larger lists grow on demand.
const MAX_PREALLOCATED_NAMES: usize = 64;

/// Session policy the codec consults for names and id remapping.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AclWireOptions {
    /// Incremental recursion: names travel with ids and ids are remapped on
    /// receipt.
    pub inc_recurse: bool,
    /// The receiver runs with elevated privileges.
    pub am_root: bool,
    /// Ids are preserved numerically instead of by name.
    pub numeric_ids: bool,
}

impl AclWireOptions {
    /// Creates options with every flag cleared.
    pub const fn new() -> Self {
        Self {
            inc_recurse: false,
            am_root: false,
            numeric_ids: false,
        }
    }

    /// Sets the incremental-recursion flag.
    pub const fn inc_recurse(mut self, value: bool) -> Self {
        self.inc_recurse = value;
        self
    }

    /// Sets the elevated-privilege flag.
    pub const fn am_root(mut self, value: bool) -> Self {
        self.am_root = value;
        self
    }

    /// Sets the numeric-ids flag.
    pub const fn numeric_ids(mut self, value: bool) -> Self {
        self.numeric_ids = value;
        self
    }

    const fn remap_uids(self) -> bool {
        self.inc_recurse && self.am_root && !self.numeric_ids
    }

    const fn remap_gids(self) -> bool {
        self.inc_recurse && (!self.am_root || !self.numeric_ids)
    }
}

/// Packs a named entry's access value: `(perms << 2) | flags`.
///
/// Shifting keeps the low bits free for the two flags while small values
/// still fit in a single varint byte.
const fn encode_access(access: u32, name_follows: bool) -> u32 {
    let mut encoded = (access & !NAME_IS_USER) << ACCESS_SHIFT;
    if name_follows {
        encoded |= XFLAG_NAME_FOLLOWS;
    }
    if access & NAME_IS_USER != 0 {
        encoded |= XFLAG_NAME_IS_USER;
    }
    encoded
}

fn out_of_range(value: u32) -> AclProtocolError {
    error!(target: ACL_TARGET, value, "ACL access value out of range");
    AclProtocolError::ValueOutOfRange { value }
}

/// Reads an object-slot value (`0..=7`).
fn recv_obj_access<R: Read + ?Sized>(reader: &mut R) -> Result<u8, AclProtocolError> {
    let value = read_varint(reader)? as u32;
    if value & !VALID_OBJ_BITS != 0 {
        return Err(out_of_range(value));
    }
    Ok(value as u8)
}

/// Reads a named entry's packed access value.
///
/// Returns the access bits (with [`NAME_IS_USER`] set for users) and the raw
/// wire flags.
fn recv_name_access<R: Read + ?Sized>(reader: &mut R) -> Result<(u32, u32), AclProtocolError> {
    let encoded = read_varint(reader)? as u32;
    let flags = encoded & (XFLAG_NAME_FOLLOWS | XFLAG_NAME_IS_USER);
    let mut access = encoded >> ACCESS_SHIFT;
    if access & !VALID_NAME_BITS != 0 {
        return Err(out_of_range(access));
    }
    if flags & XFLAG_NAME_IS_USER != 0 {
        access |= NAME_IS_USER;
    }
    Ok((access, flags))
}

fn recv_name<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_byte(reader)? as usize;
    let mut name = vec![0u8; len];
    reader.read_exact(&mut name)?;
    Ok(name)
}

/// Sends a named-entry list.
///
/// # Wire Format
///
/// ```text
/// count      : varint
/// For each entry:
///   id       : varint
///   access   : varint  // (perms << 2) | flags
///   [len]    : byte    // if XFLAG_NAME_FOLLOWS
///   [name]   : bytes   // if XFLAG_NAME_FOLLOWS
/// ```
///
/// Names are only offered during incremental recursion, and only when the
/// mapper has one that fits in a length byte.
///
/// # Upstream Reference
///
/// Mirrors `send_ida_entries()` in `acls.c`.
pub fn send_ida_entries<W, M>(
    writer: &mut W,
    entries: &IdaEntries,
    ids: &mut M,
    options: AclWireOptions,
) -> io::Result<()>
where
    W: Write + ?Sized,
    M: IdMapper + ?Sized,
{
    write_varint(writer, entries.len() as i32)?;

    for entry in entries {
        let name = if options.inc_recurse {
            if entry.is_user() {
                ids.user_name(entry.id)
            } else {
                ids.group_name(entry.id)
            }
        } else {
            None
        };
        let name = name.filter(|name| name.len() <= MAX_NAME_LEN);

        write_varint(writer, entry.id as i32)?;
        write_varint(writer, encode_access(entry.access, name.is_some()) as i32)?;
        if let Some(name) = name {
            write_byte(writer, name.len() as u8)?;
            writer.write_all(name.as_bytes())?;
        }
    }

    Ok(())
}

/// Receives a named-entry list.
///
/// Ids are translated as they arrive: a transmitted name is resolved through
/// the mapper, otherwise the numeric id is remapped according to `options`.
///
/// # Returns
///
/// The entries and the OR of their permission bits, which becomes the mask
/// when the sender omitted one.
///
/// # Upstream Reference
///
/// Mirrors `recv_ida_entries()` in `acls.c`.
pub fn recv_ida_entries<R, M>(
    reader: &mut R,
    ids: &mut M,
    options: AclWireOptions,
) -> Result<(IdaEntries, u8), AclProtocolError>
where
    R: Read + ?Sized,
    M: IdMapper + ?Sized,
{
    let count = read_varint(reader)?;
    if count < 0 {
        return Err(out_of_range(count as u32));
    }
    let count = count as usize;

    let mut entries = IdaEntries::with_capacity(count.min(MAX_PREALLOCATED_NAMES));
    let mut computed_mask = 0u32;

    for _ in 0..count {
        let mut id = read_varint(reader)? as u32;
        let (access, flags) = recv_name_access(reader)?;

        if flags & XFLAG_NAME_FOLLOWS != 0 {
            let name = recv_name(reader)?;
            id = if access & NAME_IS_USER != 0 {
                ids.recv_user_name(id, &name)
            } else {
                ids.recv_group_name(id, &name)
            };
        } else if access & NAME_IS_USER != 0 {
            if options.remap_uids() {
                id = ids.match_uid(id);
            }
        } else if options.remap_gids() {
            id = ids.match_gid(id);
        }

        entries.push(IdAccess { id, access });
        computed_mask |= access;
    }

    Ok((entries, (computed_mask as u8) & !NO_ENTRY))
}

/// Writes the literal encoding of `acl`: flag byte, present slots, names.
fn send_literal<W, M>(
    writer: &mut W,
    acl: &RsyncAcl,
    ids: &mut M,
    options: AclWireOptions,
) -> io::Result<()>
where
    W: Write + ?Sized,
    M: IdMapper + ?Sized,
{
    let flags = acl.flags();
    write_byte(writer, flags)?;

    let slots = [
        (XMIT_USER_OBJ, acl.user_obj),
        (XMIT_GROUP_OBJ, acl.group_obj),
        (XMIT_MASK_OBJ, acl.mask_obj),
        (XMIT_OTHER_OBJ, acl.other_obj),
    ];
    for (bit, value) in slots {
        if flags & bit != 0 {
            write_varint(writer, i32::from(value))?;
        }
    }
    if flags & XMIT_NAME_LIST != 0 {
        send_ida_entries(writer, &acl.names, ids, options)?;
    }

    Ok(())
}

/// Sends an ACL reference, consuming `acl`.
///
/// If an equal ACL was sent before, only its index is written and `acl` is
/// dropped. Otherwise `0` is written, `acl` moves into the cache and its
/// literal encoding follows.
///
/// # Wire Format
///
/// ```text
/// ndx + 1    : varint  // 0 means literal follows, >0 is cache index + 1
/// If ndx + 1 == 0 (literal):
///   flags    : byte    // XMIT_* flags
///   [user_obj]   : varint if XMIT_USER_OBJ
///   [group_obj]  : varint if XMIT_GROUP_OBJ
///   [mask_obj]   : varint if XMIT_MASK_OBJ
///   [other_obj]  : varint if XMIT_OTHER_OBJ
///   [names]      : ida_entries if XMIT_NAME_LIST
/// ```
///
/// # Upstream Reference
///
/// Mirrors `send_rsync_acl()` in `acls.c`.
pub fn send_rsync_acl<W, M>(
    writer: &mut W,
    acl: RsyncAcl,
    acl_type: AclType,
    cache: &mut AclCache,
    ids: &mut M,
    options: AclWireOptions,
) -> io::Result<()>
where
    W: Write + ?Sized,
    M: IdMapper + ?Sized,
{
    if let Some(index) = cache.find(&acl, acl_type) {
        trace!(target: ACL_TARGET, %acl_type, index, "sending cached ACL reference");
        return write_varint(writer, index as i32 + 1);
    }

    write_varint(writer, 0)?;
    let index = cache.store(acl, acl_type);
    trace!(target: ACL_TARGET, %acl_type, index, "sending literal ACL");
    match cache.get(acl_type, index) {
        Some(stored) => send_literal(writer, stored, ids, options),
        None => Ok(()),
    }
}

/// Decodes a literal ACL body and applies the receiver-side mask rules.
///
/// A mask received alongside an empty name list is folded into the group
/// slot. A non-empty list without a mask gets one computed from the names and
/// the group.
pub fn recv_literal_acl<R, M>(
    reader: &mut R,
    ids: &mut M,
    options: AclWireOptions,
) -> Result<RsyncAcl, AclProtocolError>
where
    R: Read + ?Sized,
    M: IdMapper + ?Sized,
{
    let flags = read_byte(reader)?;
    let mut acl = RsyncAcl::new();

    let slots = iter::zip(
        [XMIT_USER_OBJ, XMIT_GROUP_OBJ, XMIT_MASK_OBJ, XMIT_OTHER_OBJ],
        [
            &mut acl.user_obj,
            &mut acl.group_obj,
            &mut acl.mask_obj,
            &mut acl.other_obj,
        ],
    );
    for (bit, slot) in slots {
        if flags & bit != 0 {
            *slot = recv_obj_access(reader)?;
        }
    }

    let mut computed_mask = 0u8;
    if flags & XMIT_NAME_LIST != 0 {
        let (names, mask) = recv_ida_entries(reader, ids, options)?;
        acl.names = names;
        computed_mask = mask;
    }

    if acl.names.is_empty() {
        if acl.mask_obj != NO_ENTRY {
            if acl.group_obj != NO_ENTRY {
                acl.group_obj &= acl.mask_obj;
            }
            acl.mask_obj = NO_ENTRY;
        }
    } else if acl.mask_obj == NO_ENTRY {
        acl.mask_obj = (computed_mask | acl.group_obj) & !NO_ENTRY;
    }

    Ok(acl)
}

/// Receives an ACL reference and returns the cache index it resolves to.
///
/// Literal data is decoded and appended to `cache` (converted into the
/// receiver's cache entry type). A reference beyond the cache is a fatal
/// protocol violation.
///
/// # Upstream Reference
///
/// Mirrors `recv_rsync_acl()` in `acls.c`.
pub fn recv_rsync_acl<R, M, T>(
    reader: &mut R,
    acl_type: AclType,
    cache: &mut AclCache<T>,
    ids: &mut M,
    options: AclWireOptions,
) -> Result<usize, AclProtocolError>
where
    R: Read + ?Sized,
    M: IdMapper + ?Sized,
    T: From<RsyncAcl>,
{
    let ndx = read_varint(reader)?;
    let count = cache.list(acl_type).len();
    if ndx < 0 || ndx as usize > count {
        error!(target: ACL_TARGET, %acl_type, ndx, count, "ACL index out of range");
        return Err(AclProtocolError::IndexOutOfRange {
            acl_type,
            index: ndx,
            count,
        });
    }
    if ndx != 0 {
        return Ok(ndx as usize - 1);
    }

    let acl = recv_literal_acl(reader, ids, options)?;
    Ok(cache.store(T::from(acl), acl_type))
}
