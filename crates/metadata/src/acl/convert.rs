//! Translation between native handles and condensed ACLs.

use protocol::acl::{ACL_TARGET, IdAccess, IdaEntries, NAME_IS_USER, NO_ENTRY, RsyncAcl};
use tracing::warn;

use super::native::{AclTag, NativeAcl, PlatformTraits};
use crate::error::{AclError, AclStep};

/// Decodes a native handle verbatim into a condensed ACL.
///
/// Each object entry fills its slot once; later duplicates are logged and
/// ignored, as are unknown tags. Named entries keep their native order unless
/// the platform requires sorting. With [`PlatformTraits::needs_mask`], a mask
/// left without named entries is folded into the group slot.
///
/// # Errors
///
/// Fails at [`AclStep::GetQualifier`] when a named entry has no id.
pub fn unpack_acl(native: &NativeAcl, traits: PlatformTraits) -> Result<RsyncAcl, AclError> {
    let mut acl = RsyncAcl::new();
    let mut names = Vec::new();

    for entry in native.entries() {
        let slot = match entry.tag {
            AclTag::UserObj => &mut acl.user_obj,
            AclTag::GroupObj => &mut acl.group_obj,
            AclTag::Mask => &mut acl.mask_obj,
            AclTag::Other => &mut acl.other_obj,
            AclTag::User | AclTag::Group => {
                let id = entry.qualifier.ok_or_else(|| {
                    AclError::invalid(AclStep::GetQualifier, "named ACL entry without id")
                })?;
                let mut access = entry.perms;
                if entry.tag == AclTag::User {
                    access |= NAME_IS_USER;
                }
                names.push(IdAccess { id, access });
                continue;
            }
            AclTag::Unknown => {
                warn!(target: ACL_TARGET, "entry with unrecognized tag type ignored");
                continue;
            }
        };

        if *slot == NO_ENTRY {
            *slot = entry.perms as u8;
        } else {
            warn!(target: ACL_TARGET, tag = ?entry.tag, "duplicate ACL entry ignored");
        }
    }

    let mut names = IdaEntries::from(names);
    if traits.needs_sort && names.len() > 1 {
        names.sort_users_first();
    }
    acl.names = names;

    if traits.needs_mask && acl.names.is_empty() && acl.mask_obj != NO_ENTRY {
        acl.group_obj &= acl.mask_obj;
        acl.mask_obj = NO_ENTRY;
    }

    Ok(acl)
}

/// Number of entries the native form of `acl` will hold.
fn native_entry_count(acl: &RsyncAcl, traits: PlatformTraits) -> usize {
    let mask = traits.needs_mask || acl.mask_obj != NO_ENTRY;
    acl.names.len() + 3 + usize::from(mask)
}

/// Encodes a condensed ACL as a native handle.
///
/// Entry order is owner, named entries, owning group, mask, other. With
/// [`PlatformTraits::needs_sort`] named users precede the owning group and
/// named groups follow it. The mask is emitted when present, or always when
/// the platform needs one (falling back to the group bits). Absent slots are
/// written as `---`.
///
/// A handle that fails validation afterwards is only logged.
///
/// # Errors
///
/// Returns the first failing step; the partial handle is dropped.
pub fn pack_acl(acl: &RsyncAcl, traits: PlatformTraits) -> Result<NativeAcl, AclError> {
    let bits = |value: u8| u32::from(value & !NO_ENTRY);
    let mut native = NativeAcl::with_capacity(native_entry_count(acl, traits));

    native.create_entry(AclTag::UserObj, None, bits(acl.user_obj))?;

    let named_entry = |native: &mut NativeAcl, ida: &IdAccess| {
        let tag = if ida.is_user() {
            AclTag::User
        } else {
            AclTag::Group
        };
        native.create_entry(tag, Some(ida.id), ida.perms())
    };

    if traits.needs_sort {
        for ida in acl.names.iter().filter(|ida| ida.is_user()) {
            named_entry(&mut native, ida)?;
        }
        native.create_entry(AclTag::GroupObj, None, bits(acl.group_obj))?;
        for ida in acl.names.iter().filter(|ida| !ida.is_user()) {
            named_entry(&mut native, ida)?;
        }
    } else {
        for ida in &acl.names {
            named_entry(&mut native, ida)?;
        }
        native.create_entry(AclTag::GroupObj, None, bits(acl.group_obj))?;
    }

    if acl.mask_obj != NO_ENTRY {
        native.create_entry(AclTag::Mask, None, u32::from(acl.mask_obj))?;
    } else if traits.needs_mask {
        native.create_entry(AclTag::Mask, None, bits(acl.group_obj))?;
    }

    native.create_entry(AclTag::Other, None, bits(acl.other_obj))?;

    if native.validate().is_err() {
        warn!(target: ACL_TARGET, "packed ACL failed validation");
    }

    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::native::NativeEntry;

    fn extended() -> RsyncAcl {
        let mut acl = RsyncAcl::new();
        acl.user_obj = 7;
        acl.group_obj = 5;
        acl.mask_obj = 7;
        acl.other_obj = 0;
        acl.names = vec![
            IdAccess::group(20, 5),
            IdAccess::user(1000, 7),
            IdAccess::user(501, 6),
        ]
        .into();
        acl
    }

    fn tags(native: &NativeAcl) -> Vec<(AclTag, Option<u32>)> {
        native.entries().iter().map(|e| (e.tag, e.qualifier)).collect()
    }

    #[test]
    fn pack_then_unpack_is_identity() {
        let acl = extended();
        let native = pack_acl(&acl, PlatformTraits::POSIX).expect("pack");
        assert!(native.validate().is_ok());
        assert_eq!(unpack_acl(&native, PlatformTraits::POSIX).expect("unpack"), acl);
    }

    #[test]
    fn posix_order_keeps_names_before_group() {
        let native = pack_acl(&extended(), PlatformTraits::POSIX).expect("pack");
        assert_eq!(
            tags(&native),
            [
                (AclTag::UserObj, None),
                (AclTag::Group, Some(20)),
                (AclTag::User, Some(1000)),
                (AclTag::User, Some(501)),
                (AclTag::GroupObj, None),
                (AclTag::Mask, None),
                (AclTag::Other, None),
            ]
        );
    }

    #[test]
    fn sorted_platforms_split_users_and_groups() {
        let traits = PlatformTraits {
            needs_sort: true,
            ..PlatformTraits::POSIX
        };
        let native = pack_acl(&extended(), traits).expect("pack");
        assert_eq!(
            tags(&native),
            [
                (AclTag::UserObj, None),
                (AclTag::User, Some(1000)),
                (AclTag::User, Some(501)),
                (AclTag::GroupObj, None),
                (AclTag::Group, Some(20)),
                (AclTag::Mask, None),
                (AclTag::Other, None),
            ]
        );

        let unpacked = unpack_acl(&native, traits).expect("unpack");
        let order: Vec<_> = unpacked.names.iter().map(|e| e.id).collect();
        assert_eq!(order, [501, 1000, 20]);
    }

    #[test]
    fn mask_is_synthesized_when_required() {
        let acl = RsyncAcl::from_mode(0o640);
        let plain = pack_acl(&acl, PlatformTraits::POSIX).expect("pack");
        assert_eq!(plain.len(), 3);

        let traits = PlatformTraits {
            needs_mask: true,
            ..PlatformTraits::POSIX
        };
        let masked = pack_acl(&acl, traits).expect("pack");
        assert_eq!(masked.len(), 4);
        assert_eq!(masked.entries()[2].tag, AclTag::Mask);
        assert_eq!(masked.entries()[2].perms, 4);

        // Reading it back folds the lone mask into the group.
        assert_eq!(unpack_acl(&masked, traits).expect("unpack"), acl);
    }

    #[test]
    fn absent_slots_pack_as_no_permissions() {
        let native = pack_acl(&RsyncAcl::new(), PlatformTraits::POSIX).expect("pack");
        assert!(native.entries().iter().all(|e| e.perms == 0));
        assert_eq!(native.len(), 3);
    }

    #[test]
    fn out_of_range_slot_aborts_packing() {
        let mut acl = extended();
        acl.other_obj = 9;
        let err = pack_acl(&acl, PlatformTraits::POSIX).expect_err("9 is not rwx");
        assert_eq!(err.step(), Some(AclStep::SetPermset));
    }

    #[test]
    fn duplicates_and_unknown_tags_are_tolerated() {
        let entry = |tag, qualifier, perms| NativeEntry {
            tag,
            qualifier,
            perms,
        };
        let native = NativeAcl::from_entries(vec![
            entry(AclTag::UserObj, None, 6),
            entry(AclTag::UserObj, None, 7),
            entry(AclTag::Unknown, None, 7),
            entry(AclTag::GroupObj, None, 4),
            entry(AclTag::Other, None, 4),
        ]);
        let acl = unpack_acl(&native, PlatformTraits::POSIX).expect("unpack");
        assert_eq!((acl.user_obj, acl.group_obj, acl.other_obj), (6, 4, 4));
        assert!(acl.names.is_empty());
    }

    #[test]
    fn named_entry_without_id_fails() {
        let native = NativeAcl::from_entries(vec![NativeEntry {
            tag: AclTag::User,
            qualifier: None,
            perms: 7,
        }]);
        let err = unpack_acl(&native, PlatformTraits::POSIX).expect_err("no id");
        assert_eq!(err.step(), Some(AclStep::GetQualifier));
    }
}
