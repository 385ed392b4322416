//! Session-level behavior: reading, sending, receiving and applying ACLs
//! through the in-memory backend.

use std::io;
use std::path::Path;

use metadata::{
    AclApplyStatus, AclOptions, AclSession, AclStep, FileAclIndices, FileAcls, MemoryBackend,
    PlatformTraits,
};
use protocol::acl::{AclType, IdAccess, NO_ENTRY, NumericIds, RsyncAcl};

fn acl(user: u8, group: u8, mask: u8, other: u8, names: &[IdAccess]) -> RsyncAcl {
    let mut acl = RsyncAcl::new();
    acl.user_obj = user;
    acl.group_obj = group;
    acl.mask_obj = mask;
    acl.other_obj = other;
    for name in names {
        acl.names.push(*name);
    }
    acl
}

/// Sends `acls` from a fresh sender and returns the receiving session with
/// the entry whose indices it recorded.
fn transfer<'a>(
    backend: &'a MemoryBackend,
    options: AclOptions,
    acls: &[FileAcls],
) -> (AclSession<&'a MemoryBackend>, Vec<FileAclIndices>) {
    let mut sender = AclSession::new(backend, options);
    let mut wire = Vec::new();
    for item in acls {
        sender
            .send_acl(&mut wire, item.clone(), &mut NumericIds)
            .expect("send");
    }

    let mut receiver = AclSession::new(backend, options);
    let mut reader = wire.as_slice();
    let entries = acls
        .iter()
        .map(|item| {
            let mut entry = FileAclIndices::new(item.mode);
            receiver
                .receive_acl(&mut reader, &mut entry, &mut NumericIds)
                .expect("recv");
            entry
        })
        .collect();
    assert!(reader.is_empty(), "every byte consumed");
    (receiver, entries)
}

#[test]
fn plain_mode_acl_is_unchanged_against_matching_destination() {
    let backend = MemoryBackend::new();
    backend.insert_file("dst", 0o100755);
    let source = FileAcls {
        mode: 0o100755,
        access: Some(acl(7, 5, NO_ENTRY, 5, &[])),
        default: None,
    };

    let mut wire = Vec::new();
    let mut sender = AclSession::new(&backend, AclOptions::new());
    sender
        .send_acl(&mut wire, source.clone(), &mut NumericIds)
        .expect("send");
    assert_eq!(wire, [0x00, 0x00]);

    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);
    let mut dest = receiver
        .get_acl(Path::new("dst"), 0o100755)
        .expect("read destination");
    let status = receiver.set_acl(Some(Path::new("dst")), &entries[0], &mut dest);
    assert!(matches!(status, AclApplyStatus::Unchanged));
    assert_eq!(backend.set_calls(), 0);
}

#[test]
fn shared_default_acl_is_sent_once() {
    let backend = MemoryBackend::new();
    let default = acl(7, 7, 5, 0, &[IdAccess::user(501, 7)]);
    let dir = FileAcls {
        mode: 0o040755,
        access: None,
        default: Some(default.clone()),
    };

    let mut sender = AclSession::new(&backend, AclOptions::new());
    let mut first = Vec::new();
    sender
        .send_acl(&mut first, dir.clone(), &mut NumericIds)
        .expect("send");
    let mut second = Vec::new();
    sender.send_acl(&mut second, dir, &mut NumericIds).expect("send");

    // access literal (empty), then default literal with all five flags
    assert_eq!(
        first,
        [0x00, 0x00, 0x00, 0x1F, 7, 7, 5, 0, 0x01, 0x81, 0xF5, 0x1E]
    );
    // both kinds are cache references to slot 0
    assert_eq!(second, [0x01, 0x01]);
    assert_eq!(sender.sent_cache().list(AclType::Default).len(), 1);
}

#[test]
fn absent_owner_in_default_deletes_instead_of_setting() {
    let backend = MemoryBackend::new();
    backend.insert_file("dir", 0o040755);
    backend
        .seed_acl(
            Path::new("dir"),
            AclType::Default,
            &acl(7, 5, NO_ENTRY, 5, &[]),
        )
        .expect("seed");

    let source = FileAcls {
        mode: 0o040755,
        access: None,
        default: Some(RsyncAcl::new()),
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = receiver
        .get_acl(Path::new("dir"), 0o040755)
        .expect("read destination");
    let status = receiver.set_acl(Some(Path::new("dir")), &entries[0], &mut dest);

    assert!(matches!(status, AclApplyStatus::Changed));
    assert_eq!(backend.delete_calls(), 1);
    assert_eq!(backend.set_calls(), 0);
    let cached = receiver
        .received_cache()
        .get(AclType::Default, 0)
        .expect("cached");
    assert!(cached.native().is_none(), "no native handle was built");
    assert_eq!(backend.acl(Path::new("dir"), AclType::Default), None);
}

#[test]
fn ownerless_default_on_unread_directory_only_deletes() {
    let backend = MemoryBackend::new();
    backend.insert_file("dir", 0o040755);
    let source = FileAcls {
        mode: 0o040755,
        access: None,
        default: Some(RsyncAcl::new()),
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = FileAcls::new(0o040755);
    let status = receiver.set_acl(Some(Path::new("dir")), &entries[0], &mut dest);

    assert!(matches!(status, AclApplyStatus::Changed));
    assert_eq!(backend.delete_calls(), 1);
    // The single set is the access ACL; the default kind is never written.
    assert_eq!(backend.set_calls(), 1);
    assert!(backend.acl(Path::new("dir"), AclType::Access).is_some());
    assert_eq!(backend.acl(Path::new("dir"), AclType::Default), None);
    let cached = receiver
        .received_cache()
        .get(AclType::Default, 0)
        .expect("cached");
    assert!(cached.native().is_none(), "no native handle was built");
}

#[test]
fn ownerless_default_matches_directory_without_default() {
    let backend = MemoryBackend::new();
    backend.insert_file("dir", 0o040755);
    let source = FileAcls {
        mode: 0o040755,
        access: None,
        default: Some(RsyncAcl::new()),
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = receiver
        .get_acl(Path::new("dir"), 0o040755)
        .expect("read destination");
    assert_eq!(dest.default, Some(RsyncAcl::new()));
    let status = receiver.set_acl(Some(Path::new("dir")), &entries[0], &mut dest);

    assert!(matches!(status, AclApplyStatus::Unchanged));
    assert_eq!(backend.delete_calls(), 0);
    assert_eq!(backend.set_calls(), 0);
    let cached = receiver
        .received_cache()
        .get(AclType::Default, 0)
        .expect("cached");
    assert!(cached.native().is_none());
}

#[test]
fn second_apply_is_unchanged() {
    let backend = MemoryBackend::new();
    backend.insert_file("dir", 0o040750);
    let source = FileAcls {
        mode: 0o040750,
        access: Some(acl(7, 5, 7, 0, &[IdAccess::group(100, 7)])),
        default: Some(acl(7, 5, 5, 0, &[IdAccess::user(1000, 5)])),
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);
    let path = Path::new("dir");

    let mut dest = receiver.get_acl(path, 0o040750).expect("read");
    let first = receiver.set_acl(Some(path), &entries[0], &mut dest);
    assert!(matches!(first, AclApplyStatus::Changed));
    assert_eq!(backend.set_calls(), 2);

    let mut dest = receiver.get_acl(path, 0o040750).expect("read");
    let second = receiver.set_acl(Some(path), &entries[0], &mut dest);
    assert!(matches!(second, AclApplyStatus::Unchanged));
    assert_eq!(backend.set_calls(), 2);
}

#[test]
fn native_handle_is_built_once_per_cache_slot() {
    let backend = MemoryBackend::new();
    backend.insert_file("a", 0o100640);
    backend.insert_file("b", 0o100640);
    let source = FileAcls {
        mode: 0o100640,
        access: Some(acl(6, 4, 6, 0, &[IdAccess::user(1000, 6)])),
        default: None,
    };
    let (mut receiver, entries) =
        transfer(&backend, AclOptions::new(), &[source.clone(), source]);
    assert_eq!(entries[0].access, entries[1].access);

    for (name, entry) in ["a", "b"].into_iter().zip(&entries) {
        let path = Path::new(name);
        let mut dest = receiver.get_acl(path, 0o100640).expect("read");
        let status = receiver.set_acl(Some(path), entry, &mut dest);
        assert!(matches!(status, AclApplyStatus::Changed));
    }

    let cached = receiver
        .received_cache()
        .get(AclType::Access, 0)
        .expect("cached");
    assert!(cached.native().is_some());
    assert_eq!(backend.set_calls(), 2);
    assert_eq!(
        backend.acl(Path::new("b"), AclType::Access),
        backend.acl(Path::new("a"), AclType::Access)
    );
}

#[test]
fn access_apply_reports_the_new_mode() {
    let backend = MemoryBackend::new();
    backend.insert_file("f", 0o100600);
    let source = FileAcls {
        mode: 0o100750,
        access: Some(acl(7, 5, 5, 0, &[IdAccess::user(1000, 5)])),
        default: None,
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = receiver.get_acl(Path::new("f"), 0o100600).expect("read");
    let status = receiver.set_acl(Some(Path::new("f")), &entries[0], &mut dest);
    assert!(matches!(status, AclApplyStatus::Changed));
    assert_eq!(dest.mode, 0o100750);
    assert_eq!(backend.mode(Path::new("f")), Some(0o100750));
}

#[test]
fn read_only_destination_fails_before_touching_anything() {
    let backend = MemoryBackend::new();
    backend.insert_file("f", 0o100644);
    let options = AclOptions::new().read_only(true);
    let source = FileAcls {
        mode: 0o100644,
        access: Some(acl(6, 4, 6, 4, &[IdAccess::user(1000, 6)])),
        default: None,
    };
    let (mut receiver, entries) = transfer(&backend, options, &[source]);
    let mut dest = FileAcls::new(0o100644);

    let AclApplyStatus::Failed(err) = receiver.set_acl(None, &entries[0], &mut dest) else {
        panic!("read-only session must refuse");
    };
    assert_eq!(
        err.source_error().kind(),
        io::ErrorKind::ReadOnlyFilesystem
    );
    assert_eq!(err.path(), Path::new("."));
    assert_eq!(backend.set_calls(), 0);

    // A dry run may still report differences.
    let dry = AclOptions::new().read_only(true).dry_run(true);
    let source = FileAcls {
        mode: 0o100644,
        access: Some(acl(6, 4, 6, 4, &[IdAccess::user(1000, 6)])),
        default: None,
    };
    let (mut receiver, entries) = transfer(&backend, dry, &[source]);
    let status = receiver.set_acl(Some(Path::new("f")), &entries[0], &mut dest);
    assert!(matches!(status, AclApplyStatus::Changed));
    assert_eq!(backend.set_calls(), 0);
}

#[test]
fn check_only_reports_difference_without_writing() {
    let backend = MemoryBackend::new();
    backend.insert_file("f", 0o100644);
    let source = FileAcls {
        mode: 0o100644,
        access: Some(acl(6, 4, 6, 4, &[IdAccess::group(10, 6)])),
        default: None,
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);
    let mut dest = receiver.get_acl(Path::new("f"), 0o100644).expect("read");

    let status = receiver.set_acl(None, &entries[0], &mut dest);
    assert!(matches!(status, AclApplyStatus::Changed));
    assert_eq!(backend.set_calls(), 0);
}

#[test]
fn failure_dominates_and_keeps_first_error() {
    let backend = MemoryBackend::new();
    backend.insert_file("dir", 0o040755);
    backend.fail_writes("dir");
    let source = FileAcls {
        mode: 0o040755,
        access: Some(acl(7, 5, 7, 5, &[IdAccess::user(1000, 7)])),
        default: Some(acl(7, 5, NO_ENTRY, 5, &[])),
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = receiver.get_acl(Path::new("dir"), 0o040755).expect("read");
    let status = receiver.set_acl(Some(Path::new("dir")), &entries[0], &mut dest);
    let err = status.into_error().expect("failed");
    assert_eq!(err.context(), "set ACL");
    assert_eq!(err.step(), Some(AclStep::SetFile));
    assert_eq!(err.source_error().kind(), io::ErrorKind::PermissionDenied);
    // The failed access write left the recorded mode alone.
    assert_eq!(dest.mode, 0o040755);
}

#[test]
fn unpackable_cached_acl_fails_the_apply() {
    let backend = MemoryBackend::new();
    backend.insert_file("f", 0o100644);
    let mut receiver = AclSession::new(&backend, AclOptions::new());
    let mut entry = FileAclIndices::new(0o100644);
    // Locally cached ACLs are not range checked; 9 cannot be packed.
    receiver.cache_acl(
        &mut entry,
        FileAcls {
            mode: 0o100644,
            access: Some(acl(6, 4, 6, 9, &[IdAccess::user(1000, 6)])),
            default: None,
        },
    );

    let mut dest = receiver.get_acl(Path::new("f"), 0o100644).expect("read");
    let err = receiver
        .set_acl(Some(Path::new("f")), &entry, &mut dest)
        .into_error()
        .expect("pack failure");
    assert_eq!(err.step(), Some(AclStep::SetPermset));
    assert_eq!(backend.set_calls(), 0);
}

#[test]
fn out_of_range_index_is_ignored() {
    let backend = MemoryBackend::new();
    let mut session = AclSession::new(&backend, AclOptions::new());
    let entry = FileAclIndices {
        mode: 0o040755,
        access: Some(3),
        default: Some(3),
    };
    let mut dest = FileAcls::new(0o040755);
    let status = session.set_acl(Some(Path::new("dir")), &entry, &mut dest);
    assert!(matches!(status, AclApplyStatus::Unchanged));
}

#[test]
fn default_perms_come_from_default_acl_or_umask() {
    let backend = MemoryBackend::new();
    backend.insert_file("plain", 0o040755);
    backend.insert_file("acl", 0o040755);
    backend
        .seed_acl(
            Path::new("acl"),
            AclType::Default,
            &acl(7, 7, 7, 5, &[IdAccess::group(20, 7)]),
        )
        .expect("seed");

    let session = AclSession::new(&backend, AclOptions::new().orig_umask(0o027));
    assert_eq!(session.default_perms_for_dir(Some(Path::new("plain"))), 0o750);
    assert_eq!(session.default_perms_for_dir(Some(Path::new("acl"))), 0o775);
    // Missing directory: logged, then umask.
    assert_eq!(session.default_perms_for_dir(Some(Path::new("gone"))), 0o750);
    // No path means the current directory.
    assert_eq!(session.default_perms_for_dir(None), 0o750);

    let dry = AclSession::new(&backend, AclOptions::new().dry_run(true));
    assert_eq!(dry.default_perms_for_dir(Some(Path::new("gone"))), 0o755);

    let unsupported = MemoryBackend::new().unsupported();
    let session = AclSession::new(&unsupported, AclOptions::new());
    assert_eq!(session.default_perms_for_dir(Some(Path::new("any"))), 0o755);
}

#[test]
fn lossy_platform_clears_special_bits_from_recorded_mode() {
    let traits = PlatformTraits {
        loses_special_mode_bits: true,
        ..PlatformTraits::POSIX
    };
    let backend = MemoryBackend::new().with_traits(traits);
    backend.insert_file("f", 0o102750);
    let source = FileAcls {
        mode: 0o102750,
        access: Some(acl(7, 5, 5, 0, &[IdAccess::user(1000, 5)])),
        default: None,
    };
    let (mut receiver, entries) = transfer(&backend, AclOptions::new(), &[source]);

    let mut dest = receiver.get_acl(Path::new("f"), 0o102750).expect("read");
    let status = receiver.set_acl(Some(Path::new("f")), &entries[0], &mut dest);
    assert!(matches!(status, AclApplyStatus::Changed));
    // The chmod step sees a difference and restores setgid.
    assert_eq!(dest.mode, 0o100750);
    assert_eq!(backend.mode(Path::new("f")), Some(0o100750));
}
