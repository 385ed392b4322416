use std::io;

use thiserror::Error;

use super::entry::AclType;

/// Exit code reported when an ACL stream is corrupt (`RERR_STREAMIO`).
pub const STREAM_IO_EXIT_CODE: i32 = 12;

/// Fatal failures while decoding ACLs from the peer.
///
/// Peers are assumed to speak the same protocol, so any of these means the
/// stream is corrupt and the session must end.
#[derive(Debug, Error)]
pub enum AclProtocolError {
    /// A decoded permission value had bits outside the legal range.
    #[error("recv_acl_access: value out of range: {value:x}")]
    ValueOutOfRange {
        /// The offending value as received (flag bits already removed for
        /// named entries).
        value: u32,
    },
    /// A cache reference pointed past the end of the receiver's cache.
    #[error("recv_acl_index: {acl_type} ACL index {index} > {count}")]
    IndexOutOfRange {
        /// Cache kind the reference addressed.
        acl_type: AclType,
        /// Reference as received (cache index plus one).
        index: i32,
        /// Number of ACLs cached for that kind.
        count: usize,
    },
    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AclProtocolError {
    /// Returns the process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        STREAM_IO_EXIT_CODE
    }

    /// Returns true for range and index violations, as opposed to I/O errors.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl From<AclProtocolError> for io::Error {
    fn from(error: AclProtocolError) -> Self {
        match error {
            AclProtocolError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
