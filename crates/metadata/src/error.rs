use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Native ACL primitive that failed, named after its POSIX.1e counterpart.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AclStep {
    /// Reading a path's ACL.
    GetFile,
    /// Writing a path's ACL.
    SetFile,
    /// Removing a directory's default ACL.
    DeleteDefFile,
    /// Allocating a new entry in a handle.
    CreateEntry,
    /// Setting an entry's tag.
    SetTagType,
    /// Setting an entry's id qualifier.
    SetQualifier,
    /// Setting an entry's permission bits.
    SetPermset,
    /// Looking up an entry by position.
    GetEntry,
    /// Reading an entry's id qualifier.
    GetQualifier,
    /// Checking a handle for consistency.
    Valid,
}

impl AclStep {
    /// Returns the primitive's C name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetFile => "acl_get_file",
            Self::SetFile => "acl_set_file",
            Self::DeleteDefFile => "acl_delete_def_file",
            Self::CreateEntry => "acl_create_entry",
            Self::SetTagType => "acl_set_tag_type",
            Self::SetQualifier => "acl_set_qualifier",
            Self::SetPermset => "acl_set_permset",
            Self::GetEntry => "acl_get_entry",
            Self::GetQualifier => "acl_get_qualifier",
            Self::Valid => "acl_valid",
        }
    }
}

impl fmt::Display for AclStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a native ACL backend.
#[derive(Debug, Error)]
pub enum AclError {
    /// The filesystem or platform has no ACL support. Not an error for
    /// callers: the access ACL is synthesized from the mode instead.
    #[error("ACLs are not supported")]
    Unsupported,
    /// A native primitive failed.
    #[error("{step}() failed: {source}")]
    Native {
        /// The primitive that failed.
        step: AclStep,
        /// The platform error.
        #[source]
        source: io::Error,
    },
}

impl AclError {
    /// Classifies an [`io::Error`] raised by `step`.
    ///
    /// `ENOTSUP`, `EOPNOTSUPP` and `ENOSYS` mean ACLs are unavailable.
    pub fn from_io(step: AclStep, source: io::Error) -> Self {
        if is_unsupported_error(&source) {
            Self::Unsupported
        } else {
            Self::Native { step, source }
        }
    }

    /// Builds an `EINVAL` failure for `step`.
    pub fn invalid(step: AclStep, message: &'static str) -> Self {
        Self::Native {
            step,
            source: io::Error::new(io::ErrorKind::InvalidInput, message),
        }
    }

    /// Returns the failing primitive, if any.
    pub const fn step(&self) -> Option<AclStep> {
        match self {
            Self::Unsupported => None,
            Self::Native { step, .. } => Some(*step),
        }
    }

    /// Returns true when ACLs are unavailable.
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }

    /// Converts into the underlying [`io::Error`].
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Unsupported => io::Error::from(io::ErrorKind::Unsupported),
            Self::Native { source, .. } => source,
        }
    }
}

/// Returns true if `error` means the platform or filesystem lacks ACLs.
pub fn is_unsupported_error(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        if let Some(code) = error.raw_os_error() {
            return code == libc::ENOTSUP || code == libc::EOPNOTSUPP || code == libc::ENOSYS;
        }
    }
    error.kind() == io::ErrorKind::Unsupported
}

/// Error produced when reading or applying a file's ACLs fails.
#[derive(Debug)]
pub struct MetadataError {
    context: &'static str,
    path: PathBuf,
    step: Option<AclStep>,
    source: io::Error,
}

impl MetadataError {
    /// Creates a new [`MetadataError`] from the supplied context, path, and source error.
    pub fn new(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            context,
            path: path.to_path_buf(),
            step: None,
            source,
        }
    }

    /// Creates a [`MetadataError`] from a backend failure, keeping the step.
    pub fn from_acl(context: &'static str, path: &Path, error: AclError) -> Self {
        let step = error.step();
        Self {
            context,
            path: path.to_path_buf(),
            step,
            source: error.into_io(),
        }
    }

    /// Returns the operation being performed when the error occurred.
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.context
    }

    /// Returns the path involved in the failing operation.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the native primitive that failed, when known.
    #[must_use]
    pub const fn step(&self) -> Option<AclStep> {
        self.step
    }

    /// Returns the underlying [`io::Error`] that triggered this failure.
    #[must_use]
    pub fn source_error(&self) -> &io::Error {
        &self.source
    }

    /// Consumes the error and returns its constituent parts.
    #[must_use]
    pub fn into_parts(self) -> (&'static str, PathBuf, io::Error) {
        (self.context, self.path, self.source)
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to {} '{}': ", self.context, self.path.display())?;
        if let Some(step) = self.step {
            write!(f, "{step}(): ")?;
        }
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<MetadataError> for io::Error {
    fn from(error: MetadataError) -> Self {
        let kind = error.source.kind();
        Self::new(kind, error)
    }
}
