use protocol::acl::AclWireOptions;

/// Session policy consulted while reading, sending and applying ACLs.
///
/// The values are fixed for the lifetime of a session; the ACL code only reads
/// them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AclOptions {
    dry_run: bool,
    read_only: bool,
    list_only: bool,
    am_root: bool,
    numeric_ids: bool,
    inc_recurse: bool,
    orig_umask: u32,
}

impl Default for AclOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AclOptions {
    /// Default process umask assumed when none is configured.
    pub const DEFAULT_UMASK: u32 = 0o022;

    /// Creates a new [`AclOptions`] value with every flag cleared and the
    /// default umask.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dry_run: false,
            read_only: false,
            list_only: false,
            am_root: false,
            numeric_ids: false,
            inc_recurse: false,
            orig_umask: Self::DEFAULT_UMASK,
        }
    }

    /// Reports changes without touching the destination.
    #[must_use]
    #[doc(alias = "--dry-run")]
    #[doc(alias = "-n")]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Marks the destination as read-only; applying ACLs then fails with
    /// `EROFS` unless this is a dry run.
    #[must_use]
    pub const fn read_only(mut self, enabled: bool) -> Self {
        self.read_only = enabled;
        self
    }

    /// Marks the session as listing only.
    #[must_use]
    #[doc(alias = "--list-only")]
    pub const fn list_only(mut self, enabled: bool) -> Self {
        self.list_only = enabled;
        self
    }

    /// Records whether the receiver runs with elevated privileges.
    #[must_use]
    pub const fn am_root(mut self, enabled: bool) -> Self {
        self.am_root = enabled;
        self
    }

    /// Preserves ids numerically instead of mapping them by name.
    #[must_use]
    #[doc(alias = "--numeric-ids")]
    pub const fn numeric_ids(mut self, enabled: bool) -> Self {
        self.numeric_ids = enabled;
        self
    }

    /// Enables incremental recursion, which sends names with ids.
    #[must_use]
    pub const fn inc_recurse(mut self, enabled: bool) -> Self {
        self.inc_recurse = enabled;
        self
    }

    /// Sets the umask the process started with.
    #[must_use]
    pub const fn orig_umask(mut self, umask: u32) -> Self {
        self.orig_umask = umask & 0o777;
        self
    }

    /// Reports whether this is a dry run.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reports whether the destination is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Reports whether the session only lists files.
    #[must_use]
    pub const fn is_list_only(&self) -> bool {
        self.list_only
    }

    /// Reports whether the receiver is privileged.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.am_root
    }

    /// Reports whether ids are preserved numerically.
    #[must_use]
    pub const fn uses_numeric_ids(&self) -> bool {
        self.numeric_ids
    }

    /// Reports whether incremental recursion is active.
    #[must_use]
    pub const fn is_inc_recurse(&self) -> bool {
        self.inc_recurse
    }

    /// Returns the configured umask.
    #[must_use]
    pub const fn umask(&self) -> u32 {
        self.orig_umask
    }

    /// Returns true when applying ACLs must be refused up front.
    #[must_use]
    pub const fn forbids_writes(&self) -> bool {
        !self.dry_run && (self.read_only || self.list_only)
    }

    /// Extracts the subset of policy the wire codec needs.
    #[must_use]
    pub const fn wire_options(&self) -> AclWireOptions {
        AclWireOptions::new()
            .inc_recurse(self.inc_recurse)
            .am_root(self.am_root)
            .numeric_ids(self.numeric_ids)
    }
}
