//! Identity mapping against the local user and group databases.

use protocol::acl::{ACL_TARGET, IdMapper};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::id_lookup::{
    lookup_group_by_name, lookup_group_name, lookup_user_by_name, lookup_user_name,
};
use crate::options::AclOptions;

/// [`IdMapper`] backed by the local passwd and group databases.
///
/// The sender offers each id's name once per session; root (id 0) and
/// numeric-only sessions never carry names. The receiver resolves each name
/// it is given to a local id and remembers the mapping, so later entries that
/// repeat the id without a name map the same way.
#[derive(Clone, Debug, Default)]
pub struct LocalIdMapper {
    numeric_ids: bool,
    sent_uids: FxHashSet<u32>,
    sent_gids: FxHashSet<u32>,
    uid_map: FxHashMap<u32, u32>,
    gid_map: FxHashMap<u32, u32>,
}

impl LocalIdMapper {
    /// Creates a mapper; with `numeric_ids` every id is kept as-is.
    pub fn new(numeric_ids: bool) -> Self {
        Self {
            numeric_ids,
            ..Self::default()
        }
    }

    /// Creates a mapper following the session's numeric-ids policy.
    pub fn from_options(options: &AclOptions) -> Self {
        Self::new(options.uses_numeric_ids())
    }

    fn should_send(&self, id: u32) -> bool {
        !self.numeric_ids && id != 0
    }
}

fn utf8_name(name: Option<Vec<u8>>) -> Option<String> {
    name.and_then(|bytes| String::from_utf8(bytes).ok())
}

fn resolve(kind: &str, id: u32, name: &[u8], found: std::io::Result<Option<u32>>) -> u32 {
    match found {
        Ok(Some(local)) => {
            if local != id {
                debug!(
                    target: ACL_TARGET,
                    kind,
                    name = %String::from_utf8_lossy(name),
                    id,
                    local,
                    "mapped id by name"
                );
            }
            local
        }
        Ok(None) => id,
        Err(err) => {
            warn!(
                target: ACL_TARGET,
                kind,
                name = %String::from_utf8_lossy(name),
                "name lookup failed: {err}"
            );
            id
        }
    }
}

impl IdMapper for LocalIdMapper {
    fn user_name(&mut self, uid: u32) -> Option<String> {
        if !self.should_send(uid) || !self.sent_uids.insert(uid) {
            return None;
        }
        utf8_name(lookup_user_name(uid).ok().flatten())
    }

    fn group_name(&mut self, gid: u32) -> Option<String> {
        if !self.should_send(gid) || !self.sent_gids.insert(gid) {
            return None;
        }
        utf8_name(lookup_group_name(gid).ok().flatten())
    }

    fn recv_user_name(&mut self, uid: u32, name: &[u8]) -> u32 {
        let local = if self.numeric_ids || name.is_empty() {
            uid
        } else {
            resolve("user", uid, name, lookup_user_by_name(name))
        };
        self.uid_map.insert(uid, local);
        local
    }

    fn recv_group_name(&mut self, gid: u32, name: &[u8]) -> u32 {
        let local = if self.numeric_ids || name.is_empty() {
            gid
        } else {
            resolve("group", gid, name, lookup_group_by_name(name))
        };
        self.gid_map.insert(gid, local);
        local
    }

    fn match_uid(&mut self, uid: u32) -> u32 {
        self.uid_map.get(&uid).copied().unwrap_or(uid)
    }

    fn match_gid(&mut self, gid: u32) -> u32 {
        self.gid_map.get(&gid).copied().unwrap_or(gid)
    }
}
