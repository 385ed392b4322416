//! Wire and model constants for ACL transmission.
//!
//! Values match upstream rsync's `acls.c` so both peers agree on every bit.

/// Flag byte bit: the user-owner permission follows.
pub const XMIT_USER_OBJ: u8 = 1 << 0;

/// Flag byte bit: the owning-group permission follows.
pub const XMIT_GROUP_OBJ: u8 = 1 << 1;

/// Flag byte bit: the mask permission follows.
pub const XMIT_MASK_OBJ: u8 = 1 << 2;

/// Flag byte bit: the "other" permission follows.
pub const XMIT_OTHER_OBJ: u8 = 1 << 3;

/// Flag byte bit: a named user/group list follows.
pub const XMIT_NAME_LIST: u8 = 1 << 4;

/// Sentinel stored in an object slot that carries no value.
///
/// It sits above every legal permission value, so it never collides with one.
pub const NO_ENTRY: u8 = 0x80;

/// Marker bit on a named entry's access value: the id is a user, not a group.
pub const NAME_IS_USER: u32 = 1 << 31;

/// Low wire flag on a named access value: a name string follows the id.
pub const XFLAG_NAME_FOLLOWS: u32 = 0x0001;

/// Low wire flag on a named access value: the id denotes a user.
pub const XFLAG_NAME_IS_USER: u32 = 0x0002;

/// Number of flag bits below the shifted access value on the wire.
pub const ACCESS_SHIFT: u32 = 2;

/// Permission bits legal in an object slot (`rwx`).
pub const VALID_OBJ_BITS: u32 = 0o7;

/// Permission bits legal in a named entry once the wire flags are removed.
pub const VALID_NAME_BITS: u32 = 0o7;

/// Largest symbolic name that can follow a named entry (one length byte).
pub const MAX_NAME_LEN: usize = u8::MAX as usize;
