//! Core type definitions for the ext4_chain wire contract

use bitflags::bitflags;

/// Generic netlink family name registered by the kernel module.
///
/// Resolved to a numeric family id at daemon startup; the module must be
/// loaded (and the family registered) before the daemon can connect.
pub const FAMILY_NAME: &str = "ext4_chain";

/// Attribute identifiers used in message payloads.
///
/// These form a stable numeric contract with the kernel module: an id is
/// assigned once and never reused for a different meaning. `TIME_SEC` and
/// `TIME_NSEC` only appear inside the nested `ATIME`/`MTIME`/`CTIME` groups.
pub mod attr {
    pub const UNSPEC: u16 = 0;
    pub const UID: u16 = 1;
    pub const GID: u16 = 2;
    pub const ATIME: u16 = 3;
    pub const MTIME: u16 = 4;
    pub const CTIME: u16 = 5;
    pub const TIME_SEC: u16 = 6;
    pub const TIME_NSEC: u16 = 7;
    pub const MODE: u16 = 8;
    pub const INO: u16 = 9;
    pub const STATUS: u16 = 10;
}

/// Message commands carried in the generic netlink header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Daemon → kernel registration; empty payload.
    SetPid,
    NewInodeRequest,
    SetAttrRequest,
    GetAttrRequest,
    StatusResponse,
    GetAttrResponse,
}

impl Command {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::SetPid),
            2 => Some(Self::NewInodeRequest),
            3 => Some(Self::SetAttrRequest),
            4 => Some(Self::GetAttrRequest),
            5 => Some(Self::StatusResponse),
            6 => Some(Self::GetAttrResponse),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::SetPid => 1,
            Self::NewInodeRequest => 2,
            Self::SetAttrRequest => 3,
            Self::GetAttrRequest => 4,
            Self::StatusResponse => 5,
            Self::GetAttrResponse => 6,
        }
    }
}

/// Operation outcome reported back to the kernel.
///
/// The only information a ledger outcome can convey across the wire;
/// richer backend errors are collapsed into one of these before encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Fail,
    InodeNotFound,
}

impl Status {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Success),
            1 => Some(Self::Fail),
            2 => Some(Self::InodeNotFound),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Success => 0,
            Self::Fail => 1,
            Self::InodeNotFound => 2,
        }
    }
}

/// Seconds/nanoseconds pair; always travels as a nested attribute group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeSpec {
    pub sec: u64,
    pub nsec: u32,
}

/// Inode metadata record exchanged with the kernel and stored in the ledger.
///
/// `ino` is the primary key for every ledger operation and is immutable once
/// a record exists. Which of the remaining fields are meaningful is tracked
/// separately by an [`AttrMask`]; a zero value with its mask bit set is a
/// real value, not "unset".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InodeAttrs {
    pub ino: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,
}

bitflags! {
    /// Presence set naming which `InodeAttrs` fields were carried on the wire.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrMask: u32 {
        const UID = 1 << 0;
        const GID = 1 << 1;
        const ATIME = 1 << 2;
        const MTIME = 1 << 3;
        const CTIME = 1 << 4;
        const MODE = 1 << 5;
        const INO = 1 << 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_raw_round_trip() {
        for raw in 1..=6u8 {
            let cmd = Command::from_raw(raw).unwrap();
            assert_eq!(cmd.raw(), raw);
        }
        assert_eq!(Command::from_raw(0), None);
        assert_eq!(Command::from_raw(7), None);
    }

    #[test]
    fn status_raw_round_trip() {
        assert_eq!(Status::from_raw(0), Some(Status::Success));
        assert_eq!(Status::from_raw(2), Some(Status::InodeNotFound));
        assert_eq!(Status::from_raw(3), None);
        assert_eq!(Status::Fail.raw(), 1);
    }
}
