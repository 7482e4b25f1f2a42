//! Outgoing response payload builders
//!
//! Shapes the (status, attributes) outcome of a ledger call into the
//! attribute payload for each response kind. Field inclusion is part of the
//! contract: a failed lookup must not carry zero-filled metadata the kernel
//! could mistake for real values.

use crate::codec::AttrEncoder;
use crate::types::{attr, InodeAttrs, Status};

/// Payload for a `StatusResponse`: `{ino, status}` only.
pub fn status_response(ino: u64, status: Status) -> Vec<u8> {
    let mut enc = AttrEncoder::new();
    enc.put_u64(attr::INO, ino);
    enc.put_u16(attr::STATUS, status.raw());
    enc.finish()
}

/// Payload for a `GetAttrResponse`.
///
/// Always carries `{status, ino}`; the remaining metadata is included only
/// on success, and omitted entirely otherwise so the receiver reads absence
/// as "unknown" rather than as a valid zero.
pub fn get_attr_response(status: Status, attrs: &InodeAttrs) -> Vec<u8> {
    let mut enc = AttrEncoder::new();
    enc.put_u16(attr::STATUS, status.raw());
    enc.put_u64(attr::INO, attrs.ino);
    if status == Status::Success {
        enc.put_u32(attr::MODE, attrs.mode);
        enc.put_u32(attr::UID, attrs.uid);
        enc.put_u32(attr::GID, attrs.gid);
        enc.nested(attr::ATIME, |e| {
            e.put_u64(attr::TIME_SEC, attrs.atime.sec);
            e.put_u32(attr::TIME_NSEC, attrs.atime.nsec);
        });
        enc.nested(attr::MTIME, |e| {
            e.put_u64(attr::TIME_SEC, attrs.mtime.sec);
            e.put_u32(attr::TIME_NSEC, attrs.mtime.nsec);
        });
        enc.nested(attr::CTIME, |e| {
            e.put_u64(attr::TIME_SEC, attrs.ctime.sec);
            e.put_u32(attr::TIME_NSEC, attrs.ctime.nsec);
        });
    }
    enc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AttrDecoder;
    use crate::types::{AttrMask, TimeSpec};

    fn field_ids(payload: &[u8]) -> Vec<u16> {
        AttrDecoder::new(payload)
            .map(|record| record.unwrap().id)
            .collect()
    }

    #[test]
    fn status_response_carries_ino_and_status_only() {
        let payload = status_response(42, Status::Fail);
        assert_eq!(field_ids(&payload), vec![attr::INO, attr::STATUS]);

        let mut decoder = AttrDecoder::new(&payload);
        assert_eq!(decoder.next().unwrap().unwrap().u64().unwrap(), 42);
        assert_eq!(
            decoder.next().unwrap().unwrap().u16().unwrap(),
            Status::Fail.raw()
        );
    }

    #[test]
    fn failed_get_attr_response_omits_metadata() {
        let attrs = InodeAttrs { ino: 42, ..Default::default() };
        let payload = get_attr_response(Status::InodeNotFound, &attrs);
        assert_eq!(field_ids(&payload), vec![attr::STATUS, attr::INO]);
    }

    #[test]
    fn successful_get_attr_response_carries_full_record() {
        let attrs = InodeAttrs {
            ino: 42,
            uid: 1000,
            gid: 100,
            mode: 0o644,
            atime: TimeSpec { sec: 1, nsec: 2 },
            mtime: TimeSpec { sec: 3, nsec: 4 },
            ctime: TimeSpec { sec: 5, nsec: 6 },
        };
        let payload = get_attr_response(Status::Success, &attrs);
        assert_eq!(
            field_ids(&payload),
            vec![
                attr::STATUS,
                attr::INO,
                attr::MODE,
                attr::UID,
                attr::GID,
                attr::ATIME,
                attr::MTIME,
                attr::CTIME,
            ]
        );

        // Everything after status decodes back to the original record.
        let (decoded, present) = crate::codec::decode_attrs(&payload).unwrap();
        assert_eq!(decoded, attrs);
        assert_eq!(present, AttrMask::all());
    }
}
