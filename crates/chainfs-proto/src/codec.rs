//! Netlink TLV attribute codec
//!
//! Attributes are length-tagged records: a 4-byte header (u16 length
//! including the header, u16 type) followed by a native-endian payload,
//! padded to 4-byte alignment. Composite fields (the time groups) set
//! `NLA_F_NESTED` and carry a payload that is itself a TLV sequence.
//!
//! Decoding skips unknown attribute ids. Any structural damage (truncated
//! headers, lengths that overrun the buffer, scalars of the wrong width, a
//! broken nest) fails the whole message rather than yielding a
//! partially-populated record.

use tracing::debug;

use crate::error::ProtoError;
use crate::types::{attr, AttrMask, InodeAttrs, TimeSpec};

const NLA_HDRLEN: usize = 4;
const NLA_ALIGNTO: usize = 4;

pub const NLA_F_NESTED: u16 = 0x8000;
pub const NLA_TYPE_MASK: u16 = 0x3fff;

fn align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Builds a TLV attribute stream with deterministic field order.
#[derive(Default)]
pub struct AttrEncoder {
    buf: Vec<u8>,
}

impl AttrEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&mut self, ty: u16, payload: &[u8]) {
        let len = (NLA_HDRLEN + payload.len()) as u16;
        self.buf.extend_from_slice(&len.to_ne_bytes());
        self.buf.extend_from_slice(&ty.to_ne_bytes());
        self.buf.extend_from_slice(payload);
        let padded = align(self.buf.len());
        self.buf.resize(padded, 0);
    }

    pub fn put_u16(&mut self, ty: u16, value: u16) {
        self.put(ty, &value.to_ne_bytes());
    }

    pub fn put_u32(&mut self, ty: u16, value: u32) {
        self.put(ty, &value.to_ne_bytes());
    }

    pub fn put_u64(&mut self, ty: u16, value: u64) {
        self.put(ty, &value.to_ne_bytes());
    }

    /// NUL-terminated string attribute (used for the family name lookup).
    pub fn put_str(&mut self, ty: u16, value: &str) {
        let mut payload = Vec::with_capacity(value.len() + 1);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.put(ty, &payload);
    }

    /// Encode a nested attribute group under `ty`.
    pub fn nested(&mut self, ty: u16, build: impl FnOnce(&mut AttrEncoder)) {
        let mut inner = AttrEncoder::new();
        build(&mut inner);
        self.put(ty | NLA_F_NESTED, &inner.buf);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A single decoded attribute record.
pub struct Attr<'a> {
    /// Attribute id with the nested/byte-order flag bits stripped.
    pub id: u16,
    payload: &'a [u8],
}

impl<'a> Attr<'a> {
    pub fn u16(&self) -> Result<u16, ProtoError> {
        let bytes: [u8; 2] = self
            .payload
            .try_into()
            .map_err(|_| ProtoError::Malformed("u16 attribute has wrong width"))?;
        Ok(u16::from_ne_bytes(bytes))
    }

    pub fn u32(&self) -> Result<u32, ProtoError> {
        let bytes: [u8; 4] = self
            .payload
            .try_into()
            .map_err(|_| ProtoError::Malformed("u32 attribute has wrong width"))?;
        Ok(u32::from_ne_bytes(bytes))
    }

    pub fn u64(&self) -> Result<u64, ProtoError> {
        let bytes: [u8; 8] = self
            .payload
            .try_into()
            .map_err(|_| ProtoError::Malformed("u64 attribute has wrong width"))?;
        Ok(u64::from_ne_bytes(bytes))
    }

    /// NUL-terminated string payload.
    pub fn str(&self) -> Result<&'a str, ProtoError> {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..end])
            .map_err(|_| ProtoError::Malformed("string attribute is not utf-8"))
    }

    /// Iterate the records of a nested attribute group.
    pub fn nested(&self) -> AttrDecoder<'a> {
        AttrDecoder::new(self.payload)
    }
}

/// Iterates the attribute records of a TLV buffer.
pub struct AttrDecoder<'a> {
    rest: &'a [u8],
}

impl<'a> AttrDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { rest: buf }
    }
}

impl<'a> Iterator for AttrDecoder<'a> {
    type Item = Result<Attr<'a>, ProtoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < NLA_HDRLEN {
            self.rest = &[];
            return Some(Err(ProtoError::Malformed("truncated attribute header")));
        }
        let len = u16::from_ne_bytes([self.rest[0], self.rest[1]]) as usize;
        let ty = u16::from_ne_bytes([self.rest[2], self.rest[3]]);
        if len < NLA_HDRLEN {
            self.rest = &[];
            return Some(Err(ProtoError::Malformed("attribute length shorter than its header")));
        }
        if len > self.rest.len() {
            self.rest = &[];
            return Some(Err(ProtoError::Malformed("attribute overruns the buffer")));
        }
        let payload = &self.rest[NLA_HDRLEN..len];
        // The final attribute may omit its trailing padding.
        self.rest = &self.rest[align(len).min(self.rest.len())..];
        Some(Ok(Attr {
            id: ty & NLA_TYPE_MASK,
            payload,
        }))
    }
}

fn encode_time(enc: &mut AttrEncoder, time: TimeSpec) {
    enc.put_u64(attr::TIME_SEC, time.sec);
    enc.put_u32(attr::TIME_NSEC, time.nsec);
}

fn decode_time(record: &Attr<'_>) -> Result<TimeSpec, ProtoError> {
    let mut time = TimeSpec::default();
    for sub in record.nested() {
        let sub = sub?;
        match sub.id {
            attr::TIME_SEC => time.sec = sub.u64()?,
            attr::TIME_NSEC => time.nsec = sub.u32()?,
            _ => {}
        }
    }
    Ok(time)
}

/// Serialize the fields of `attrs` selected by `present`, in the fixed
/// order uid, gid, atime, mtime, ctime, mode, ino.
pub fn encode_attrs(attrs: &InodeAttrs, present: AttrMask) -> Vec<u8> {
    let mut enc = AttrEncoder::new();
    if present.contains(AttrMask::UID) {
        enc.put_u32(attr::UID, attrs.uid);
    }
    if present.contains(AttrMask::GID) {
        enc.put_u32(attr::GID, attrs.gid);
    }
    if present.contains(AttrMask::ATIME) {
        enc.nested(attr::ATIME, |e| encode_time(e, attrs.atime));
    }
    if present.contains(AttrMask::MTIME) {
        enc.nested(attr::MTIME, |e| encode_time(e, attrs.mtime));
    }
    if present.contains(AttrMask::CTIME) {
        enc.nested(attr::CTIME, |e| encode_time(e, attrs.ctime));
    }
    if present.contains(AttrMask::MODE) {
        enc.put_u32(attr::MODE, attrs.mode);
    }
    if present.contains(AttrMask::INO) {
        enc.put_u64(attr::INO, attrs.ino);
    }
    enc.finish()
}

/// Decode a full attribute payload, returning the record plus the presence
/// set of fields actually seen on the wire.
pub fn decode_attrs(payload: &[u8]) -> Result<(InodeAttrs, AttrMask), ProtoError> {
    let mut attrs = InodeAttrs::default();
    let mut present = AttrMask::empty();
    for record in AttrDecoder::new(payload) {
        let record = record?;
        match record.id {
            attr::UID => {
                attrs.uid = record.u32()?;
                present |= AttrMask::UID;
            }
            attr::GID => {
                attrs.gid = record.u32()?;
                present |= AttrMask::GID;
            }
            attr::ATIME => {
                attrs.atime = decode_time(&record)?;
                present |= AttrMask::ATIME;
            }
            attr::MTIME => {
                attrs.mtime = decode_time(&record)?;
                present |= AttrMask::MTIME;
            }
            attr::CTIME => {
                attrs.ctime = decode_time(&record)?;
                present |= AttrMask::CTIME;
            }
            attr::MODE => {
                attrs.mode = record.u32()?;
                present |= AttrMask::MODE;
            }
            attr::INO => {
                attrs.ino = record.u64()?;
                present |= AttrMask::INO;
            }
            id => debug!(id, "skipping unknown attribute"),
        }
    }
    Ok((attrs, present))
}

/// Decode the single-`ino` payload of a `GetAttrRequest`.
pub fn decode_ino(payload: &[u8]) -> Result<u64, ProtoError> {
    let mut decoder = AttrDecoder::new(payload);
    match decoder.next() {
        Some(Ok(record)) if record.id == attr::INO => record.u64(),
        Some(Ok(record)) => Err(ProtoError::UnexpectedAttribute {
            want: attr::INO,
            got: record.id,
        }),
        Some(Err(err)) => Err(err),
        None => Err(ProtoError::UnexpectedAttribute {
            want: attr::INO,
            got: attr::UNSPEC,
        }),
    }
}
