//! Generic netlink connection manager
//!
//! Owns the kernel-facing `AF_NETLINK` socket: resolves the `ext4_chain`
//! family through the nlctrl control family, registers this process as the
//! module's reply sink with `SetPid`, and frames outbound/inbound generic
//! netlink messages. The socket closes when the connection is dropped, on
//! every exit path.
//!
//! Header and attribute framing is pure byte-slice work so it is testable
//! without a socket; only `connect`/`recv`/`send` touch the fd.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, OwnedFd};

use chainfs_proto::{AttrDecoder, AttrEncoder, Command};
use nix::errno::Errno;
use nix::sys::socket::{
    bind, getsockname, recvfrom, sendto, socket, AddressFamily, MsgFlags, NetlinkAddr, SockFlag,
    SockProtocol, SockType,
};
use tracing::{debug, info, warn};

use crate::dispatch::{Channel, InboundMessage};

// netlink control message types
const NLMSG_NOOP: u16 = 1;
const NLMSG_ERROR: u16 = 2;
const NLMSG_DONE: u16 = 3;

const NLM_F_REQUEST: u16 = 0x01;

// generic netlink control family (nlctrl)
const GENL_ID_CTRL: u16 = 0x10;
const CTRL_CMD_GETFAMILY: u8 = 3;
const CTRL_VERSION: u8 = 2;
const CTRL_ATTR_FAMILY_ID: u16 = 1;
const CTRL_ATTR_FAMILY_NAME: u16 = 2;
const CTRL_ATTR_VERSION: u16 = 3;

const NLMSG_HDRLEN: usize = 16;
const GENL_HDRLEN: usize = 4;
const RECV_BUF_LEN: usize = 8192;

/// Connection-level failure. Fatal at startup; fatal mid-run only when
/// raised from `recv`.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("netlink transport failure: {0}")]
    Transport(#[from] Errno),

    #[error("generic netlink family {name:?} not available (is the kernel module loaded?)")]
    FamilyUnavailable { name: String },

    #[error("kernel reported errno {errno}")]
    Kernel { errno: i32 },

    #[error("netlink channel closed")]
    Closed,

    #[error("malformed netlink frame: {0}")]
    BadFrame(&'static str),
}

/// Generic netlink family resolved at startup, immutable afterwards.
#[derive(Clone, Debug)]
pub struct Family {
    pub id: u16,
    pub version: u8,
    pub name: String,
}

#[derive(Debug)]
struct Frame<'a> {
    ty: u16,
    data: &'a [u8],
}

fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}

fn build_message(
    nl_type: u16,
    flags: u16,
    seq: u32,
    port: u32,
    cmd: u8,
    version: u8,
    payload: &[u8],
) -> Vec<u8> {
    let len = NLMSG_HDRLEN + GENL_HDRLEN + payload.len();
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&(len as u32).to_ne_bytes());
    buf.extend_from_slice(&nl_type.to_ne_bytes());
    buf.extend_from_slice(&flags.to_ne_bytes());
    buf.extend_from_slice(&seq.to_ne_bytes());
    buf.extend_from_slice(&port.to_ne_bytes());
    buf.push(cmd);
    buf.push(version);
    buf.extend_from_slice(&[0, 0]); // genlmsghdr reserved
    buf.extend_from_slice(payload);
    buf
}

fn parse_frames(mut buf: &[u8]) -> Result<Vec<Frame<'_>>, ConnError> {
    let mut frames = Vec::new();
    while !buf.is_empty() {
        if buf.len() < NLMSG_HDRLEN {
            return Err(ConnError::BadFrame("truncated netlink header"));
        }
        let len = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let ty = u16::from_ne_bytes([buf[4], buf[5]]);
        if len < NLMSG_HDRLEN || len > buf.len() {
            return Err(ConnError::BadFrame("netlink length out of range"));
        }
        frames.push(Frame {
            ty,
            data: &buf[NLMSG_HDRLEN..len],
        });
        buf = &buf[nlmsg_align(len).min(buf.len())..];
    }
    Ok(frames)
}

fn parse_errno(data: &[u8]) -> Result<i32, ConnError> {
    if data.len() < 4 {
        return Err(ConnError::BadFrame("truncated error message"));
    }
    Ok(i32::from_ne_bytes([data[0], data[1], data[2], data[3]]))
}

fn family_lookup_error(errno: i32, name: &str) -> ConnError {
    if errno == -(Errno::ENOENT as i32) {
        ConnError::FamilyUnavailable {
            name: name.to_string(),
        }
    } else {
        ConnError::Kernel { errno }
    }
}

fn parse_family_reply(data: &[u8]) -> Result<(u16, u8), ConnError> {
    if data.len() < GENL_HDRLEN {
        return Err(ConnError::BadFrame("truncated generic netlink header"));
    }
    let mut id = None;
    let mut version = 1u8;
    for record in AttrDecoder::new(&data[GENL_HDRLEN..]) {
        let record = record.map_err(|_| ConnError::BadFrame("malformed control attributes"))?;
        match record.id {
            CTRL_ATTR_FAMILY_ID => {
                let raw = record
                    .u16()
                    .map_err(|_| ConnError::BadFrame("bad family id attribute"))?;
                id = Some(raw);
            }
            CTRL_ATTR_VERSION => {
                let raw = record
                    .u32()
                    .map_err(|_| ConnError::BadFrame("bad family version attribute"))?;
                version = raw as u8;
            }
            _ => {}
        }
    }
    let id = id.ok_or(ConnError::BadFrame("control reply missing family id"))?;
    Ok((id, version))
}

/// The single kernel-facing channel.
///
/// Owned by the dispatch loop; sends are addressed with the family id and
/// version resolved at connect time.
pub struct NetlinkConnection {
    fd: OwnedFd,
    port: u32,
    seq: u32,
    family: Family,
    inbox: VecDeque<InboundMessage>,
}

impl NetlinkConnection {
    /// Open the channel, resolve `family_name`, and register this process
    /// as the module's reply sink. Any failure here is fatal.
    pub fn connect(family_name: &str) -> Result<Self, ConnError> {
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Raw,
            SockFlag::empty(),
            Some(SockProtocol::NetlinkGeneric),
        )?;
        bind(fd.as_raw_fd(), &NetlinkAddr::new(0, 0))?;
        let addr: NetlinkAddr = getsockname(fd.as_raw_fd())?;
        let port = addr.pid();

        let mut conn = Self {
            fd,
            port,
            seq: 0,
            family: Family {
                id: 0,
                version: 0,
                name: family_name.to_string(),
            },
            inbox: VecDeque::new(),
        };
        conn.resolve_family(family_name)?;
        info!(
            family = %conn.family.name,
            id = conn.family.id,
            version = conn.family.version,
            port,
            "resolved generic netlink family"
        );

        // The module routes replies by the registered port; a fresh
        // registration must happen on every daemon start.
        conn.send_cmd(Command::SetPid, &[])?;
        debug!("registered as the kernel module's reply sink");
        Ok(conn)
    }

    fn resolve_family(&mut self, name: &str) -> Result<(), ConnError> {
        let mut enc = AttrEncoder::new();
        enc.put_str(CTRL_ATTR_FAMILY_NAME, name);
        self.send_raw(GENL_ID_CTRL, CTRL_CMD_GETFAMILY, CTRL_VERSION, &enc.finish())?;

        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            let (n, _) = recvfrom::<NetlinkAddr>(self.fd.as_raw_fd(), &mut buf)?;
            if n == 0 {
                return Err(ConnError::Closed);
            }
            for frame in parse_frames(&buf[..n])? {
                match frame.ty {
                    NLMSG_NOOP | NLMSG_DONE => {}
                    NLMSG_ERROR => {
                        let errno = parse_errno(frame.data)?;
                        if errno != 0 {
                            return Err(family_lookup_error(errno, name));
                        }
                    }
                    GENL_ID_CTRL => {
                        let (id, version) = parse_family_reply(frame.data)?;
                        self.family = Family {
                            id,
                            version,
                            name: name.to_string(),
                        };
                        return Ok(());
                    }
                    ty => warn!(ty, "ignoring unexpected message during family lookup"),
                }
            }
        }
    }

    fn send_raw(
        &mut self,
        nl_type: u16,
        cmd: u8,
        version: u8,
        payload: &[u8],
    ) -> Result<(), ConnError> {
        self.seq = self.seq.wrapping_add(1);
        let msg = build_message(nl_type, NLM_F_REQUEST, self.seq, self.port, cmd, version, payload);
        sendto(
            self.fd.as_raw_fd(),
            &msg,
            &NetlinkAddr::new(0, 0),
            MsgFlags::empty(),
        )?;
        Ok(())
    }

    fn send_cmd(&mut self, cmd: Command, payload: &[u8]) -> Result<(), ConnError> {
        self.send_raw(self.family.id, cmd.raw(), self.family.version, payload)
    }
}

impl Channel for NetlinkConnection {
    fn recv(&mut self) -> Result<InboundMessage, ConnError> {
        loop {
            if let Some(msg) = self.inbox.pop_front() {
                return Ok(msg);
            }
            let mut buf = vec![0u8; RECV_BUF_LEN];
            let (n, _) = recvfrom::<NetlinkAddr>(self.fd.as_raw_fd(), &mut buf)?;
            if n == 0 {
                return Err(ConnError::Closed);
            }
            for frame in parse_frames(&buf[..n])? {
                match frame.ty {
                    NLMSG_NOOP | NLMSG_DONE => {}
                    NLMSG_ERROR => {
                        let errno = parse_errno(frame.data)?;
                        if errno != 0 {
                            return Err(ConnError::Kernel { errno });
                        }
                    }
                    ty if ty == self.family.id => {
                        if frame.data.len() < GENL_HDRLEN {
                            return Err(ConnError::BadFrame("truncated generic netlink header"));
                        }
                        self.inbox.push_back(InboundMessage {
                            cmd: frame.data[0],
                            payload: frame.data[GENL_HDRLEN..].to_vec(),
                        });
                    }
                    ty => debug!(ty, "ignoring message for another family"),
                }
            }
        }
    }

    fn send(&mut self, cmd: Command, payload: &[u8]) -> Result<(), ConnError> {
        self.send_cmd(cmd, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_message_layout() {
        let msg = build_message(0x18, NLM_F_REQUEST, 7, 1234, 2, 1, &[0xaa, 0xbb]);
        assert_eq!(msg.len(), NLMSG_HDRLEN + GENL_HDRLEN + 2);
        assert_eq!(u32::from_ne_bytes([msg[0], msg[1], msg[2], msg[3]]), msg.len() as u32);
        assert_eq!(u16::from_ne_bytes([msg[4], msg[5]]), 0x18);
        assert_eq!(u16::from_ne_bytes([msg[6], msg[7]]), NLM_F_REQUEST);
        assert_eq!(u32::from_ne_bytes([msg[8], msg[9], msg[10], msg[11]]), 7);
        assert_eq!(u32::from_ne_bytes([msg[12], msg[13], msg[14], msg[15]]), 1234);
        assert_eq!(msg[16], 2); // cmd
        assert_eq!(msg[17], 1); // version
        assert_eq!(&msg[20..], &[0xaa, 0xbb]);
    }

    #[test]
    fn parse_frames_round_trip() {
        let mut enc = AttrEncoder::new();
        enc.put_u64(chainfs_proto::attr::INO, 42);
        let payload = enc.finish();

        let mut buf = build_message(0x18, NLM_F_REQUEST, 1, 0, 4, 1, &payload);
        buf.extend_from_slice(&build_message(0x18, NLM_F_REQUEST, 2, 0, 2, 1, &[]));

        let frames = parse_frames(&buf).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].ty, 0x18);
        assert_eq!(frames[0].data[0], 4);
        assert_eq!(&frames[0].data[GENL_HDRLEN..], payload.as_slice());
        assert_eq!(frames[1].data[0], 2);
        assert!(frames[1].data[GENL_HDRLEN..].is_empty());
    }

    #[test]
    fn parse_frames_rejects_truncation() {
        let msg = build_message(0x18, NLM_F_REQUEST, 1, 0, 4, 1, &[1, 2, 3, 4]);
        let err = parse_frames(&msg[..msg.len() - 2]).unwrap_err();
        assert!(matches!(err, ConnError::BadFrame(_)));

        let err = parse_frames(&msg[..8]).unwrap_err();
        assert!(matches!(err, ConnError::BadFrame(_)));
    }

    #[test]
    fn parse_errno_reads_leading_i32() {
        assert_eq!(parse_errno(&(-2i32).to_ne_bytes()).unwrap(), -2);
        assert!(matches!(
            parse_errno(&[0, 0]),
            Err(ConnError::BadFrame(_))
        ));
    }

    #[test]
    fn family_lookup_distinguishes_missing_module() {
        let err = family_lookup_error(-(Errno::ENOENT as i32), "ext4_chain");
        assert!(matches!(err, ConnError::FamilyUnavailable { .. }));

        let err = family_lookup_error(-(Errno::EPERM as i32), "ext4_chain");
        assert!(matches!(err, ConnError::Kernel { .. }));
    }

    #[test]
    fn parse_family_reply_extracts_id_and_version() {
        let mut enc = AttrEncoder::new();
        enc.put_str(CTRL_ATTR_FAMILY_NAME, "ext4_chain");
        enc.put_u16(CTRL_ATTR_FAMILY_ID, 0x18);
        enc.put_u32(CTRL_ATTR_VERSION, 1);
        let mut data = vec![1, CTRL_VERSION, 0, 0]; // genlmsghdr: CTRL_CMD_NEWFAMILY
        data.extend_from_slice(&enc.finish());

        let (id, version) = parse_family_reply(&data).unwrap();
        assert_eq!(id, 0x18);
        assert_eq!(version, 1);
    }

    #[test]
    fn parse_family_reply_requires_family_id() {
        let data = vec![1, CTRL_VERSION, 0, 0];
        let err = parse_family_reply(&data).unwrap_err();
        assert!(matches!(err, ConnError::BadFrame(_)));
    }
}
