//! Message dispatch loop
//!
//! Classifies each kernel request by command, applies it to the ledger
//! gateway, and sends exactly one response per recognized request. Requests
//! are processed strictly in arrival order. Per-message failures (an
//! undecodable payload, a ledger error, a failed response send) are logged
//! and absorbed; only a receive failure ends the loop.

use chainfs_ledger::LedgerGateway;
use chainfs_proto::{decode_attrs, decode_ino, response, Command, InodeAttrs, Status};
use tracing::{debug, error, info, warn};

use crate::netlink::ConnError;

/// One kernel-originated generic netlink message.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub cmd: u8,
    pub payload: Vec<u8>,
}

/// Blocking kernel-facing channel as the dispatcher sees it.
pub trait Channel {
    fn recv(&mut self) -> Result<InboundMessage, ConnError>;
    fn send(&mut self, cmd: Command, payload: &[u8]) -> Result<(), ConnError>;
}

pub struct Bridge<C, L> {
    channel: C,
    ledger: L,
}

impl<C: Channel, L: LedgerGateway> Bridge<C, L> {
    pub fn new(channel: C, ledger: L) -> Self {
        Self { channel, ledger }
    }

    /// Run the receive/dispatch loop until the channel fails.
    pub fn run(&mut self) -> Result<(), ConnError> {
        info!("bridge dispatch loop started");
        loop {
            let msg = self.channel.recv()?;
            self.handle(msg);
        }
    }

    fn handle(&mut self, msg: InboundMessage) {
        match Command::from_raw(msg.cmd) {
            Some(Command::NewInodeRequest) => self.on_new_inode(&msg.payload),
            Some(Command::SetAttrRequest) => self.on_set_attr(&msg.payload),
            Some(Command::GetAttrRequest) => self.on_get_attr(&msg.payload),
            Some(other) => warn!(command = ?other, "ignoring non-request command"),
            None => warn!(command = msg.cmd, "ignoring unrecognized command"),
        }
    }

    fn on_new_inode(&mut self, payload: &[u8]) {
        let (attrs, present) = match decode_attrs(payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "dropping undecodable new-inode request");
                return;
            }
        };
        let status = match self.ledger.create_inode(&attrs, present) {
            Ok(()) => Status::Success,
            Err(err) => {
                warn!(ino = attrs.ino, error = %err, "create rejected by ledger");
                err.status()
            }
        };
        debug!(ino = attrs.ino, ?status, "new-inode request handled");
        self.reply(
            Command::StatusResponse,
            &response::status_response(attrs.ino, status),
        );
    }

    fn on_set_attr(&mut self, payload: &[u8]) {
        let (attrs, present) = match decode_attrs(payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "dropping undecodable set-attr request");
                return;
            }
        };
        let status = match self.ledger.update_attrs(&attrs, present) {
            Ok(()) => Status::Success,
            Err(err) => {
                warn!(ino = attrs.ino, error = %err, "update rejected by ledger");
                err.status()
            }
        };
        debug!(ino = attrs.ino, ?status, "set-attr request handled");
        self.reply(
            Command::StatusResponse,
            &response::status_response(attrs.ino, status),
        );
    }

    fn on_get_attr(&mut self, payload: &[u8]) {
        let ino = match decode_ino(payload) {
            Ok(ino) => ino,
            Err(err) => {
                warn!(error = %err, "dropping undecodable get-attr request");
                return;
            }
        };
        let (status, attrs) = match self.ledger.read_attrs(ino) {
            Ok(attrs) => (Status::Success, attrs),
            Err(err) => {
                warn!(ino, error = %err, "read failed in ledger");
                let placeholder = InodeAttrs {
                    ino,
                    ..Default::default()
                };
                (err.status(), placeholder)
            }
        };
        debug!(ino, ?status, "get-attr request handled");
        self.reply(
            Command::GetAttrResponse,
            &response::get_attr_response(status, &attrs),
        );
    }

    // A lost response is logged and sacrificed; the next request must not
    // be blocked on it.
    fn reply(&mut self, cmd: Command, payload: &[u8]) {
        if let Err(err) = self.channel.send(cmd, payload) {
            error!(command = ?cmd, error = %err, "failed to send response");
        }
    }
}
