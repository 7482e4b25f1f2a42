//! In-memory ledger backend
//!
//! Keeps the full record set in a process-local map. Used as the backend for
//! local runs and as the test double for the dispatcher; its semantics match
//! the chaincode contract (duplicate creates rejected, updates and reads of
//! a missing key fail).

use std::collections::HashMap;

use chainfs_proto::{AttrMask, InodeAttrs};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::{LedgerGateway, Result};

pub struct MemoryLedger {
    records: HashMap<u64, InodeAttrs>,
}

impl MemoryLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        info!(
            channel = %config.channel,
            contract = %config.contract,
            "using in-memory ledger backend"
        );
        Self {
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

fn apply(record: &mut InodeAttrs, attrs: &InodeAttrs, present: AttrMask) {
    if present.contains(AttrMask::UID) {
        record.uid = attrs.uid;
    }
    if present.contains(AttrMask::GID) {
        record.gid = attrs.gid;
    }
    if present.contains(AttrMask::ATIME) {
        record.atime = attrs.atime;
    }
    if present.contains(AttrMask::MTIME) {
        record.mtime = attrs.mtime;
    }
    if present.contains(AttrMask::CTIME) {
        record.ctime = attrs.ctime;
    }
    if present.contains(AttrMask::MODE) {
        record.mode = attrs.mode;
    }
}

impl LedgerGateway for MemoryLedger {
    fn create_inode(&mut self, attrs: &InodeAttrs, present: AttrMask) -> Result<()> {
        if self.records.contains_key(&attrs.ino) {
            return Err(LedgerError::AlreadyExists(attrs.ino));
        }
        let mut record = InodeAttrs {
            ino: attrs.ino,
            ..Default::default()
        };
        apply(&mut record, attrs, present);
        self.records.insert(attrs.ino, record);
        debug!(ino = attrs.ino, "created inode record");
        Ok(())
    }

    fn update_attrs(&mut self, attrs: &InodeAttrs, present: AttrMask) -> Result<()> {
        let record = self
            .records
            .get_mut(&attrs.ino)
            .ok_or(LedgerError::NotFound(attrs.ino))?;
        apply(record, attrs, present);
        debug!(ino = attrs.ino, fields = ?present, "updated inode record");
        Ok(())
    }

    fn read_attrs(&mut self, ino: u64) -> Result<InodeAttrs> {
        self.records
            .get(&ino)
            .copied()
            .ok_or(LedgerError::NotFound(ino))
    }
}
