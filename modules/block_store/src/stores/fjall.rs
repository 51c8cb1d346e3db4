use std::{fmt, fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use config::Config;
use fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};
use timestampvm_common::BlockId;
use tracing::{debug, error, info};

use crate::stores::{StagedWrite, StagedWrites, StoredBlock};

/// Block store on the fjall LSM engine.
///
/// Staged writes are applied as a single write batch, so a block record and
/// the last accepted pointer written together become visible together or not
/// at all. `commit` fails only if the batch could not be applied. After the
/// batch it syncs the journal to disk; if that sync fails the writes are
/// still committed and the failure is logged.
pub struct FjallStore {
    database: Database,
    blocks: Keyspace,
    singletons: Keyspace,
    staged: StagedWrites,
}

const DEFAULT_DATABASE_PATH: &str = "timestampvm-blocks";
const DEFAULT_CLEAR_ON_START: bool = false;
const BLOCKS_KEYSPACE: &str = "blocks";
const SINGLETONS_KEYSPACE: &str = "singletons";
const LAST_ACCEPTED_KEY: &[u8] = b"last-accepted";

impl FjallStore {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let path = config
            .get_string("database-path")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        let clear = config.get_bool("clear-on-start").unwrap_or(DEFAULT_CLEAR_ON_START);
        let path = PathBuf::from(path);
        if clear && path.exists() {
            info!("Clearing block store at {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        let database = Database::builder(&path)
            .open()
            .with_context(|| format!("could not open block store at {}", path.display()))?;
        let blocks = database.keyspace(BLOCKS_KEYSPACE, KeyspaceCreateOptions::default)?;
        let singletons = database.keyspace(SINGLETONS_KEYSPACE, KeyspaceCreateOptions::default)?;

        Ok(Self {
            database,
            blocks,
            singletons,
            staged: StagedWrites::default(),
        })
    }
}

impl super::Store for FjallStore {
    fn get_block(&self, id: &BlockId) -> Result<Option<StoredBlock>> {
        let Some(record) = self.blocks.get(id.as_ref())? else {
            return Ok(None);
        };
        let block = minicbor::decode(&record)
            .with_context(|| format!("corrupt block record for {id}"))?;
        Ok(Some(block))
    }

    fn put_block(&self, id: &BlockId, block: &StoredBlock) -> Result<()> {
        self.staged.push(StagedWrite::Block(*id, block.clone()));
        Ok(())
    }

    fn get_last_accepted(&self) -> Result<Option<BlockId>> {
        let Some(raw) = self.singletons.get(LAST_ACCEPTED_KEY)? else {
            return Ok(None);
        };
        let id = BlockId::try_from(raw.as_ref())
            .map_err(|_| anyhow!("last accepted pointer is {} bytes, expected 32", raw.len()))?;
        Ok(Some(id))
    }

    fn set_last_accepted(&self, id: &BlockId) -> Result<()> {
        self.staged.push(StagedWrite::LastAccepted(*id));
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let writes = self.staged.take();
        if writes.is_empty() {
            return Ok(());
        }
        let count = writes.len();

        let mut batch = self.database.batch();
        for write in writes {
            match write {
                StagedWrite::Block(id, block) => {
                    let encoded = minicbor::to_vec(&block)
                        .map_err(|e| anyhow!("could not encode block {id}: {e}"))?;
                    batch.insert(&self.blocks, id.as_ref(), encoded);
                }
                StagedWrite::LastAccepted(id) => {
                    batch.insert(&self.singletons, LAST_ACCEPTED_KEY, id.as_ref());
                }
            }
        }
        batch.commit()?;
        settle_journal_sync(count, self.database.persist(PersistMode::SyncAll))
    }

    fn discard(&self) {
        self.staged.clear();
    }
}

/// Once the batch has committed its writes are visible to readers and cannot
/// be taken back, so a failed journal sync does not fail the commit. The
/// writes stay in fjall's journal buffer and are synced by its background
/// persister or the next commit.
fn settle_journal_sync<E: fmt::Display>(count: usize, synced: Result<(), E>) -> Result<()> {
    match synced {
        Ok(()) => debug!("Committed {count} block store writes"),
        Err(e) => {
            error!("Committed {count} block store writes but could not sync the journal: {e}")
        }
    }
    Ok(())
}
