use std::{
    collections::HashSet,
    error::Error,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storage::{Storage, MAX_INSERT_ROWS};
use thiserror::Error as ThisError;
use types::{Checkpoint, TransferRecord};

#[derive(ThisError, Debug)]
pub enum MockStorageError {
    #[error("injected write failure")]
    InjectedFailure,

    #[error("batch of {0} rows exceeds the {MAX_INSERT_ROWS}-row insert limit")]
    BatchTooLarge(usize),
}

impl From<MockStorageError> for Pin<Box<dyn Error + Send + Sync>> {
    fn from(err: MockStorageError) -> Self {
        Pin::from(Box::new(err))
    }
}

#[derive(Debug)]
struct MockState {
    transfers: Vec<TransferRecord>,
    seen: HashSet<(String, i32)>,
    last_processed_slot: i64,
    streaming_start_slot: Option<i64>,
    last_updated: DateTime<Utc>,
    write_calls: usize,
}

/// In-memory stand-in for the relational store. Realizes the same contracts
/// the Postgres backend does: natural-key dedup on insert, forward-only
/// checkpoint, set-once streaming start. Writes can be made to fail for
/// exercising retry paths.
#[derive(Debug)]
pub struct MockStorage {
    state: Mutex<MockState>,
    fail_writes: AtomicBool,
}

impl MockStorage {
    pub fn new(genesis_slot: i64) -> Self {
        Self {
            state: Mutex::new(MockState {
                transfers: vec![],
                seen: HashSet::new(),
                last_processed_slot: genesis_slot,
                streaming_start_slot: None,
                last_updated: Utc::now(),
                write_calls: 0,
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `write_transfers` call fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }

    pub fn last_processed_slot(&self) -> i64 {
        self.state.lock().unwrap().last_processed_slot
    }

    pub fn streaming_start_slot(&self) -> Option<i64> {
        self.state.lock().unwrap().streaming_start_slot
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn prepare_db(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        Ok(())
    }

    async fn write_transfers(
        &self,
        transfers: &[TransferRecord],
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        if transfers.is_empty() {
            return Ok(());
        }
        if transfers.len() > MAX_INSERT_ROWS {
            return Err(MockStorageError::BatchTooLarge(transfers.len()).into());
        }

        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MockStorageError::InjectedFailure.into());
        }
        for t in transfers {
            if state.seen.insert((t.signature.clone(), t.transfer_index)) {
                state.transfers.push(t.clone());
            }
        }
        Ok(())
    }

    async fn checkpoint(&self) -> Result<Checkpoint, Pin<Box<dyn Error + Send + Sync>>> {
        let state = self.state.lock().unwrap();
        Ok(Checkpoint {
            last_processed_slot: state.last_processed_slot,
            streaming_start_slot: state.streaming_start_slot,
            last_updated: state.last_updated,
        })
    }

    async fn advance_checkpoint(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        let mut state = self.state.lock().unwrap();
        if slot > state.last_processed_slot {
            state.last_processed_slot = slot;
            state.last_updated = Utc::now();
        }
        Ok(())
    }

    async fn seed_streaming_start(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        let mut state = self.state.lock().unwrap();
        if state.streaming_start_slot.is_none() {
            state.streaming_start_slot = Some(slot);
        }
        Ok(())
    }
}
