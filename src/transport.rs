//! Transport interface
//!
//! The physical BLE transport and its serialized command queue live outside this crate.
//! Everything the driver wants done is collected into a [`Transaction`], an ordered list of
//! operations the platform executes strictly in order, and handed to [`BleSupport::queue`].

use crate::service::Characteristic;
use crate::types::{hex_dump, Result};
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Evaluated by the transport right before the operations that follow it; returning `true`
/// drops the rest of the transaction.
pub type AbortPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Handle to a BLE characteristic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub uuid: String,
}

impl CharacteristicHandle {
    pub fn new(uuid: String) -> Self {
        Self { uuid }
    }
}

/// A single queued transport operation
#[derive(Clone)]
pub enum TransportOp {
    Write {
        handle: CharacteristicHandle,
        data: Vec<u8>,
    },
    Read {
        handle: CharacteristicHandle,
    },
    Notify {
        handle: CharacteristicHandle,
        enable: bool,
    },
    Wait(Duration),
    /// Checkpoint before a repeat iteration. When `should_abort` holds, `on_abort` (if any) is
    /// written and the remaining operations are skipped.
    AbortIf {
        should_abort: AbortPredicate,
        on_abort: Option<(CharacteristicHandle, Vec<u8>)>,
    },
}

impl fmt::Debug for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOp::Write { handle, data } => {
                write!(f, "Write({}, [{}])", handle.uuid, hex_dump(data))
            }
            TransportOp::Read { handle } => write!(f, "Read({})", handle.uuid),
            TransportOp::Notify { handle, enable } => {
                write!(f, "Notify({}, {})", handle.uuid, enable)
            }
            TransportOp::Wait(duration) => write!(f, "Wait({:?})", duration),
            TransportOp::AbortIf { on_abort, .. } => {
                write!(f, "AbortIf(stop_write={})", on_abort.is_some())
            }
        }
    }
}

/// Ordered batch of transport operations, queued atomically
#[derive(Debug, Clone)]
pub struct Transaction {
    name: String,
    ops: Vec<TransportOp>,
}

impl Transaction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write(&mut self, handle: &CharacteristicHandle, data: &[u8]) -> &mut Self {
        debug!("[{}] write {}: {}", self.name, handle.uuid, hex_dump(data));
        self.ops.push(TransportOp::Write {
            handle: handle.clone(),
            data: data.to_vec(),
        });
        self
    }

    pub fn read(&mut self, handle: &CharacteristicHandle) -> &mut Self {
        self.ops.push(TransportOp::Read {
            handle: handle.clone(),
        });
        self
    }

    pub fn notify(&mut self, handle: &CharacteristicHandle, enable: bool) -> &mut Self {
        self.ops.push(TransportOp::Notify {
            handle: handle.clone(),
            enable,
        });
        self
    }

    pub fn wait(&mut self, duration: Duration) -> &mut Self {
        self.ops.push(TransportOp::Wait(duration));
        self
    }

    pub fn abort_if(
        &mut self,
        should_abort: AbortPredicate,
        on_abort: Option<(CharacteristicHandle, Vec<u8>)>,
    ) -> &mut Self {
        self.ops.push(TransportOp::AbortIf {
            should_abort,
            on_abort,
        });
        self
    }

    pub fn ops(&self) -> &[TransportOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<TransportOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// All write operations in queue order, ignoring abort checkpoints
    pub fn writes(&self) -> Vec<(&CharacteristicHandle, &[u8])> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Write { handle, data } => Some((handle, data.as_slice())),
                _ => None,
            })
            .collect()
    }
}

/// Trait for BLE operations that must be implemented by the platform
#[async_trait::async_trait]
pub trait BleSupport: Send + Sync {
    /// Get a characteristic by UUID, `None` if the connected device does not expose it
    fn get_characteristic(&self, uuid: &str) -> Option<CharacteristicHandle>;

    /// Queue a transaction for in-order execution
    async fn queue(&self, transaction: Transaction) -> Result<()>;
}

/// Look up one of the known characteristics on the connected device
pub fn lookup(ble: &dyn BleSupport, characteristic: Characteristic) -> Option<CharacteristicHandle> {
    ble.get_characteristic(&characteristic.uuid())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording transport used across the crate's tests

    use super::*;
    use crate::types::HuamiError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    pub struct MockBleSupport {
        missing: HashSet<String>,
        fail_on: Mutex<Option<String>>,
        queued: Mutex<Vec<Transaction>>,
    }

    impl MockBleSupport {
        pub fn new() -> Self {
            Self {
                missing: HashSet::new(),
                fail_on: Mutex::new(None),
                queued: Mutex::new(Vec::new()),
            }
        }

        /// Device without the given characteristics
        pub fn without(characteristics: &[Characteristic]) -> Self {
            let mut mock = Self::new();
            mock.missing = characteristics.iter().map(|c| c.uuid()).collect();
            mock
        }

        /// Make `queue` fail for transactions whose name contains `pattern`
        pub fn fail_on(&self, pattern: &str) {
            *self.fail_on.lock().unwrap() = Some(pattern.to_string());
        }

        pub fn queued(&self) -> Vec<Transaction> {
            self.queued.lock().unwrap().clone()
        }

        pub fn queued_names(&self) -> Vec<String> {
            self.queued()
                .iter()
                .map(|tx| tx.name().to_string())
                .collect()
        }

        /// Writes of every queued transaction, as the device would see them
        pub fn executed_writes(&self) -> Vec<(Characteristic, Vec<u8>)> {
            self.queued().into_iter().flat_map(execute).collect()
        }
    }

    #[async_trait::async_trait]
    impl BleSupport for MockBleSupport {
        fn get_characteristic(&self, uuid: &str) -> Option<CharacteristicHandle> {
            if self.missing.contains(uuid) {
                None
            } else {
                Some(CharacteristicHandle::new(uuid.to_string()))
            }
        }

        async fn queue(&self, transaction: Transaction) -> Result<()> {
            if let Some(pattern) = self.fail_on.lock().unwrap().as_ref() {
                if transaction.name().contains(pattern.as_str()) {
                    return Err(HuamiError::Transport(format!(
                        "queue rejected '{}'",
                        transaction.name()
                    )));
                }
            }
            self.queued.lock().unwrap().push(transaction);
            Ok(())
        }
    }

    /// Run a transaction the way the platform queue does and return the writes performed
    pub fn execute(transaction: Transaction) -> Vec<(Characteristic, Vec<u8>)> {
        let mut writes = Vec::new();
        for op in transaction.into_ops() {
            match op {
                TransportOp::Write { handle, data } => {
                    if let Some(c) = Characteristic::from_uuid(&handle.uuid) {
                        writes.push((c, data));
                    }
                }
                TransportOp::AbortIf {
                    should_abort,
                    on_abort,
                } => {
                    if should_abort() {
                        if let Some((handle, data)) = on_abort {
                            if let Some(c) = Characteristic::from_uuid(&handle.uuid) {
                                writes.push((c, data));
                            }
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_transaction_keeps_order() {
        let handle = CharacteristicHandle::new(Characteristic::Configuration.uuid());
        let mut tx = Transaction::new("order");
        tx.write(&handle, &[1]).read(&handle).write(&handle, &[2]);

        let writes = tx.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, &[1]);
        assert_eq!(writes[1].1, &[2]);
        assert_eq!(tx.ops().len(), 3);
    }

    #[test]
    fn test_abort_checkpoint_stops_execution() {
        let handle = CharacteristicHandle::new(Characteristic::AlertLevel.uuid());
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        let predicate: AbortPredicate = Arc::new(move || !flag.load(Ordering::SeqCst));

        let mut tx = Transaction::new("abortable");
        tx.abort_if(predicate.clone(), None).write(&handle, &[1]);
        tx.abort_if(predicate, Some((handle.clone(), vec![0])))
            .write(&handle, &[1]);

        let all = execute(tx.clone());
        assert_eq!(all.len(), 2);

        active.store(false, Ordering::SeqCst);
        assert!(execute(tx).is_empty());
    }

    #[tokio::test]
    async fn test_mock_lookup_and_failure() {
        let ble = MockBleSupport::without(&[Characteristic::ChunkedTransfer]);
        assert!(lookup(&ble, Characteristic::ChunkedTransfer).is_none());
        assert!(lookup(&ble, Characteristic::Configuration).is_some());

        ble.fail_on("broken");
        assert!(ble.queue(Transaction::new("broken tx")).await.is_err());
        assert!(ble.queue(Transaction::new("fine tx")).await.is_ok());
        assert_eq!(ble.queued_names(), vec!["fine tx".to_string()]);
    }
}
