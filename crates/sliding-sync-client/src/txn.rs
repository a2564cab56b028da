//! Correlation of client-issued transactions with server acknowledgements.

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::TxnError;

/// A single-fire handle tracking one transaction issued by
/// [`resend`][crate::SlidingSync::resend].
///
/// Resolves with the transaction's own id once a response acknowledges it,
/// or with [`TxnError::Superseded`] if a later transaction was acknowledged
/// first.
#[derive(Debug)]
pub struct TxnHandle {
    rx: oneshot::Receiver<Result<String, TxnError>>,
}

impl TxnHandle {
    /// Waits for the transaction's terminal outcome.
    pub async fn wait(self) -> Result<String, TxnError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TxnError::Disconnected),
        }
    }
}

/// The ordered collection of transactions awaiting acknowledgement.
///
/// The server acknowledges by echoing the most recent txn id it saw; any
/// entry issued before the acknowledged one is therefore known to have been
/// superseded without being applied as a distinct request, and is failed
/// with its own id so its issuer can observe that.
#[derive(Debug, Default)]
pub(crate) struct TransactionLedger {
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    txn_id: String,
    completion: oneshot::Sender<Result<String, TxnError>>,
}

impl TransactionLedger {
    /// Appends an entry for a freshly minted txn id and returns the handle
    /// observing it.
    pub(crate) fn issue(&mut self, txn_id: String) -> TxnHandle {
        debug_assert!(
            !self.entries.iter().any(|entry| entry.txn_id == txn_id),
            "transport minted a duplicate txn id"
        );

        let (completion, rx) = oneshot::channel();
        self.entries.push(Entry { txn_id, completion });
        TxnHandle { rx }
    }

    /// Processes a server acknowledgement of `txn_id`.
    pub(crate) fn acknowledge(&mut self, txn_id: &str) {
        let Some(position) = self.entries.iter().position(|entry| entry.txn_id == txn_id) else {
            debug!(txn_id, "acknowledgement for an unknown txn id, ignoring");
            return;
        };

        for entry in self.entries.drain(..=position) {
            let Entry { txn_id: id, completion } = entry;
            let outcome = if id == txn_id {
                Ok(id)
            } else {
                Err(TxnError::Superseded { txn_id: id })
            };
            // the issuer may have dropped its handle, that's fine
            let _ = completion.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::TransactionLedger;
    use crate::error::TxnError;

    #[tokio::test]
    async fn acknowledgement_supersedes_earlier_entries() {
        let mut ledger = TransactionLedger::default();
        let t1 = ledger.issue("T1".to_owned());
        let t2 = ledger.issue("T2".to_owned());
        let mut t3 = ledger.issue("T3".to_owned());

        ledger.acknowledge("T2");

        assert_matches!(t1.wait().await, Err(TxnError::Superseded { txn_id }));
        assert_eq!(txn_id, "T1");

        assert_eq!(t2.wait().await.unwrap(), "T2");

        // T3 was issued after the acknowledged txn and stays pending
        assert_matches!(t3.rx.try_recv(), Err(tokio::sync::oneshot::error::TryRecvError::Empty));
    }

    #[tokio::test]
    async fn unknown_acknowledgement_is_ignored() {
        let mut ledger = TransactionLedger::default();
        let mut t1 = ledger.issue("T1".to_owned());

        ledger.acknowledge("T9");

        assert_matches!(t1.rx.try_recv(), Err(tokio::sync::oneshot::error::TryRecvError::Empty));
    }

    #[tokio::test]
    async fn dropped_ledger_disconnects_handles() {
        let mut ledger = TransactionLedger::default();
        let t1 = ledger.issue("T1".to_owned());
        drop(ledger);

        assert_matches!(t1.wait().await, Err(TxnError::Disconnected));
    }
}
