use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::transaction::Transaction;

/// Drives a batch of transactions on a background thread. Transactions are
/// executed sequentially; per-transaction outcomes are recorded in `stats`
/// and the number of commits in `result`. Nothing escapes the thread
/// boundary — a panicking transaction is recorded as a failure.
pub struct TransactionWorker {
    /// Transactions to be executed.
    transactions: Vec<Transaction>,

    /// Outcome of each transaction, in execution order.
    stats: Arc<Mutex<Vec<bool>>>,

    /// Number of transactions that committed.
    result: Arc<Mutex<usize>>,

    /// Thread handle for join.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionWorker {
    pub fn new() -> Self {
        TransactionWorker {
            transactions: Vec::new(),
            stats: Arc::new(Mutex::new(Vec::new())),
            result: Arc::new(Mutex::new(0)),
            handle: Mutex::new(None),
        }
    }

    /// Add a transaction to the batch. Has no effect once `run` has been
    /// called.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Start executing the batch on a background thread.
    pub fn run(&mut self) {
        let transactions = std::mem::take(&mut self.transactions);
        let stats = self.stats.clone();
        let result = self.result.clone();

        let handle = thread::spawn(move || {
            let mut committed = 0;

            for mut transaction in transactions {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| transaction.run()))
                    .unwrap_or(false);

                stats.lock().unwrap().push(outcome);
                if outcome {
                    committed += 1;
                }
            }

            *result.lock().unwrap() = committed;
        });

        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Wait for the worker thread to finish and return the commit count.
    pub fn join(&self) -> usize {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }

        *self.result.lock().unwrap()
    }

    /// Number of transactions that committed.
    pub fn result(&self) -> usize {
        *self.result.lock().unwrap()
    }

    /// Per-transaction outcomes, in execution order.
    pub fn stats(&self) -> Vec<bool> {
        self.stats.lock().unwrap().clone()
    }
}

impl Default for TransactionWorker {
    fn default() -> Self {
        TransactionWorker::new()
    }
}
