//! Boundary with a chain service: fetching raw transactions and broadcasting new ones.

use crate::{
    builder::BuildResult,
    context::SpendContext,
    error::{Error, Result},
};
use async_trait::async_trait;
use lockbox_consensus_core::tx::{Transaction, TransactionId};
use log::{debug, info};

/// Raw transaction access. Implementations do their own retrying, if any.
#[async_trait]
pub trait ChainApi: Sync + Send {
    async fn get_raw_transaction(&self, id: TransactionId) -> Result<Vec<u8>>;

    /// Submits a serialized transaction and returns the id the service assigned it.
    async fn broadcast_transaction(&self, bytes: Vec<u8>) -> Result<TransactionId>;
}

async fn fetch_transaction(api: &dyn ChainApi, id: TransactionId) -> Result<Transaction> {
    let tx = Transaction::deserialize(&api.get_raw_transaction(id).await?)?;
    if tx.id() != id {
        return Err(Error::Api(format!("requested transaction {id} but received {}", tx.id())));
    }
    Ok(tx)
}

/// Fetches transaction `spending_id` and the transaction holding the output spent by
/// its input `input_index`.
pub async fn fetch_spend_context(api: &dyn ChainApi, spending_id: TransactionId, input_index: usize) -> Result<SpendContext> {
    let spending = fetch_transaction(api, spending_id).await?;
    let outpoint = spending
        .inputs
        .get(input_index)
        .map(|input| input.previous_outpoint)
        .ok_or(Error::InputIndexOutOfRange { index: input_index, count: spending.inputs.len() })?;
    debug!("input {input_index} of {spending_id} spends {outpoint}");

    let source = fetch_transaction(api, outpoint.transaction_id).await?;
    SpendContext::from_parts(&source, spending, input_index, outpoint.index as usize)
}

pub async fn broadcast(api: &dyn ChainApi, result: &BuildResult) -> Result<TransactionId> {
    let id = api.broadcast_transaction(result.bytes.clone()).await?;
    if id != result.txid {
        return Err(Error::Api(format!("broadcast {} but the service reported {id}", result.txid)));
    }
    info!("broadcast transaction {id}");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::parse_asm, error::ErrorKind, trace::validate};
    use lockbox_consensus_core::{
        constants::{MAX_TX_IN_SEQUENCE_NUM, TX_VERSION},
        tx::{ScriptPublicKey, TransactionInput, TransactionOutpoint, TransactionOutput},
    };
    use std::{collections::HashMap, sync::Mutex};

    #[derive(Default)]
    struct MockApi {
        transactions: HashMap<TransactionId, Vec<u8>>,
        broadcasts: Mutex<Vec<Vec<u8>>>,
    }

    impl MockApi {
        fn with(transactions: &[&Transaction]) -> Self {
            Self { transactions: transactions.iter().map(|tx| (tx.id(), tx.serialize())).collect(), ..Default::default() }
        }
    }

    #[async_trait]
    impl ChainApi for MockApi {
        async fn get_raw_transaction(&self, id: TransactionId) -> Result<Vec<u8>> {
            self.transactions.get(&id).cloned().ok_or_else(|| Error::Api(format!("transaction {id} not found")))
        }

        async fn broadcast_transaction(&self, bytes: Vec<u8>) -> Result<TransactionId> {
            let id = Transaction::deserialize(&bytes)?.id();
            self.broadcasts.lock().unwrap().push(bytes);
            Ok(id)
        }
    }

    fn pair() -> (Transaction, Transaction) {
        let funding = TransactionInput::unsigned(TransactionOutpoint::new(TransactionId::from_bytes([3; 32]), 0));
        let locking = parse_asm("OP_ADD OP_5 OP_EQUAL").unwrap();
        let source = Transaction::new(TX_VERSION, vec![funding], vec![TransactionOutput::new(5_000, ScriptPublicKey::from_vec(locking))], 0);
        let input = TransactionInput::new(TransactionOutpoint::new(source.id(), 0), parse_asm("OP_2 OP_3").unwrap(), MAX_TX_IN_SEQUENCE_NUM);
        let spending = Transaction::new(TX_VERSION, vec![input], vec![TransactionOutput::new(4_000, ScriptPublicKey::from_vec(vec![]))], 0);
        (source, spending)
    }

    #[tokio::test]
    async fn test_fetch_spend_context() {
        let (source, spending) = pair();
        let api = MockApi::with(&[&source, &spending]);
        let context = fetch_spend_context(&api, spending.id(), 0).await.unwrap();
        assert_eq!(context.amount(), 5_000);
        let verdict = validate(context.locking_script(), context.unlocking_script(), &context).unwrap();
        assert!(verdict.valid);

        let err = fetch_spend_context(&api, spending.id(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[tokio::test]
    async fn test_fetch_missing_source() {
        let (_, spending) = pair();
        let api = MockApi::with(&[&spending]);
        let err = fetch_spend_context(&api, spending.id(), 0).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.kind(), ErrorKind::Context);
    }

    #[tokio::test]
    async fn test_fetch_wrong_transaction() {
        let (source, spending) = pair();
        let mut api = MockApi::with(&[&source]);
        api.transactions.insert(spending.id(), source.serialize());
        assert!(matches!(fetch_spend_context(&api, spending.id(), 0).await, Err(Error::Api(_))));
    }

    #[tokio::test]
    async fn test_broadcast() {
        let (_, spending) = pair();
        let api = MockApi::default();
        let bytes = spending.serialize();
        let result = BuildResult { txid: spending.id(), size: bytes.len(), bytes, fee: 1_000, fee_rate: 1_000.0 / 74.0 };
        assert_eq!(broadcast(&api, &result).await.unwrap(), spending.id());
        assert_eq!(api.broadcasts.lock().unwrap().len(), 1);
    }
}
