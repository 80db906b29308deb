use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::WeftError;
use crate::primitives::*;

/// A value transfer between two parties. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transaction {
    sender: Address,
    receiver: Address,
    amount: Amount,
    payload: Vec<u8>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: Amount,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            payload,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// An unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: TxId,
    pub output_index: u32,
    pub amount: Amount,
    pub address: Address,
}

impl Utxo {
    pub fn new(
        tx_id: impl Into<TxId>,
        output_index: u32,
        amount: Amount,
        address: impl Into<Address>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
            amount,
            address: address.into(),
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id.clone(), self.output_index)
    }

    /// The ledger key, `"tx_id:output_index"`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.tx_id, self.output_index)
    }
}

/// An output to be created by a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: Amount,
    pub address: Address,
}

/// A transaction waiting for inclusion in a block, with the outputs it spends
/// and the outputs it creates.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub id: TxId,
    pub transaction: Transaction,
    pub timestamp: Timestamp,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOutput>,
}

impl BlockTransaction {
    /// The UTXOs this transaction creates, indexed in output order.
    pub fn created_utxos(&self) -> Vec<Utxo> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, out)| Utxo::new(self.id.clone(), i as u32, out.amount, out.address.clone()))
            .collect()
    }

    /// Check internal consistency: non-empty id, distinct inputs, and no
    /// zero-value outputs.
    pub fn check_shape(&self) -> Result<(), WeftError> {
        if self.id.is_empty() {
            return Err(WeftError::MalformedTransaction {
                reason: "empty transaction id".to_string(),
            });
        }
        for (i, input) in self.inputs.iter().enumerate() {
            if self.inputs[..i].contains(input) {
                return Err(WeftError::MalformedTransaction {
                    reason: format!("input {} listed twice", input),
                });
            }
        }
        if self.outputs.iter().any(|o| o.amount == 0) {
            return Err(WeftError::InvalidAmount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(inputs: Vec<OutPoint>) -> BlockTransaction {
        BlockTransaction {
            id: "TX0003".to_string(),
            transaction: Transaction::new("alice", "bob", 40, b"memo".to_vec()),
            timestamp: 1_625_097_600,
            inputs,
            outputs: vec![
                TxOutput {
                    amount: 40,
                    address: "bob".to_string(),
                },
                TxOutput {
                    amount: 10,
                    address: "alice".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_utxo_key_format() {
        let utxo = Utxo::new("TX0001", 0, 150, "0xA3f1");
        assert_eq!(utxo.key(), "TX0001:0");
        assert_eq!(utxo.outpoint().key(), utxo.key());
    }

    #[test]
    fn test_created_utxos_are_indexed_in_order() {
        let tx = sample(vec![OutPoint::new("TX0001", 0)]);
        let created = tx.created_utxos();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].key(), "TX0003:0");
        assert_eq!(created[1].key(), "TX0003:1");
        assert_eq!(created[1].address, "alice");
    }

    #[test]
    fn test_check_shape_rejects_repeated_input() {
        let tx = sample(vec![OutPoint::new("TX0001", 0), OutPoint::new("TX0001", 0)]);
        assert!(matches!(
            tx.check_shape(),
            Err(WeftError::MalformedTransaction { .. })
        ));
    }

    #[test]
    fn test_check_shape_rejects_zero_output() {
        let mut tx = sample(vec![OutPoint::new("TX0001", 0)]);
        tx.outputs[0].amount = 0;
        assert_eq!(tx.check_shape(), Err(WeftError::InvalidAmount));
    }

    #[test]
    fn test_check_shape_accepts_well_formed() {
        let tx = sample(vec![OutPoint::new("TX0001", 0), OutPoint::new("TX0002", 1)]);
        assert!(tx.check_shape().is_ok());
    }
}
