use serde::{Deserialize, Serialize};

use crate::buf::HexBytes;

/// A transaction committed to the chain's transaction log.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
    /// Position in the chain's global transaction order, assigned by the chain
    /// in arrival order.
    pub sequence_index: u64,

    /// Hash uniquely identifying the transaction.
    pub hash: HexBytes,

    pub payload: HexBytes,

    /// Height of the header that revealed this transaction to the watcher.
    pub observed_at_height: u64,
}

impl ChainTransaction {
    pub fn new(
        sequence_index: u64,
        hash: HexBytes,
        payload: HexBytes,
        observed_at_height: u64,
    ) -> Self {
        Self {
            sequence_index,
            hash,
            payload,
            observed_at_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_camel_case_hex() {
        let tx = ChainTransaction::new(7, HexBytes::from([0xaa]), HexBytes::from([1u8, 2]), 3);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sequenceIndex"], 7);
        assert_eq!(json["hash"], "0xaa");
        assert_eq!(json["payload"], "0x0102");
        assert_eq!(json["observedAtHeight"], 3);
    }
}
