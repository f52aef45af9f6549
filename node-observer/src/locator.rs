//! Finds the block that includes a transaction.
//!
//! A transaction only knows its reference block, so the search walks every
//! block after it up to the current head. The walk is linear on purpose:
//! block production is not monotonic in which transactions end up where, so
//! bisection could skip the right block.

use log::{debug, trace};

use crate::backend::{ensure_non_empty, Backend};
use crate::error::{ClientError, ClientResult};

/// Where a transaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The backend does not know the transaction.
    Missing,
    /// Known, but no block in `(ref_block_num, head]` contains it yet.
    NotYetIncluded { ref_block_num: u64 },
    Included(u64),
}

impl Location {
    pub fn block_num(&self) -> Option<u64> {
        match self {
            Self::Included(block_num) => Some(*block_num),
            _ => None,
        }
    }
}

pub struct BlockLocator<'a> {
    backend: &'a dyn Backend,
}

impl<'a> BlockLocator<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn locate(&self, tx_id: &str) -> ClientResult<Location> {
        ensure_non_empty("transaction id", tx_id)?;

        let tx = match self.backend.get_transaction(tx_id).await? {
            Some(tx) => tx,
            None => return Ok(Location::Missing),
        };
        let ref_block_num = tx.ref_block_num.ok_or_else(|| {
            ClientError::protocol(
                "get transaction",
                format!("transaction {} has no reference block", tx_id),
                tx.raw.to_string(),
            )
        })?;

        let head = match self.backend.get_info().await? {
            Some(info) => info.head_block_num,
            None => return Ok(Location::NotYetIncluded { ref_block_num }),
        };

        let first = ref_block_num.checked_add(1).ok_or_else(|| {
            ClientError::protocol(
                "get transaction",
                format!("transaction {} has an out of range reference block", tx_id),
                tx.raw.to_string(),
            )
        })?;
        if first > head {
            return Ok(Location::NotYetIncluded { ref_block_num });
        }

        // A backend that reports the including block lets us skip the walk,
        // provided the hint is inside the searchable range and checks out.
        if let Some(hint) = tx.block_num.filter(|n| (first..=head).contains(n)) {
            if self.block_contains(hint, tx_id).await? {
                debug!("transaction {} found in reported block {}", tx_id, hint);
                return Ok(Location::Included(hint));
            }
        }

        debug!(
            "searching blocks {}..={} for transaction {}",
            first, head, tx_id
        );
        for block_num in first..=head {
            if self.block_contains(block_num, tx_id).await? {
                debug!("transaction {} found in block {}", tx_id, block_num);
                return Ok(Location::Included(block_num));
            }
        }

        Ok(Location::NotYetIncluded { ref_block_num })
    }

    pub async fn locate_block(&self, tx_id: &str) -> ClientResult<Option<u64>> {
        Ok(self.locate(tx_id).await?.block_num())
    }

    async fn block_contains(&self, block_num: u64, tx_id: &str) -> ClientResult<bool> {
        match self.backend.get_block(block_num).await? {
            Some(block) => Ok(block.contains_transaction(tx_id)),
            None => {
                trace!("block {} not available while searching", block_num);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[tokio::test]
    async fn test_scan_starts_after_reference_block() {
        let backend = MockBackend::new().with_head(20, 10);
        backend.add_block(5, "alice", &["tx"]);
        backend.add_block(14, "bob", &["tx"]);
        backend.add_transaction("tx", 10);

        let location = BlockLocator::new(&backend).locate("tx").await.unwrap();
        assert_eq!(location, Location::Included(14));
    }

    #[tokio::test]
    async fn test_not_yet_included_and_missing() {
        let backend = MockBackend::new().with_head(20, 10);
        backend.add_transaction("pending", 18);
        let locator = BlockLocator::new(&backend);

        assert_eq!(
            locator.locate("pending").await.unwrap(),
            Location::NotYetIncluded { ref_block_num: 18 }
        );
        assert_eq!(locator.locate("ghost").await.unwrap(), Location::Missing);
        assert_eq!(locator.locate_block("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reference_block_at_head_skips_scan() {
        let backend = MockBackend::new().with_head(20, 10);
        backend.add_transaction("tx", 20);

        let location = BlockLocator::new(&backend).locate("tx").await.unwrap();
        assert_eq!(location, Location::NotYetIncluded { ref_block_num: 20 });
        assert_eq!(backend.block_lookups(), 0);
    }

    #[tokio::test]
    async fn test_reported_block_is_checked_first() {
        let backend = MockBackend::new().with_head(100, 90);
        backend.add_block(95, "carol", &["tx"]);
        backend.add_transaction_in_block("tx", 10, 95);

        let location = BlockLocator::new(&backend).locate("tx").await.unwrap();
        assert_eq!(location, Location::Included(95));
        assert_eq!(backend.block_lookups(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let backend = MockBackend::new();
        let err = BlockLocator::new(&backend).locate("").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_reference_block_at_u64_max_is_protocol_error() {
        let backend = MockBackend::new().with_head(20, 10);
        backend.add_transaction("tx", u64::MAX);

        let err = BlockLocator::new(&backend).locate("tx").await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));
        assert_eq!(backend.block_lookups(), 0);
    }
}
