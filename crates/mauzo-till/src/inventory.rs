//! # Inventory Subscriber
//!
//! Takes sold quantities off tracked stock once a sale is committed.
//! Best effort: a failure is logged and the sale stands.

use async_trait::async_trait;
use mauzo_db::InventoryRepository;
use tracing::debug;

use crate::error::TillResult;
use crate::events::{CommitSubscriber, TransactionCommitted};

#[derive(Debug, Clone)]
pub struct InventorySubscriber {
    inventory: InventoryRepository,
}

impl InventorySubscriber {
    pub fn new(inventory: InventoryRepository) -> Self {
        InventorySubscriber { inventory }
    }
}

#[async_trait]
impl CommitSubscriber for InventorySubscriber {
    fn name(&self) -> &'static str {
        "inventory"
    }

    async fn on_commit(&self, event: &TransactionCommitted) -> TillResult<()> {
        let changed = self
            .inventory
            .decrement_for_sale(&event.transaction.items)
            .await?;
        debug!(
            transaction_id = %event.transaction.id,
            lines = changed,
            "Stock decremented"
        );
        Ok(())
    }
}
