//! Cancellation records and their return workflow.

use std::time::Instant;

use chrono::Utc;
use common::{CancellationId, CancellationStatus, OrderCancellation, OrderId, OrderStatus};
use store::{CancellationQuery, CancellationRepository, OrderRepository, Page, Store, Transaction};

use crate::error::{DomainError, Result};
use crate::locations::LocationRegistry;
use crate::order::ensure_mutable;
use crate::transfer::{self, TransferRequest};

/// Service for cancellation records.
pub struct CancellationService<S: Store> {
    store: S,
    registry: LocationRegistry,
}

impl<S: Store> CancellationService<S> {
    pub fn new(store: S, registry: LocationRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn get(&self, id: CancellationId) -> Result<OrderCancellation> {
        let mut tx = self.store.begin().await?;
        tx.get_cancellation_for_update(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cancellation", id))
    }

    /// Lists records, newest first.
    pub async fn list(&self, query: CancellationQuery) -> Result<Page<OrderCancellation>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_cancellations(&query).await?)
    }

    /// Marks the items of a cancelled order as returned.
    ///
    /// If the order held its items in transit, they move to Production now.
    /// A record can be returned once.
    #[tracing::instrument(skip(self))]
    pub async fn advance_status(
        &self,
        id: CancellationId,
        status: CancellationStatus,
    ) -> Result<OrderCancellation> {
        let start = Instant::now();
        if status != CancellationStatus::Returned {
            return Err(DomainError::validation(
                "Cancellation status can only advance to returned",
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut record = tx
            .get_cancellation_for_update(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cancellation", id))?;
        if record.status == CancellationStatus::Returned {
            return Err(DomainError::validation(
                "Cancellation has already been returned",
            ));
        }

        let order = tx
            .get_order_for_update(record.order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", record.order_id))?;
        ensure_mutable(&order)?;
        if order.status != OrderStatus::Cancelled {
            return Err(DomainError::validation(
                "Only items of a cancelled order can be returned",
            ));
        }

        if order.hold_return {
            let locations = self.registry.resolve(&mut tx).await?;
            let note = format!("Cancellation {} returned to production", record.id);
            for item in &record.items {
                let req = TransferRequest::new(
                    item.product_id,
                    locations.in_transit,
                    locations.production,
                    i64::from(item.quantity),
                )
                .notes(note.clone())
                .order(order.id);
                transfer::transfer(&mut tx, &req).await?;
            }
        }

        let returned_at = Utc::now();
        tx.update_cancellation_status(id, status, Some(returned_at))
            .await?;
        tx.commit().await?;

        record.status = status;
        record.returned_at = Some(returned_at);
        metrics::counter!("cancellation_returns_total").increment(1);
        crate::record_duration("advance_cancellation", start);
        tracing::info!(
            cancellation_id = %id,
            order_id = %order.id,
            restocked = order.hold_return,
            "cancellation returned"
        );
        Ok(record)
    }

    /// Deletes the cancellation record of an order.
    ///
    /// Inventory is not moved and the order keeps its status.
    #[tracing::instrument(skip(self))]
    pub async fn uncancel(&self, order_id: OrderId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let record = tx
            .get_cancellation_by_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cancellation for order", order_id))?;
        if let Some(order) = tx.get_order_for_update(order_id).await? {
            ensure_mutable(&order)?;
        }
        tx.delete_cancellation(record.id).await?;
        tx.commit().await?;

        tracing::info!(%order_id, cancellation_id = %record.id, "cancellation record removed");
        Ok(())
    }
}
