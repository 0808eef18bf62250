//! Post-commit side effects: cache invalidation, low-stock evaluation and
//! audit logging.
//!
//! Everything here is fire-and-forget relative to the transactional outcome.
//! A hook that fails is logged and dropped; it can never turn a committed
//! stock mutation into a failed request.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{inventory_key, CacheBackend, CacheError};
use crate::entities::stock_movement::MovementType;
use crate::events::{Event, EventSender};

/// Invalidation of cached inventory reads for a (batch, location) pair.
#[async_trait]
pub trait InventoryCache: Send + Sync {
    async fn invalidate(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<(), CacheError>;
}

/// Evaluation of the low-stock threshold after a committed mutation.
#[async_trait]
pub trait LowStockAlerts: Send + Sync {
    async fn check_low_stock_alert(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        new_available_qty: i32,
    ) -> anyhow::Result<()>;
}

/// Operation trail for back-office review. Not a compliance audit store.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_operation(
        &self,
        actor_id: Option<Uuid>,
        operation: &str,
        details: Value,
    ) -> anyhow::Result<()>;
}

/// Drops cached reads for the touched pair.
pub struct CacheInvalidator {
    cache: Arc<dyn CacheBackend>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheBackend>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl InventoryCache for CacheInvalidator {
    async fn invalidate(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
    ) -> Result<(), CacheError> {
        self.cache
            .delete_by_prefix(&inventory_key(product_batch_id, location_id))
            .await?;
        Ok(())
    }
}

/// Emits `LowStockDetected` when the available quantity crosses the
/// configured threshold.
pub struct ThresholdLowStockAlerts {
    threshold: i32,
    event_sender: EventSender,
}

impl ThresholdLowStockAlerts {
    pub fn new(threshold: i32, event_sender: EventSender) -> Self {
        Self {
            threshold,
            event_sender,
        }
    }
}

#[async_trait]
impl LowStockAlerts for ThresholdLowStockAlerts {
    async fn check_low_stock_alert(
        &self,
        product_batch_id: Uuid,
        location_id: Uuid,
        new_available_qty: i32,
    ) -> anyhow::Result<()> {
        if new_available_qty > self.threshold {
            return Ok(());
        }

        warn!(
            product_batch_id = %product_batch_id,
            location_id = %location_id,
            available_qty = %new_available_qty,
            threshold = %self.threshold,
            "Available quantity at or below low-stock threshold"
        );

        self.event_sender
            .send(Event::LowStockDetected {
                product_batch_id,
                location_id,
                available_qty: new_available_qty,
                threshold: self.threshold,
                detected_at: Utc::now(),
            })
            .await
            .map_err(anyhow::Error::msg)
    }
}

/// Writes the operation trail through a slog drain.
pub struct SlogAuditLog {
    logger: slog::Logger,
}

impl SlogAuditLog {
    pub fn new(logger: slog::Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl AuditLog for SlogAuditLog {
    async fn log_operation(
        &self,
        actor_id: Option<Uuid>,
        operation: &str,
        details: Value,
    ) -> anyhow::Result<()> {
        slog::info!(
            self.logger,
            "inventory operation";
            "operation" => operation,
            "actor_id" => actor_id.map(|id| id.to_string()).unwrap_or_else(|| "system".to_string()),
            "details" => details.to_string(),
        );
        Ok(())
    }
}

/// A balance row touched by a committed operation.
#[derive(Debug, Clone)]
pub struct TouchedBalance {
    pub product_batch_id: Uuid,
    pub location_id: Uuid,
    pub available_qty: i32,
}

/// Everything the hooks need to run after a commit.
#[derive(Debug, Clone)]
pub struct SideEffectContext {
    pub operation: MovementType,
    pub actor_id: Option<Uuid>,
    pub touched: Vec<TouchedBalance>,
    pub details: Value,
}

/// The hook bundle the engine depends on abstractly.
pub struct SideEffects {
    cache: Arc<dyn InventoryCache>,
    alerts: Arc<dyn LowStockAlerts>,
    audit: Arc<dyn AuditLog>,
}

impl SideEffects {
    pub fn new(
        cache: Arc<dyn InventoryCache>,
        alerts: Arc<dyn LowStockAlerts>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            cache,
            alerts,
            audit,
        }
    }

    /// Standard wiring: in-process cache invalidation, threshold alerts over
    /// the event channel, slog-backed audit trail.
    pub fn standard(
        cache: Arc<dyn CacheBackend>,
        event_sender: EventSender,
        low_stock_threshold: i32,
        audit_logger: slog::Logger,
    ) -> Self {
        Self::new(
            Arc::new(CacheInvalidator::new(cache)),
            Arc::new(ThresholdLowStockAlerts::new(low_stock_threshold, event_sender)),
            Arc::new(SlogAuditLog::new(audit_logger)),
        )
    }

    /// Runs every hook on a detached task. Hook errors are logged at `warn`
    /// and never reach the caller.
    pub fn after_commit(&self, ctx: SideEffectContext) {
        let cache = Arc::clone(&self.cache);
        let alerts = Arc::clone(&self.alerts);
        let audit = Arc::clone(&self.audit);

        tokio::spawn(async move {
            let SideEffectContext {
                operation,
                actor_id,
                touched,
                details,
            } = ctx;

            let mut tasks: Vec<BoxFuture<'static, ()>> = Vec::new();

            for balance in touched {
                let cache = Arc::clone(&cache);
                let alerts = Arc::clone(&alerts);
                let TouchedBalance {
                    product_batch_id,
                    location_id,
                    available_qty,
                } = balance;

                tasks.push(Box::pin(async move {
                    if let Err(e) = cache.invalidate(product_batch_id, location_id).await {
                        warn!(
                            product_batch_id = %product_batch_id,
                            location_id = %location_id,
                            error = %e,
                            "Cache invalidation failed"
                        );
                    }
                }));

                tasks.push(Box::pin(async move {
                    if let Err(e) = alerts
                        .check_low_stock_alert(product_batch_id, location_id, available_qty)
                        .await
                    {
                        warn!(
                            product_batch_id = %product_batch_id,
                            location_id = %location_id,
                            error = %e,
                            "Low-stock evaluation failed"
                        );
                    }
                }));
            }

            tasks.push(Box::pin(async move {
                if let Err(e) = audit
                    .log_operation(actor_id, operation.as_str(), details)
                    .await
                {
                    warn!(error = %e, "Audit logging failed");
                }
            }));

            join_all(tasks).await;
        });
    }
}
