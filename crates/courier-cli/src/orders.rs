//! Orders: the business side of the demo.
//!
//! `complete_order` marks an order completed and publishes `OrderCompleted`
//! through the outbox. The order change and the outbox row are committed by
//! one `OrderSession`, so consumers never see an event for an order that was
//! not completed, and no completed order goes without its event.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::domain::OutboxItem;
use courier_core::impls::InMemoryOutboxStore;
use courier_core::ports::{Clock, CommitError, OutboxTrigger, UnitOfWork};
use courier_core::{OutboxError, OutboxItemFactory, OutboxMessage, OutboxSession};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped on every committed change; used for optimistic concurrency.
    pub version: u64,
}

impl Order {
    pub fn open(id: impl Into<String>, total_cents: i64) -> Self {
        Self {
            id: id.into(),
            total_cents,
            status: OrderStatus::Open,
            completed_at: None,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: String,
    pub total_cents: i64,
    pub completed_at: DateTime<Utc>,
}

impl OutboxMessage for OrderCompleted {
    const TYPE: &'static str = "orders.order_completed.v1";
}

/// Order table plus the outbox table it commits with.
#[derive(Clone)]
pub struct InMemoryOrderDb {
    orders: Arc<Mutex<HashMap<String, Order>>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryOrderDb {
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            orders: Arc::default(),
            outbox,
        }
    }

    pub async fn insert(&self, order: Order) {
        self.orders.lock().await.insert(order.id.clone(), order);
    }

    pub async fn get(&self, id: &str) -> Option<Order> {
        self.orders.lock().await.get(id).cloned()
    }

    pub fn session(&self) -> OrderSession {
        OrderSession {
            db: self.clone(),
            updated: HashMap::new(),
        }
    }
}

/// Tracks order changes until `commit_with_outbox`.
pub struct OrderSession {
    db: InMemoryOrderDb,
    updated: HashMap<String, Order>,
}

impl OrderSession {
    /// The order as this session sees it (its own pending change first).
    pub async fn get_order(&self, id: &str) -> Option<Order> {
        match self.updated.get(id) {
            Some(order) => Some(order.clone()),
            None => self.db.get(id).await,
        }
    }

    pub fn update_order(&mut self, order: Order) {
        self.updated.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl UnitOfWork for OrderSession {
    async fn commit_with_outbox(&mut self, outbox_items: &[OutboxItem]) -> Result<(), CommitError> {
        // Lock order: orders, then outbox. The dispatcher only takes the latter.
        let mut orders = self.db.orders.lock().await;
        let mut tx = self.db.outbox.begin().await;

        for (id, changed) in &self.updated {
            let current = orders
                .get(id)
                .ok_or_else(|| CommitError::Constraint(format!("order {id} does not exist")))?;
            if current.version != changed.version {
                return Err(CommitError::Conflict(format!(
                    "order {id} changed since it was read (version {} -> {})",
                    changed.version, current.version
                )));
            }
        }
        tx.insert(outbox_items)?;

        for (id, mut changed) in self.updated.drain() {
            changed.version += 1;
            orders.insert(id, changed);
        }
        tx.commit();
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CompleteOrderError {
    #[error("order {0} does not exist")]
    UnknownOrder(String),

    #[error("order {0} is already completed")]
    AlreadyCompleted(String),

    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

/// Wiring for the order use cases.
#[derive(Clone)]
pub struct OrderService {
    db: InMemoryOrderDb,
    factory: OutboxItemFactory,
    trigger: Arc<dyn OutboxTrigger>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(
        db: InMemoryOrderDb,
        factory: OutboxItemFactory,
        trigger: Arc<dyn OutboxTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            factory,
            trigger,
            clock,
        }
    }

    pub async fn complete_order(&self, order_id: &str) -> Result<Order, CompleteOrderError> {
        let mut session = OutboxSession::new(
            self.db.session(),
            self.factory.clone(),
            Arc::clone(&self.trigger),
        );

        let mut order = session
            .get_order(order_id)
            .await
            .ok_or_else(|| CompleteOrderError::UnknownOrder(order_id.to_string()))?;
        if order.status == OrderStatus::Completed {
            return Err(CompleteOrderError::AlreadyCompleted(order_id.to_string()));
        }

        let now = self.clock.now();
        order.status = OrderStatus::Completed;
        order.completed_at = Some(now);
        session.update_order(order.clone());
        session.stage_message(&OrderCompleted {
            order_id: order.id.clone(),
            total_cents: order.total_cents,
            completed_at: now,
        })?;
        session.commit().await?;

        info!(order_id, "order completed");
        order.version += 1;
        Ok(order)
    }
}
