//! courier demo: completes a few orders and lets the dispatcher publish the
//! resulting `OrderCompleted` events through the outbox.
//!
//! Log level via `RUST_LOG` (default `info`); dispatcher settings via
//! `COURIER_*` variables (see `config.rs`).

mod config;
mod orders;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use courier_core::impls::{InMemoryOutboxStore, LogPublisher, NotifyTrigger};
use courier_core::ports::{OutboxStore, SystemClock, TriggerListener};
use courier_core::typed::MessageRegistry;
use courier_core::{DispatcherBuilder, OutboxItemFactory, OutboxMessage};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::orders::{InMemoryOrderDb, Order, OrderCompleted, OrderService};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::from_env().context("reading COURIER_* settings")?;
    info!(?config, "starting courier demo");

    let outbox = InMemoryOutboxStore::new();
    let db = InMemoryOrderDb::new(outbox.clone());
    for (id, total_cents) in [("order-1001", 4_990), ("order-1002", 12_000), ("order-1003", 750)] {
        db.insert(Order::open(id, total_cents)).await;
    }

    let trigger = Arc::new(NotifyTrigger::new());
    let handle = DispatcherBuilder::new()
        .store(Arc::new(outbox.clone()))
        .publisher(Arc::new(LogPublisher))
        .registry(MessageRegistry::new().with::<OrderCompleted>()?)
        .trigger(Arc::clone(&trigger) as Arc<dyn TriggerListener>)
        .config(config)
        .expect_message_types(&[OrderCompleted::TYPE])
        .build()?
        .spawn();

    let service = OrderService::new(
        db,
        OutboxItemFactory::system(),
        trigger,
        Arc::new(SystemClock),
    );
    // The last two fail on purpose: completed twice, and unknown.
    for order_id in ["order-1001", "order-1002", "order-1003", "order-1001", "order-9999"] {
        match service.complete_order(order_id).await {
            Ok(order) => info!(order_id = %order.id, total_cents = order.total_cents, "completed"),
            Err(err) => warn!(order_id, error = %err, "could not complete order"),
        }
    }

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        loop {
            match outbox.counts_by_status().await {
                Ok(counts) if counts.is_drained() => return,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "could not read outbox counts"),
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(timeout = ?DRAIN_TIMEOUT, "outbox did not drain in time");
    }

    handle.shutdown_and_join().await;

    let counts = outbox.counts_by_status().await?;
    info!(
        dispatched = counts.dispatched,
        failed = counts.failed,
        pending = counts.pending,
        "outbox summary"
    );
    for item in outbox.list_failed(10).await? {
        warn!(item_id = %item.id(), error = ?item.last_error(), "dead-lettered");
    }
    Ok(())
}
