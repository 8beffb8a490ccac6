mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use common::{
    FlakyOutcomeStore, InvoiceIssued, RacingStore, ScriptedPublisher, SlowPublisher,
    StoreUnitOfWork, instant_retry, invoice, t0,
};
use courier_core::domain::DispatcherId;
use courier_core::impls::{InMemoryOutboxStore, NotifyTrigger};
use courier_core::ports::{
    ClaimOutcome, Clock, CommitError, FixedClock, MessagePublisher, OutboxStore, PublishError,
    SystemClock,
};
use courier_core::typed::MessageRegistry;
use courier_core::{
    DispatcherBuilder, DispatcherConfig, OutboxDispatcher, OutboxError, OutboxItemFactory,
    OutboxMessage, OutboxSession, OutboxStatus,
};
use rstest::rstest;
use tokio::sync::watch;
use ulid::Ulid;

fn registry() -> MessageRegistry {
    MessageRegistry::new().with::<InvoiceIssued>().unwrap()
}

fn config(max_attempts: u32) -> DispatcherConfig {
    DispatcherConfig {
        poll_interval: Duration::from_millis(20),
        batch_size: 50,
        claim_timeout: None,
        retry: instant_retry(max_attempts),
    }
}

fn dispatcher(
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn MessagePublisher>,
    clock: Arc<FixedClock>,
    config: DispatcherConfig,
) -> OutboxDispatcher {
    DispatcherBuilder::new()
        .store(store)
        .publisher(publisher)
        .registry(registry())
        .clock(clock)
        .config(config)
        .expect_message_types(&[InvoiceIssued::TYPE])
        .build()
        .unwrap()
}

fn not_stopping() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(20)]
#[tokio::test]
async fn committed_messages_are_pending_with_zero_attempts(#[case] n: usize) {
    let store = InMemoryOutboxStore::new();
    let mut session = OutboxSession::new(
        StoreUnitOfWork::new(&store),
        OutboxItemFactory::system(),
        Arc::new(NotifyTrigger::new()),
    );
    for i in 0..n {
        session.stage_message(&invoice(i)).unwrap();
    }

    session.commit().await.unwrap();

    let pending = store.fetch_pending(Utc::now(), 1_000).await.unwrap();
    assert_eq!(pending.len(), n);
    assert!(
        pending
            .iter()
            .all(|item| item.status() == OutboxStatus::Pending && item.attempts() == 0)
    );
}

#[tokio::test]
async fn failed_commit_leaves_no_outbox_rows() {
    let store = InMemoryOutboxStore::new();
    let mut session = OutboxSession::new(
        StoreUnitOfWork::rejecting(&store, "invoice number already used"),
        OutboxItemFactory::system(),
        Arc::new(NotifyTrigger::new()),
    );
    session.stage_message(&invoice(1)).unwrap();
    session.stage_message(&invoice(2)).unwrap();

    let err = session.commit().await.unwrap_err();

    assert!(matches!(err, OutboxError::Commit(CommitError::Constraint(_))));
    assert_eq!(store.counts_by_status().await.unwrap().total(), 0);
}

#[tokio::test]
async fn two_failures_then_success_ends_dispatched_after_three_attempts() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let publisher = Arc::new(ScriptedPublisher::failing_first([
        PublishError::Transient("broker timeout (attempt 1)".into()),
        PublishError::Transient("broker timeout (attempt 2)".into()),
    ]));
    let dispatcher = dispatcher(store.clone(), publisher.clone(), clock.clone(), config(5));
    let item = OutboxItemFactory::with_clock(clock.clone())
        .create(&invoice(7))
        .unwrap();
    store.insert_all(vec![item.clone()]).await.unwrap();
    let (_tx, rx) = not_stopping();

    let mut attempts_seen = Vec::new();
    for _ in 0..3 {
        dispatcher.run_once(&rx).await.unwrap();
        attempts_seen.push(store.get(item.id()).await.unwrap().unwrap().attempts());
    }

    assert_eq!(attempts_seen, vec![1, 2, 3]);
    let stored = store.get(item.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OutboxStatus::Dispatched);
    assert_eq!(stored.attempts(), 3);
    assert!(stored.last_error().unwrap().contains("attempt 2"));
    assert!(stored.dispatched_at().unwrap() >= item.occurred_at());
    assert_eq!(publisher.delivered().len(), 1);
}

#[tokio::test]
async fn failing_every_attempt_dead_letters_at_the_ceiling() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let publisher = Arc::new(ScriptedPublisher::always_failing(PublishError::Transient(
        "connection refused".into(),
    )));
    let dispatcher = dispatcher(store.clone(), publisher.clone(), clock.clone(), config(5));
    let item = OutboxItemFactory::with_clock(clock.clone())
        .create(&invoice(1))
        .unwrap();
    store.insert_all(vec![item.clone()]).await.unwrap();
    let (_tx, rx) = not_stopping();

    let mut previous = 0;
    for _ in 0..8 {
        dispatcher.run_once(&rx).await.unwrap();
        let attempts = store.get(item.id()).await.unwrap().unwrap().attempts();
        assert!(attempts >= previous);
        previous = attempts;
        clock.advance(TimeDelta::seconds(1));
    }

    let stored = store.get(item.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OutboxStatus::Failed);
    assert_eq!(stored.attempts(), 5);
    assert_eq!(publisher.calls().len(), 5);
    assert!(
        store
            .fetch_pending(clock.now() + TimeDelta::days(30), 50)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(store.list_failed(10).await.unwrap()[0].id(), item.id());
}

#[tokio::test]
async fn batch_is_published_in_occurred_at_order() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let publisher = Arc::new(ScriptedPublisher::default());
    let factory = OutboxItemFactory::with_clock(clock.clone());
    let mut items = Vec::new();
    for i in 0..10 {
        items.push(factory.create(&invoice(i)).unwrap());
        clock.advance(TimeDelta::milliseconds(3));
    }
    // Insertion order is the reverse of occurrence order.
    for item in items.iter().rev() {
        store.insert_all(vec![item.clone()]).await.unwrap();
    }
    let dispatcher = dispatcher(store.clone(), publisher.clone(), clock, config(5));
    let (_tx, rx) = not_stopping();

    dispatcher.run_once(&rx).await.unwrap();

    let published: Vec<_> = publisher
        .calls()
        .iter()
        .map(|m| m.occurred_at)
        .collect();
    assert_eq!(published.len(), 10);
    assert!(published.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn losing_every_claim_publishes_nothing() {
    let inner = InMemoryOutboxStore::new();
    let clock = Arc::new(FixedClock::new(t0()));
    let factory = OutboxItemFactory::with_clock(clock.clone());
    let items: Vec<_> = (0..4).map(|i| factory.create(&invoice(i)).unwrap()).collect();
    inner.insert_all(items.clone()).await.unwrap();
    let rival = DispatcherId::from_ulid(Ulid::new());
    let store = Arc::new(RacingStore {
        inner: inner.clone(),
        rival,
    });
    let publisher = Arc::new(ScriptedPublisher::default());
    let dispatcher = dispatcher(store, publisher.clone(), clock, config(5));
    let (_tx, rx) = not_stopping();

    let report = dispatcher.run_once(&rx).await.unwrap();

    assert_eq!(report.fetched, 4);
    assert_eq!(report.lost_claims, 4);
    assert_eq!(report.claimed, 0);
    assert!(publisher.calls().is_empty());
    for item in &items {
        let stored = inner.get(item.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OutboxStatus::Dispatching);
        assert_eq!(stored.claimed_by(), Some(rival));
    }
}

#[tokio::test]
async fn concurrent_dispatchers_publish_each_item_once() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let factory = OutboxItemFactory::with_clock(clock.clone());
    let items: Vec<_> = (0..40).map(|i| factory.create(&invoice(i)).unwrap()).collect();
    store.insert_all(items).await.unwrap();
    let publisher = Arc::new(ScriptedPublisher::default());
    let a = dispatcher(store.clone(), publisher.clone(), clock.clone(), config(5));
    let b = dispatcher(store.clone(), publisher.clone(), clock.clone(), config(5));
    let (_tx, rx) = not_stopping();

    let (ra, rb) = tokio::join!(a.run_once(&rx), b.run_once(&rx));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    let delivered = publisher.delivered();
    let unique: HashSet<_> = delivered.iter().map(|m| m.message_id).collect();
    assert_eq!(delivered.len(), 40);
    assert_eq!(unique.len(), 40);
    assert_eq!(ra.dispatched + rb.dispatched, 40);
    assert_eq!(ra.claimed + ra.lost_claims + rb.claimed + rb.lost_claims, ra.fetched + rb.fetched);
    assert!(store.counts_by_status().await.unwrap().is_drained());
}

#[tokio::test]
async fn trigger_wakes_the_dispatcher_before_the_poll_interval() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let trigger = Arc::new(NotifyTrigger::new());
    let publisher = Arc::new(ScriptedPublisher::default());
    let poll_interval = Duration::from_secs(30);
    let handle = DispatcherBuilder::new()
        .store(store.clone())
        .publisher(publisher.clone())
        .registry(registry())
        .trigger(trigger.clone())
        .clock(Arc::new(SystemClock))
        .config(DispatcherConfig {
            poll_interval,
            ..DispatcherConfig::default()
        })
        .build()
        .unwrap()
        .spawn();
    // Let the first (empty) cycle finish so the loop is waiting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let committed_at = Utc::now();
    let mut session = OutboxSession::new(
        StoreUnitOfWork::new(&store),
        OutboxItemFactory::system(),
        trigger.clone(),
    );
    session.stage_message(&invoice(42)).unwrap();
    let id = session.staged()[0].id();
    session.commit().await.unwrap();

    let dispatched = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let item = store.get(id).await.unwrap().unwrap();
            if item.status() == OutboxStatus::Dispatched {
                return item;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("not dispatched within the wait");

    assert!(dispatched.dispatched_at().unwrap() >= committed_at);
    handle.shutdown_and_join().await;
}

#[tokio::test]
async fn claims_of_a_crashed_instance_are_recovered_after_the_timeout() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let item = OutboxItemFactory::with_clock(clock.clone())
        .create(&invoice(3))
        .unwrap();
    store.insert_all(vec![item.clone()]).await.unwrap();
    let crashed = DispatcherId::from_ulid(Ulid::new());
    let outcome = store.try_claim(item.id(), crashed, t0()).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));

    let publisher = Arc::new(ScriptedPublisher::default());
    let dispatcher = dispatcher(
        store.clone(),
        publisher.clone(),
        clock.clone(),
        DispatcherConfig {
            claim_timeout: Some(Duration::from_secs(60)),
            ..config(5)
        },
    );
    let (_tx, rx) = not_stopping();

    clock.advance(TimeDelta::seconds(30));
    let early = dispatcher.run_once(&rx).await.unwrap();
    assert_eq!(early.fetched, 0);

    clock.advance(TimeDelta::seconds(31));
    let recovered = dispatcher.run_once(&rx).await.unwrap();
    assert_eq!(recovered.dispatched, 1);

    let stored = store.get(item.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OutboxStatus::Dispatched);
    assert_eq!(stored.attempts(), 1);
}

#[tokio::test]
async fn unrecorded_outcome_releases_the_claim_for_the_next_cycle() {
    let inner = InMemoryOutboxStore::new();
    let clock = Arc::new(FixedClock::new(t0()));
    let item = OutboxItemFactory::with_clock(clock.clone())
        .create(&invoice(5))
        .unwrap();
    inner.insert_all(vec![item.clone()]).await.unwrap();
    let store = Arc::new(FlakyOutcomeStore::new(&inner, 1));
    let publisher = Arc::new(ScriptedPublisher::default());
    let dispatcher = dispatcher(store, publisher.clone(), clock, config(5));
    let (_tx, rx) = not_stopping();

    let first = dispatcher.run_once(&rx).await.unwrap();

    assert_eq!(first.released, 1);
    let stored = inner.get(item.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OutboxStatus::Pending);
    assert_eq!(stored.claimed_by(), None);

    let second = dispatcher.run_once(&rx).await.unwrap();

    assert_eq!(second.dispatched, 1);
    let stored = inner.get(item.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OutboxStatus::Dispatched);
    assert_eq!(publisher.delivered().len(), 2);
}

#[tokio::test]
async fn full_batches_are_drained_without_waiting_for_the_poll() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let factory = OutboxItemFactory::with_clock(clock.clone());
    let items: Vec<_> = (0..7).map(|i| factory.create(&invoice(i)).unwrap()).collect();
    store.insert_all(items).await.unwrap();
    let publisher = Arc::new(ScriptedPublisher::default());
    let handle = dispatcher(
        store.clone(),
        publisher.clone(),
        clock,
        DispatcherConfig {
            poll_interval: Duration::from_secs(30),
            batch_size: 2,
            ..config(5)
        },
    )
    .spawn();

    tokio::time::timeout(Duration::from_secs(1), async {
        while !store.counts_by_status().await.unwrap().is_drained() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("batches were not drained back to back");

    assert_eq!(store.counts_by_status().await.unwrap().dispatched, 7);
    assert_eq!(publisher.delivered().len(), 7);
    handle.shutdown_and_join().await;
}

#[tokio::test]
async fn shutdown_during_a_publish_finishes_it_and_releases_the_rest() {
    let store = Arc::new(InMemoryOutboxStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let factory = OutboxItemFactory::with_clock(clock.clone());
    let items: Vec<_> = (0..3).map(|i| factory.create(&invoice(i)).unwrap()).collect();
    store.insert_all(items).await.unwrap();
    let publisher = Arc::new(SlowPublisher::new(Duration::from_millis(200)));
    let handle = dispatcher(store.clone(), publisher.clone(), clock, config(5)).spawn();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown_and_join().await;

    let counts = store.counts_by_status().await.unwrap();
    assert_eq!(counts.dispatched, 1);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.dispatching, 0);
    assert_eq!(publisher.delivered().len(), 1);
}
