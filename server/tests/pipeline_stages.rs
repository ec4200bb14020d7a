use std::sync::Arc;
use std::time::Duration;

use cotacao_server::deadline::RequestContext;
use cotacao_server::error::{ErrorKind, Stage};
use cotacao_server::pipeline::QuotePipeline;
use cotacao_server::source::QuoteSource;
use cotacao_server::store::PersistenceGateway;


use mock_store::{InMemoryQuoteStore, settle};
use stub_source::{
    PendingSource, SequenceSource, StaticSource, UndecodableSource, quote_with_bid, sample_quote,
};

const FETCH: Duration = Duration::from_millis(200);
const SCHEMA: Duration = Duration::from_millis(10);
const INSERT: Duration = Duration::from_millis(10);

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn pipeline(source: Arc<dyn QuoteSource>, store: &InMemoryQuoteStore) -> QuotePipeline {
    pipeline_with_fetch_budget(source, store, FETCH)
}

fn pipeline_with_fetch_budget(
    source: Arc<dyn QuoteSource>,
    store: &InMemoryQuoteStore,
    fetch: Duration,
) -> QuotePipeline {
    let gateway = PersistenceGateway::new(Arc::new(store.clone()), SCHEMA, INSERT);
    QuotePipeline::new(source, gateway, fetch)
}

#[tokio::test(start_paused = true)]
async fn success_returns_bid_and_appends_one_record() {
    let store = InMemoryQuoteStore::default();
    let p = pipeline(Arc::new(StaticSource::new(sample_quote())), &store);

    let quote = p.run(&RequestContext::background()).await.unwrap();

    assert_eq!(quote.bid, "5.4321");
    assert_eq!(store.records().await, vec![sample_quote()]);
    assert_eq!(store.schema_calls(), 1);
    assert_eq!(store.insert_calls(), 1);
    assert_eq!(p.gateway().open_connections(), 0);
    assert_eq!(store.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn fetch_deadline_fails_before_any_store_step() {
    let store = InMemoryQuoteStore::default();
    let source = StaticSource::new(sample_quote()).with_delay(ms(300));
    let p = pipeline(Arc::new(source.clone()), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Fetch);
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.is_deadline());

    assert_eq!(source.calls(), 1);
    assert_eq!(store.schema_calls(), 0);
    assert_eq!(store.insert_calls(), 0);
    assert!(store.records().await.is_empty());
    assert_eq!(store.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn schema_deadline_fails_without_inserting() {
    let store = InMemoryQuoteStore::default().with_schema_delay(ms(50));
    let p = pipeline(Arc::new(StaticSource::new(sample_quote())), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Schema);
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.is_deadline());
    assert_eq!(store.schema_calls(), 1);
    assert_eq!(store.insert_calls(), 0);
    assert_eq!(store.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn insert_deadline_fails_and_leaves_no_record() {
    let store = InMemoryQuoteStore::default().with_insert_delay(ms(50));
    let p = pipeline(Arc::new(StaticSource::new(sample_quote())), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Persist);
    assert!(err.is_deadline());
    assert_eq!(store.insert_calls(), 1);
    assert!(store.records().await.is_empty());
    assert_eq!(store.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_does_not_shorten_store_budgets() {
    // Fetch uses almost all of its 200ms; schema and insert still get a fresh
    // 10ms each.
    let store = InMemoryQuoteStore::default()
        .with_schema_delay(ms(8))
        .with_insert_delay(ms(8));
    let source = StaticSource::new(sample_quote()).with_delay(ms(195));
    let p = pipeline(Arc::new(source), &store);

    let quote = p.run(&RequestContext::background()).await.unwrap();

    assert_eq!(quote.bid, "5.4321");
    assert_eq!(store.records().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn parent_deadline_caps_every_stage() {
    // Only 5ms of the request's own 200ms remain after the fetch.
    let store = InMemoryQuoteStore::default().with_schema_delay(ms(8));
    let source = StaticSource::new(sample_quote()).with_delay(ms(195));
    let p = pipeline(Arc::new(source), &store);

    let err = p
        .run(&RequestContext::with_timeout(ms(200)))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Schema);
    assert!(err.is_deadline());
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn decode_failure_is_terminal() {
    let store = InMemoryQuoteStore::default();
    let p = pipeline(Arc::new(UndecodableSource), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Fetch);
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(!err.is_deadline());
    assert_eq!(store.schema_calls(), 0);
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_skips_fetch() {
    let store = InMemoryQuoteStore::default().failing_connect();
    let source = StaticSource::new(sample_quote());
    let p = pipeline(Arc::new(source.clone()), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Connect);
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(source.calls(), 0);
    assert_eq!(p.gateway().open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn insert_failure_is_reported_as_persist() {
    let store = InMemoryQuoteStore::default().failing_insert();
    let p = pipeline(Arc::new(StaticSource::new(sample_quote())), &store);

    let err = p.run(&RequestContext::background()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Persist);
    assert!(!err.is_deadline());
    assert_eq!(store.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_successful_run_appends_exactly_one_record() {
    let store = InMemoryQuoteStore::default();
    let quotes = vec![
        quote_with_bid("5.1000"),
        quote_with_bid("5.2000"),
        quote_with_bid("5.2000"),
        quote_with_bid("5.30"),
    ];
    let p = pipeline(Arc::new(SequenceSource::new(quotes.clone())), &store);

    for _ in 0..quotes.len() {
        p.run(&RequestContext::background()).await.unwrap();
    }

    // Duplicates are kept: the table is append-only.
    assert_eq!(store.records().await, quotes);
    assert_eq!(store.schema_calls(), quotes.len());
    assert_eq!(store.insert_calls(), quotes.len());
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_fetch_releases_the_connection() {
    let store = InMemoryQuoteStore::default();
    let source = PendingSource::default();
    let p = Arc::new(pipeline(Arc::new(source.clone()), &store));

    let ctx = RequestContext::background();
    let handle = {
        let p = Arc::clone(&p);
        let ctx = ctx.clone();
        tokio::spawn(async move { p.run(&ctx).await })
    };

    // Let the request reach the fetch stage.
    tokio::time::sleep(ms(20)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(p.gateway().open_connections(), 1);

    ctx.cancel();
    let err = handle.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage(), Stage::Fetch);
    assert_eq!(p.gateway().open_connections(), 0);
    assert_eq!(store.live(), 0);
    assert_eq!(store.schema_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_request_future_releases_the_connection() {
    let store = InMemoryQuoteStore::default();
    // A large fetch budget so only the outer drop can end the request.
    let p = pipeline_with_fetch_budget(
        Arc::new(PendingSource::default()),
        &store,
        Duration::from_secs(60),
    );

    let ctx = RequestContext::background();
    let outcome = tokio::time::timeout(ms(50), p.run(&ctx)).await;

    assert!(outcome.is_err());
    assert_eq!(settle(p.gateway()).await, 0);
    assert_eq!(store.live(), 0);
}
