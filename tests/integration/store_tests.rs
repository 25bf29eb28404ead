use super::*;
use price_drop_watcher::config::DatabaseConfig;
use price_drop_watcher::store::SqliteBackend;
use price_drop_watcher::CommandIngestor;
use rust_decimal_macros::dec;
use sqlx::SqlitePool;

async fn sqlite_store(dir: &tempfile::TempDir) -> anyhow::Result<(ProductStore, SqlitePool)> {
    let config = DatabaseConfig {
        url: format!("sqlite://{}/watch.db", dir.path().display()),
        max_connections: 2,
    };
    let backend = SqliteBackend::connect(&config).await?;
    let pool = backend.pool().clone();
    Ok((ProductStore::new(Arc::new(backend)), pool))
}

async fn ingestor(store: &ProductStore, transport: Arc<ScriptedTransport>) -> CommandIngestor {
    CommandIngestor::new(store.clone(), transport, test_registry().await, &get_test_config().alerts)
}

#[tokio::test]
async fn test_re_add_updates_target_without_duplicating() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (store, _pool) = sqlite_store(&dir).await?;
    let transport = Arc::new(ScriptedTransport::new());

    transport.push(1, "/add https://example.com/x 1000").await;
    transport.push(2, "/add https://example.com/x 750").await;

    let outcome = ingestor(&store, Arc::clone(&transport)).await.ingest().await?;

    assert_eq!(outcome.registrations.len(), 2);
    assert!(outcome.registrations[0].was_new);
    assert!(!outcome.registrations[1].was_new);

    let records = store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target_price, dec!(750));

    let replies: Vec<String> = transport.sent().await.into_iter().map(|(_, text)| text).collect();
    assert!(replies[0].contains("Now tracking"));
    assert!(replies[1].contains("updated"));
    Ok(())
}

#[tokio::test]
async fn test_re_add_keeps_current_price() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (store, _pool) = sqlite_store(&dir).await?;
    let transport = Arc::new(ScriptedTransport::new());

    transport.push(1, "/add https://example.com/x 1000").await;
    ingestor(&store, Arc::clone(&transport)).await.ingest().await?;
    store.update_price("https://example.com/x", dec!(1200)).await?;

    transport.push(2, "/add https://example.com/x 1100").await;
    ingestor(&store, Arc::clone(&transport)).await.ingest().await?;

    let record = store.get("https://example.com/x").await?.expect("record");
    assert_eq!(record.target_price, dec!(1100));
    assert_eq!(record.current_price, Some(dec!(1200)));
    Ok(())
}

#[tokio::test]
async fn test_commands_are_not_replayed_after_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(5, "/add https://example.com/x 1000").await;
    transport.push(6, "/add not-a-url 10").await;

    {
        let (store, pool) = sqlite_store(&dir).await?;
        let outcome = ingestor(&store, Arc::clone(&transport)).await.ingest().await?;
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.offset, 6);

        // Target changed by hand after the command ran.
        store
            .upsert(price_drop_watcher::models::NewWatch::new("https://example.com/x", dec!(1))?)
            .await?;
        pool.close().await;
    }

    let (store, _pool) = sqlite_store(&dir).await?;
    assert_eq!(store.command_offset().await?, 6);

    let outcome = ingestor(&store, Arc::clone(&transport)).await.ingest().await?;
    assert_eq!(outcome.processed, 0);
    assert!(outcome.registrations.is_empty());
    assert_eq!(store.get("https://example.com/x").await?.expect("record").target_price, dec!(1));

    transport.push(7, "/add https://example.com/y 20").await;
    let outcome = ingestor(&store, Arc::clone(&transport)).await.ingest().await?;
    assert_eq!(outcome.processed, 1);
    assert_eq!(store.list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invalid_commands_still_advance_offset() -> anyhow::Result<()> {
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(1, "/add").await;
    transport.push(2, "/add https://example.com/x -5").await;
    transport.push(3, "/add https://unknown-shop.test/x 100").await;
    transport.push(4, "hello there").await;

    let outcome = ingestor(&store, Arc::clone(&transport)).await.ingest().await?;

    assert_eq!(outcome.processed, 4);
    assert_eq!(outcome.rejected.len(), 3);
    assert_eq!(store.command_offset().await?, 4);
    assert!(store.list().await?.is_empty());

    // Plain chatter gets no reply; each rejected add gets a usage hint.
    assert_eq!(transport.sent().await.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_history_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());
    transport.push(1, "/add https://example.com/x 1000").await;
    fetcher.set_price("https://example.com/x", "1,050").await;

    {
        let (store, pool) = sqlite_store(&dir).await?;
        let orchestrator =
            build_orchestrator(&config, &store, Arc::clone(&transport), Arc::clone(&fetcher)).await;
        orchestrator.run_cycle().await?;
        pool.close().await;
    }

    let (store, _pool) = sqlite_store(&dir).await?;
    let history = store.history("https://example.com/x", 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price, dec!(1050));
    assert_eq!(store.list().await?[0].name.as_deref(), Some("Item at https://example.com/x"));
    Ok(())
}

#[tokio::test]
async fn test_unreadable_row_does_not_stop_the_cycle() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config();
    let (store, pool) = sqlite_store(&dir).await?;
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    store
        .upsert(price_drop_watcher::models::NewWatch::new("https://example.com/good", dec!(1000))?)
        .await?;
    sqlx::query("INSERT INTO products (url, target_price, status) VALUES (?, '1,000', 'active')")
        .bind("https://example.com/bad")
        .execute(&pool)
        .await?;
    fetcher.set_price("https://example.com/good", "900").await;
    fetcher.set_price("https://example.com/bad", "900").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), Arc::clone(&fetcher)).await;
    let report = orchestrator.run_cycle().await?;

    assert!(report.is_success());
    assert_eq!(report.refresh.checked, 1);
    assert_eq!(fetcher.calls().await, vec!["https://example.com/good".to_string()]);
    assert_eq!(report.alerts(), 1);
    assert_eq!(store.get("https://example.com/good").await?.expect("record").current_price, Some(dec!(900)));
    Ok(())
}
