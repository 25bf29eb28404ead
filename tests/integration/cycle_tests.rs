use super::*;
use price_drop_watcher::models::{AlertPolicy, NewWatch};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn seed(store: &ProductStore, url: &str, target: Decimal) -> anyhow::Result<()> {
    store.upsert(NewWatch::new(url, target)?).await?;
    Ok(())
}

#[tokio::test]
async fn test_add_then_drop_end_to_end() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    transport.push(1, "/add https://example.com/x 1000").await;
    fetcher.set_price("https://example.com/x", "900").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), Arc::clone(&fetcher)).await;
    let report = orchestrator.run_cycle().await?;

    assert!(report.is_success());
    assert_eq!(report.registered, 1);

    let records = store.list().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://example.com/x");
    assert_eq!(records[0].target_price, dec!(1000));
    assert_eq!(records[0].current_price, Some(dec!(900)));

    let payload = report.payload.expect("one payload");
    assert_eq!(payload.alerts.len(), 1);
    assert_eq!(payload.alerts[0].record.url, "https://example.com/x");
    assert_eq!(payload.alerts[0].drop_amount, dec!(100));

    let alerts = transport.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("https://example.com/x"));

    let sent = transport.sent().await;
    assert!(sent.iter().any(|(chat, text)| chat == CHAT_ID && text.contains("Now tracking")));
    Ok(())
}

#[tokio::test]
async fn test_consolidates_all_drops_into_one_message() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    for (path, price) in [("a", "90"), ("b", "80"), ("c", "70"), ("d", "150")] {
        let url = format!("https://example.com/{path}");
        seed(&store, &url, dec!(100)).await?;
        fetcher.set_price(&url, price).await;
    }

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), fetcher).await;
    let report = orchestrator.run_cycle().await?;

    assert_eq!(report.alerts(), 3);
    let alerts = transport.alerts().await;
    assert_eq!(alerts.len(), 1);
    for path in ["a", "b", "c"] {
        assert!(alerts[0].contains(&format!("https://example.com/{path}")));
    }
    assert!(!alerts[0].contains("https://example.com/d"));
    Ok(())
}

#[tokio::test]
async fn test_alert_threshold() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/below", dec!(55000)).await?;
    seed(&store, "https://example.com/above", dec!(55000)).await?;
    fetcher.set_price("https://example.com/below", "50,000").await;
    fetcher.set_price("https://example.com/above", "60,000").await;

    let orchestrator = build_orchestrator(&config, &store, transport, fetcher).await;
    let report = orchestrator.run_cycle().await?;

    let payload = report.payload.expect("one payload");
    let urls: Vec<&str> = payload.alerts.iter().map(|a| a.record.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/below"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_cycle_sends_nothing() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/x", dec!(100)).await?;
    fetcher.set_price("https://example.com/x", "250").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), fetcher).await;
    let report = orchestrator.run_cycle().await?;

    assert!(report.is_success());
    assert!(report.payload.is_none());
    assert!(transport.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_one_failure_does_not_block_the_rest() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    for i in 1..=5 {
        let url = format!("https://example.com/item{i}");
        seed(&store, &url, dec!(1000)).await?;
        fetcher.set_price(&url, &format!("{}", 1000 + i)).await;
    }
    fetcher
        .set_error("https://example.com/item3", ExtractionError::Timeout)
        .await;

    let orchestrator = build_orchestrator(&config, &store, transport, Arc::clone(&fetcher)).await;
    let report = orchestrator.run_cycle().await?;

    assert!(report.is_success());
    assert_eq!(report.refresh.updated, 4);
    assert_eq!(report.refresh.failed, 1);
    assert_eq!(fetcher.calls().await.len(), 5);

    for record in store.list().await? {
        if record.url.ends_with("item3") {
            assert_eq!(record.current_price, None);
        } else {
            assert!(record.current_price.is_some(), "{} not refreshed", record.url);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_ingest_outage_still_checks_stored_products() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::failing_fetch());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/x", dec!(1000)).await?;
    fetcher.set_price("https://example.com/x", "999").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), fetcher).await;
    let report = orchestrator.run_cycle().await?;

    assert!(report.ingest_error.is_some());
    assert!(!report.is_success());
    assert_eq!(report.refresh.updated, 1);
    assert_eq!(transport.alerts().await.len(), 1);
    assert_eq!(store.command_offset().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_delivery_failure_fails_the_cycle() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::failing_send());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/x", dec!(1000)).await?;
    fetcher.set_price("https://example.com/x", "500").await;

    let orchestrator = build_orchestrator(&config, &store, transport, fetcher).await;
    let report = orchestrator.run_cycle().await?;

    assert!(!report.is_success());
    assert!(report.delivery_error.is_some());
    assert_eq!(store.list().await?[0].current_price, Some(dec!(500)));
    Ok(())
}

#[tokio::test]
async fn test_every_cycle_policy_repeats_alerts() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/x", dec!(1000)).await?;
    fetcher.set_price("https://example.com/x", "900").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), fetcher).await;
    orchestrator.run_cycle().await?;
    orchestrator.run_cycle().await?;

    assert_eq!(transport.alerts().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_on_change_policy_alerts_once_per_price() -> anyhow::Result<()> {
    let mut config = get_test_config();
    config.alerts.policy = AlertPolicy::OnChange;
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let url = "https://example.com/x";

    seed(&store, url, dec!(1000)).await?;
    fetcher.set_price(url, "900").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), Arc::clone(&fetcher)).await;
    orchestrator.run_cycle().await?;
    orchestrator.run_cycle().await?;
    assert_eq!(transport.alerts().await.len(), 1);

    fetcher.set_price(url, "850").await;
    orchestrator.run_cycle().await?;
    assert_eq!(transport.alerts().await.len(), 2);

    fetcher.set_price(url, "1,100").await;
    orchestrator.run_cycle().await?;
    fetcher.set_price(url, "850").await;
    orchestrator.run_cycle().await?;
    assert_eq!(transport.alerts().await.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_paused_products_are_skipped() -> anyhow::Result<()> {
    let config = get_test_config();
    let store = ProductStore::in_memory();
    let transport = Arc::new(ScriptedTransport::new());
    let fetcher = Arc::new(ScriptedFetcher::new());

    seed(&store, "https://example.com/a", dec!(1000)).await?;
    seed(&store, "https://example.com/b", dec!(1000)).await?;
    fetcher.set_price("https://example.com/a", "500").await;
    fetcher.set_price("https://example.com/b", "500").await;
    transport.push(10, "/pause 1").await;

    let orchestrator = build_orchestrator(&config, &store, Arc::clone(&transport), Arc::clone(&fetcher)).await;
    let report = orchestrator.run_cycle().await?;

    assert_eq!(report.refresh.paused, 1);
    assert_eq!(fetcher.calls().await, vec!["https://example.com/b".to_string()]);
    let payload = report.payload.expect("one payload");
    assert_eq!(payload.alerts.len(), 1);
    assert_eq!(payload.alerts[0].record.url, "https://example.com/b");
    Ok(())
}
