use super::*;
use price_drop_watcher::fetch::DirectFetcher;
use price_drop_watcher::plugins::transports::TelegramTransport;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Rules for product pages served by the local mock server.
struct LocalShop;

impl RetailerPlugin for LocalShop {
    fn name(&self) -> &str {
        "Local Shop"
    }

    fn plugin_type(&self) -> &str {
        "local"
    }

    fn matches_host(&self, host: &str) -> bool {
        host == "127.0.0.1" || host == "localhost"
    }

    fn title_selectors(&self) -> &[&'static str] {
        &["h1.product"]
    }

    fn price_selectors(&self) -> &[&'static str] {
        &["span.price"]
    }
}

const PRODUCT_PAGE: &str = r#"<html><head>
<script type="application/ld+json">
{"@context": "https://schema.org", "@type": "Product", "name": "Noise Cancelling Headphones",
 "offers": {"@type": "Offer", "price": "18990.00", "priceCurrency": "INR"}}
</script>
</head><body><h1 class="product">Headphones</h1><span class="price">₹19,990</span></body></html>"#;

#[tokio::test]
async fn test_full_cycle_over_http() -> anyhow::Result<()> {
    let telegram = MockServer::start().await;
    let shop = MockServer::start().await;
    let product_url = format!("{}/headphones", shop.uri());

    Mock::given(method("GET"))
        .and(path("/headphones"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .expect(1)
        .mount(&shop)
        .await;

    Mock::given(method("GET"))
        .and(path("/bot123:test/getUpdates"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {"update_id": 900, "message": {"chat": {"id": 4242}, "text": format!("/add {} 20000", product_url)}}
            ]
        })))
        .expect(1)
        .mount(&telegram)
        .await;

    Mock::given(method("POST"))
        .and(path("/bot123:test/sendMessage"))
        .and(body_string_contains("Now tracking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&telegram)
        .await;

    Mock::given(method("POST"))
        .and(path("/bot123:test/sendMessage"))
        .and(body_string_contains("Price Drop Alerts"))
        .and(body_string_contains("Noise Cancelling Headphones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&telegram)
        .await;

    let mut config = get_test_config();
    config.telegram.api_base = telegram.uri();

    let registry = RetailerRegistry::with_default_retailers().await;
    registry.register(Arc::new(LocalShop)).await;
    let fetcher = Arc::new(DirectFetcher::new(&config.scraper)?);
    let extractor = Arc::new(PriceExtractor::new(fetcher, registry));
    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);

    let store = ProductStore::in_memory();
    let orchestrator = CycleOrchestrator::new(&config, store.clone(), transport, extractor);
    let report = orchestrator.run_cycle().await?;

    assert!(report.is_success());
    assert!(report.delivered);
    assert_eq!(store.command_offset().await?, 900);

    let record = store.get(&product_url).await?.expect("record");
    assert_eq!(record.current_price, Some(rust_decimal_macros::dec!(18990)));
    assert_eq!(record.name.as_deref(), Some("Noise Cancelling Headphones"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_chat_api_does_not_stop_refresh() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&shop)
        .await;

    let config = get_test_config();
    let registry = RetailerRegistry::with_default_retailers().await;
    registry.register(Arc::new(LocalShop)).await;
    let fetcher = Arc::new(DirectFetcher::new(&config.scraper)?);
    let extractor = Arc::new(PriceExtractor::new(fetcher, registry));
    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);

    let store = ProductStore::in_memory();
    let url = format!("{}/gone", shop.uri());
    store
        .upsert(price_drop_watcher::models::NewWatch::new(url, rust_decimal_macros::dec!(10))?)
        .await?;

    let orchestrator = CycleOrchestrator::new(&config, store.clone(), transport, extractor);
    let report = orchestrator.run_cycle().await?;

    assert!(report.ingest_error.is_some());
    assert_eq!(report.refresh.checked, 1);
    assert_eq!(report.refresh.failed, 1);
    assert!(report.payload.is_none());
    Ok(())
}
