// Shared fixtures for the integration tests: a scripted chat transport, a
// scripted page fetcher and a retailer for example.com.

pub mod cycle_tests;
pub mod store_tests;
pub mod telegram_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use price_drop_watcher::{
    config::{
        AlertsConfig, AppConfig, DatabaseConfig, LoggingConfig, SchedulerConfig, ScraperConfig, TelegramConfig,
    },
    fetch::{FetchedPage, PageFetcher},
    models::{AlertPolicy, InboundMessage},
    plugins::{ChatTransport, RetailerPlugin, RetailerRegistry},
    utils::error::{DeliveryError, ExtractionError},
    CycleOrchestrator, PriceExtractor, ProductStore,
};

pub const CHAT_ID: &str = "4242";

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        scraper: ScraperConfig {
            user_agent: "PriceDropWatcher-Test/1.0".to_string(),
            accept_language: "en-IN,en;q=0.9".to_string(),
            request_timeout: 5,
            connect_timeout: 2,
            max_concurrent_checks: 3,
            relay_url: None,
            relay_token: None,
        },
        telegram: TelegramConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            bot_token: "123:test".to_string(),
            chat_id: CHAT_ID.to_string(),
            poll_timeout: 0,
        },
        alerts: AlertsConfig {
            policy: AlertPolicy::EveryCycle,
            utc_offset_minutes: 330,
            currency_symbol: "₹".to_string(),
        },
        scheduler: SchedulerConfig {
            cron: "0 * * * *".to_string(),
        },
        logging: LoggingConfig {
            directory: None,
            file_prefix: "watcher.log".to_string(),
        },
    }
}

/// Chat transport fed from a script. Like the real bot API it only returns
/// messages past the requested offset.
#[derive(Default)]
pub struct ScriptedTransport {
    inbox: Mutex<Vec<InboundMessage>>,
    sent: Mutex<Vec<(String, String)>>,
    fail_fetch: bool,
    fail_send: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Default::default()
        }
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Default::default()
        }
    }

    pub async fn push(&self, update_id: i64, text: &str) {
        self.inbox.lock().await.push(InboundMessage {
            update_id,
            chat_id: CHAT_ID.to_string(),
            text: text.to_string(),
        });
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Messages that look like the consolidated price-drop alert.
    pub async fn alerts(&self) -> Vec<String> {
        self.sent()
            .await
            .into_iter()
            .map(|(_, text)| text)
            .filter(|text| text.contains("Price Drop Alerts"))
            .collect()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_updates(&self, last_update_id: i64) -> Result<Vec<InboundMessage>, DeliveryError> {
        if self.fail_fetch {
            return Err(DeliveryError::Api {
                description: "Bad Gateway".to_string(),
            });
        }
        let inbox = self.inbox.lock().await;
        Ok(inbox.iter().filter(|m| m.update_id > last_update_id).cloned().collect())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().await.push((chat_id.to_string(), text.to_string()));
        if self.fail_send {
            return Err(DeliveryError::Api {
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }
}

/// Page fetcher serving canned prices per URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<String, Result<String, ExtractionError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, url: &str, price: &str) {
        let body = format!(
            r#"<html><head><title>Shop</title></head><body><h1>Item at {url}</h1><span class="price">₹{price}</span></body></html>"#
        );
        self.pages.lock().await.insert(url.to_string(), Ok(body));
    }

    pub async fn set_error(&self, url: &str, err: ExtractionError) {
        self.pages.lock().await.insert(url.to_string(), Err(err));
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ExtractionError> {
        self.calls.lock().await.push(url.to_string());
        let body = match self.pages.lock().await.get(url) {
            Some(Ok(body)) => body.clone(),
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(ExtractionError::HttpStatus(404)),
        };
        Ok(FetchedPage {
            url: url.to_string(),
            status: 200,
            body,
            response_time_ms: 1,
        })
    }
}

/// Extraction rules for the example.com pages served by `ScriptedFetcher`.
pub struct ExampleRetailer;

impl RetailerPlugin for ExampleRetailer {
    fn name(&self) -> &str {
        "Example Shop"
    }

    fn plugin_type(&self) -> &str {
        "example"
    }

    fn matches_host(&self, host: &str) -> bool {
        host == "example.com" || host.ends_with(".example.com")
    }

    fn title_selectors(&self) -> &[&'static str] {
        &["h1"]
    }

    fn price_selectors(&self) -> &[&'static str] {
        &[".price"]
    }
}

pub async fn test_registry() -> RetailerRegistry {
    let registry = RetailerRegistry::with_default_retailers().await;
    registry.register(Arc::new(ExampleRetailer)).await;
    registry
}

pub async fn build_orchestrator(
    config: &AppConfig,
    store: &ProductStore,
    transport: Arc<ScriptedTransport>,
    fetcher: Arc<ScriptedFetcher>,
) -> CycleOrchestrator {
    let extractor = PriceExtractor::new(fetcher, test_registry().await);
    CycleOrchestrator::new(config, store.clone(), transport, Arc::new(extractor))
}
