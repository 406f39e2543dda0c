use api_client::error::ApiError;
use api_client::{CurrencyLayerClient, FxClient};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use configuration::FxSettings;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A stand-in for the `/historical` endpoint that fails the first
/// `failures_before_success` requests with 503.
#[derive(Clone, Default)]
struct Provider {
    hits: Arc<AtomicUsize>,
    failures_before_success: usize,
}

async fn historical(
    State(provider): State<Provider>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let n = provider.hits.fetch_add(1, Ordering::SeqCst);
    if n < provider.failures_before_success {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    if params.get("access_key").map(String::as_str) != Some("test-key") {
        return Ok(Json(json!({
            "success": false,
            "error": { "code": 101, "info": "You have not supplied a valid API Access Key." }
        })));
    }
    if params.get("source").map(String::as_str) != Some("USD") {
        return Err(StatusCode::BAD_REQUEST);
    }

    let quotes: serde_json::Map<String, Value> = params
        .get("currencies")
        .map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .map(|c| {
            let rate = match c {
                "EUR" => json!(0.86),
                "ILS" => json!(3.21),
                _ => json!(1.0),
            };
            (format!("USD{c}"), rate)
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "historical": true,
        "date": params.get("date"),
        "source": "USD",
        "quotes": quotes
    })))
}

async fn spawn_provider(provider: Provider) -> String {
    let router = Router::new()
        .route("/historical", get(historical))
        .with_state(provider);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings(base_url: String) -> FxSettings {
    FxSettings {
        base_url,
        base_delay_ms: 10,
        ..FxSettings::default()
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 10, 1).unwrap()
}

#[tokio::test]
async fn fetches_requested_currencies() {
    let provider = Provider::default();
    let base_url = spawn_provider(provider.clone()).await;
    let client = CurrencyLayerClient::new(&settings(base_url), "test-key").unwrap();

    let rates = client
        .fetch_historical(date(), &["eur".to_string(), "ILS".to_string()])
        .await
        .unwrap();

    assert_eq!(rates.len(), 2);
    assert_eq!(rates["EUR"], dec!(0.86));
    assert_eq!(rates["ILS"], dec!(3.21));
    assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let provider = Provider {
        failures_before_success: 2,
        ..Provider::default()
    };
    let base_url = spawn_provider(provider.clone()).await;
    let client = CurrencyLayerClient::new(&settings(base_url), "test-key").unwrap();

    let rates = client
        .fetch_historical(date(), &["EUR".to_string()])
        .await
        .unwrap();

    assert_eq!(rates["EUR"], dec!(0.86));
    assert_eq!(provider.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let provider = Provider {
        failures_before_success: usize::MAX,
        ..Provider::default()
    };
    let base_url = spawn_provider(provider.clone()).await;
    let client = CurrencyLayerClient::new(&settings(base_url), "test-key").unwrap();

    let err = client
        .fetch_historical(date(), &["EUR".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 503 }));
    assert_eq!(provider.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn provider_rejection_is_not_retried() {
    let provider = Provider::default();
    let base_url = spawn_provider(provider.clone()).await;
    let client = CurrencyLayerClient::new(&settings(base_url), "wrong-key").unwrap();

    let err = client
        .fetch_historical(date(), &["EUR".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Provider { code: 101, .. }), "{err}");
    assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
}
