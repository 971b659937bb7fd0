use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tracing::info;

use mfquote::api::create_router;
use mfquote::build_service;
use mfquote::core::config::AppConfig;

const HDFC_TOP_100: &str = "0P0000XVHO.BO";
const PPFAS_FLEXI: &str = "0P0000XW1B.BO";

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn quote_body(price: f64, previous_close: f64) -> String {
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{
                            "currency": "INR",
                            "gmtoffset": 19800,
                            "regularMarketPrice": {price},
                            "chartPreviousClose": {previous_close},
                            "longName": "Upstream Fund Name"
                        }},
                        "timestamp": [1704080700],
                        "indicators": {{"quote": [{{"close": [{price}]}}]}}
                    }}],
                    "error": null
                }}
            }}"#
        )
    }

    pub const PROFILE_BODY: &str = r#"{
        "quoteSummary": {
            "result": [{
                "summaryDetail": {"totalAssets": {"raw": 310000000000.0}},
                "fundProfile": {
                    "family": "Upstream Family",
                    "feesExpensesInvestment": {"annualReportExpenseRatio": {"raw": 0.0105}}
                },
                "defaultKeyStatistics": {"ytdReturn": {"raw": 0.0812}}
            }],
            "error": null
        }
    }"#;

    // 2024-01-01 to 2024-01-03 at 09:15 IST
    pub const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "INR", "gmtoffset": 19800},
                "timestamp": [1704080700, 1704167100, 1704253500],
                "indicators": {"quote": [{"close": [950.0, 955.5, 960.25]}]}
            }],
            "error": null
        }
    }"#;

    pub async fn mount_quote(server: &MockServer, symbol: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .and(query_param("range", "1d"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    pub async fn mount_profile(server: &MockServer, symbol: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/v10/finance/quoteSummary/{symbol}")))
            .respond_with(template)
            .mount(server)
            .await;
    }

    pub async fn mount_chart(server: &MockServer, symbol: &str, range: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .and(query_param("range", range))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHART_BODY))
            .mount(server)
            .await;
    }
}

fn test_config(server: &wiremock::MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.providers.yahoo.base_url = server.uri();
    config.rate_limit.delay_ms = 0;
    config
}

fn app(config: &AppConfig) -> Router {
    let service = Arc::new(build_service(config).unwrap());
    create_router(service, &config.cors_origins)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    info!(%status, %body, "Received response");
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[test_log::test(tokio::test)]
async fn test_root_and_health() {
    let server = wiremock::MockServer::start().await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "mfquote");
    assert_eq!(body["status"], "running");
    assert_eq!(body["endpoints"]["portfolio"], "/api/mutual-funds/portfolio/calculate");

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["fallback_mode"], false);
    assert_eq!(body["cached_funds"], 0);
}

#[test_log::test(tokio::test)]
async fn test_list_funds_falls_back_when_upstream_is_down() {
    // Unmatched requests get a 404 from the mock server
    let server = wiremock::MockServer::start().await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, "/api/mutual-funds/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["count"], 19);
    let funds = body["data"]["funds"].as_array().unwrap();
    assert!(funds.iter().all(|f| f["is_fallback"] == true));
    assert_eq!(funds[0]["symbol"], HDFC_TOP_100);

    let (status, body) = get(&app, "/api/mutual-funds?category=Small%20Cap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["fallback_mode"], false);
    assert_eq!(body["cached_funds"], 19);
}

#[test_log::test(tokio::test)]
async fn test_search_and_categories() {
    let server = wiremock::MockServer::start().await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, "/api/mutual-funds/search?q=small").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);
    for result in body["data"]["results"].as_array().unwrap() {
        let haystack = format!(
            "{} {} {}",
            result["name"], result["category"], result["fund_family"]
        )
        .to_lowercase();
        assert!(haystack.contains("small"));
    }

    let (status, body) = get(&app, "/api/mutual-funds/search?q=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 19);

    let (status, body) = get(&app, "/api/mutual-funds/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Query parameter 'q' is required");

    let (status, body) = get(&app, "/api/mutual-funds/categories").await;
    assert_eq!(status, StatusCode::OK);
    let categories = body["data"]["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 6);
    assert_eq!(categories[4]["id"], "elss");

    // Neither listing endpoint touches the upstream
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_fund_detail_with_live_data() {
    use wiremock::ResponseTemplate;

    let server = wiremock::MockServer::start().await;
    test_utils::mount_quote(
        &server,
        HDFC_TOP_100,
        ResponseTemplate::new(200).set_body_string(test_utils::quote_body(985.12, 980.0)),
    )
    .await;
    test_utils::mount_profile(
        &server,
        HDFC_TOP_100,
        ResponseTemplate::new(200).set_body_string(test_utils::PROFILE_BODY),
    )
    .await;
    test_utils::mount_chart(&server, HDFC_TOP_100, "1mo").await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, &format!("/api/mutual-funds/{HDFC_TOP_100}?period=1mo")).await;
    assert_eq!(status, StatusCode::OK);
    let fund = &body["data"]["fund"];
    assert_eq!(fund["symbol"], HDFC_TOP_100);
    assert_eq!(fund["name"], "HDFC Top 100 Fund");
    assert_eq!(fund["fund_family"], "HDFC Mutual Fund");
    assert_eq!(fund["nav"], 985.12);
    assert_eq!(fund["day_change"], 5.12);
    assert_eq!(fund["is_fallback"], false);
    assert_eq!(fund["expense_ratio"], 1.05);
    assert_eq!(fund["total_assets"], 310000000000.0);
    assert_eq!(fund["ytd_return"], 8.12);
    // Too short a series to replace the reference figure
    assert_eq!(fund["one_year_return"], 18.5);
    let history = fund["historical_data"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["date"], "2024-01-01");
    assert_eq!(history[2]["nav"], 960.25);

    let (status, body) = get(&app, &format!("/api/mutual-funds/{HDFC_TOP_100}/nav")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nav"], 985.12);
    assert_eq!(body["data"]["previous_close"], 980.0);
    assert!(body["data"].get("historical_data").is_none());

    let (status, body) =
        get(&app, &format!("/api/mutual-funds/{HDFC_TOP_100}/history?period=1mo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], HDFC_TOP_100);
    assert_eq!(body["data"]["period"], "1mo");
    assert_eq!(body["data"]["count"], 3);
}

#[test_log::test(tokio::test)]
async fn test_unknown_fund_is_not_found() {
    let server = wiremock::MockServer::start().await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, "/api/mutual-funds/NOPE.BO").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Fund with symbol NOPE.BO not found");

    let (status, _) = get(&app, "/api/mutual-funds/NOPE.BO/nav").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app, "/api/mutual-funds/NOPE.BO/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No historical data found for NOPE.BO");
}

#[test_log::test(tokio::test)]
async fn test_rate_limit_switches_to_fallback_mode() {
    use wiremock::ResponseTemplate;

    let server = wiremock::MockServer::start().await;
    test_utils::mount_quote(&server, HDFC_TOP_100, ResponseTemplate::new(429)).await;
    test_utils::mount_quote(
        &server,
        PPFAS_FLEXI,
        ResponseTemplate::new(200).set_body_string(test_utils::quote_body(75.0, 74.0)),
    )
    .await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, &format!("/api/mutual-funds/{HDFC_TOP_100}/nav")).await;
    assert_eq!(status, StatusCode::OK);
    let nav = body["data"]["nav"].as_f64().unwrap();
    assert!((nav - 982.45).abs() <= 982.45 * 0.02 + 0.005);

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["fallback_mode"], true);

    // Sticky: a symbol the upstream would serve is synthesized instead
    let (status, body) = get(&app, &format!("/api/mutual-funds/{PPFAS_FLEXI}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fund"]["is_fallback"], true);
    assert_eq!(body["data"]["fund"]["historical_data"], serde_json::json!([]));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_portfolio_calculation() {
    use wiremock::ResponseTemplate;

    let server = wiremock::MockServer::start().await;
    test_utils::mount_quote(
        &server,
        HDFC_TOP_100,
        ResponseTemplate::new(200).set_body_string(test_utils::quote_body(900.0, 895.0)),
    )
    .await;
    test_utils::mount_quote(
        &server,
        PPFAS_FLEXI,
        ResponseTemplate::new(200).set_body_string(test_utils::quote_body(60.0, 61.0)),
    )
    .await;
    let app = app(&test_config(&server));

    let holdings = format!(
        r#"[
            {{"symbol": "{HDFC_TOP_100}", "units": 100, "avg_nav": 850.50}},
            {{"symbol": "{PPFAS_FLEXI}", "units": 50, "avg_nav": 65.30}}
        ]"#
    );
    let (status, body) = post_json(&app, "/api/mutual-funds/portfolio/calculate", &holdings).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"]["summary"];
    assert_eq!(summary["total_invested"], 88315.0);
    assert_eq!(summary["total_current"], 93000.0);
    assert_eq!(summary["total_returns"], 4685.0);
    assert_eq!(summary["total_returns_percent"], 5.3);
    let first = &body["data"]["holdings"][0];
    assert_eq!(first["name"], "HDFC Top 100 Fund");
    assert_eq!(first["current_value"], 90000.0);
    assert_eq!(first["returns"], 4950.0);
}

#[test_log::test(tokio::test)]
async fn test_portfolio_rejects_bad_input() {
    let server = wiremock::MockServer::start().await;
    let app = app(&test_config(&server));

    let (status, body) = post_json(&app, "/api/mutual-funds/portfolio/calculate", "[]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Holdings list cannot be empty");

    let (status, body) =
        post_json(&app, "/api/mutual-funds/portfolio/calculate", r#"{"symbol": 1}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
}

#[test_log::test(tokio::test)]
async fn test_reference_table_from_config_file() {
    let server = wiremock::MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let reference_path = dir.path().join("funds.yaml");
    std::fs::write(
        &reference_path,
        r#"funds:
  - symbol: "TEST1.BO"
    name: "Test Debt Fund"
    category: "Debt"
    family: "Test AMC"
    fallback_nav: 10.5
"#,
    )
    .unwrap();

    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "reference_path: {}\nrate_limit:\n  delay_ms: 0\nproviders:\n  yahoo:\n    base_url: {}\n",
            reference_path.display(),
            server.uri()
        ),
    )
    .unwrap();

    let config = AppConfig::load_from_path(&config_path).unwrap();
    let app = app(&config);

    let (status, body) = get(&app, "/api/mutual-funds/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["funds"][0]["name"], "Test Debt Fund");
    assert_eq!(body["data"]["funds"][0]["one_year_return"], Value::Null);
}

#[test_log::test(tokio::test)]
async fn test_live_quote_when_profile_is_refused() {
    use wiremock::ResponseTemplate;

    let server = wiremock::MockServer::start().await;
    test_utils::mount_quote(
        &server,
        PPFAS_FLEXI,
        ResponseTemplate::new(200).set_body_string(test_utils::quote_body(75.0, 74.0)),
    )
    .await;
    test_utils::mount_profile(
        &server,
        PPFAS_FLEXI,
        ResponseTemplate::new(401).set_body_string("Invalid Crumb"),
    )
    .await;
    let app = app(&test_config(&server));

    let (status, body) = get(&app, &format!("/api/mutual-funds/{PPFAS_FLEXI}/nav")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nav"], 75.0);
    assert_eq!(body["data"]["day_change"], 1.0);

    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["fallback_mode"], false);
}

#[test_log::test(tokio::test)]
async fn test_wildcard_cors_origin() {
    let server = wiremock::MockServer::start().await;
    let mut config = test_config(&server);
    config
        .apply_overrides(|name| (name == "CORS_ORIGINS").then(|| "*".to_string()))
        .unwrap();
    let app = app(&config);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/mutual-funds/categories")
        .header(header::ORIGIN, "https://funds.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://funds.example.com"
    );

    let (status, _) = get(&app, "/api/mutual-funds/categories").await;
    assert_eq!(status, StatusCode::OK);
}
