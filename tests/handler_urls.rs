mod common;

use hitlink::domain::repositories::ShortUrlRepository;
use serde_json::json;

#[tokio::test]
async fn test_list_returns_only_own_urls() {
    let app = common::spawn_app();
    common::create_short_url(&app.repo, "mine0001", "https://a.example", 1).await;
    common::create_short_url(&app.repo, "mine0002", "https://b.example", 1).await;
    common::create_short_url(&app.repo, "theirs01", "https://c.example", 2).await;

    let response = app
        .server
        .get("/api/user/url/list")
        .add_header("Cookie", app.cookie_for(1))
        .await;

    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    let urls = body["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);

    for url in urls {
        assert!(url["code"].as_str().unwrap().starts_with("mine"));
        assert_eq!(url["hits"], 0);
        assert!(url["originURL"].is_string());
        assert!(url["createdAt"].is_string());
    }
}

#[tokio::test]
async fn test_list_empty() {
    let app = common::spawn_app();

    let response = app
        .server
        .get("/api/user/url/list")
        .add_header("Cookie", app.cookie_for(9))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "urls": [] }));
}

#[tokio::test]
async fn test_list_requires_session() {
    let app = common::spawn_app();

    let response = app.server.get("/api/user/url/list").await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_delete_own_url() {
    let app = common::spawn_app();
    common::create_short_url(&app.repo, "delete01", "https://example.com", 1).await;

    let response = app
        .server
        .delete("/api/user/url/r/delete01")
        .add_header("Cookie", app.cookie_for(1))
        .await;

    response.assert_status_ok();
    assert!(!app.repo.exists("delete01").await.unwrap());

    let response = app.server.get("/api/shortener/r/delete01").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let app = common::spawn_app();
    common::create_short_url(&app.repo, "delete02", "https://example.com", 1).await;

    app.server
        .delete("/api/user/url/r/delete02")
        .add_header("Cookie", app.cookie_for(1))
        .await
        .assert_status_ok();

    let response = app
        .server
        .delete("/api/user/url/r/delete02")
        .add_header("Cookie", app.cookie_for(1))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_delete_foreign_url_is_not_found() {
    let app = common::spawn_app();
    common::create_short_url(&app.repo, "foreign1", "https://example.com", 1).await;

    let response = app
        .server
        .delete("/api/user/url/r/foreign1")
        .add_header("Cookie", app.cookie_for(2))
        .await;

    response.assert_status_not_found();
    assert!(app.repo.exists("foreign1").await.unwrap());

    // Still resolvable for everyone.
    let response = app.server.get("/api/shortener/r/foreign1").await;
    assert_eq!(response.status_code(), 307);
}

#[tokio::test]
async fn test_delete_drops_cached_entry_and_pending_hits() {
    let app = common::spawn_app();
    common::create_short_url(&app.repo, "cached01", "https://example.com", 1).await;

    app.server.get("/api/shortener/r/cached01").await;
    assert!(app.state.aggregator.is_pending("cached01"));
    assert_eq!(app.cache.local_delta("cached01"), Some(1));

    app.server
        .delete("/api/user/url/r/cached01")
        .add_header("Cookie", app.cookie_for(1))
        .await
        .assert_status_ok();

    assert!(!app.state.aggregator.is_pending("cached01"));
    assert_eq!(app.cache.local_delta("cached01"), None);

    let report = app.state.aggregator.flush_once().await;
    assert_eq!(report.applied + report.discarded + report.failed, 0);
}

#[tokio::test]
async fn test_auth_check() {
    let app = common::spawn_app();

    let response = app
        .server
        .get("/api/user/authCheck")
        .add_header("Cookie", app.cookie_for(42))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "userId": 42 }));

    let response = app.server.get("/api/user/authCheck").await;
    response.assert_status_unauthorized();
}
