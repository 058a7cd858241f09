//! Router tests for the cached notification read endpoints.

mod test_support;

use axum::http::StatusCode;
use chime_test_utils::fixtures::{location_scenario, time_scenario};
use test_support::{get, test_app};

const MEMBER: i64 = 7;

#[tokio::test]
async fn test_list_returns_entries_with_etag_header() {
    let app = test_app();
    app.source.put_scenario(location_scenario(MEMBER, 2)).await;
    app.source.put_scenario(time_scenario(MEMBER, 1, 9, 30)).await;

    let response = app
        .send(get("/notifications/scenarios", Some(MEMBER), None))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let etag = body["etag"].as_str().unwrap().to_string();
    assert_eq!(response.etag(), Some(format!("\"{}\"", etag).as_str()));

    let scenarios = body["scenarios"].as_array().unwrap();
    let ids: Vec<i64> = scenarios
        .iter()
        .map(|s| s["scenario_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(scenarios[0]["condition"]["type"], "TIME");
    assert_eq!(scenarios[1]["condition"]["type"], "LOCATION");
}

#[tokio::test]
async fn test_matching_if_none_match_returns_empty_304() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 1, 7, 0)).await;

    let first = app
        .send(get("/notifications/scenarios", Some(MEMBER), None))
        .await;
    let etag = first.etag().unwrap().to_string();

    let second = app
        .send(get("/notifications/scenarios", Some(MEMBER), Some(&etag)))
        .await;

    assert_eq!(second.status, StatusCode::NOT_MODIFIED);
    assert!(second.body.is_empty());
    assert_eq!(second.etag(), Some(etag.as_str()));
    assert_eq!(app.source.fetch_count(), 1);
}

#[tokio::test]
async fn test_stale_if_none_match_returns_current_list() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 1, 7, 0)).await;

    let first = app
        .send(get("/notifications/scenarios", Some(MEMBER), None))
        .await;
    let stale = first.etag().unwrap().to_string();

    let scenario = time_scenario(MEMBER, 2, 8, 15);
    app.state
        .cache
        .upsert(scenario.member_id, &scenario)
        .await
        .unwrap();

    let second = app
        .send(get("/notifications/scenarios", Some(MEMBER), Some(&stale)))
        .await;

    assert_eq!(second.status, StatusCode::OK);
    assert_ne!(second.etag(), Some(stale.as_str()));
    assert_eq!(second.json()["scenarios"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_if_none_match_without_namespace_rebuilds() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 1, 7, 0)).await;

    let response = app
        .send(get("/notifications/scenarios", Some(MEMBER), Some("*")))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.source.fetch_count(), 1);
}

#[tokio::test]
async fn test_single_returns_decoded_condition() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 10, 9, 30)).await;

    let response = app
        .send(get("/notifications/scenarios/10", Some(MEMBER), None))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["scenario_id"], 10);
    assert_eq!(body["notification_type"], "TIME");
    assert_eq!(body["condition"]["start_hour"], 9);
    assert_eq!(body["condition"]["start_minute"], 30);
}

#[tokio::test]
async fn test_single_without_active_notification_is_404() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 10, 9, 30)).await;

    let response = app
        .send(get("/notifications/scenarios/99", Some(MEMBER), None))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = response.json();
    assert_eq!(body["code"], "NOTIFICATION_NOT_FOUND");
    assert!(body["message"].as_str().unwrap().contains("99"));
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_malformed_scenario_id_is_400() {
    let app = test_app();
    let response = app
        .send(get("/notifications/scenarios/abc", Some(MEMBER), None))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_missing_member_header_is_401() {
    let app = test_app();

    let list = app.send(get("/notifications/scenarios", None, None)).await;
    assert_eq!(list.status, StatusCode::UNAUTHORIZED);
    assert_eq!(list.json()["code"], "UNAUTHORIZED");

    let single = app
        .send(get("/notifications/scenarios/1", None, None))
        .await;
    assert_eq!(single.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.source.fetch_count(), 0);
}

#[tokio::test]
async fn test_members_do_not_see_each_other() {
    let app = test_app();
    app.source.put_scenario(time_scenario(MEMBER, 1, 7, 0)).await;

    let response = app
        .send(get("/notifications/scenarios/1", Some(MEMBER + 1), None))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
