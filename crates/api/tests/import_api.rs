//! Integration tests for background imports.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, body_text, get, post_json, wait_for_import, wait_for_view, SlowStore};
use roster_api::background::import_jobs::ImportJobs;
use roster_core::store::memory::MemoryStore;
use serde_json::json;

const HEADER: &str = "Primary Gov't Org,Directorate,Dept/Div/Branch,Secondary Gov't Org,\
Civ. Company,First Name,Last Name,Callsign/Nickname,Rank,Duty Position,Commercial #,\
Cell #,SVOIP,Company Email,NIPR Email,SIPR Email,Country";

/// One CSV line with the given org, names and cell number; other cells empty.
fn csv_row(org: &str, first: &str, last: &str, cell: &str) -> String {
    format!("{org},,,,,{first},{last},,,,,{cell},,,,,")
}

fn csv(rows: &[String]) -> String {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text
}

fn numbered_rows(count: usize) -> String {
    let rows: Vec<String> = (0..count)
        .map(|i| csv_row("NAVY", &format!("First{i}"), "Last", ""))
        .collect();
    csv(&rows)
}

/// Split an SSE body into `(event, data)` pairs.
fn sse_frames(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = Some(name.to_string());
                } else if let Some(json) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(json).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

async fn start(app: &axum::Router, format: &str, data: String) -> i64 {
    let response = post_json(
        app.clone(),
        "/api/v1/imports",
        json!({ "format": format, "data": data }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "running");
    json["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn csv_import_accounts_for_every_row() {
    let (app, store) = common::build_test_app();
    let data = csv(&[
        csv_row("NAVY", "Ada", "Lovelace", "5551234567"),
        csv_row("NAVY", "Ada", "Lovelace", ""),
        csv_row("ARMY", "Alan", "", ""),
        csv_row("ARMY", "Grace", "Hopper", "12"),
    ]);

    let id = start(&app, "csv", data).await;
    let view = wait_for_import(&app, id).await;

    assert_eq!(view["status"], "completed");
    assert_eq!(view["total_rows"], 4);
    assert_eq!(view["processed"], 4);
    assert_eq!(view["accounting"]["inserted"], 1);
    assert_eq!(view["accounting"]["duplicate"], 1);
    assert_eq!(view["accounting"]["invalid"], 2);
    assert_eq!(view["accounting"]["failed"], 0);
    assert_eq!(view["accounting"]["rows"][1]["row_number"], 3);
    assert_eq!(view["accounting"]["rows"][1]["outcome"], "duplicate");
    assert!(view["summary"]
        .as_str()
        .unwrap()
        .starts_with("Imported 1 of 4 rows"));

    let stored = store.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fields.cell_number, "555-123-4567");
}

#[tokio::test]
async fn json_import_skips_existing_records() {
    let (app, store) = common::build_test_app();
    let created = post_json(
        app.clone(),
        "/api/v1/employees",
        json!({ "first_name": "Ada", "last_name": "Lovelace", "primary_govt_org": "NAVY" }),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let headers: Vec<&str> = HEADER.split(',').collect();
    let row = |first: &str, last: &str| {
        let mut object = serde_json::Map::new();
        for header in &headers {
            object.insert((*header).to_string(), json!(""));
        }
        object.insert("Primary Gov't Org".into(), json!("NAVY"));
        object.insert("First Name".into(), json!(first));
        object.insert("Last Name".into(), json!(last));
        serde_json::Value::Object(object)
    };
    let data = json!([row("Ada", "Lovelace"), row("Grace", "Hopper")]).to_string();

    let id = start(&app, "json", data).await;
    let view = wait_for_import(&app, id).await;

    assert_eq!(view["status"], "completed");
    assert_eq!(view["accounting"]["inserted"], 1);
    assert_eq!(view["accounting"]["duplicate"], 1);
    assert_eq!(view["accounting"]["rows"][0]["matched"]["kind"], "existing");
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn missing_headers_fail_the_run() {
    let (app, store) = common::build_test_app();
    let id = start(&app, "csv", "First Name,Last Name\nAda,Lovelace".to_string()).await;
    let view = wait_for_import(&app, id).await;

    assert_eq!(view["status"], "failed");
    assert!(view["error"].as_str().unwrap().contains("Primary Gov't Org"));
    assert!(view["finished_at"].is_string());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn unreachable_store_fails_the_run() {
    let app = common::build_app_with(Arc::new(common::UnreachableStore), common::test_config());
    let id = start(&app, "csv", csv(&[csv_row("NAVY", "Ada", "Lovelace", "")])).await;
    let view = wait_for_import(&app, id).await;

    assert_eq!(view["status"], "failed");
}

#[tokio::test]
async fn unknown_format_is_rejected() {
    let (app, _) = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/imports",
        json!({ "format": "xlsx", "data": "anything" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn empty_upload_is_400() {
    let (app, _) = common::build_test_app();
    let response = post_json(app, "/api/v1/imports", json!({ "format": "csv", "data": "  " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let mut config = common::test_config();
    config.max_import_bytes = 256;
    let app = common::build_app_with(Arc::new(MemoryStore::new()), config);

    let rows: Vec<String> = (0..20)
        .map(|i| csv_row("NAVY", &format!("First{i}"), "Last", ""))
        .collect();
    let response = post_json(app, "/api/v1/imports", json!({ "format": "csv", "data": csv(&rows) })).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unknown_import_is_404() {
    let (app, _) = common::build_test_app();

    assert_eq!(get(app.clone(), "/api/v1/imports/99").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        post_json(app, "/api/v1/imports/99/cancel", json!({})).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn finished_import_cannot_be_cancelled() {
    let (app, _) = common::build_test_app();
    let id = start(&app, "csv", csv(&[csv_row("NAVY", "Ada", "Lovelace", "")])).await;
    wait_for_import(&app, id).await;

    let response = post_json(app, &format!("/api/v1/imports/{id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn imports_are_listed_newest_first() {
    let (app, _) = common::build_test_app();
    let first = start(&app, "csv", csv(&[csv_row("NAVY", "Ada", "Lovelace", "")])).await;
    wait_for_import(&app, first).await;
    let second = start(&app, "csv", csv(&[csv_row("NAVY", "Grace", "Hopper", "")])).await;
    wait_for_import(&app, second).await;

    let json = body_json(get(app, "/api/v1/imports").await).await;
    assert_eq!(json["data"][0]["id"], second);
    assert_eq!(json["data"][1]["id"], first);
}

#[tokio::test]
async fn events_of_a_finished_import_end_after_the_snapshot() {
    let (app, _) = common::build_test_app();
    let id = start(&app, "csv", csv(&[csv_row("NAVY", "Ada", "Lovelace", "")])).await;
    wait_for_import(&app, id).await;

    let response = get(app, &format!("/api/v1/imports/{id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let body = body_text(response).await;
    assert!(body.contains("event: snapshot"));
    assert!(body.contains("\"status\":\"completed\""));
}

#[tokio::test]
async fn total_rows_is_known_before_the_first_row_finishes() {
    let store = SlowStore::new(Duration::from_millis(20));
    let app = common::build_app_with(Arc::new(store), common::test_config());
    let id = start(&app, "csv", numbered_rows(20)).await;

    let view = wait_for_view(&app, id, |v| v["total_rows"] == 20).await;
    assert_eq!(view["status"], "running");
    assert!(view["processed"].as_u64().unwrap() < 20);

    wait_for_import(&app, id).await;
}

#[tokio::test]
async fn live_subscriber_sees_progress_then_finished() {
    let store = SlowStore::new(Duration::from_millis(10));
    let app = common::build_app_with(Arc::new(store.clone()), common::test_config());
    let id = start(&app, "csv", numbered_rows(20)).await;

    let response = get(app, &format!("/api/v1/imports/{id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let frames = sse_frames(&body_text(response).await);

    assert_eq!(frames[0].0, "snapshot");
    let processed: Vec<u64> = frames
        .iter()
        .filter(|(event, _)| event == "progress")
        .map(|(_, data)| data["processed"].as_u64().unwrap())
        .collect();
    assert!(!processed.is_empty());
    assert!(processed.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(processed.last(), Some(&20));

    let (last_event, last_data) = frames.last().unwrap();
    assert_eq!(last_event, "finished");
    assert_eq!(last_data["status"], "completed");
    assert_eq!(store.inner.len().await, 20);
}

#[tokio::test]
async fn cancelling_a_running_import_commits_nothing() {
    let store = SlowStore::new(Duration::from_millis(20));
    let app = common::build_app_with(Arc::new(store.clone()), common::test_config());
    let id = start(&app, "csv", numbered_rows(30)).await;
    wait_for_view(&app, id, |v| v["processed"].as_u64().unwrap_or(0) >= 1).await;

    let response = post_json(app.clone(), &format!("/api/v1/imports/{id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let view = wait_for_import(&app, id).await;
    assert_eq!(view["status"], "cancelled");
    assert!(view["processed"].as_u64().unwrap() < 30);
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn shutdown_signal_cancels_running_imports() {
    let store = SlowStore::new(Duration::from_millis(20));
    let jobs = Arc::new(ImportJobs::new());
    let app = common::build_app_with_jobs(
        Arc::new(store.clone()),
        common::test_config(),
        Arc::clone(&jobs),
    );
    let id = start(&app, "csv", numbered_rows(30)).await;
    wait_for_view(&app, id, |v| v["processed"].as_u64().unwrap_or(0) >= 1).await;

    jobs.cancel_on(async {}).await;

    let view = wait_for_import(&app, id).await;
    assert_eq!(view["status"], "cancelled");
    assert!(store.inner.is_empty().await);
}
