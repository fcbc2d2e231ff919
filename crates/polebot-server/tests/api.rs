use std::time::Duration;

use futures_util::StreamExt;
use polebot_server::{AppState, api, db, telemetry::TelemetryHub};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn spawn_app() -> String {
    let state = AppState::new(
        db::open_in_memory().unwrap(),
        TelemetryHub::new(Duration::from_millis(20)),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn send(request: reqwest::RequestBuilder) -> (StatusCode, Value) {
    let response = request.send().await.unwrap();
    let status = response.status();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

async fn save_goal_set(client: &reqwest::Client, base: &str, name: &str, goals: Value) -> Value {
    let (status, body) = send(client.post(format!("{base}/api/goal-sets")).json(&json!({
        "map_name": "warehouse",
        "set_name": name,
        "goals": goals,
        "map_info": { "resolution": 0.05, "width": 384, "height": 384 }
    })))
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn goal_set_scenario_over_http() {
    let base = format!("http://{}", spawn_app().await);
    let client = reqwest::Client::new();

    let saved =
        save_goal_set(&client, &base, "A", json!([{ "x": 1.0, "y": 1.0 }, { "x": 2.0, "y": 2.0 }]))
            .await;
    assert_eq!(saved["success"], true);
    assert_eq!(saved["total_goals"], 2);

    let (status, body) = send(client.delete(format!("{base}/api/goal-sets/A/goals/1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(client.get(format!("{base}/api/goal-sets/A"))).await;
    assert_eq!(status, StatusCode::OK);
    let goal_set = &body["goal_set"];
    assert_eq!(goal_set["total_goals"], 1);
    assert_eq!(goal_set["map_name"], "warehouse");
    assert_eq!(goal_set["goals"].as_array().unwrap().len(), 1);
    assert_eq!(goal_set["goals"][0]["sequence_number"], 1);
    assert_eq!(goal_set["goals"][0]["position_x"], 2.0);
    assert_eq!(goal_set["goals"][0]["position_y"], 2.0);

    let (status, body) = send(
        client.post(format!("{base}/api/goal-sets/A/goals")).json(&json!({ "x": 3.0, "y": 4.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence_number"], 2);

    let (status, body) = send(
        client
            .put(format!("{base}/api/goal-sets/A/goals/2"))
            .json(&json!({ "orientation_z": 1.0, "orientation_w": 0.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["goal"]["sequence_number"], 2);
    assert_eq!(body["goal"]["position_x"], 3.0);
    assert_eq!(body["goal"]["orientation_w"], 0.0);

    let (_, body) = send(client.get(format!("{base}/api/goal-sets?map=warehouse"))).await;
    assert_eq!(body["goal_sets"].as_array().unwrap().len(), 1);
    let (_, body) = send(client.get(format!("{base}/api/maps/warehouse"))).await;
    assert_eq!(body["map"]["width"], 384);

    let (status, _) = send(client.delete(format!("{base}/api/goal-sets/A"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(client.get(format!("{base}/api/goal-sets/A"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("'A'"));
}

#[tokio::test]
async fn encoded_set_names_address_exactly_one_set() {
    let base = format!("http://{}", spawn_app().await);
    let client = reqwest::Client::new();
    save_goal_set(&client, &base, "A", json!([{ "x": 1, "y": 1 }])).await;
    save_goal_set(&client, &base, "A?x", json!([{ "x": 2, "y": 2 }])).await;
    save_goal_set(&client, &base, "dock/2", json!([{ "x": 3, "y": 3 }])).await;

    let set_url = |name: &str| {
        let mut url = reqwest::Url::parse(&base).unwrap();
        url.path_segments_mut().unwrap().pop_if_empty().extend(["api", "goal-sets", name]);
        url
    };

    let (status, body) = send(client.get(set_url("dock/2"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["goal_set"]["name"], "dock/2");

    let (status, _) = send(client.delete(set_url("A?x"))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(client.get(format!("{base}/api/goal-sets"))).await;
    let mut names: Vec<_> = body["goal_sets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|set| set["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["A", "dock/2"]);
}

#[tokio::test]
async fn errors_use_the_documented_shapes() {
    let base = format!("http://{}", spawn_app().await);
    let client = reqwest::Client::new();

    let (status, body) = send(
        client
            .post(format!("{base}/api/goal-sets"))
            .json(&json!({ "map_name": "warehouse", "set_name": "A", "goals": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "goals must not be empty");

    let (status, body) = send(
        client
            .post(format!("{base}/api/goal-sets"))
            .header("content-type", "application/json")
            .body("{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(
        client.post(format!("{base}/api/goal-sets/missing/goals")).json(&json!({ "x": 1, "y": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "goal set 'missing' not found");

    let (status, body) = send(client.delete(format!("{base}/api/goal-sets/A/goals/abc"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(client.get(format!("{base}/api/robots"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Endpoint not found", "path": "/api/robots" }));

    let (status, body) = send(client.patch(format!("{base}/api/missions/1"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Endpoint not found", "path": "/api/missions/1" }));

    let (status, body) = send(
        client.post(format!("{base}/api/maps/warehouse")).json(&json!({ "width": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/api/maps/warehouse");

    let (status, body) =
        send(client.get(format!("{base}/api/goal-sets?map=warehouse&map=dock"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn mission_lifecycle_over_http() {
    let base = format!("http://{}", spawn_app().await);
    let client = reqwest::Client::new();
    save_goal_set(&client, &base, "A", json!([{ "x": 1, "y": 1 }, { "x": 2, "y": 2 }])).await;
    let (_, body) = send(client.get(format!("{base}/api/goal-sets/A"))).await;
    let first_goal = body["goal_set"]["goals"][0]["id"].clone();

    let (status, body) = send(
        client
            .post(format!("{base}/api/categories"))
            .json(&json!({ "name": "inspection", "color": "#ff9800" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = body["category"]["id"].clone();

    let (status, body) = send(client.post(format!("{base}/api/missions")).json(&json!({
        "name": "dock sweep",
        "category_id": category_id,
        "goal_set": "A",
        "goals": [
            { "goal_id": first_goal },
            { "x": 5.0, "y": 6.0, "next_goal_trigger": "wait", "wait_time": 12 }
        ]
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let mission = &body["mission"];
    let mission_id = mission["id"].as_i64().unwrap();
    assert_eq!(mission["goal_count"], 2);
    assert_eq!(mission["goals"][1]["next_goal_trigger"], "wait");
    assert_eq!(mission["goals"][1]["wait_time"], 12);
    assert_eq!(mission["goals"][1]["on_failure"], "skip");

    let (_, body) = send(client.get(format!("{base}/api/goal-sets/A"))).await;
    assert_eq!(body["goal_set"]["total_goals"], 3);

    let (status, body) = send(
        client
            .put(format!("{base}/api/missions/{mission_id}/goals"))
            .json(&json!({ "goals": [{ "goal_id": first_goal, "on_failure": "abort" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["mission"]["goals"].as_array().unwrap().len(), 1);
    assert_eq!(body["mission"]["goals"][0]["on_failure"], "abort");

    let (status, body) = send(
        client
            .put(format!("{base}/api/missions/{mission_id}/goals"))
            .json(&json!({ "goals": [{ "x": 1.0, "y": 1.0 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) =
        send(client.post(format!("{base}/api/missions/{mission_id}/execute"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["last_executed_ms"].as_u64().unwrap() > 0);

    let executed_at = body["last_executed_ms"].clone();

    let (_, body) = send(client.get(format!("{base}/api/missions"))).await;
    assert_eq!(body["missions"].as_array().unwrap().len(), 1);
    assert_eq!(body["missions"][0]["last_executed_ms"], executed_at);
    assert_eq!(body["missions"][0]["goal_count"], 1);

    let (status, _) = send(client.delete(format!("{base}/api/missions/{mission_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(client.delete(format!("{base}/api/missions/{mission_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(client.get(format!("{base}/api/goal-sets/A"))).await;
    assert_eq!(body["goal_set"]["total_goals"], 3);
}

#[tokio::test]
async fn telemetry_viewers_receive_latest_message() {
    let addr = spawn_app().await;
    let client = reqwest::Client::new();

    let (_, body) = send(client.get(format!("http://{addr}/api/telemetry"))).await;
    assert_eq!(body, json!({ "success": true, "data": null }));

    let (status, body) = send(
        client
            .post(format!("http://{addr}/api/telemetry"))
            .json(&json!({ "robot_id": "polebot-1", "payload": { "x": 1.5, "battery": 0.9 } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["robot_id"], "polebot-1");

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => break serde_json::from_str::<Value>(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket closed early: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(frame["data"]["robot_id"], "polebot-1");
    assert_eq!(frame["data"]["payload"]["battery"], 0.9);
}
