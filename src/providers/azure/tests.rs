use chrono::{TimeDelta, Utc};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

use super::{AzureProvider, ProviderOptions};
use crate::auth::Token;
use crate::pipelines::{Correlation, RunResult, RunState, StageResult, StageState};

const API: &str = "/contoso/proj/_apis";

fn provider(server: &ServerGuard) -> AzureProvider {
    AzureProvider::new(
        &format!("{}/contoso", server.url()),
        "proj".to_string(),
        Some(Token::from("pat")),
        &ProviderOptions::default(),
    )
    .unwrap()
}

async fn mock_json(server: &mut ServerGuard, path: &str, query: Matcher, body: Value) -> Mock {
    server
        .mock("GET", path)
        .match_query(query)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

async fn mock_status(server: &mut ServerGuard, path: &str, query: Matcher, status: usize) -> Mock {
    server
        .mock("GET", path)
        .match_query(query)
        .with_status(status)
        .with_body("{\"message\": \"not available\"}")
        .create_async()
        .await
}

fn timeline_path(build_id: u32) -> String {
    format!("{API}/build/builds/{build_id}/timeline")
}

fn runs_path(pipeline_id: u32) -> String {
    format!("{API}/pipelines/{pipeline_id}/runs")
}

fn builds_by_id(run_id: u32) -> Matcher {
    Matcher::UrlEncoded("buildIds".into(), run_id.to_string())
}

fn builds_by_definition(pipeline_id: u32) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("definitions".into(), pipeline_id.to_string()),
        Matcher::UrlEncoded("$top".into(), "50".into()),
    ])
}

fn run(id: u32, state: Value, result: Value) -> Value {
    json!({
        "id": id,
        "name": format!("20240501.{id}"),
        "state": state,
        "result": result,
        "createdDate": "2024-05-01T10:00:00Z",
        "finishedDate": "2024-05-01T10:30:00Z",
        "_links": { "web": { "href": format!("https://dev.azure.com/contoso/proj/_build/results?buildId={id}") } },
        "pipeline": { "id": 7, "name": "P", "folder": "\\", "revision": 3 }
    })
}

fn stage(id: &str, name: &str, order: i32, state: Value, result: Value) -> Value {
    json!({
        "id": id,
        "parentId": null,
        "type": "Stage",
        "name": name,
        "order": order,
        "state": state,
        "result": result,
        "errorCount": 0,
        "warningCount": 0
    })
}

#[tokio::test]
async fn test_fallback_to_most_recent_build_of_pipeline() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "count": 1, "value": [run(100, json!("completed"), json!("failed"))] }),
    )
    .await;
    mock_status(&mut server, &timeline_path(100), Matcher::Any, 404).await;
    mock_json(
        &mut server,
        &format!("{API}/build/builds"),
        builds_by_id(100),
        json!({ "count": 0, "value": [] }),
    )
    .await;
    mock_json(
        &mut server,
        &format!("{API}/build/builds"),
        builds_by_definition(7),
        json!({ "count": 1, "value": [{ "id": 205 }] }),
    )
    .await;
    mock_json(
        &mut server,
        &timeline_path(205),
        Matcher::Any,
        json!({ "records": [
            stage("s2", "Deploy", 1, json!("completed"), json!("failed")),
            { "id": "j1", "parentId": "s1", "type": "Job", "name": "Compile", "order": 1 },
            stage("s1", "Build", 0, json!("completed"), json!("succeeded"))
        ]}),
    )
    .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.id, 100);
    assert_eq!(run.state, RunState::Completed);
    assert_eq!(run.result, Some(RunResult::Failed));
    assert_eq!(
        run.correlation,
        Some(Correlation::FallbackMostRecent { build_id: 205 })
    );

    let stages = run.stages.as_ref().unwrap();
    let summary: Vec<_> = stages
        .iter()
        .map(|s| (s.name.as_str(), s.state, s.result))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Build", Some(StageState::Completed), Some(StageResult::Succeeded)),
            ("Deploy", Some(StageState::Completed), Some(StageResult::Failed)),
        ]
    );
}

#[tokio::test]
async fn test_run_id_as_build_id_skips_build_listing() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [run(300, json!(2), json!(1))] }),
    )
    .await;
    mock_json(
        &mut server,
        &timeline_path(300),
        Matcher::Any,
        json!({ "records": [stage("s1", "Build", 1, json!(2), json!(0))] }),
    )
    .await;
    let builds = server
        .mock("GET", format!("{API}/build/builds").as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    builds.assert_async().await;
    assert_eq!(runs[0].correlation, Some(Correlation::Exact { build_id: 300 }));
    assert_eq!(runs[0].result, Some(RunResult::Succeeded));
    assert_eq!(runs[0].stages.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unresolved_run_gets_empty_stages() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [run(100, json!("completed"), json!("succeeded"))] }),
    )
    .await;
    mock_status(&mut server, &timeline_path(100), Matcher::Any, 404).await;
    mock_json(
        &mut server,
        &format!("{API}/build/builds"),
        builds_by_id(100),
        json!({ "value": [] }),
    )
    .await;
    mock_json(
        &mut server,
        &format!("{API}/build/builds"),
        builds_by_definition(7),
        json!({ "value": [] }),
    )
    .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    assert_eq!(runs[0].correlation, Some(Correlation::Unresolved));
    assert_eq!(runs[0].stages, Some(Vec::new()));
}

#[tokio::test]
async fn test_queued_build_without_timeline_has_no_stages() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [run(400, json!("inProgress"), json!(null))] }),
    )
    .await;
    server
        .mock("GET", timeline_path(400).as_str())
        .match_query(Matcher::Any)
        .with_status(204)
        .create_async()
        .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    assert_eq!(runs[0].state, RunState::InProgress);
    assert_eq!(runs[0].result, None);
    assert_eq!(runs[0].correlation, Some(Correlation::Exact { build_id: 400 }));
    assert_eq!(runs[0].stages, Some(Vec::new()));
}

#[tokio::test]
async fn test_empty_or_null_timeline_body_has_no_stages() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [
            run(1, json!("notStarted"), json!(null)),
            run(2, json!("notStarted"), json!(null))
        ]}),
    )
    .await;
    server
        .mock("GET", timeline_path(1).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("")
        .create_async()
        .await;
    server
        .mock("GET", timeline_path(2).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("null")
        .create_async()
        .await;
    let builds = server
        .mock("GET", format!("{API}/build/builds").as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    builds.assert_async().await;
    for (run, id) in runs.iter().zip([1, 2]) {
        assert_eq!(run.id, id);
        assert_eq!(run.correlation, Some(Correlation::Exact { build_id: id }));
        assert_eq!(run.stages, Some(Vec::new()));
        assert_eq!(run.stages_error, None);
    }
}

#[tokio::test]
async fn test_build_id_filter_match_skips_definition_window() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [run(100, json!("completed"), json!("failed"))] }),
    )
    .await;
    let timeline = server
        .mock("GET", timeline_path(100).as_str())
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    mock_json(
        &mut server,
        &format!("{API}/build/builds"),
        builds_by_id(100),
        json!({ "value": [{ "id": 100 }] }),
    )
    .await;
    let window = server
        .mock("GET", format!("{API}/build/builds").as_str())
        .match_query(builds_by_definition(7))
        .expect(0)
        .create_async()
        .await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    window.assert_async().await;
    timeline.assert_async().await;
    assert_eq!(runs[0].correlation, Some(Correlation::Exact { build_id: 100 }));
    assert_eq!(runs[0].stages, Some(Vec::new()));
    assert!(runs[0].stages_error.as_deref().unwrap().contains("500"));
}

#[tokio::test]
async fn test_failing_run_does_not_affect_siblings() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [
            run(101, json!("completed"), json!("succeeded")),
            run(102, json!("completed"), json!("failed"))
        ]}),
    )
    .await;
    mock_json(
        &mut server,
        &timeline_path(101),
        Matcher::Any,
        json!({ "records": [stage("s1", "Build", 1, json!("completed"), json!("succeeded"))] }),
    )
    .await;
    mock_status(&mut server, &timeline_path(102), Matcher::Any, 500).await;
    mock_status(&mut server, &format!("{API}/build/builds"), Matcher::Any, 500).await;

    let runs = provider(&server).fetch_runs_with_stages(7, 20).await.unwrap();

    let ids: Vec<_> = runs.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![101, 102]);
    assert_eq!(runs[0].stages.as_ref().unwrap().len(), 1);
    assert_eq!(runs[1].correlation, Some(Correlation::Unresolved));
    assert_eq!(runs[1].stages, Some(Vec::new()));
    assert_eq!(runs[1].stages_error, None);
}

#[tokio::test]
async fn test_list_runs_truncates_and_normalizes() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [
            run(5, json!("inProgress"), json!("failed")),
            run(4, json!("canceling"), json!(null)),
            run(3, json!(8), json!("canceled")),
            run(2, json!("completed"), json!("partiallySucceeded")),
            run(1, json!("completed"), json!("succeeded"))
        ]}),
    )
    .await;

    let runs = provider(&server).list_runs(7, 3).await.unwrap();

    let ids: Vec<_> = runs.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![5, 4, 3]);
    assert_eq!(runs[0].state, RunState::InProgress);
    assert_eq!(runs[1].state, RunState::Canceling);
    assert_eq!(runs[2].state, RunState::Canceled);
    assert!(runs.iter().all(|r| r.result.is_none()));
    assert!(runs.iter().all(|r| r.stages.is_none()));
    assert_eq!(runs[0].pipeline.id, 7);
    assert_eq!(runs[0].pipeline.revision, Some(3));
}

#[tokio::test]
async fn test_run_without_links_gets_derived_url() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [{ "id": 9, "state": "completed" }] }),
    )
    .await;

    let runs = provider(&server).list_runs(7, 10).await.unwrap();

    assert_eq!(runs[0].name, "Run 9");
    assert!(runs[0].url.ends_with("/contoso/proj/_build/results?buildId=9"));
    assert_eq!(runs[0].pipeline.name, "");
    // missing creation date falls back to the time of the request
    assert!(Utc::now() - runs[0].created_date < TimeDelta::minutes(5));
}

#[tokio::test]
async fn test_snapshot_isolates_failing_pipeline() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &format!("{API}/pipelines"),
        Matcher::Any,
        json!({ "count": 3, "value": [
            { "id": 1, "name": "api" },
            { "id": 2, "name": "web", "folder": "\\apps" },
            { "id": 3, "name": "infra", "revision": 4 }
        ]}),
    )
    .await;
    mock_json(&mut server, &runs_path(1), Matcher::Any, json!({ "value": [] })).await;
    mock_status(&mut server, &runs_path(2), Matcher::Any, 500).await;
    mock_json(&mut server, &runs_path(3), Matcher::Any, json!({ "value": [] })).await;

    let snapshot = provider(&server).collect_snapshot(10, 20).await.unwrap();

    assert_eq!(snapshot.project, "proj");
    assert_eq!(snapshot.pipelines.len(), 3);
    let keys: Vec<_> = snapshot.runs.keys().copied().collect();
    assert_eq!(keys, vec![1, 2, 3]);
    assert!(snapshot.runs[&2].is_empty());
}

#[tokio::test]
async fn test_snapshot_respects_pipeline_limit() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &format!("{API}/pipelines"),
        Matcher::Any,
        json!({ "value": [{ "id": 1, "name": "a" }, { "id": 2, "name": "b" }] }),
    )
    .await;
    mock_json(&mut server, &runs_path(1), Matcher::Any, json!({ "value": [] })).await;
    let second = server
        .mock("GET", runs_path(2).as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let snapshot = provider(&server).collect_snapshot(1, 20).await.unwrap();

    second.assert_async().await;
    assert_eq!(snapshot.pipelines.len(), 2);
    assert_eq!(snapshot.runs.len(), 1);
}

#[tokio::test]
async fn test_catalog_failure_aborts_snapshot() {
    let mut server = Server::new_async().await;
    mock_status(&mut server, &format!("{API}/pipelines"), Matcher::Any, 401).await;

    let err = provider(&server).collect_snapshot(10, 20).await.unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_repeated_fetch_is_structurally_equal() {
    let mut server = Server::new_async().await;
    mock_json(
        &mut server,
        &runs_path(7),
        Matcher::Any,
        json!({ "value": [
            run(11, json!("completed"), json!("succeeded")),
            run(10, json!("completed"), json!("failed"))
        ]}),
    )
    .await;
    for id in [10, 11] {
        mock_json(
            &mut server,
            &timeline_path(id),
            Matcher::Any,
            json!({ "records": [
                stage("b", "Test", 2, json!("completed"), json!("failed")),
                stage("a", "Build", 1, json!("completed"), json!("succeeded"))
            ]}),
        )
        .await;
    }

    let provider = provider(&server);
    let first = provider.fetch_runs_with_stages(7, 20).await.unwrap();
    let second = provider.fetch_runs_with_stages(7, 20).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pipelines_follow_continuation_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{API}/pipelines").as_str())
        .match_query(Matcher::Regex("^api-version=7\\.1$".into()))
        .with_status(200)
        .with_header("x-ms-continuationtoken", "page2")
        .with_body(json!({ "value": [{ "id": 1, "name": "a" }] }).to_string())
        .create_async()
        .await;
    mock_json(
        &mut server,
        &format!("{API}/pipelines"),
        Matcher::UrlEncoded("continuationToken".into(), "page2".into()),
        json!({ "value": [{ "id": 2, "name": "b" }] }),
    )
    .await;

    let pipelines = provider(&server).list_pipelines().await.unwrap();

    let ids: Vec<_> = pipelines.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(pipelines[0]
        .url
        .as_deref()
        .unwrap()
        .ends_with("/contoso/proj/_build?definitionId=1"));
}

#[tokio::test]
async fn test_pipelines_stop_on_repeated_continuation_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{API}/pipelines").as_str())
        .match_query(Matcher::Regex("^api-version=7\\.1$".into()))
        .with_status(200)
        .with_header("x-ms-continuationtoken", "again")
        .with_body(json!({ "value": [{ "id": 1, "name": "a" }] }).to_string())
        .create_async()
        .await;
    let repeated = server
        .mock("GET", format!("{API}/pipelines").as_str())
        .match_query(Matcher::UrlEncoded("continuationToken".into(), "again".into()))
        .with_status(200)
        .with_header("x-ms-continuationtoken", "again")
        .with_body(json!({ "value": [{ "id": 2, "name": "b" }] }).to_string())
        .expect(1)
        .create_async()
        .await;

    let pipelines = provider(&server).list_pipelines().await.unwrap();

    repeated.assert_async().await;
    let ids: Vec<_> = pipelines.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_requests_use_pat_basic_auth() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", format!("{API}/pipelines").as_str())
        .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
        .match_header("authorization", "Basic OnBhdA==")
        .with_status(200)
        .with_body(r#"{"value": []}"#)
        .create();

    let provider = provider(&server);
    let pipelines = tokio_test::block_on(provider.list_pipelines()).unwrap();

    mock.assert();
    assert!(pipelines.is_empty());
}
