//! Trigger-next planning and webhook dispatch

mod helpers;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use helpers::{aapl, fixture, steel};
use insights_common::events::{EventBus, InsightsEvent};
use insights_reports::pipeline::{
    Report, ReportRef, SectionArtifact, SectionBody, SectionKey, SectionSlot, Stage, StageRequest,
};
use insights_reports::relay::{plan_next, NextStep, TriggerNextRelay, WEBHOOK_URL_ENV};
use serde_json::{json, Value};
use serial_test::serial;
use tokio::sync::mpsc;

fn section(stage: Stage, slot: SectionSlot) -> SectionArtifact {
    SectionArtifact::new(
        SectionKey { stage, slot },
        SectionBody::parse(stage, fixture(stage)).unwrap(),
    )
}

fn report(report: ReportRef, sections: Vec<SectionArtifact>) -> Report {
    Report::new(report, Utc::now(), Utc::now(), sections)
}

fn area_slot(heading: usize, sub_heading: usize) -> SectionSlot {
    SectionSlot::Area {
        heading,
        sub_heading,
    }
}

fn next(stage: Stage, slot: SectionSlot) -> Option<NextStep> {
    Some(NextStep {
        stage,
        request: StageRequest::for_slot(&slot, true),
    })
}

fn steel_report() -> Report {
    report(
        steel(),
        vec![
            section(Stage::Headings, SectionSlot::Whole),
            section(Stage::TariffUpdates, SectionSlot::Whole),
        ],
    )
}

fn aapl_report() -> Report {
    report(aapl(), vec![section(Stage::Criteria, SectionSlot::Whole)])
}

#[test]
fn test_whole_stage_moves_to_next_in_order() {
    let report = steel_report();
    assert_eq!(
        plan_next(&report, &SectionKey::whole(Stage::Headings)),
        next(Stage::Introduction, SectionSlot::Whole)
    );
    assert_eq!(
        plan_next(&report, &SectionKey::whole(Stage::ExecutiveSummary)),
        next(Stage::FinalConclusion, SectionSlot::Whole)
    );
}

#[test]
fn test_areas_advance_sub_heading_then_heading_then_stage() {
    let report = steel_report();
    let completed = |h, s| SectionKey {
        stage: Stage::EvaluateIndustryAreas,
        slot: area_slot(h, s),
    };

    assert_eq!(
        plan_next(&report, &SectionKey::whole(Stage::TariffUpdates)),
        next(Stage::EvaluateIndustryAreas, area_slot(0, 0))
    );
    assert_eq!(
        plan_next(&report, &completed(0, 0)),
        next(Stage::EvaluateIndustryAreas, area_slot(0, 1))
    );
    assert_eq!(
        plan_next(&report, &completed(0, 1)),
        next(Stage::EvaluateIndustryAreas, area_slot(1, 0))
    );
    assert_eq!(
        plan_next(&report, &completed(1, 0)),
        next(Stage::ExecutiveSummary, SectionSlot::Whole)
    );
}

#[test]
fn test_criteria_advance_in_list_order() {
    let report = aapl_report();
    let completed = |key: &str| SectionKey {
        stage: Stage::EvaluateCriterion,
        slot: SectionSlot::Criterion(key.to_string()),
    };

    assert_eq!(
        plan_next(&report, &SectionKey::whole(Stage::Criteria)),
        next(Stage::EvaluateCriterion, SectionSlot::Criterion("moat".to_string()))
    );
    assert_eq!(
        plan_next(&report, &completed("moat")),
        next(
            Stage::EvaluateCriterion,
            SectionSlot::Criterion("balance-sheet".to_string())
        )
    );
    assert_eq!(
        plan_next(&report, &completed("balance-sheet")),
        next(Stage::FinalSummary, SectionSlot::Whole)
    );
}

#[test]
fn test_last_stage_has_nothing_to_chain() {
    assert_eq!(
        plan_next(&steel_report(), &SectionKey::whole(Stage::ReportCover)),
        None
    );
    assert_eq!(
        plan_next(&aapl_report(), &SectionKey::whole(Stage::FinalSummary)),
        None
    );
}

#[test]
fn test_indexed_next_stage_without_slots_is_not_chained() {
    let report = report(steel(), vec![section(Stage::TariffUpdates, SectionSlot::Whole)]);
    assert_eq!(
        plan_next(&report, &SectionKey::whole(Stage::TariffUpdates)),
        None
    );
}

/// Webhook stand-in that forwards every payload it receives
async fn spawn_webhook() -> (String, mpsc::UnboundedReceiver<Value>) {
    async fn receive(State(tx): State<mpsc::UnboundedSender<Value>>, Json(payload): Json<Value>) {
        let _ = tx.send(payload);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route("/hook", post(receive)).with_state(tx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hook", addr), rx)
}

/// An address nothing listens on
async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/hook", addr)
}

#[tokio::test]
#[serial]
async fn test_dispatch_posts_next_step_to_configured_webhook() {
    std::env::remove_var(WEBHOOK_URL_ENV);
    let (url, mut rx) = spawn_webhook().await;
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let relay = TriggerNextRelay::new(Some(url), bus);

    let handle = relay
        .trigger_after(&steel_report(), &SectionKey::whole(Stage::Headings))
        .unwrap();
    handle.await.unwrap();

    let payload = rx.recv().await.unwrap();
    assert_eq!(
        payload,
        json!({
            "reportKind": "industry-tariff-reports",
            "reportId": "steel",
            "stage": "introduction",
            "path": "/api/industry-tariff-reports/steel/generate-introduction",
            "body": {"triggerNext": true}
        })
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        InsightsEvent::NextStageDispatched { .. }
    ));
}

#[tokio::test]
#[serial]
async fn test_environment_url_overrides_configured_url() {
    let (url, mut rx) = spawn_webhook().await;
    std::env::set_var(WEBHOOK_URL_ENV, &url);
    let relay = TriggerNextRelay::new(Some(closed_url().await), EventBus::new(16));

    assert_eq!(relay.webhook_url(), Some(url));
    let handle = relay
        .trigger_after(&aapl_report(), &SectionKey::whole(Stage::Criteria))
        .unwrap();
    handle.await.unwrap();
    std::env::remove_var(WEBHOOK_URL_ENV);

    let payload = rx.recv().await.unwrap();
    assert_eq!(payload["stage"], "evaluate-criterion");
    assert_eq!(payload["body"]["criterionKey"], "moat");
}

#[tokio::test]
#[serial]
async fn test_dispatch_failure_is_broadcast() {
    std::env::remove_var(WEBHOOK_URL_ENV);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let relay = TriggerNextRelay::new(Some(closed_url().await), bus);

    let handle = relay
        .trigger_after(&steel_report(), &SectionKey::whole(Stage::Headings))
        .unwrap();
    handle.await.unwrap();

    match events.recv().await.unwrap() {
        InsightsEvent::NextStageDispatchFailed {
            report_id,
            next_stage,
            ..
        } => {
            assert_eq!(report_id, "steel");
            assert_eq!(next_stage, "introduction");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_no_webhook_skips_dispatch() {
    std::env::remove_var(WEBHOOK_URL_ENV);
    let relay = TriggerNextRelay::new(None, EventBus::new(16));

    assert!(relay
        .trigger_after(&steel_report(), &SectionKey::whole(Stage::Headings))
        .is_none());
}
