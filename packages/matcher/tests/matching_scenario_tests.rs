//! End-to-end matching scenarios against the full service: queue ordering,
//! expiry/rematch, late registration, partial capability and capacity safety.
//!
//! Tests run with a paused clock so the expiry timers fire deterministically
//! under `tokio::time::advance`.

use std::time::Duration;

use matcher_core::common::GeoPoint;
use matcher_core::domains::dispatch::events::AssignmentEventKind;
use matcher_core::domains::dispatch::models::{AssignmentStatus, Urgency};
use matcher_core::kernel::registry::ResponderDelta;
use matcher_core::kernel::service::{MatcherService, NeedSubmission, ResponderRegistration};
use matcher_core::MatcherConfig;
use tokio::sync::broadcast;

const MINNEAPOLIS: (f64, f64) = (44.98, -93.27);
// ~198 km east of Minneapolis at this latitude.
const FAR_EAST: (f64, f64) = (44.98, -90.75);

fn point(loc: (f64, f64)) -> GeoPoint {
    GeoPoint::new(loc.0, loc.1).unwrap()
}

fn need(loc: (f64, f64), urgency: Urgency, capabilities: &[&str]) -> NeedSubmission {
    NeedSubmission {
        location: point(loc),
        urgency,
        required_capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
        headcount: None,
    }
}

fn responder(loc: (f64, f64), capabilities: &[&str], capacity: u32) -> ResponderRegistration {
    ResponderRegistration {
        location: point(loc),
        capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
        capacity,
        availability: None,
    }
}

/// Let the scheduler drain its trigger inbox (paused clock auto-advances).
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn drain_kinds(rx: &mut broadcast::Receiver<matcher_core::domains::dispatch::events::AssignmentEvent>) -> Vec<AssignmentEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

#[tokio::test(start_paused = true)]
async fn critical_need_wins_last_unit_of_capacity() {
    let service = MatcherService::new(MatcherConfig::default());

    // Both needs pending before any responder exists
    let n1 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Critical, &["medical"]))
        .await
        .unwrap();
    let n2 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Medium, &["medical"]))
        .await
        .unwrap();
    settle().await;
    assert_eq!(service.unmatched_needs().len(), 2);

    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["medical"], 1))
        .await
        .unwrap();
    settle().await;

    let assignment = service.get_assignment(&n1.id).expect("critical need matched");
    assert_eq!(assignment.responder_id, r1.id);
    assert_eq!(assignment.status, AssignmentStatus::Proposed);

    assert!(service.get_assignment(&n2.id).is_none());
    let unmatched = service.unmatched_needs();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].id, n2.id);

    assert_eq!(service.get_responder(&r1.id).unwrap().load, 1);
}

#[tokio::test(start_paused = true)]
async fn fifo_within_equal_urgency() {
    let service = MatcherService::new(MatcherConfig::default());

    let older = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["water"]))
        .await
        .unwrap();
    let newer = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["water"]))
        .await
        .unwrap();
    settle().await;

    service
        .on_responder_registered(responder(MINNEAPOLIS, &["water"], 1))
        .await
        .unwrap();
    settle().await;

    assert!(service.get_assignment(&older.id).is_some());
    assert!(service.get_assignment(&newer.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn expired_assignment_frees_responder_and_rematches() {
    let service = MatcherService::new(MatcherConfig::default());
    let (_, mut rx) = service.subscribe_assignments(None).await;

    let n1 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Critical, &["medical"]))
        .await
        .unwrap();
    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["medical"], 1))
        .await
        .unwrap();
    settle().await;

    let first = service.get_assignment(&n1.id).expect("matched");
    assert_eq!(first.status, AssignmentStatus::Proposed);

    // Never confirmed: push past the confirmation timeout
    tokio::time::advance(Duration::from_secs(301)).await;
    settle().await;

    // Expired, then immediately rematched to the same (only) responder
    let second = service.get_assignment(&n1.id).expect("rematched");
    assert_eq!(second.status, AssignmentStatus::Proposed);
    assert_ne!(second.id, first.id);
    assert_eq!(second.responder_id, r1.id);
    assert_eq!(service.get_responder(&r1.id).unwrap().load, 1);

    let kinds = drain_kinds(&mut rx);
    assert_eq!(
        kinds,
        vec![
            AssignmentEventKind::Proposed,
            AssignmentEventKind::Expired,
            AssignmentEventKind::Proposed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn requeued_need_keeps_seniority_over_younger_peer() {
    let service = MatcherService::new(MatcherConfig::default());

    let senior = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Medium, &["food"]))
        .await
        .unwrap();
    let junior = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Medium, &["food"]))
        .await
        .unwrap();
    service
        .on_responder_registered(responder(MINNEAPOLIS, &["food"], 1))
        .await
        .unwrap();
    settle().await;

    // Senior matched first; junior waiting
    assert!(service.get_assignment(&senior.id).is_some());
    assert!(service.get_assignment(&junior.id).is_none());

    // Expire the senior's assignment. If requeueing lost its original
    // created_at, the junior need would now win the freed capacity.
    tokio::time::advance(Duration::from_secs(301)).await;
    settle().await;

    let rematch = service.get_assignment(&senior.id).expect("senior rematched");
    assert_eq!(rematch.status, AssignmentStatus::Proposed);
    assert!(service.get_assignment(&junior.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn late_far_responder_triggers_rematch() {
    // The §default ceiling is 160 km; this deployment tolerates farther
    // dispatch. The property under test: registration wakes the matcher, and
    // distance alone does not disqualify the only candidate.
    let mut config = MatcherConfig::default();
    config.max_radius_km = 250.0;
    let service = MatcherService::new(config);

    let n2 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Medium, &["medical"]))
        .await
        .unwrap();
    settle().await;
    assert_eq!(service.unmatched_needs().len(), 1);

    let r2 = service
        .on_responder_registered(responder(FAR_EAST, &["medical"], 2))
        .await
        .unwrap();
    settle().await;

    let assignment = service.get_assignment(&n2.id).expect("matched to far responder");
    assert_eq!(assignment.responder_id, r2.id);
    assert!(
        assignment.distance_km > 180.0 && assignment.distance_km < 220.0,
        "distance was {}",
        assignment.distance_km
    );
}

#[tokio::test(start_paused = true)]
async fn partial_capability_is_eligible_but_outranked() {
    let service = MatcherService::new(MatcherConfig::default());

    // Nearby responder covering only water; slightly farther responder
    // covering both required capabilities.
    let water_only = service
        .on_responder_registered(responder(MINNEAPOLIS, &["water"], 1))
        .await
        .unwrap();
    let full_cover = service
        .on_responder_registered(responder((45.02, -93.27), &["water", "medical"], 1))
        .await
        .unwrap();

    let n1 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["water", "medical"]))
        .await
        .unwrap();
    settle().await;

    let first = service.get_assignment(&n1.id).expect("matched");
    assert_eq!(first.responder_id, full_cover.id);
    assert_eq!(first.match_score, 1.0);

    // With the full-coverage responder busy, a second identical need falls
    // back to the partial match rather than going unserved.
    let n2 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["water", "medical"]))
        .await
        .unwrap();
    settle().await;

    let second = service.get_assignment(&n2.id).expect("partial match");
    assert_eq!(second.responder_id, water_only.id);
    assert_eq!(second.match_score, 0.5);
}

#[tokio::test(start_paused = true)]
async fn rematch_over_stable_state_changes_nothing() {
    let service = MatcherService::new(MatcherConfig::default());

    let matched = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["medical"]))
        .await
        .unwrap();
    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["medical"], 1))
        .await
        .unwrap();
    // No registered responder can cover this one
    let stuck = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Low, &["rescue"]))
        .await
        .unwrap();
    settle().await;

    assert!(service.get_assignment(&matched.id).is_some());
    assert_eq!(service.unmatched_needs().len(), 1);

    let (_, mut rx) = service.subscribe_assignments(None).await;

    // Freed capacity forces a full rematch pass over the queue
    service
        .on_responder_status_changed(
            r1.id,
            ResponderDelta {
                capacity: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    settle().await;

    // No new assignments, no events, no state drift
    assert!(drain_kinds(&mut rx).is_empty());
    assert_eq!(service.unmatched_needs().len(), 1);
    assert_eq!(service.unmatched_needs()[0].id, stuck.id);
    assert_eq!(service.get_responder(&r1.id).unwrap().load, 1);
}

#[tokio::test(start_paused = true)]
async fn load_never_exceeds_capacity_under_submission_burst() {
    let service = MatcherService::new(MatcherConfig::default());

    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["medical"], 2))
        .await
        .unwrap();

    for _ in 0..5 {
        service
            .on_need_created(need(MINNEAPOLIS, Urgency::Critical, &["medical"]))
            .await
            .unwrap();
    }
    settle().await;

    let snapshot = service.get_responder(&r1.id).unwrap();
    assert_eq!(snapshot.load, 2);
    assert!(snapshot.load <= snapshot.capacity);
    assert_eq!(service.unmatched_needs().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_frees_capacity_for_waiting_need() {
    let service = MatcherService::new(MatcherConfig::default());
    let (_, mut rx) = service.subscribe_assignments(None).await;

    let first = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["shelter"]))
        .await
        .unwrap();
    let waiting = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["shelter"]))
        .await
        .unwrap();
    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["shelter"], 1))
        .await
        .unwrap();
    settle().await;

    assert!(service.get_assignment(&first.id).is_some());
    assert!(service.get_assignment(&waiting.id).is_none());

    service.on_need_cancelled(first.id).await.unwrap();
    settle().await;

    let assignment = service.get_assignment(&waiting.id).expect("waiting need matched");
    assert_eq!(assignment.responder_id, r1.id);
    assert_eq!(service.get_responder(&r1.id).unwrap().load, 1);

    let kinds = drain_kinds(&mut rx);
    assert_eq!(
        kinds,
        vec![
            AssignmentEventKind::Proposed,
            AssignmentEventKind::Cancelled,
            AssignmentEventKind::Proposed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn confirmation_cancels_expiry_timer() {
    let service = MatcherService::new(MatcherConfig::default());

    let n1 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::Critical, &["rescue"]))
        .await
        .unwrap();
    let r1 = service
        .on_responder_registered(responder(MINNEAPOLIS, &["rescue"], 1))
        .await
        .unwrap();
    settle().await;

    let confirmed = service.confirm_assignment(n1.id).await.unwrap();
    assert_eq!(confirmed.status, AssignmentStatus::Confirmed);

    // Well past the timeout: nothing should expire
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;

    let assignment = service.get_assignment(&n1.id).unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Confirmed);
    assert_eq!(service.get_responder(&r1.id).unwrap().load, 1);

    // Fulfillment then releases the responder
    service.on_need_fulfilled(n1.id).await.unwrap();
    settle().await;
    assert_eq!(service.get_responder(&r1.id).unwrap().load, 0);
    assert_eq!(
        service.get_assignment(&n1.id).unwrap().status,
        AssignmentStatus::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn reconnecting_subscriber_replays_missed_events() {
    let service = MatcherService::new(MatcherConfig::default());

    let n1 = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["medical"]))
        .await
        .unwrap();
    service
        .on_responder_registered(responder(MINNEAPOLIS, &["medical"], 1))
        .await
        .unwrap();
    settle().await;

    // First connection sees the proposal
    let (backlog, _rx) = service.subscribe_assignments(Some(0)).await;
    assert_eq!(backlog.len(), 1);
    let last_seen = backlog[0].sequence;

    // Disconnected while the confirmation happened
    service.confirm_assignment(n1.id).await.unwrap();

    let (missed, _rx) = service.subscribe_assignments(Some(last_seen)).await;
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].kind, AssignmentEventKind::Confirmed);
    assert_eq!(missed[0].sequence, last_seen + 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_capability_and_bad_headcount_rejected() {
    let service = MatcherService::new(MatcherConfig::default());

    let err = service
        .on_need_created(need(MINNEAPOLIS, Urgency::High, &["juggling"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown capability"));

    let mut bad = need(MINNEAPOLIS, Urgency::High, &["medical"]);
    bad.headcount = Some(0);
    assert!(service.on_need_created(bad).await.is_err());

    // Nothing leaked into the queue
    assert!(service.unmatched_needs().is_empty());
}
