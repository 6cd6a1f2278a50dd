//! Core matching step: find and reserve the best eligible responder for a
//! need, or leave it queued when none qualifies.
//!
//! Unmatched is a normal, persistent state, never an error — the need waits
//! in the queue until the next capacity-freeing trigger.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::{AssignmentId, NeedId, ResponderId};
use crate::config::MatcherConfig;
use crate::domains::dispatch::events::{AssignmentEvent, AssignmentEventKind};
use crate::domains::dispatch::models::{Assignment, AssignmentStatus, Need, NeedStatus};
use crate::domains::dispatch::utils::scoring;
use crate::kernel::broadcaster::DispatchBroadcaster;
use crate::kernel::geo_index::GeoIndex;
use crate::kernel::need_queue::NeedQueue;
use crate::kernel::registry::ResponderRegistry;
use crate::kernel::scheduler::MatchTrigger;

/// Outcome of a single match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Reserved a responder and proposed an assignment.
    Matched,
    /// No eligible candidate up to the radius ceiling; the need stays pending.
    NoCandidate,
    /// The need is gone or no longer pending (cancelled/matched concurrently).
    NotPending,
}

struct Candidate {
    responder_id: ResponderId,
    distance_km: f64,
    capability_score: f64,
    rank: f64,
}

pub struct Assigner {
    geo: Arc<GeoIndex>,
    registry: Arc<ResponderRegistry>,
    queue: Arc<NeedQueue>,
    needs: Arc<DashMap<NeedId, Need>>,
    assignments: Arc<DashMap<NeedId, Assignment>>,
    broadcaster: Arc<DispatchBroadcaster>,
    // Pending expiry timers, keyed by need. Confirming or closing an
    // assignment must abort its timer.
    timers: Arc<DashMap<NeedId, JoinHandle<()>>>,
    trigger_tx: mpsc::UnboundedSender<MatchTrigger>,
    config: MatcherConfig,
}

impl Assigner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        geo: Arc<GeoIndex>,
        registry: Arc<ResponderRegistry>,
        queue: Arc<NeedQueue>,
        needs: Arc<DashMap<NeedId, Need>>,
        assignments: Arc<DashMap<NeedId, Assignment>>,
        broadcaster: Arc<DispatchBroadcaster>,
        timers: Arc<DashMap<NeedId, JoinHandle<()>>>,
        trigger_tx: mpsc::UnboundedSender<MatchTrigger>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            geo,
            registry,
            queue,
            needs,
            assignments,
            broadcaster,
            timers,
            trigger_tx,
            config,
        }
    }

    /// Attempt to match one need, removing it from the queue on success.
    pub async fn try_match_need(&self, need_id: NeedId) -> MatchOutcome {
        let outcome = self.match_one(need_id).await;
        if outcome == MatchOutcome::NoCandidate {
            debug!(need_id = %need_id, "No eligible responder; need remains pending");
        }
        outcome
    }

    /// Re-attempt matching for a bounded batch from the queue head.
    ///
    /// Needs that still cannot match are requeued at the end (preserving
    /// their original seniority) rather than immediately, so one stubborn
    /// need is not popped repeatedly within the same batch.
    pub async fn drain_pending_batch(&self) {
        let mut unmatched = Vec::new();

        for _ in 0..self.config.rematch_batch {
            let Some(need_id) = self.queue.pop() else {
                break;
            };
            if self.match_one(need_id).await == MatchOutcome::NoCandidate {
                unmatched.push(need_id);
            }
        }

        if !unmatched.is_empty() {
            debug!(unmatched_count = unmatched.len(), "Batch left needs unmatched");
        }
        for need_id in unmatched {
            if let Some(need) = self.needs.get(&need_id) {
                self.queue.requeue(need.value());
            }
        }
    }

    /// Expire a proposed assignment that was never confirmed: free the
    /// responder, requeue the need with its original seniority, and retry
    /// matching since capacity just changed.
    ///
    /// The assignment id guards against a stale timer firing for a
    /// superseded assignment.
    pub async fn expire_assignment(&self, need_id: NeedId, assignment_id: AssignmentId) {
        let mut expired = None;
        if let Some(mut assignment) = self.assignments.get_mut(&need_id) {
            if assignment.id == assignment_id && assignment.status == AssignmentStatus::Proposed {
                assignment.status = AssignmentStatus::Expired;
                expired = Some(assignment.clone());
            }
        }
        let Some(assignment) = expired else {
            debug!(need_id = %need_id, "Expiry fired for stale assignment; ignoring");
            return;
        };

        self.timers.remove(&need_id);
        self.registry.release(&assignment.responder_id);

        let mut requeue = None;
        if let Some(mut need) = self.needs.get_mut(&need_id) {
            need.status = NeedStatus::Pending;
            need.assigned_responder_id = None;
            requeue = Some(need.clone());
        }
        if let Some(need) = requeue {
            self.queue.requeue(&need);
        }

        warn!(
            need_id = %need_id,
            responder_id = %assignment.responder_id,
            "Assignment expired unconfirmed; need requeued"
        );
        self.broadcaster
            .publish(AssignmentEvent::for_assignment(
                &assignment,
                AssignmentEventKind::Expired,
            ))
            .await;

        // The released capacity may serve the head of the queue (often the
        // same need we just requeued).
        self.drain_pending_batch().await;
    }

    /// Abort the expiry timer for a need, if one is armed.
    pub fn cancel_expiry(&self, need_id: &NeedId) {
        if let Some((_, handle)) = self.timers.remove(need_id) {
            handle.abort();
        }
    }

    async fn match_one(&self, need_id: NeedId) -> MatchOutcome {
        // Snapshot outside any entry lock; the commit step re-checks under it.
        let need = match self.needs.get(&need_id) {
            Some(need) if need.is_pending() => need.clone(),
            _ => return MatchOutcome::NotPending,
        };

        let mut radius_km = self.config.initial_radius_km;
        loop {
            let candidates = self.candidates_within(&need, radius_km);

            for candidate in &candidates {
                // Atomic per-responder reservation: of two racing assigner
                // runs, exactly one wins; the loser re-ranks and moves on.
                if !self.registry.try_reserve(&candidate.responder_id) {
                    debug!(
                        responder_id = %candidate.responder_id,
                        "Lost reservation race; trying next candidate"
                    );
                    continue;
                }

                match self.commit(&need, candidate) {
                    Some(assignment) => {
                        self.queue.remove(&need_id);
                        info!(
                            need_id = %need_id,
                            responder_id = %candidate.responder_id,
                            distance_km = candidate.distance_km,
                            capability_score = candidate.capability_score,
                            radius_km,
                            "Matched need to responder"
                        );
                        self.broadcaster
                            .publish(AssignmentEvent::for_assignment(
                                &assignment,
                                AssignmentEventKind::Proposed,
                            ))
                            .await;
                        self.arm_expiry(need_id, assignment.id);
                        return MatchOutcome::Matched;
                    }
                    // The need was cancelled or matched while we were
                    // reserving; the reservation has been rolled back.
                    None => return MatchOutcome::NotPending,
                }
            }

            if radius_km >= self.config.max_radius_km {
                return MatchOutcome::NoCandidate;
            }
            radius_km = (radius_km * 2.0).min(self.config.max_radius_km);
        }
    }

    /// Eligible candidates within `radius_km`, ranked best-first.
    fn candidates_within(&self, need: &Need, radius_km: f64) -> Vec<Candidate> {
        let nearby = self.geo.query_within_radius(&need.location, radius_km);

        let mut candidates: Vec<Candidate> = nearby
            .into_iter()
            .filter_map(|responder_id| {
                let responder = self.registry.get(&responder_id)?;
                if !responder.is_eligible() {
                    return None;
                }
                let capability_score = scoring::capability_score(
                    &need.required_capabilities,
                    &responder.capabilities,
                );
                if capability_score <= 0.0 {
                    return None;
                }
                // True great-circle distance against the registry's
                // authoritative position; the index buckets are approximate.
                let distance_km = need.location.distance_km(&responder.location);
                let rank = scoring::composite_score(
                    capability_score,
                    distance_km,
                    self.config.max_radius_km,
                    responder.load_fraction(),
                    &self.config.weights,
                );
                Some(Candidate {
                    responder_id,
                    distance_km,
                    capability_score,
                    rank,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.rank
                .partial_cmp(&a.rank)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.responder_id.cmp(&b.responder_id))
        });
        candidates
    }

    /// Commit the reservation against the need, re-checking its status under
    /// the entry lock. Rolls the reservation back if the need changed hands.
    fn commit(&self, need: &Need, candidate: &Candidate) -> Option<Assignment> {
        let mut committed = None;
        if let Some(mut entry) = self.needs.get_mut(&need.id) {
            if entry.is_pending() {
                entry.status = NeedStatus::Matched;
                entry.assigned_responder_id = Some(candidate.responder_id);
                committed = Some(Assignment::propose(
                    need.id,
                    candidate.responder_id,
                    candidate.distance_km,
                    candidate.capability_score,
                ));
            }
        }

        match committed {
            Some(assignment) => {
                self.assignments.insert(need.id, assignment.clone());
                Some(assignment)
            }
            None => {
                self.registry.release(&candidate.responder_id);
                None
            }
        }
    }

    fn arm_expiry(&self, need_id: NeedId, assignment_id: AssignmentId) {
        let tx = self.trigger_tx.clone();
        let timeout = self.config.confirm_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(MatchTrigger::AssignmentExpired {
                need_id,
                assignment_id,
            });
        });
        if let Some(stale) = self.timers.insert(need_id, handle) {
            stale.abort();
        }
    }
}
