//! The matching service facade: the feed contract consumed by the external
//! persistence/API layer, and the query/subscription surface consumed by
//! dashboards and notifications.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::common::{capability, DispatchError, GeoPoint, NeedId, ResponderId};
use crate::config::MatcherConfig;
use crate::domains::dispatch::events::{AssignmentEvent, AssignmentEventKind};
use crate::domains::dispatch::models::{
    Assignment, AssignmentStatus, Availability, Need, NeedStatus, Responder, Urgency,
};
use crate::kernel::assigner::Assigner;
use crate::kernel::broadcaster::DispatchBroadcaster;
use crate::kernel::geo_index::GeoIndex;
use crate::kernel::need_queue::NeedQueue;
use crate::kernel::registry::{ResponderDelta, ResponderRegistry};
use crate::kernel::scheduler::{self, MatchTrigger};

/// External submission of a need. Capability labels are free text and get
/// normalized into the closed vocabulary here, at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct NeedSubmission {
    pub location: GeoPoint,
    pub urgency: Urgency,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub headcount: Option<u32>,
}

/// External registration of a responder or asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderRegistration {
    pub location: GeoPoint,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub capacity: u32,
    #[serde(default)]
    pub availability: Option<Availability>,
}

struct ServiceInner {
    geo: Arc<GeoIndex>,
    registry: Arc<ResponderRegistry>,
    queue: Arc<NeedQueue>,
    needs: Arc<DashMap<NeedId, Need>>,
    assignments: Arc<DashMap<NeedId, Assignment>>,
    broadcaster: Arc<DispatchBroadcaster>,
    assigner: Arc<Assigner>,
    trigger_tx: mpsc::UnboundedSender<MatchTrigger>,
    scheduler: JoinHandle<()>,
    config: MatcherConfig,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.scheduler.abort();
    }
}

/// Thread-safe, cloneable handle to the matching service.
#[derive(Clone)]
pub struct MatcherService {
    inner: Arc<ServiceInner>,
}

impl MatcherService {
    /// Build all components and spawn the rematch scheduler.
    pub fn new(config: MatcherConfig) -> Self {
        let geo = Arc::new(GeoIndex::new());
        let registry = Arc::new(ResponderRegistry::new());
        let queue = Arc::new(NeedQueue::new());
        let needs = Arc::new(DashMap::new());
        let assignments = Arc::new(DashMap::new());
        let broadcaster = Arc::new(DispatchBroadcaster::new(config.replay_capacity));
        let timers = Arc::new(DashMap::new());

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let assigner = Arc::new(Assigner::new(
            Arc::clone(&geo),
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&needs),
            Arc::clone(&assignments),
            Arc::clone(&broadcaster),
            timers,
            trigger_tx.clone(),
            config.clone(),
        ));

        let scheduler = tokio::spawn(scheduler::run(Arc::clone(&assigner), trigger_rx));

        Self {
            inner: Arc::new(ServiceInner {
                geo,
                registry,
                queue,
                needs,
                assignments,
                broadcaster,
                assigner,
                trigger_tx,
                scheduler,
                config,
            }),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.inner.config
    }

    // ========================================================================
    // Feed contract: needs
    // ========================================================================

    /// Validate and accept a newly submitted need, then trigger an immediate
    /// match attempt.
    pub async fn on_need_created(
        &self,
        submission: NeedSubmission,
    ) -> Result<Need, DispatchError> {
        if matches!(submission.headcount, Some(0)) {
            return Err(DispatchError::InvalidHeadcount);
        }
        let required = capability::normalize_labels(&submission.required_capabilities)?;

        let need = Need::new(
            submission.location,
            submission.urgency,
            required,
            submission.headcount,
        );
        self.inner.needs.insert(need.id, need.clone());
        self.inner.queue.push(&need);

        info!(need_id = %need.id, urgency = ?need.urgency, "Need submitted");
        self.trigger(MatchTrigger::NeedSubmitted(need.id));
        Ok(need)
    }

    /// External cancellation: drop the need from the queue, cancel any active
    /// assignment and free the responder.
    pub async fn on_need_cancelled(&self, need_id: NeedId) -> Result<(), DispatchError> {
        let Some((_, need)) = self.inner.needs.remove(&need_id) else {
            return Err(DispatchError::UnknownNeed(need_id));
        };
        self.inner.queue.remove(&need_id);

        if need.status == NeedStatus::Matched {
            self.close_active_assignment(need_id, AssignmentStatus::Cancelled)
                .await;
        }
        info!(need_id = %need_id, "Need cancelled");
        Ok(())
    }

    /// External fulfillment confirmation for a matched need.
    pub async fn on_need_fulfilled(&self, need_id: NeedId) -> Result<(), DispatchError> {
        {
            let need = self
                .inner
                .needs
                .get(&need_id)
                .ok_or(DispatchError::UnknownNeed(need_id))?;
            if need.status != NeedStatus::Matched {
                return Err(DispatchError::NoActiveAssignment(need_id));
            }
        }

        self.inner.needs.remove(&need_id);
        self.close_active_assignment(need_id, AssignmentStatus::Completed)
            .await;
        info!(need_id = %need_id, "Need fulfilled");
        Ok(())
    }

    // ========================================================================
    // Feed contract: responders
    // ========================================================================

    /// Register a responder and trigger a rematch attempt for queued needs —
    /// new capacity may satisfy previously-unmatched needs.
    pub async fn on_responder_registered(
        &self,
        registration: ResponderRegistration,
    ) -> Result<Responder, DispatchError> {
        if registration.capacity == 0 {
            return Err(DispatchError::InvalidCapacity);
        }
        let capabilities = capability::normalize_labels(&registration.capabilities)?;

        let responder = Responder::new(
            registration.location,
            capabilities,
            registration.capacity,
            registration.availability.unwrap_or(Availability::Available),
        );
        let id = responder.id;
        self.inner.registry.insert(responder.clone())?;
        self.inner.geo.upsert(id, responder.location);

        info!(
            responder_id = %id,
            capacity = responder.capacity,
            "Responder registered"
        );
        if responder.is_eligible() {
            self.trigger(MatchTrigger::ResponderAvailable(id));
        }
        Ok(responder)
    }

    /// Apply a status delta (location ping, capacity or availability change);
    /// triggers a rematch when the delta frees capacity.
    pub async fn on_responder_status_changed(
        &self,
        responder_id: ResponderId,
        delta: ResponderDelta,
    ) -> Result<Responder, DispatchError> {
        let outcome = self.inner.registry.apply_delta(&responder_id, delta)?;

        if let Some(location) = outcome.moved_to {
            self.inner.geo.upsert(responder_id, location);
        }
        if outcome.frees_capacity {
            self.trigger(MatchTrigger::CapacityFreed(responder_id));
        }

        self.inner
            .registry
            .get(&responder_id)
            .ok_or(DispatchError::UnknownResponder(responder_id))
    }

    // ========================================================================
    // Assignment lifecycle (external acknowledgments)
    // ========================================================================

    /// External acknowledgment of a proposed assignment: stops the expiry
    /// clock. The responder keeps serving until fulfillment or cancellation.
    pub async fn confirm_assignment(
        &self,
        need_id: NeedId,
    ) -> Result<Assignment, DispatchError> {
        let confirmed = {
            let mut assignment = self
                .inner
                .assignments
                .get_mut(&need_id)
                .ok_or(DispatchError::NoActiveAssignment(need_id))?;
            if assignment.status != AssignmentStatus::Proposed {
                return Err(DispatchError::NoActiveAssignment(need_id));
            }
            assignment.status = AssignmentStatus::Confirmed;
            assignment.clone()
        };

        self.inner.assigner.cancel_expiry(&need_id);
        info!(
            need_id = %need_id,
            responder_id = %confirmed.responder_id,
            "Assignment confirmed"
        );
        self.inner
            .broadcaster
            .publish(AssignmentEvent::for_assignment(
                &confirmed,
                AssignmentEventKind::Confirmed,
            ))
            .await;
        Ok(confirmed)
    }

    // ========================================================================
    // Query / subscription surface
    // ========================================================================

    /// Subscribe to assignment lifecycle events, replaying anything after
    /// `last_event_id` first.
    pub async fn subscribe_assignments(
        &self,
        last_event_id: Option<u64>,
    ) -> (Vec<AssignmentEvent>, broadcast::Receiver<AssignmentEvent>) {
        self.inner.broadcaster.subscribe(last_event_id).await
    }

    /// Latest assignment for a need (active or terminal), if any.
    pub fn get_assignment(&self, need_id: &NeedId) -> Option<Assignment> {
        self.inner.assignments.get(need_id).map(|a| a.clone())
    }

    /// All pending needs, most urgent (then oldest) first — operator
    /// visibility into the unmatched backlog.
    pub fn unmatched_needs(&self) -> Vec<Need> {
        let mut pending: Vec<Need> = self
            .inner
            .needs
            .iter()
            .filter(|entry| entry.value().is_pending())
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        pending
    }

    /// Snapshot of a responder's current state.
    pub fn get_responder(&self, responder_id: &ResponderId) -> Option<Responder> {
        self.inner.registry.get(responder_id)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn trigger(&self, trigger: MatchTrigger) {
        // Send fails only when the scheduler is gone (service shutting down).
        let _ = self.inner.trigger_tx.send(trigger);
    }

    /// Close the active assignment for a need with the given terminal status,
    /// releasing the responder and waking the queue.
    async fn close_active_assignment(&self, need_id: NeedId, terminal: AssignmentStatus) {
        let closed = match self.inner.assignments.get_mut(&need_id) {
            Some(mut assignment) if assignment.is_active() => {
                assignment.status = terminal;
                Some(assignment.clone())
            }
            _ => None,
        };

        let Some(assignment) = closed else { return };
        self.inner.assigner.cancel_expiry(&need_id);
        self.inner.registry.release(&assignment.responder_id);
        self.inner
            .broadcaster
            .publish(AssignmentEvent::for_assignment(
                &assignment,
                AssignmentEventKind::from(terminal),
            ))
            .await;
        self.trigger(MatchTrigger::CapacityFreed(assignment.responder_id));
    }
}
