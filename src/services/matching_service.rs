//! Flujo de asignación de conductor
//!
//! El cliente crea una solicitud `Pending` y espera, con un plazo fijo, a que
//! un conductor la acepte. El estado de la espera es un reductor explícito:
//! `MatchingState × MatchingEvent → MatchingState`. Una vez resuelto, el
//! estado ya no cambia, así que el plazo dispara como mucho una vez y nunca
//! después de observar una aceptación.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{DriverAssignment, TowRequest, TowStatus};
use crate::repositories::TowRequestRepository;
use crate::services::request_events::RequestEventBus;
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Límite superior del plazo que un cliente puede pedir
pub const MAX_MATCH_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchingState {
    Searching,
    DriverAssigned(DriverAssignment),
    Expired,
    Declined,
    Canceled,
    Completed,
}

#[derive(Debug, Clone)]
pub enum MatchingEvent {
    Snapshot(TowRequest),
    DeadlineReached,
}

impl MatchingState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, MatchingState::Searching)
    }

    pub fn reduce(self, event: MatchingEvent) -> MatchingState {
        if self.is_settled() {
            return self;
        }

        match event {
            MatchingEvent::DeadlineReached => MatchingState::Expired,
            MatchingEvent::Snapshot(request) => match request.status {
                TowStatus::Pending => MatchingState::Searching,
                TowStatus::Accepted => DriverAssignment::from_request(&request)
                    .map(MatchingState::DriverAssigned)
                    .unwrap_or(MatchingState::Searching),
                TowStatus::Declined => MatchingState::Declined,
                TowStatus::Canceled => MatchingState::Canceled,
                TowStatus::Completed => MatchingState::Completed,
            },
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            MatchingState::Searching => "Looking for a nearby driver...",
            MatchingState::DriverAssigned(_) => "A driver has accepted your request.",
            MatchingState::Expired => {
                "No drivers are available right now. You can retry or cancel your request."
            }
            MatchingState::Declined => "Your request was declined by the driver.",
            MatchingState::Canceled => "Your request has been canceled.",
            MatchingState::Completed => {
                "The towing service has been completed. Thank you for using our app!"
            }
        }
    }
}

/// Resultado de una espera: estado final y última foto conocida del registro
#[derive(Debug, Clone, Serialize)]
pub struct MatchingOutcome {
    #[serde(flatten)]
    pub state: MatchingState,
    pub message: &'static str,
    pub request: TowRequest,
}

#[derive(Clone)]
pub struct MatchingService {
    requests: Arc<dyn TowRequestRepository>,
    events: RequestEventBus,
    default_window: Duration,
}

impl MatchingService {
    pub fn new(
        requests: Arc<dyn TowRequestRepository>,
        events: RequestEventBus,
        default_window: Duration,
    ) -> Self {
        Self {
            requests,
            events,
            default_window,
        }
    }

    /// Plazo efectivo: el pedido por el cliente, acotado a 1..=60 s
    pub fn window_for(&self, requested_secs: Option<u64>) -> Duration {
        let window = requested_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_window);
        window.clamp(Duration::from_secs(1), MAX_MATCH_WINDOW)
    }

    /// Espera a que la solicitud salga de `Pending` o venza el plazo.
    /// Vencer el plazo no modifica el registro.
    pub async fn await_assignment(
        &self,
        request_id: Uuid,
        window: Duration,
    ) -> AppResult<MatchingOutcome> {
        let deadline = Instant::now() + window;

        // suscribirse antes de leer para no perder una aceptación intermedia
        let mut rx = self.events.subscribe();
        let mut latest = self.load(request_id).await?;
        let mut state = MatchingState::Searching.reduce(MatchingEvent::Snapshot(latest.clone()));

        debug!(
            "🔎 Waiting up to {:?} for a driver on request {}",
            window, request_id
        );

        while !state.is_settled() {
            match timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    info!("⏰ No driver accepted request {} in time", request_id);
                    state = state.reduce(MatchingEvent::DeadlineReached);
                }
                Ok(Ok(snapshot)) if snapshot.id == request_id => {
                    latest = snapshot;
                    state = state.reduce(MatchingEvent::Snapshot(latest.clone()));
                }
                Ok(Ok(_)) => {}
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(
                        "⚠️ Matching listener lagged by {} events, reloading request {}",
                        skipped, request_id
                    );
                    latest = self.load(request_id).await?;
                    state = state.reduce(MatchingEvent::Snapshot(latest.clone()));
                }
                Ok(Err(RecvError::Closed)) => {
                    return Err(AppError::ServiceUnavailable(
                        "Request updates are not available".to_string(),
                    ));
                }
            }
        }

        Ok(MatchingOutcome {
            message: state.message(),
            state,
            request: latest,
        })
    }

    async fn load(&self, request_id: Uuid) -> AppResult<TowRequest> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| not_found_error("Tow request", &request_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Actor, GeoPoint, NewTowRequest, RequestPreference, Role, Transition, TruckType,
    };
    use crate::repositories::MemoryStore;
    use chrono::Utc;

    struct Harness {
        store: Arc<MemoryStore>,
        events: RequestEventBus,
        service: MatchingService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let events = RequestEventBus::new();
        let service = MatchingService::new(store.clone(), events.clone(), MAX_MATCH_WINDOW);
        Harness {
            store,
            events,
            service,
        }
    }

    async fn create_pending(h: &Harness) -> TowRequest {
        let request = TowRequest::new_pending(
            NewTowRequest {
                id: None,
                customer_id: Uuid::new_v4(),
                location: GeoPoint::new(37.7749, -122.4194),
                issue: "Flat tire".to_string(),
                truck_type: Some(TruckType::Flatbed),
                preference: RequestPreference::Immediate,
                scheduled_for: None,
            },
            Utc::now(),
        );
        TowRequestRepository::insert(h.store.as_ref(), &request)
            .await
            .unwrap()
    }

    async fn transition(h: &Harness, request: &TowRequest, transition: Transition, actor: Actor) {
        let next = transition.apply(request, &actor, Utc::now()).unwrap();
        let saved = h
            .store
            .compare_and_swap(request.status, &next)
            .await
            .unwrap()
            .unwrap();
        h.events.publish(&saved).await;
    }

    fn driver_accept(driver_id: Uuid) -> Transition {
        Transition::Accept(DriverAssignment {
            driver_id,
            driver_name: Some("John Doe".to_string()),
            driver_phone: Some("123-456-7890".to_string()),
            driver_eta: Some("10 minutes".to_string()),
        })
    }

    #[test]
    fn test_settled_state_ignores_later_events() {
        let assignment = DriverAssignment {
            driver_id: Uuid::new_v4(),
            driver_name: None,
            driver_phone: None,
            driver_eta: None,
        };
        let assigned = MatchingState::DriverAssigned(assignment);

        assert_eq!(
            assigned.clone().reduce(MatchingEvent::DeadlineReached),
            assigned
        );
        assert_eq!(
            MatchingState::Expired.reduce(MatchingEvent::DeadlineReached),
            MatchingState::Expired
        );
    }

    #[test]
    fn test_window_is_clamped() {
        let h = harness();
        assert_eq!(h.service.window_for(None), Duration::from_secs(60));
        assert_eq!(h.service.window_for(Some(5)), Duration::from_secs(5));
        assert_eq!(h.service.window_for(Some(600)), Duration::from_secs(60));
        assert_eq!(h.service.window_for(Some(0)), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_sixty_seconds_without_acceptance() {
        let h = harness();
        let request = create_pending(&h).await;

        let started = Instant::now();
        let outcome = h
            .service
            .await_assignment(request.id, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(outcome.state, MatchingState::Expired);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));

        // vencer el plazo no toca el registro
        let stored = TowRequestRepository::find_by_id(h.store.as_ref(), request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TowStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acceptance_before_deadline_assigns_driver() {
        let h = harness();
        let request = create_pending(&h).await;
        let driver_id = Uuid::new_v4();

        let accept = {
            let store = h.store.clone();
            let events = h.events.clone();
            let request = request.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(12)).await;
                let actor = Actor {
                    user_id: driver_id,
                    role: Role::Driver,
                };
                let next = driver_accept(driver_id)
                    .apply(&request, &actor, Utc::now())
                    .unwrap();
                let saved = store
                    .compare_and_swap(TowStatus::Pending, &next)
                    .await
                    .unwrap()
                    .unwrap();
                events.publish(&saved).await;
            })
        };

        let started = Instant::now();
        let outcome = h
            .service
            .await_assignment(request.id, Duration::from_secs(60))
            .await
            .unwrap();
        accept.await.unwrap();

        match &outcome.state {
            MatchingState::DriverAssigned(assignment) => {
                assert_eq!(assignment.driver_id, driver_id);
                assert_eq!(assignment.driver_eta.as_deref(), Some("10 minutes"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13));
        assert_eq!(outcome.request.status, TowStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_accepted_request_resolves_immediately() {
        let h = harness();
        let request = create_pending(&h).await;
        let driver_id = Uuid::new_v4();
        transition(
            &h,
            &request,
            driver_accept(driver_id),
            Actor {
                user_id: driver_id,
                role: Role::Driver,
            },
        )
        .await;

        let started = Instant::now();
        let outcome = h
            .service
            .await_assignment(request.id, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(outcome.state, MatchingState::DriverAssigned(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_ends_the_wait() {
        let h = harness();
        let request = create_pending(&h).await;
        let owner = Actor {
            user_id: request.customer_id,
            role: Role::Customer,
        };

        let waiter = {
            let service = h.service.clone();
            let id = request.id;
            tokio::spawn(async move { service.await_assignment(id, Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_secs(3)).await;
        transition(&h, &request, Transition::Cancel, owner).await;

        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome.state, MatchingState::Canceled);
        assert_eq!(outcome.request.status, TowStatus::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_while_waiting_ends_the_wait() {
        let h = harness();
        let request = create_pending(&h).await;
        let driver = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Driver,
        };

        let waiter = {
            let service = h.service.clone();
            let id = request.id;
            tokio::spawn(async move { service.await_assignment(id, Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_secs(8)).await;
        let started = Instant::now();
        transition(&h, &request, Transition::Decline, driver).await;

        let outcome = waiter.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.state, MatchingState::Declined);
        assert_eq!(outcome.request.status, TowStatus::Declined);

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["outcome"], "declined");
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let h = harness();
        let err = h
            .service
            .await_assignment(Uuid::new_v4(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
