//! Ciclo de vida de las solicitudes de grúa
//!
//! Toda escritura sigue el mismo camino: leer el registro, calcular la
//! transición con [`Transition::apply`], guardarla con compare-and-swap sobre
//! el estado leído y publicar la nueva foto en el bus de eventos.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::dto::tow_request_dto::{AcceptJobRequest, CreateTowRequestRequest, DriverLocationRequest};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    Actor, DriverAssignment, GeoPoint, NewTowRequest, RequestPreference, Role, TowRequest,
    TowStatus, Transition, TransitionError, User,
};
use crate::repositories::{TowRequestRepository, UserRepository};
use crate::services::{Geocoder, MatchingOutcome, MatchingService, RequestEventBus};
use crate::state::{require_geocoder, AppState};
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};

pub const JOB_UNAVAILABLE: &str = "This job is no longer available.";
pub const DRIVER_OFFLINE: &str = "You are offline. Go online to see available jobs.";

/// Intentos de compare-and-swap ante escritores concurrentes
const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct TowRequestController {
    requests: Arc<dyn TowRequestRepository>,
    users: Arc<dyn UserRepository>,
    events: RequestEventBus,
    matching: MatchingService,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl TowRequestController {
    pub fn new(state: &AppState) -> Self {
        Self {
            requests: state.tow_requests.clone(),
            users: state.users.clone(),
            events: state.events.clone(),
            matching: state.matching.clone(),
            geocoder: state.geocoder.clone(),
        }
    }

    pub async fn create(
        &self,
        customer: &AuthenticatedUser,
        request: CreateTowRequestRequest,
    ) -> AppResult<TowRequest> {
        customer.require_role(Role::Customer)?;
        request.validate()?;

        let location = self.resolve_location(&request).await?;

        let scheduled_for = match request.preference {
            RequestPreference::Immediate => {
                if request.truck_type.is_none() {
                    return Err(validation_error("truck_type", "Please select a tow truck type."));
                }
                None
            }
            RequestPreference::Scheduled => match request.scheduled_for {
                Some(at) if at > Utc::now() => Some(at),
                _ => {
                    return Err(validation_error(
                        "scheduled_for",
                        "Please choose a future date and time.",
                    ))
                }
            },
        };

        let pending = TowRequest::new_pending(
            NewTowRequest {
                id: request.id,
                customer_id: customer.user_id,
                location,
                issue: request.issue.unwrap_or_default(),
                truck_type: request.truck_type,
                preference: request.preference,
                scheduled_for,
            },
            Utc::now(),
        );
        let saved = self.requests.insert(&pending).await?;
        self.events.publish(&saved).await;

        info!(
            "🆕 Tow request {} created by {} ({})",
            saved.id,
            saved.customer_id,
            saved.truck_type.map(|t| t.label()).unwrap_or("no truck type")
        );
        Ok(saved)
    }

    /// Coordenadas explícitas o, si no hay, geocodificación de la dirección
    async fn resolve_location(&self, request: &CreateTowRequestRequest) -> AppResult<GeoPoint> {
        match (request.latitude, request.longitude, request.address.as_deref()) {
            (Some(latitude), Some(longitude), _) => {
                let point = GeoPoint::new(latitude, longitude);
                if !point.is_valid() {
                    return Err(validation_error("location", "Please provide a valid location."));
                }
                Ok(point)
            }
            (None, None, Some(address)) if !address.trim().is_empty() => {
                let geocoder = require_geocoder(self.geocoder.as_ref())?;
                Ok(geocoder.geocode(address.trim()).await?.location)
            }
            (Some(_), None, _) | (None, Some(_), _) => Err(validation_error(
                "location",
                "Latitude and longitude must be provided together.",
            )),
            _ => Err(validation_error(
                "location",
                "Please share your location or enter an address.",
            )),
        }
    }

    pub async fn list_for_customer(&self, customer: &AuthenticatedUser) -> AppResult<Vec<TowRequest>> {
        customer.require_role(Role::Customer)?;
        self.requests.list_by_customer(customer.user_id).await
    }

    pub async fn pending_jobs(&self, driver: &AuthenticatedUser) -> AppResult<Vec<TowRequest>> {
        self.ensure_online(driver).await?;
        self.requests.list_by_status(TowStatus::Pending).await
    }

    /// Solo un conductor en línea ve el tablero de trabajos y acepta
    pub async fn ensure_online(&self, driver: &AuthenticatedUser) -> AppResult<User> {
        driver.require_role(Role::Driver)?;
        let profile = self
            .users
            .find_by_id(driver.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
        if !profile.is_online {
            debug!("📴 Offline driver {} tried to open the job board", driver.user_id);
            return Err(AppError::Forbidden(DRIVER_OFFLINE.to_string()));
        }
        Ok(profile)
    }

    pub async fn jobs_for_driver(&self, driver: &AuthenticatedUser) -> AppResult<Vec<TowRequest>> {
        driver.require_role(Role::Driver)?;
        self.requests.list_by_driver(driver.user_id).await
    }

    /// Visible para su cliente, para el conductor asignado y, mientras está
    /// pendiente, para cualquier conductor
    pub async fn get(&self, user: &AuthenticatedUser, id: Uuid) -> AppResult<TowRequest> {
        let request = self.load(id).await?;
        if can_view(&request, user) {
            Ok(request)
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to view this request.".to_string(),
            ))
        }
    }

    pub async fn cancel(&self, user: &AuthenticatedUser, id: Uuid) -> AppResult<TowRequest> {
        self.transition(user.actor(), id, Transition::Cancel).await
    }

    pub async fn accept(
        &self,
        driver: &AuthenticatedUser,
        id: Uuid,
        request: AcceptJobRequest,
    ) -> AppResult<TowRequest> {
        let profile = self.ensure_online(driver).await?;
        request.validate()?;

        let assignment = DriverAssignment {
            driver_id: driver.user_id,
            driver_name: Some(profile.full_name()).filter(|n| !n.is_empty()),
            driver_phone: profile.phone_number.clone(),
            driver_eta: request.driver_eta.map(|eta| eta.trim().to_string()),
        };
        self.transition(driver.actor(), id, Transition::Accept(assignment))
            .await
    }

    pub async fn decline(&self, driver: &AuthenticatedUser, id: Uuid) -> AppResult<TowRequest> {
        driver.require_role(Role::Driver)?;
        self.transition(driver.actor(), id, Transition::Decline).await
    }

    pub async fn complete(&self, driver: &AuthenticatedUser, id: Uuid) -> AppResult<TowRequest> {
        driver.require_role(Role::Driver)?;
        self.transition(driver.actor(), id, Transition::Complete).await
    }

    pub async fn relocate_driver(
        &self,
        driver: &AuthenticatedUser,
        id: Uuid,
        request: DriverLocationRequest,
    ) -> AppResult<TowRequest> {
        driver.require_role(Role::Driver)?;
        let point = GeoPoint::new(request.latitude, request.longitude);
        if !point.is_valid() {
            return Err(validation_error("location", "Please provide a valid location."));
        }
        self.transition(driver.actor(), id, Transition::RelocateDriver(point))
            .await
    }

    /// Flujo de asignación: solo el cliente dueño puede esperar su solicitud
    pub async fn await_assignment(
        &self,
        customer: &AuthenticatedUser,
        id: Uuid,
        timeout_secs: Option<u64>,
    ) -> AppResult<MatchingOutcome> {
        customer.require_role(Role::Customer)?;
        let request = self.load(id).await?;
        if request.customer_id != customer.user_id {
            return Err(AppError::Forbidden(
                "Only the customer who created this request can track it.".to_string(),
            ));
        }

        let window = self.matching.window_for(timeout_secs);
        self.matching.await_assignment(id, window).await
    }

    /// Suscripción para el stream de una solicitud: receptor creado antes de
    /// leer la foto inicial
    pub async fn watch(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
    ) -> AppResult<(broadcast::Receiver<TowRequest>, TowRequest)> {
        let rx = self.events.subscribe();
        let request = self.load(id).await?;

        let allowed = request.customer_id == user.user_id || request.is_assigned_to(user.user_id);
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have permission to follow this request.".to_string(),
            ));
        }
        Ok((rx, request))
    }

    pub fn requests(&self) -> Arc<dyn TowRequestRepository> {
        self.requests.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TowRequest> {
        self.events.subscribe()
    }

    async fn transition(&self, actor: Actor, id: Uuid, transition: Transition) -> AppResult<TowRequest> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.load(id).await?;
            let next = transition
                .apply(&current, &actor, Utc::now())
                .map_err(|e| transition_failure(&transition, e))?;

            if let Some(saved) = self.requests.compare_and_swap(current.status, &next).await? {
                self.events.publish(&saved).await;
                info!(
                    "🔁 Request {}: {} -> {} ({} by {})",
                    id,
                    current.status,
                    saved.status,
                    transition.name(),
                    actor.user_id
                );
                return Ok(saved);
            }

            debug!(
                "⚔️ Concurrent write on request {} during {} (attempt {})",
                id,
                transition.name(),
                attempt
            );
        }

        Err(AppError::Conflict(
            "This request was updated by someone else. Please try again.".to_string(),
        ))
    }

    async fn load(&self, id: Uuid) -> AppResult<TowRequest> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Tow request", &id.to_string()))
    }
}

fn can_view(request: &TowRequest, user: &AuthenticatedUser) -> bool {
    request.customer_id == user.user_id
        || request.is_assigned_to(user.user_id)
        || (user.role == Role::Driver && request.status == TowStatus::Pending)
}

/// Para un conductor, un trabajo que ya salió de `Pending` simplemente no está disponible
fn transition_failure(transition: &Transition, err: TransitionError) -> AppError {
    let job_taken = matches!(transition, Transition::Accept(_) | Transition::Decline)
        && matches!(
            err,
            TransitionError::Terminal(_) | TransitionError::Invalid { .. }
        );
    if job_taken {
        AppError::Conflict(JOB_UNAVAILABLE.to_string())
    } else {
        err.into()
    }
}
