//! Modelo de TowRequest y su máquina de estados
//!
//! Una solicitud de grúa es el registro compartido entre el cliente que la crea
//! y los conductores que la ven en su feed. Todas las mutaciones pasan por
//! [`Transition::apply`], que es una función pura: calcula el nuevo registro o
//! rechaza la transición. La persistencia (compare-and-swap sobre `status`)
//! vive en los repositorios.
//!
//! ```text
//! Pending ──accept──▶ Accepted ──complete──▶ Completed
//!    │                   │
//!    ├──decline──▶ Declined
//!    └──cancel───▶ Canceled ◀──cancel──┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::geo::GeoPoint;
use super::user::Role;

/// Texto guardado cuando el cliente no describe el problema
pub const NO_ISSUE_SPECIFIED: &str = "No issue specified";

/// Estado de la solicitud - mapea al ENUM tow_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "tow_status")]
pub enum TowStatus {
    Pending,
    Accepted,
    Declined,
    Canceled,
    Completed,
}

impl TowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TowStatus::Pending => "Pending",
            TowStatus::Accepted => "Accepted",
            TowStatus::Declined => "Declined",
            TowStatus::Canceled => "Canceled",
            TowStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TowStatus::Declined | TowStatus::Canceled | TowStatus::Completed
        )
    }

    /// Estados en los que la solicitud tiene conductor asignado
    pub fn has_driver(&self) -> bool {
        matches!(self, TowStatus::Accepted | TowStatus::Completed)
    }

    pub fn can_transition_to(&self, next: TowStatus) -> bool {
        use TowStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Pending, Canceled)
                | (Accepted, Canceled)
                | (Accepted, Completed)
        )
    }
}

impl fmt::Display for TowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de grúa - mapea al ENUM truck_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "truck_type")]
pub enum TruckType {
    #[serde(rename = "Flatbed Tow Truck", alias = "Flatbed")]
    #[sqlx(rename = "Flatbed Tow Truck")]
    Flatbed,
    #[serde(rename = "Wheel-Lift Tow Truck", alias = "Wheel-Lift")]
    #[sqlx(rename = "Wheel-Lift Tow Truck")]
    WheelLift,
    #[serde(rename = "Hook and Chain Tow Truck", alias = "Hook-and-Chain")]
    #[sqlx(rename = "Hook and Chain Tow Truck")]
    HookAndChain,
    #[serde(rename = "Integrated Tow Truck", alias = "Integrated")]
    #[sqlx(rename = "Integrated Tow Truck")]
    Integrated,
}

impl TruckType {
    pub const ALL: [TruckType; 4] = [
        TruckType::Flatbed,
        TruckType::WheelLift,
        TruckType::HookAndChain,
        TruckType::Integrated,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TruckType::Flatbed => "Flatbed Tow Truck",
            TruckType::WheelLift => "Wheel-Lift Tow Truck",
            TruckType::HookAndChain => "Hook and Chain Tow Truck",
            TruckType::Integrated => "Integrated Tow Truck",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TruckType::Flatbed => "Suitable for all vehicles, especially damaged ones.",
            TruckType::WheelLift => "Ideal for lighter vehicles, quick operations.",
            TruckType::HookAndChain => "Used for older cars, might cause scratches.",
            TruckType::Integrated => "Perfect for heavy-duty vehicles like buses.",
        }
    }

    pub fn price_range(&self) -> &'static str {
        match self {
            TruckType::Flatbed => "$100 - $150",
            TruckType::WheelLift => "$80 - $120",
            TruckType::HookAndChain => "$70 - $100",
            TruckType::Integrated => "$120 - $180",
        }
    }
}

/// Inmediata o programada - mapea al ENUM request_preference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "request_preference")]
pub enum RequestPreference {
    #[default]
    Immediate,
    Scheduled,
}

/// Solicitud de grúa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub location: GeoPoint,
    pub driver_location: Option<GeoPoint>,
    pub issue: String,
    pub truck_type: Option<TruckType>,
    pub preference: RequestPreference,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: TowStatus,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_eta: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Datos para crear una solicitud nueva en estado Pending
#[derive(Debug, Clone)]
pub struct NewTowRequest {
    pub id: Option<Uuid>,
    pub customer_id: Uuid,
    pub location: GeoPoint,
    pub issue: String,
    pub truck_type: Option<TruckType>,
    pub preference: RequestPreference,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl TowRequest {
    pub fn new_pending(new: NewTowRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id.unwrap_or_else(Uuid::new_v4),
            customer_id: new.customer_id,
            driver_id: None,
            location: new.location,
            driver_location: None,
            issue: normalize_issue(&new.issue),
            truck_type: new.truck_type,
            preference: new.preference,
            scheduled_for: new.scheduled_for,
            status: TowStatus::Pending,
            driver_name: None,
            driver_phone: None,
            driver_eta: None,
            created_at: now,
            updated_at: now,
            accepted_at: None,
            completed_at: None,
        }
    }

    /// `driver_id` presente si y solo si el estado tiene conductor
    pub fn driver_invariant_holds(&self) -> bool {
        self.driver_id.is_some() == self.status.has_driver()
    }

    pub fn is_assigned_to(&self, driver_id: Uuid) -> bool {
        self.driver_id == Some(driver_id)
    }

    fn clear_assignment(&mut self) {
        self.driver_id = None;
        self.driver_name = None;
        self.driver_phone = None;
        self.driver_eta = None;
        self.driver_location = None;
    }
}

pub fn normalize_issue(issue: &str) -> String {
    let trimmed = issue.trim();
    if trimmed.is_empty() {
        NO_ISSUE_SPECIFIED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Quién ejecuta una transición
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

/// Datos de contacto que el conductor deja en la solicitud al aceptarla
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub driver_id: Uuid,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_eta: Option<String>,
}

impl DriverAssignment {
    pub fn from_request(request: &TowRequest) -> Option<Self> {
        request.driver_id.map(|driver_id| Self {
            driver_id,
            driver_name: request.driver_name.clone(),
            driver_phone: request.driver_phone.clone(),
            driver_eta: request.driver_eta.clone(),
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    #[error("Only the customer who created this request can cancel it.")]
    NotOwner,

    #[error("Only the driver assigned to this job can update it.")]
    NotAssignedDriver,

    #[error("Only a {0} can perform this action.")]
    WrongRole(Role),

    #[error("This request is already {0} and can no longer change.")]
    Terminal(TowStatus),

    #[error("Cannot move a request from {from} to {to}.")]
    Invalid { from: TowStatus, to: TowStatus },
}

/// Mutaciones permitidas sobre una solicitud
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Accept(DriverAssignment),
    Decline,
    Cancel,
    Complete,
    RelocateDriver(GeoPoint),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Accept(_) => "accept",
            Transition::Decline => "decline",
            Transition::Cancel => "cancel",
            Transition::Complete => "complete",
            Transition::RelocateDriver(_) => "relocate_driver",
        }
    }

    fn target(&self) -> TowStatus {
        match self {
            Transition::Accept(_) => TowStatus::Accepted,
            Transition::Decline => TowStatus::Declined,
            Transition::Cancel => TowStatus::Canceled,
            Transition::Complete => TowStatus::Completed,
            Transition::RelocateDriver(_) => TowStatus::Accepted,
        }
    }

    /// Calcula el registro resultante sin tocar el original.
    pub fn apply(
        &self,
        current: &TowRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TowRequest, TransitionError> {
        self.authorize(current, actor)?;

        let target = self.target();
        if current.status.is_terminal() {
            return Err(TransitionError::Terminal(current.status));
        }
        let allowed = match self {
            // solo mueve la posición del conductor, el estado no cambia
            Transition::RelocateDriver(_) => current.status == TowStatus::Accepted,
            _ => current.status.can_transition_to(target),
        };
        if !allowed {
            return Err(TransitionError::Invalid {
                from: current.status,
                to: target,
            });
        }

        let mut next = current.clone();
        next.status = target;
        next.updated_at = now;

        match self {
            Transition::Accept(assignment) => {
                next.driver_id = Some(assignment.driver_id);
                next.driver_name = assignment.driver_name.clone();
                next.driver_phone = assignment.driver_phone.clone();
                next.driver_eta = assignment.driver_eta.clone();
                next.accepted_at = Some(now);
            }
            Transition::Decline => {}
            Transition::Cancel => next.clear_assignment(),
            Transition::Complete => next.completed_at = Some(now),
            Transition::RelocateDriver(point) => next.driver_location = Some(*point),
        }

        debug_assert!(next.driver_invariant_holds());
        Ok(next)
    }

    fn authorize(&self, current: &TowRequest, actor: &Actor) -> Result<(), TransitionError> {
        match self {
            Transition::Accept(assignment) => {
                if actor.role != Role::Driver {
                    return Err(TransitionError::WrongRole(Role::Driver));
                }
                if assignment.driver_id != actor.user_id {
                    return Err(TransitionError::NotAssignedDriver);
                }
            }
            Transition::Decline => {
                if actor.role != Role::Driver {
                    return Err(TransitionError::WrongRole(Role::Driver));
                }
            }
            Transition::Cancel => {
                if actor.user_id != current.customer_id {
                    return Err(TransitionError::NotOwner);
                }
            }
            Transition::Complete | Transition::RelocateDriver(_) => {
                if actor.role != Role::Driver {
                    return Err(TransitionError::WrongRole(Role::Driver));
                }
                if current.status == TowStatus::Accepted && !current.is_assigned_to(actor.user_id) {
                    return Err(TransitionError::NotAssignedDriver);
                }
            }
        }
        Ok(())
    }
}
