//! Backend en memoria
//!
//! Implementa los tres repositorios sobre mapas protegidos por `RwLock`.
//! Se usa en desarrollo (`STORE_BACKEND=memory`) y en los tests de integración.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{TowRequestRepository, UserRepository, VehicleRepository};
use crate::models::{PasswordResetToken, TowRequest, TowStatus, User, Vehicle};
use crate::utils::errors::{not_found_error, AppError, AppResult};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    reset_tokens: RwLock<HashMap<String, PasswordResetToken>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
    tow_requests: RwLock<HashMap<Uuid, TowRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| not_found_error("User", &user.id.to_string()))?;

        // id, role, email y created_at son inmutables
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.password_hash = user.password_hash.clone();
        stored.phone_number = user.phone_number.clone();
        stored.pronouns = user.pronouns.clone();
        stored.profile_image_url = user.profile_image_url.clone();
        stored.is_online = user.is_online;
        stored.latitude = user.latitude;
        stored.longitude = user.longitude;
        stored.updated_at = user.updated_at;

        Ok(stored.clone())
    }

    async fn store_reset_token(&self, token: &PasswordResetToken) -> AppResult<()> {
        self.reset_tokens
            .write()
            .await
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn take_reset_token(&self, token: &str) -> AppResult<Option<PasswordResetToken>> {
        Ok(self.reset_tokens.write().await.remove(token))
    }
}

#[async_trait]
impl VehicleRepository for MemoryStore {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<Vehicle> {
        let mut vehicles = self.vehicles.write().await;
        let duplicate = vehicles
            .values()
            .any(|v| v.owner_id == vehicle.owner_id && v.license_plate == vehicle.license_plate);
        if duplicate {
            return Err(AppError::Conflict(
                "A vehicle with this license plate already exists.".to_string(),
            ));
        }
        vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let mut owned: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update(&self, vehicle: &Vehicle) -> AppResult<Vehicle> {
        let mut vehicles = self.vehicles.write().await;
        let duplicate = vehicles.values().any(|v| {
            v.id != vehicle.id
                && v.owner_id == vehicle.owner_id
                && v.license_plate == vehicle.license_plate
        });
        if duplicate {
            return Err(AppError::Conflict(
                "A vehicle with this license plate already exists.".to_string(),
            ));
        }

        let stored = vehicles
            .get_mut(&vehicle.id)
            .ok_or_else(|| not_found_error("Vehicle", &vehicle.id.to_string()))?;
        stored.name = vehicle.name.clone();
        stored.license_plate = vehicle.license_plate.clone();
        stored.vehicle_type = vehicle.vehicle_type.clone();

        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.vehicles.write().await.remove(&id).is_some())
    }

    async fn plate_exists(
        &self,
        owner_id: Uuid,
        license_plate: &str,
        except: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(self.vehicles.read().await.values().any(|v| {
            v.owner_id == owner_id && v.license_plate == license_plate && Some(v.id) != except
        }))
    }
}

#[async_trait]
impl TowRequestRepository for MemoryStore {
    async fn insert(&self, request: &TowRequest) -> AppResult<TowRequest> {
        let mut requests = self.tow_requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(AppError::Conflict(
                "A tow request with this id already exists.".to_string(),
            ));
        }
        requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TowRequest>> {
        Ok(self.tow_requests.read().await.get(&id).cloned())
    }

    async fn list_by_status(&self, status: TowStatus) -> AppResult<Vec<TowRequest>> {
        let mut found = self.collect(|r| r.status == status).await;
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<TowRequest>> {
        let mut found = self.collect(|r| r.customer_id == customer_id).await;
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> AppResult<Vec<TowRequest>> {
        let mut found = self.collect(|r| r.is_assigned_to(driver_id)).await;
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn compare_and_swap(
        &self,
        expected: TowStatus,
        updated: &TowRequest,
    ) -> AppResult<Option<TowRequest>> {
        let mut requests = self.tow_requests.write().await;
        let Some(stored) = requests.get_mut(&updated.id) else {
            return Ok(None);
        };
        if stored.status != expected {
            return Ok(None);
        }

        let customer_id = stored.customer_id;
        let created_at = stored.created_at;
        *stored = updated.clone();
        stored.customer_id = customer_id;
        stored.created_at = created_at;

        Ok(Some(stored.clone()))
    }
}

impl MemoryStore {
    async fn collect(&self, predicate: impl Fn(&TowRequest) -> bool) -> Vec<TowRequest> {
        self.tow_requests
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Actor, DriverAssignment, GeoPoint, NewTowRequest, RequestPreference, Role, Transition,
        TruckType,
    };
    use chrono::Utc;
    use std::sync::Arc;

    fn pending(customer_id: Uuid) -> TowRequest {
        TowRequest::new_pending(
            NewTowRequest {
                id: None,
                customer_id,
                location: GeoPoint::new(37.7749, -122.4194),
                issue: "Flat tire".to_string(),
                truck_type: Some(TruckType::Flatbed),
                preference: RequestPreference::Immediate,
                scheduled_for: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_request_id_is_conflict() {
        let store = MemoryStore::new();
        let request = pending(Uuid::new_v4());

        TowRequestRepository::insert(&store, &request).await.unwrap();
        let err = TowRequestRepository::insert(&store, &request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_only_one_concurrent_accept_wins() {
        let store = Arc::new(MemoryStore::new());
        let request = pending(Uuid::new_v4());
        TowRequestRepository::insert(store.as_ref(), &request)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let request = request.clone();
            handles.push(tokio::spawn(async move {
                let actor = Actor {
                    user_id: Uuid::new_v4(),
                    role: Role::Driver,
                };
                let next = Transition::Accept(DriverAssignment {
                    driver_id: actor.user_id,
                    driver_name: None,
                    driver_phone: None,
                    driver_eta: None,
                })
                .apply(&request, &actor, Utc::now())
                .unwrap();
                store
                    .compare_and_swap(TowStatus::Pending, &next)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let stored = TowRequestRepository::find_by_id(store.as_ref(), request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TowStatus::Accepted);
        assert!(stored.driver_invariant_holds());
    }

    #[tokio::test]
    async fn test_pending_listing_is_oldest_first() {
        let store = MemoryStore::new();
        let mut first = pending(Uuid::new_v4());
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        let second = pending(Uuid::new_v4());

        TowRequestRepository::insert(&store, &second).await.unwrap();
        TowRequestRepository::insert(&store, &first).await.unwrap();

        let listed = store.list_by_status(TowStatus::Pending).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let store = MemoryStore::new();
        let token = PasswordResetToken {
            token: "abc".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: Utc::now(),
        };
        store.store_reset_token(&token).await.unwrap();

        assert!(store.take_reset_token("abc").await.unwrap().is_some());
        assert!(store.take_reset_token("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plate_unique_per_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let vehicle = Vehicle::new(owner, "Civic".into(), "abc123".into(), "Sedan".into());
        VehicleRepository::insert(&store, &vehicle).await.unwrap();

        assert!(store.plate_exists(owner, "ABC123", None).await.unwrap());
        assert!(!store.plate_exists(owner, "ABC123", Some(vehicle.id)).await.unwrap());

        let other_owner = Vehicle::new(Uuid::new_v4(), "Civic".into(), "abc123".into(), "Sedan".into());
        assert!(VehicleRepository::insert(&store, &other_owner).await.is_ok());

        let duplicate = Vehicle::new(owner, "Accord".into(), "ABC123".into(), "Sedan".into());
        assert!(matches!(
            VehicleRepository::insert(&store, &duplicate).await,
            Err(AppError::Conflict(_))
        ));
    }
}
