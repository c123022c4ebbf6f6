//! Streams en vivo sobre el bus de eventos
//!
//! - `job_feed`: lista completa de solicitudes `Pending` tras cada cambio.
//! - `request_watch`: fotos de una sola solicitud hasta que llega a un estado final.

use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::{TowRequest, TowStatus};
use crate::repositories::TowRequestRepository;

/// Feed de trabajos para conductores. La primera emisión es el estado actual.
pub fn job_feed(
    rx: broadcast::Receiver<TowRequest>,
    requests: Arc<dyn TowRequestRepository>,
) -> impl Stream<Item = Vec<TowRequest>> + Send + 'static {
    stream::unfold((rx, true), move |(mut rx, first)| {
        let requests = requests.clone();
        async move {
            if !first {
                // cualquier cambio (o un retraso) obliga a releer la lista
                match rx.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return None,
                }
            }

            match requests.list_by_status(TowStatus::Pending).await {
                Ok(jobs) => {
                    debug!("📋 Job feed update: {} pending requests", jobs.len());
                    Some((jobs, (rx, false)))
                }
                Err(e) => {
                    error!("❌ Job feed query failed: {}", e);
                    None
                }
            }
        }
    })
}

enum WatchState {
    Start(TowRequest, broadcast::Receiver<TowRequest>),
    Listening(Uuid, broadcast::Receiver<TowRequest>),
    Done,
}

impl WatchState {
    fn after(snapshot: &TowRequest, rx: broadcast::Receiver<TowRequest>) -> Self {
        if snapshot.status.is_terminal() {
            WatchState::Done
        } else {
            WatchState::Listening(snapshot.id, rx)
        }
    }
}

/// Stream de una solicitud. `rx` debe crearse antes de leer `current`.
/// Termina después de emitir un estado final.
pub fn request_watch(
    rx: broadcast::Receiver<TowRequest>,
    current: TowRequest,
    requests: Arc<dyn TowRequestRepository>,
) -> impl Stream<Item = TowRequest> + Send + 'static {
    stream::unfold(WatchState::Start(current, rx), move |state| {
        let requests = requests.clone();
        async move {
            match state {
                WatchState::Start(current, rx) => {
                    let next = WatchState::after(&current, rx);
                    Some((current, next))
                }
                WatchState::Listening(id, mut rx) => loop {
                    match rx.recv().await {
                        Ok(snapshot) if snapshot.id == id => {
                            let next = WatchState::after(&snapshot, rx);
                            return Some((snapshot, next));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(_)) => match requests.find_by_id(id).await {
                            Ok(Some(snapshot)) => {
                                let next = WatchState::after(&snapshot, rx);
                                return Some((snapshot, next));
                            }
                            Ok(None) => return None,
                            Err(e) => {
                                error!("❌ Could not reload request {}: {}", id, e);
                                return None;
                            }
                        },
                        Err(RecvError::Closed) => return None,
                    }
                },
                WatchState::Done => None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, GeoPoint, NewTowRequest, RequestPreference, Role, Transition};
    use crate::repositories::MemoryStore;
    use crate::services::request_events::RequestEventBus;
    use chrono::Utc;
    use futures::StreamExt;

    fn new_request() -> TowRequest {
        TowRequest::new_pending(
            NewTowRequest {
                id: None,
                customer_id: Uuid::new_v4(),
                location: GeoPoint::new(1.0, 1.0),
                issue: "Dead battery".to_string(),
                truck_type: None,
                preference: RequestPreference::Immediate,
                scheduled_for: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_job_feed_reemits_pending_list() {
        let store = Arc::new(MemoryStore::new());
        let events = RequestEventBus::new();
        let feed = job_feed(events.subscribe(), store.clone());
        tokio::pin!(feed);

        assert!(feed.next().await.unwrap().is_empty());

        let request = new_request();
        TowRequestRepository::insert(store.as_ref(), &request)
            .await
            .unwrap();
        events.publish(&request).await;

        let jobs = feed.next().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, request.id);
    }

    #[tokio::test]
    async fn test_request_watch_closes_after_terminal_state() {
        let store = Arc::new(MemoryStore::new());
        let events = RequestEventBus::new();
        let request = new_request();
        TowRequestRepository::insert(store.as_ref(), &request)
            .await
            .unwrap();

        let watch = request_watch(events.subscribe(), request.clone(), store.clone());
        tokio::pin!(watch);
        assert_eq!(watch.next().await.unwrap().status, TowStatus::Pending);

        // otra solicitud no aparece en el stream
        events.publish(&new_request()).await;

        let owner = Actor {
            user_id: request.customer_id,
            role: Role::Customer,
        };
        let canceled = Transition::Cancel
            .apply(&request, &owner, Utc::now())
            .unwrap();
        events.publish(&canceled).await;

        let last = watch.next().await.unwrap();
        assert_eq!(last.id, request.id);
        assert_eq!(last.status, TowStatus::Canceled);
        assert!(watch.next().await.is_none());
    }
}
