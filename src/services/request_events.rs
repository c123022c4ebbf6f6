//! Bus de eventos de solicitudes de grúa
//!
//! Tras cada escritura exitosa se publica la foto completa del registro.
//! Los suscriptores (flujo de asignación, stream de la solicitud y feed de
//! trabajos) reciben las fotos por un canal `broadcast`. Con `REDIS_URL`
//! configurado, las fotos también se reenvían entre instancias por pub/sub.

use anyhow::Result;
use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::TowRequest;

pub const REDIS_CHANNEL: &str = "smile_towing:tow_requests";
const CHANNEL_CAPACITY: usize = 256;

/// Mensaje publicado en Redis; `origin` evita re-inyectar lo propio
#[derive(Debug, Serialize, Deserialize)]
struct RelayEnvelope {
    origin: Uuid,
    request: TowRequest,
}

#[derive(Clone)]
struct RedisRelay {
    manager: ConnectionManager,
    instance_id: Uuid,
}

#[derive(Clone)]
pub struct RequestEventBus {
    sender: broadcast::Sender<TowRequest>,
    relay: Option<RedisRelay>,
}

impl Default for RequestEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            relay: None,
        }
    }

    /// Conecta el bus a Redis y arranca la tarea que escucha a otras instancias
    pub async fn with_redis(mut self, redis_url: &str) -> Result<Self> {
        info!("🔗 Connecting event relay to Redis");

        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        let instance_id = Uuid::new_v4();
        let mut pubsub = client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(REDIS_CHANNEL).await?;

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("⚠️ Unreadable relay payload: {}", e);
                        continue;
                    }
                };
                match serde_json::from_str::<RelayEnvelope>(&payload) {
                    Ok(envelope) if envelope.origin == instance_id => {}
                    Ok(envelope) => {
                        debug!("📥 Relayed snapshot for request {}", envelope.request.id);
                        let _ = sender.send(envelope.request);
                    }
                    Err(e) => warn!("⚠️ Invalid relay envelope: {}", e),
                }
            }
            error!("❌ Redis relay subscription ended");
        });

        info!("✅ Event relay connected (instance {})", instance_id);
        self.relay = Some(RedisRelay {
            manager,
            instance_id,
        });
        Ok(self)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TowRequest> {
        self.sender.subscribe()
    }

    /// Publica la foto localmente y, si hay relay, en Redis.
    /// Un fallo de Redis no invalida la escritura ya confirmada.
    pub async fn publish(&self, snapshot: &TowRequest) {
        // sin suscriptores `send` devuelve error; no es un fallo
        let _ = self.sender.send(snapshot.clone());

        if let Some(relay) = &self.relay {
            let envelope = RelayEnvelope {
                origin: relay.instance_id,
                request: snapshot.clone(),
            };
            let payload = match serde_json::to_string(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("❌ Could not serialize relay envelope: {}", e);
                    return;
                }
            };
            let mut conn = relay.manager.clone();
            let result: redis::RedisResult<i64> = conn.publish(REDIS_CHANNEL, payload).await;
            if let Err(e) = result {
                warn!("⚠️ Could not relay request {} to Redis: {}", snapshot.id, e);
            }
        }
    }
}
