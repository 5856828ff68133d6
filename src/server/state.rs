use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::error::Result;
use crate::notification::{DeliveryFanout, EventDispatcher, NotificationLogWriter};
use crate::postgres::PostgresPool;
use crate::push::{create_push_channel, PushChannel};
use crate::store::{create_stores, Stores};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<EventDispatcher>,
    pub stores: Stores,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the dispatcher from already-built collaborators
    pub fn new(
        settings: Settings,
        stores: Stores,
        push_channel: Arc<dyn PushChannel>,
        postgres_pool: Option<PostgresPool>,
    ) -> Self {
        let fanout = DeliveryFanout::new(push_channel).with_click_action(&settings.push.click_action);
        let dispatcher = EventDispatcher::new(
            stores.records.clone(),
            fanout,
            NotificationLogWriter::new(stores.log.clone()),
        );

        Self {
            settings: Arc::new(settings),
            dispatcher: Arc::new(dispatcher),
            stores,
            postgres_pool,
            start_time: Instant::now(),
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// A PostgreSQL connection failure falls back to the memory stores.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let postgres_pool = if settings.store.backend == "postgres" {
            match PostgresPool::new(&settings.database).await {
                Ok(pool) => {
                    tracing::info!(url = %pool.database_url_masked(), "PostgreSQL pool ready");
                    Some(pool)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    None
                }
            }
        } else {
            None
        };

        let stores = create_stores(&settings.store, postgres_pool.as_ref());
        let push_channel = create_push_channel(&settings.push)?;

        Ok(Self::new(settings, stores, push_channel, postgres_pool))
    }
}
