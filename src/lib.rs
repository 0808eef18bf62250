//! Warehouse API Library
//!
//! This crate provides the inventory movement engine for the warehouse
//! back office: atomic, idempotent, concurrency-safe stock operations
//! (receive, dispatch, transfer, reserve/release, adjust) over a relational
//! store, with an append-only stock-movement ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod queries;
pub mod repositories;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::ServiceError;
use crate::repositories::SeaOrmInventoryRepository;
use crate::services::{InventoryService, SideEffects};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub inventory_service: InventoryService,
}

impl AppState {
    /// Wires the full stack from configuration: connection pool, migrations
    /// (when `auto_migrate` is set), event channel, standard side-effect
    /// hooks and the engine itself.
    ///
    /// Returns the state plus the event receiver; the caller decides how to
    /// consume events (usually by spawning [`events::process_events`]).
    pub async fn initialize(
        config: config::AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::Event>), ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;

        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let db = Arc::new(pool);
        let (event_sender, event_receiver) = events::event_channel(config.event_channel_capacity);

        let repo = Arc::new(SeaOrmInventoryRepository::new(db.clone()));
        let hooks = Arc::new(SideEffects::standard(
            Arc::new(cache::InMemoryCache::new()),
            event_sender.clone(),
            config.low_stock_threshold,
            logging::setup_logger(logging::LoggerConfig::default()),
        ));
        let inventory_service = InventoryService::new(repo, event_sender.clone(), hooks);

        Ok((
            Self {
                db,
                config,
                event_sender,
                inventory_service,
            },
            event_receiver,
        ))
    }
}
