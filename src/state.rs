// src/state.rs

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, repositories::memory::InMemoryStore, services::Services};

/// Backing store shared by every request.
#[derive(Clone)]
pub enum Storage {
    Postgres(PgPool),
    InMemory(InMemoryStore),
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub config: Config,
}

impl AppState {
    /// Builds a fresh unit of work over the shared storage.
    pub fn services(&self) -> Services {
        let retry = self.config.retry_params();
        match &self.storage {
            Storage::Postgres(pool) => Services::postgres(pool.clone(), retry),
            Storage::InMemory(store) => Services::in_memory(store, retry),
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Services {
    fn from_ref(state: &AppState) -> Self {
        state.services()
    }
}
