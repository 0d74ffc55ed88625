// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::Database,
    services::{
        catalog::ExamCatalog, explainer::Explainer, history::HistoryStore,
        session::SessionRegistry, stats::StatsAggregator,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub catalog: ExamCatalog,
    pub history: HistoryStore,
    pub stats: StatsAggregator,
    pub sessions: SessionRegistry,
    pub explainer: Arc<dyn Explainer>,
}

impl AppState {
    pub fn new(db: Database, config: Config, explainer: Arc<dyn Explainer>) -> Self {
        Self {
            catalog: ExamCatalog::new(&db),
            history: HistoryStore::new(&db),
            stats: StatsAggregator::new(&db),
            sessions: SessionRegistry::new(),
            db,
            config,
            explainer,
        }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ExamCatalog {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for HistoryStore {
    fn from_ref(state: &AppState) -> Self {
        state.history.clone()
    }
}

impl FromRef<AppState> for StatsAggregator {
    fn from_ref(state: &AppState) -> Self {
        state.stats.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Explainer> {
    fn from_ref(state: &AppState) -> Self {
        state.explainer.clone()
    }
}
