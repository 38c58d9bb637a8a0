use std::sync::Arc;
use std::time::Duration;

use slog::Logger;

use crate::auth::Sessions;
use crate::db::Db;
use crate::store::Store;
use crate::urls::Urls;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub sessions: Arc<dyn Sessions>,
    pub store: Arc<dyn Store>,
    pub urls: Arc<Urls>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        sessions: Arc<dyn Sessions>,
        store: Arc<dyn Store>,
        urls: Arc<Urls>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            sessions,
            store,
            urls,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Upper bound on any single call to the asset store.
    pub(crate) store_timeout: Duration,
}

impl Config {
    pub fn new(store_timeout: Duration) -> Self {
        Self { store_timeout }
    }
}
