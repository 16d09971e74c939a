pub mod api;
pub mod config;
pub mod db;
pub mod notifications;
pub mod storage;
pub mod workflow;

pub use db::DbPool;

use config::Config;

use crate::notifications::email::SystemEmailService;
use crate::storage::ProofStorage;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub proofs: ProofStorage,
    pub mailer: SystemEmailService,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let proofs = ProofStorage::new(config.server.data_dir.join("proofs"));
        let mailer = SystemEmailService::new(config.email.clone());
        Self {
            config,
            db,
            proofs,
            mailer,
        }
    }
}
