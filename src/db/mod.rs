use axum::extract::FromRef;
use mongodb::{bson::doc, options::ClientOptions, Client, Database};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::repository::carbon_repo::CarbonRepository;
use crate::repository::certification_repo::CertificationRepository;
use crate::repository::company_repo::CompanyRepository;
use crate::repository::csr_repo::CsrRepository;
use crate::repository::notification_repo::NotificationRepository;
use crate::repository::workshop_repo::WorkshopRepository;
use crate::services::submissions::CarbonService;
use crate::services::tokens::JwtKeys;
use crate::services::uploads::UploadStore;

pub struct AppState {
    pub config: AppConfig,
    pub keys: JwtKeys,
    pub uploads: UploadStore,
    pub carbon: CarbonService,
    pub company_repo: CompanyRepository,
    pub csr_repo: CsrRepository,
    pub certification_repo: CertificationRepository,
    pub workshop_repo: WorkshopRepository,
    pub notification_repo: NotificationRepository,
}

impl AppState {
    pub fn new(config: AppConfig, db: &Database) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone());
        let carbon = CarbonService::new(
            Arc::new(CarbonRepository::new(db)),
            uploads.clone(),
            config.recent_limit,
        );
        AppState {
            keys: JwtKeys::new(&config.jwt_secret, config.token_ttl_secs),
            company_repo: CompanyRepository::new(db),
            csr_repo: CsrRepository::new(db),
            certification_repo: CertificationRepository::new(db),
            workshop_repo: WorkshopRepository::new(db),
            notification_repo: NotificationRepository::new(db),
            carbon,
            uploads,
            config,
        }
    }
}

impl FromRef<Arc<AppState>> for CarbonService {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.carbon.clone()
    }
}

impl FromRef<Arc<AppState>> for JwtKeys {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.keys.clone()
    }
}

/// Connects and pings the server once.
pub async fn init_db(config: &AppConfig) -> AppResult<(Client, Database)> {
    let mut options = ClientOptions::parse(&config.mongodb_uri).await?;
    options.app_name = Some("csr-backend".to_string());

    let client = Client::with_options(options)?;
    let db = client.database(&config.database_name);
    db.run_command(doc! { "ping": 1 }, None).await?;

    tracing::info!(database = %config.database_name, "connected to MongoDB");
    Ok((client, db))
}
