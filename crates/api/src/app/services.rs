use std::sync::Arc;

use tracing::info;

use tradedesk_infra::{
    AccountStore, Bouncer, BouncerConfig, InMemoryAccountStore, PermissionMutationService,
    PostgresAccountStore, StoreError,
};

/// Store handle shared by every service in the process.
pub type SharedStore = Arc<dyn AccountStore>;

/// Services available to handlers (via `Extension<Arc<AppServices>>`).
pub struct AppServices {
    pub bouncer: Bouncer<SharedStore>,
    pub mutations: PermissionMutationService<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, config: BouncerConfig) -> Self {
        let bouncer = Bouncer::new(store, config);
        Self {
            mutations: PermissionMutationService::new(bouncer.clone()),
            bouncer,
        }
    }
}

/// Postgres when a database URL is configured, in-memory otherwise.
pub async fn build_store(database_url: Option<&str>) -> Result<SharedStore, StoreError> {
    match database_url {
        Some(url) => {
            let store = PostgresAccountStore::connect(url).await?;
            info!("using postgres account store");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set; using in-memory account store");
            Ok(Arc::new(InMemoryAccountStore::new()))
        }
    }
}
