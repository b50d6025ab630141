use std::sync::Arc;

use anyhow::{Context, Result};

use gatekeep_auth::{AccessTokenStore, Authorizer, PermissionSource, UserDirectory};
use gatekeep_infra::{InMemoryStore, PostgresStore};

use crate::config::ApiConfig;
use crate::identity_service::{HttpIdentityService, IdentityService};
use crate::resolver::CredentialResolver;

/// Authorizer over a type-erased permission source.
pub type SharedAuthorizer = Authorizer<Arc<dyn PermissionSource>>;

/// Everything request handling depends on, shared across requests.
#[derive(Clone)]
pub struct AppServices {
    pub authorizer: Arc<SharedAuthorizer>,
    pub resolver: Arc<CredentialResolver>,
}

impl AppServices {
    /// Wire services over one store implementing every read.
    pub fn from_store<T>(store: Arc<T>, identity: Arc<dyn IdentityService>, config: &ApiConfig) -> Self
    where
        T: PermissionSource + AccessTokenStore + UserDirectory + 'static,
    {
        let source: Arc<dyn PermissionSource> = store.clone();
        let users: Arc<dyn UserDirectory> = store.clone();
        let tokens: Arc<dyn AccessTokenStore> = store;

        let authorizer = Authorizer::new(source, config.guest_permissions.clone(), config.names);
        let resolver = CredentialResolver::new(users, tokens, identity, config.names);

        Self {
            authorizer: Arc::new(authorizer),
            resolver: Arc::new(resolver),
        }
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise an empty in-memory store.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices> {
    let identity: Arc<dyn IdentityService> = Arc::new(
        HttpIdentityService::new(config.identity_base_url.clone(), config.identity_timeout)
            .context("build identity service client")?,
    );

    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("connect to postgres")?;
            Ok(AppServices::from_store(Arc::new(store), identity, config))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using an empty in-memory store");
            Ok(AppServices::from_store(Arc::new(InMemoryStore::new()), identity, config))
        }
    }
}
