//! Business logic services

pub mod auth;
pub mod catalog;
pub mod clock;
pub mod loans;
pub mod renewal;

use crate::{config::AuthConfig, repository::SharedStore};

use self::{auth::SharedAuthorizer, renewal::RenewalPolicy};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub store: SharedStore,
}

impl Services {
    /// Create all services over one store and authorizer
    pub fn new(store: SharedStore, authorizer: SharedAuthorizer, auth_config: AuthConfig) -> Self {
        Self {
            auth: auth::AuthService::new(store.clone(), authorizer.clone(), auth_config),
            catalog: catalog::CatalogService::new(store.clone(), authorizer.clone()),
            loans: loans::LoansService::new(store.clone(), authorizer, RenewalPolicy::default()),
            store,
        }
    }
}
