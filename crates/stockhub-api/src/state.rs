use std::sync::Arc;

use stockhub_core::repositories::{EntityStore, RateCounter, TenantRepository};
use stockhub_core::services::{InventoryService, SubscriptionService};
use stockhub_core::tenancy::{IsolationGate, QuotaEnforcer, TenantResolver};
use stockhub_security::JwtService;
use stockhub_shared::config::TenancySettings;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TenantResolver>,
    pub gate: Arc<IsolationGate>,
    pub quota: Arc<QuotaEnforcer>,
    pub subscriptions: Arc<SubscriptionService>,
    pub inventory: Arc<InventoryService>,
    pub jwt: Arc<JwtService>,
}

impl AppState {
    /// Wire the tenancy engine over the given storage adapters.
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        store: Arc<dyn EntityStore>,
        counter: Arc<dyn RateCounter>,
        jwt: JwtService,
        tenancy: TenancySettings,
    ) -> Self {
        let gate = Arc::new(IsolationGate::new(store));
        let quota = Arc::new(QuotaEnforcer::new(tenants.clone(), gate.clone(), counter));

        Self {
            resolver: Arc::new(TenantResolver::new(tenants.clone())),
            subscriptions: Arc::new(SubscriptionService::new(
                tenants,
                gate.clone(),
                quota.clone(),
                tenancy,
            )),
            inventory: Arc::new(InventoryService::new(gate.clone(), quota.clone())),
            gate,
            quota,
            jwt: Arc::new(jwt),
        }
    }
}
