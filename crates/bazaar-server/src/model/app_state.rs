//! Application state shared across all handlers

use std::sync::Arc;

use bazaar_persistence::PersistenceService;

use crate::service::{
    DashboardService, MessagingService, PaymentGateway, PaymentService, SubscriptionService,
};
use crate::ws::ConnectionRegistry;

use super::config::Configuration;

pub struct AppState {
    pub configuration: Configuration,
    pub persistence: Arc<dyn PersistenceService>,
    /// Live WebSocket connections, one per user
    pub connections: Arc<ConnectionRegistry>,
    pub subscriptions: Arc<SubscriptionService>,
    pub payments: Arc<PaymentService>,
    pub dashboards: Arc<DashboardService>,
    pub messaging: Arc<MessagingService>,
}

impl AppState {
    pub fn new(
        configuration: Configuration,
        persistence: Arc<dyn PersistenceService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let cache_config = configuration.cache_config();
        let connections = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(SubscriptionService::new(
            persistence.clone(),
            cache_config.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            gateway,
            subscriptions.clone(),
            persistence.clone(),
            configuration.payment_currency(),
        ));
        let dashboards = Arc::new(DashboardService::new(
            persistence.clone(),
            subscriptions.clone(),
            cache_config,
        ));
        let messaging = Arc::new(MessagingService::new(
            persistence.clone(),
            connections.clone(),
        ));

        Self {
            configuration,
            persistence,
            connections,
            subscriptions,
            payments,
            dashboards,
            messaging,
        }
    }

    pub fn persistence(&self) -> &dyn PersistenceService {
        self.persistence.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("configuration", &self.configuration)
            .field("persistence", &"<dyn PersistenceService>")
            .field("connections", &self.connections.len())
            .finish()
    }
}
