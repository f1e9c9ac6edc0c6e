use std::sync::Arc;

use application::{ChatRepository, ConnectionRegistry, MessageRouter, PresenceUpdater};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
    pub presence: Arc<PresenceUpdater>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(repository: Arc<dyn ChatRepository>, jwt_service: Arc<JwtService>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(repository.clone(), registry.clone()));
        let presence = Arc::new(PresenceUpdater::new(repository));

        Self {
            registry,
            router,
            presence,
            jwt_service,
        }
    }
}
