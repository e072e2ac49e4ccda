//! Provider-facing services.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → HelloService / UserService
//!     → Command (circuit → bulkhead → timeout → retries)
//!     → RemoteClient → provider
//!     → value, or the configured fallback
//! ```

pub mod hello;
pub mod types;
pub mod user;

use std::sync::Arc;

use crate::client::{RemoteClient, TransportResult};
use crate::config::ConsumerConfig;
use crate::resilience::CommandRegistry;

pub use hello::HelloService;
pub use types::User;
pub use user::{UserBatchLoader, UserService};

/// Everything the consumer endpoints need, built once from config.
#[derive(Debug, Clone)]
pub struct ConsumerServices {
    pub registry: Arc<CommandRegistry>,
    pub hello: HelloService,
    pub users: UserService,
}

impl ConsumerServices {
    pub fn from_config(config: &ConsumerConfig) -> TransportResult<Self> {
        let client = RemoteClient::new(&config.upstream)?;
        let registry = Arc::new(CommandRegistry::from_config(config));

        let hello = HelloService::new(client.clone(), &registry, &config.fallback.hello);
        let users = UserService::new(client, &registry, &config.fallback, &config.collapser);

        Ok(Self {
            registry,
            hello,
            users,
        })
    }
}
