//! Greeting lookup against `GET /hello`.

use std::sync::Arc;

use crate::client::RemoteClient;
use crate::resilience::{Command, CommandRegistry};

pub const HELLO_COMMAND: &str = "hello";

#[derive(Debug, Clone)]
pub struct HelloService {
    client: RemoteClient,
    command: Arc<Command>,
    fallback: Arc<str>,
}

impl HelloService {
    pub fn new(client: RemoteClient, registry: &CommandRegistry, fallback: &str) -> Self {
        Self {
            client,
            command: registry.get(HELLO_COMMAND),
            fallback: Arc::from(fallback),
        }
    }

    /// The provider's greeting, or the configured fallback text.
    pub async fn hello(&self) -> String {
        let client = &self.client;
        self.command
            .execute(move || client.get_text("/hello"), || self.fallback.to_string())
            .await
    }
}
