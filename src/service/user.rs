//! User lookups against `GET /users/{id}` and `GET /users?ids=`.
//!
//! # Operations
//! - `get_user_by_id`: awaited single lookup
//! - `get_user_by_id_async`: queued on the runtime, returns a future immediately
//! - `find_all`: one batched lookup, all-or-nothing fallback
//! - `find`: single lookup collapsed into `find_all` batches
//!
//! Every operation yields users; failures produce users carrying the
//! requested id and the configured sentinel name.

use std::future::Future;
use std::sync::Arc;

use crate::client::RemoteClient;
use crate::collapser::{BatchLoader, Collapser};
use crate::config::{CollapserConfig, FallbackConfig};
use crate::resilience::{Command, CommandRegistry};
use crate::service::types::{join_ids, User};

pub const GET_USER_BY_ID_COMMAND: &str = "get_user_by_id";
pub const FIND_ALL_COMMAND: &str = "find_all";
pub const FIND_COLLAPSER: &str = "find";

/// The protected user commands, shared by the service and its batch loader.
#[derive(Debug, Clone)]
struct UserCommands {
    client: RemoteClient,
    by_id: Arc<Command>,
    find_all: Arc<Command>,
    fallback_name: Arc<str>,
}

impl UserCommands {
    fn fallback_user(&self, id: i64) -> User {
        User::new(id, self.fallback_name.as_ref())
    }

    fn fallback_users(&self, ids: &[i64]) -> Vec<User> {
        ids.iter().map(|&id| self.fallback_user(id)).collect()
    }

    async fn get_user_by_id(&self, id: i64) -> User {
        let client = &self.client;
        let path = format!("/users/{}", id);
        let path = path.as_str();
        self.by_id
            .execute(move || client.get::<User>(path), || self.fallback_user(id))
            .await
    }

    fn get_user_by_id_async(&self, id: i64) -> impl Future<Output = User> + Send + 'static {
        let client = self.client.clone();
        let path = format!("/users/{}", id);
        let fallback_name = Arc::clone(&self.fallback_name);

        let handle = self.by_id.queue(
            move || {
                let client = client.clone();
                let path = path.clone();
                async move { client.get::<User>(&path).await }
            },
            move || User::new(id, fallback_name.as_ref()),
        );

        let fallback = self.fallback_user(id);
        async move {
            match handle.await {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!(command = GET_USER_BY_ID_COMMAND, id = id, error = %e, "Queued lookup aborted");
                    fallback
                }
            }
        }
    }

    async fn find_all(&self, ids: &[i64]) -> Vec<User> {
        if ids.is_empty() {
            return Vec::new();
        }
        let client = &self.client;
        let path = format!("/users?ids={}", join_ids(ids));
        let path = path.as_str();
        self.find_all
            .execute(move || client.get::<Vec<User>>(path), || self.fallback_users(ids))
            .await
    }
}

/// Feeds collapsed single lookups into `find_all`.
pub struct UserBatchLoader {
    commands: UserCommands,
}

impl BatchLoader for UserBatchLoader {
    type Key = i64;
    type Value = User;

    fn load(&self, keys: Vec<i64>) -> impl Future<Output = Vec<User>> + Send {
        async move { self.commands.find_all(&keys).await }
    }

    fn key_of(&self, value: &User) -> i64 {
        value.id
    }

    fn fallback(&self, key: &i64) -> User {
        self.commands.fallback_user(*key)
    }
}

#[derive(Clone)]
pub struct UserService {
    commands: UserCommands,
    collapser: Option<Collapser<UserBatchLoader>>,
}

impl UserService {
    pub fn new(
        client: RemoteClient,
        registry: &CommandRegistry,
        fallback: &FallbackConfig,
        collapser: &CollapserConfig,
    ) -> Self {
        let commands = UserCommands {
            client,
            by_id: registry.get(GET_USER_BY_ID_COMMAND),
            find_all: registry.get(FIND_ALL_COMMAND),
            fallback_name: Arc::from(fallback.user_name.as_str()),
        };

        let collapser = collapser.enabled.then(|| {
            let loader = UserBatchLoader {
                commands: commands.clone(),
            };
            Collapser::new(FIND_COLLAPSER, loader, collapser)
        });

        Self { commands, collapser }
    }

    /// Look up one user, waiting for the result or the fallback.
    pub async fn get_user_by_id(&self, id: i64) -> User {
        self.commands.get_user_by_id(id).await
    }

    /// Start a lookup on the runtime and hand back its future right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_user_by_id_async(&self, id: i64) -> impl Future<Output = User> + Send + 'static {
        self.commands.get_user_by_id_async(id)
    }

    /// Look up several users in one upstream call.
    ///
    /// On failure every id gets a sentinel user, in request order.
    pub async fn find_all(&self, ids: &[i64]) -> Vec<User> {
        self.commands.find_all(ids).await
    }

    /// Look up one user through the collapser (or directly when collapsing is off).
    pub async fn find(&self, id: i64) -> User {
        match &self.collapser {
            Some(collapser) => collapser.request(id).await,
            None => self.commands.get_user_by_id(id).await,
        }
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("client", &self.commands.client)
            .field("collapsing", &self.collapser.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_FALLBACK_USER_NAME;
    use crate::config::{CommandConfig, ConsumerConfig, UpstreamConfig};

    fn unreachable_service(collapsing: bool) -> UserService {
        let mut config = ConsumerConfig::default();
        config.upstream = UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            connect_timeout_ms: 100,
            ..UpstreamConfig::default()
        };
        config.collapser.enabled = collapsing;

        let client = RemoteClient::new(&config.upstream).unwrap();
        let registry = CommandRegistry::new(CommandConfig::default(), Default::default());
        UserService::new(client, &registry, &config.fallback, &config.collapser)
    }

    #[tokio::test]
    async fn test_unreachable_upstream_yields_sentinel_user() {
        let service = unreachable_service(false);
        let user = service.get_user_by_id(1).await;
        assert_eq!(user, User::new(1, DEFAULT_FALLBACK_USER_NAME));
    }

    #[tokio::test]
    async fn test_queued_lookup_falls_back() {
        let service = unreachable_service(false);
        let pending = service.get_user_by_id_async(5);
        assert_eq!(pending.await, User::new(5, DEFAULT_FALLBACK_USER_NAME));
    }

    #[tokio::test]
    async fn test_find_all_fallback_keeps_order() {
        let service = unreachable_service(false);
        let users = service.find_all(&[3, 1, 2]).await;
        let ids: Vec<_> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(users.iter().all(|u| u.user_name == DEFAULT_FALLBACK_USER_NAME));
    }

    #[tokio::test]
    async fn test_find_all_empty_skips_upstream() {
        let service = unreachable_service(false);
        assert!(service.find_all(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_collapsed_find_falls_back_per_id() {
        let service = unreachable_service(true);
        let (a, b) = tokio::join!(service.find(10), service.find(11));
        assert_eq!(a, User::new(10, DEFAULT_FALLBACK_USER_NAME));
        assert_eq!(b, User::new(11, DEFAULT_FALLBACK_USER_NAME));
    }
}
