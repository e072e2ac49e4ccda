//! Named command registry.
//!
//! # Responsibilities
//! - Hand out one shared `Command` per operation name
//! - Create commands lazily, from a per-name override or the defaults
//! - Report every command's state for the status endpoint

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::resolve_command;
use crate::config::{CommandConfig, ConsumerConfig};
use crate::resilience::command::{Command, CommandSnapshot};

#[derive(Debug, Default)]
pub struct CommandRegistry {
    defaults: CommandConfig,
    overrides: HashMap<String, CommandConfig>,
    commands: DashMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new(defaults: CommandConfig, overrides: HashMap<String, CommandConfig>) -> Self {
        Self {
            defaults,
            overrides,
            commands: DashMap::new(),
        }
    }

    pub fn from_config(config: &ConsumerConfig) -> Self {
        Self::new(config.command.clone(), config.commands.clone())
    }

    /// Get the command registered under `name`, creating it on first use.
    pub fn get(&self, name: &str) -> Arc<Command> {
        if let Some(existing) = self.commands.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.commands.entry(name.to_string()).or_insert_with(|| {
            let config = resolve_command(&self.defaults, &self.overrides, name);
            tracing::debug!(
                command = %name,
                timeout_ms = config.timeout_ms,
                overridden = self.overrides.contains_key(name),
                "Registering command"
            );
            Arc::new(Command::new(name, config))
        });
        Arc::clone(entry.value())
    }

    /// Snapshots of all registered commands, sorted by name.
    pub fn snapshot(&self) -> Vec<CommandSnapshot> {
        let mut snapshots: Vec<_> = self.commands.iter().map(|c| c.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;

    #[test]
    fn test_same_name_shares_command() {
        let registry = CommandRegistry::default();
        let a = registry.get("hello");
        let b = registry.get("hello");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_override_applies_to_named_command() {
        let mut defaults = CommandConfig::default();
        defaults.circuit_breaker.request_volume_threshold = 1;
        let mut lenient = defaults.clone();
        lenient.circuit_breaker.request_volume_threshold = 100;

        let registry = CommandRegistry::new(
            defaults,
            HashMap::from([("find_all".to_string(), lenient)]),
        );

        let strict = registry.get("get_user_by_id");
        let relaxed = registry.get("find_all");
        for command in [&strict, &relaxed] {
            command
                .execute(
                    || async { Err::<(), _>(crate::client::TransportError::Connect("down".into())) },
                    || (),
                )
                .await;
        }

        assert_eq!(strict.circuit_state(), CircuitState::Open);
        assert_eq!(relaxed.circuit_state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = CommandRegistry::default();
        registry.get("hello");
        registry.get("find_all");
        registry.get("get_user_by_id");

        let names: Vec<_> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["find_all", "get_user_by_id", "hello"]);
    }
}
