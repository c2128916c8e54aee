//! Static table of the activities a host knows about.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::Address;
use routing_slip::{ActivityStep, to_object};
use serde::Serialize;

use crate::activity::{Compensator, Executor, NoCompensation};
use crate::error::{CourierError, Result};

/// One activity: its endpoints and implementation.
#[derive(Clone)]
pub struct ActivityDefinition {
    pub name: String,
    pub execute_address: Address,
    pub compensate_address: Address,
    pub executor: Arc<dyn Executor>,
    pub compensator: Arc<dyn Compensator>,
}

impl std::fmt::Debug for ActivityDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityDefinition")
            .field("name", &self.name)
            .field("execute_address", &self.execute_address)
            .field("compensate_address", &self.compensate_address)
            .finish_non_exhaustive()
    }
}

/// Maps activity names to their definitions.
///
/// Addresses default to `{scheme}:{name}_execute` and
/// `{scheme}:{name}_compensate`.
#[derive(Debug, Clone)]
pub struct ActivityRegistry {
    scheme: String,
    activities: BTreeMap<String, ActivityDefinition>,
}

impl ActivityRegistry {
    /// Creates an empty registry whose default addresses use `scheme`.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            activities: BTreeMap::new(),
        }
    }

    /// Returns the address scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the default execute address for `name`.
    pub fn execute_address(&self, name: &str) -> Address {
        Address::from_parts(&self.scheme, &format!("{name}_execute"))
    }

    /// Returns the default compensate address for `name`.
    pub fn compensate_address(&self, name: &str) -> Address {
        Address::from_parts(&self.scheme, &format!("{name}_compensate"))
    }

    /// Registers an activity that implements both halves.
    pub fn register<A>(&mut self, name: impl Into<String>, activity: A) -> &mut Self
    where
        A: Executor + Compensator + 'static,
    {
        let activity = Arc::new(activity);
        self.register_parts(name.into(), activity.clone(), activity)
    }

    /// Registers an activity with nothing to undo.
    pub fn register_execute_only<E>(&mut self, name: impl Into<String>, executor: E) -> &mut Self
    where
        E: Executor + 'static,
    {
        self.register_parts(name.into(), Arc::new(executor), Arc::new(NoCompensation))
    }

    /// Registers a definition with explicit addresses.
    pub fn register_definition(&mut self, definition: ActivityDefinition) -> &mut Self {
        tracing::debug!(
            activity = %definition.name,
            execute_address = %definition.execute_address,
            compensate_address = %definition.compensate_address,
            "activity registered"
        );
        self.activities.insert(definition.name.clone(), definition);
        self
    }

    fn register_parts(
        &mut self,
        name: String,
        executor: Arc<dyn Executor>,
        compensator: Arc<dyn Compensator>,
    ) -> &mut Self {
        let definition = ActivityDefinition {
            execute_address: self.execute_address(&name),
            compensate_address: self.compensate_address(&name),
            name,
            executor,
            compensator,
        };
        self.register_definition(definition)
    }

    /// Looks up an activity by name.
    pub fn get(&self, name: &str) -> Option<&ActivityDefinition> {
        self.activities.get(name)
    }

    /// All definitions, ordered by name.
    pub fn definitions(&self) -> impl Iterator<Item = &ActivityDefinition> {
        self.activities.values()
    }

    /// Returns the number of registered activities.
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Builds an itinerary step for a registered activity.
    pub fn step<T: Serialize + ?Sized>(&self, name: &str, arguments: &T) -> Result<ActivityStep> {
        let definition = self
            .get(name)
            .ok_or_else(|| CourierError::UnknownActivity(name.to_string()))?;
        Ok(ActivityStep::new(
            name,
            definition.execute_address.clone(),
            definition.compensate_address.clone(),
        )
        .with_raw_arguments(to_object(arguments, name)?))
    }
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new("queue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{CompensationResult, ExecutionResult};
    use crate::context::{CompensateContext, ExecuteContext};
    use crate::error::ActivityError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        async fn execute(
            &self,
            context: &ExecuteContext,
        ) -> std::result::Result<ExecutionResult, ActivityError> {
            Ok(context.completed())
        }
    }

    #[async_trait]
    impl Compensator for Noop {
        async fn compensate(
            &self,
            context: &CompensateContext,
        ) -> std::result::Result<CompensationResult, ActivityError> {
            Ok(context.compensated())
        }
    }

    #[test]
    fn addresses_follow_the_naming_convention() {
        let mut registry = ActivityRegistry::new("loopback");
        registry.register("reserve_inventory", Noop);

        let definition = registry.get("reserve_inventory").unwrap();
        assert_eq!(
            definition.execute_address.as_str(),
            "loopback:reserve_inventory_execute"
        );
        assert_eq!(
            definition.compensate_address.as_str(),
            "loopback:reserve_inventory_compensate"
        );
    }

    #[test]
    fn explicit_definition_keeps_its_addresses() {
        let mut registry = ActivityRegistry::default();
        registry.register_definition(ActivityDefinition {
            name: "audit".to_string(),
            execute_address: Address::new("rabbitmq://audit/run"),
            compensate_address: Address::new("rabbitmq://audit/undo"),
            executor: Arc::new(Noop),
            compensator: Arc::new(NoCompensation),
        });

        let step = registry.step("audit", &json!({})).unwrap();
        assert_eq!(step.execute_address.as_str(), "rabbitmq://audit/run");
        assert_eq!(step.compensate_address.as_str(), "rabbitmq://audit/undo");
    }

    #[test]
    fn step_carries_arguments() {
        let mut registry = ActivityRegistry::default();
        registry.register_execute_only("notify", Noop);

        let step = registry
            .step("notify", &json!({"channel": "email"}))
            .unwrap();
        assert_eq!(step.name, "notify");
        assert_eq!(step.arguments["channel"], "email");
        assert_eq!(step.execute_address.as_str(), "queue:notify_execute");
    }

    #[test]
    fn unknown_activity_is_an_error() {
        let registry = ActivityRegistry::default();
        assert!(matches!(
            registry.step("missing", &json!({})),
            Err(CourierError::UnknownActivity(name)) if name == "missing"
        ));
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let mut registry = ActivityRegistry::default();
        registry.register("reserve_inventory", Noop);
        assert!(matches!(
            registry.step("reserve_inventory", &json!([1, 2])),
            Err(CourierError::RoutingSlip(_))
        ));
    }

    #[test]
    fn definitions_are_ordered_by_name() {
        let mut registry = ActivityRegistry::default();
        registry.register("b", Noop).register("a", Noop);
        let names: Vec<_> = registry.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
