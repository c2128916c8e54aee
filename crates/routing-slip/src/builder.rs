//! Builders for creating and revising routing slips.

use common::TrackingNumber;
use serde::Serialize;

use crate::error::{Result, RoutingSlipError};
use crate::slip::{ActivityStep, RoutingSlip, Variables};
use crate::subscription::Subscription;

/// Creates the initial routing slip at the originating process.
#[derive(Debug, Default)]
pub struct RoutingSlipBuilder {
    tracking_number: Option<TrackingNumber>,
    itinerary: Vec<ActivityStep>,
    variables: Variables,
    subscriptions: Vec<Subscription>,
}

impl RoutingSlipBuilder {
    /// Creates a builder; a tracking number is generated unless one is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a caller supplied tracking number.
    pub fn tracking_number(mut self, tracking_number: TrackingNumber) -> Self {
        self.tracking_number = Some(tracking_number);
        self
    }

    /// Appends an activity to the itinerary.
    pub fn add_activity(mut self, step: ActivityStep) -> Self {
        self.itinerary.push(step);
        self
    }

    /// Sets a variable from a serializable value.
    pub fn add_variable<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        self.variables
            .insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Merges a set of raw variables.
    pub fn add_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Registers a subscription for lifecycle events.
    pub fn add_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Builds the routing slip.
    ///
    /// Fails if no activity was added: such a slip has nowhere to go.
    pub fn build(self) -> Result<RoutingSlip> {
        if self.itinerary.is_empty() {
            return Err(RoutingSlipError::EmptyItinerary);
        }
        Ok(RoutingSlip::new(
            self.tracking_number.unwrap_or_default(),
            self.itinerary,
            self.variables,
            self.subscriptions,
        ))
    }
}

/// Itinerary changes requested by an activity as part of its completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItineraryRevision {
    /// Steps to run before the rest of the itinerary, in this order.
    pub insert_next: Vec<ActivityStep>,
    /// Steps to run after the rest of the itinerary, in this order.
    pub append: Vec<ActivityStep>,
    /// Subscriptions to add to the slip.
    pub subscriptions: Vec<Subscription>,
}

impl ItineraryRevision {
    /// Returns true if the revision changes nothing.
    pub fn is_empty(&self) -> bool {
        self.insert_next.is_empty() && self.append.is_empty() && self.subscriptions.is_empty()
    }
}

/// Produces the next hop's routing slip from a base slip.
///
/// Steps can only be added in front of or behind the remaining itinerary;
/// existing entries are never reordered or removed. The base slip is not
/// modified.
#[derive(Debug)]
pub struct ItineraryBuilder<'a> {
    base: &'a RoutingSlip,
    revision: ItineraryRevision,
    variables: Variables,
}

impl<'a> ItineraryBuilder<'a> {
    /// Starts revising `base`.
    pub fn new(base: &'a RoutingSlip) -> Self {
        Self {
            base,
            revision: ItineraryRevision::default(),
            variables: Variables::new(),
        }
    }

    /// Schedules `step` to run next. Successive calls keep their call order.
    pub fn insert_next(mut self, step: ActivityStep) -> Self {
        self.revision.insert_next.push(step);
        self
    }

    /// Schedules `step` to run after everything already on the itinerary.
    pub fn append(mut self, step: ActivityStep) -> Self {
        self.revision.append.push(step);
        self
    }

    /// Adds a subscription.
    pub fn add_subscription(mut self, subscription: Subscription) -> Self {
        self.revision.subscriptions.push(subscription);
        self
    }

    /// Sets variables on the next slip.
    pub fn set_variables(mut self, variables: &Variables) -> Self {
        self.variables
            .extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Applies a revision returned by an activity.
    pub fn apply(mut self, revision: ItineraryRevision) -> Self {
        self.revision.insert_next.extend(revision.insert_next);
        self.revision.append.extend(revision.append);
        self.revision.subscriptions.extend(revision.subscriptions);
        self
    }

    /// Builds the revised routing slip.
    pub fn build(self) -> RoutingSlip {
        self.base.revise(
            &self.revision.insert_next,
            &self.revision.append,
            &self.revision.subscriptions,
            &self.variables,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Address;
    use serde_json::json;

    fn step(name: &str) -> ActivityStep {
        ActivityStep::new(
            name,
            Address::from_parts("queue", &format!("{name}_execute")),
            Address::from_parts("queue", &format!("{name}_compensate")),
        )
    }

    fn names(slip: &RoutingSlip) -> Vec<&str> {
        slip.itinerary().iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn build_requires_an_activity() {
        let result = RoutingSlipBuilder::new().build();
        assert!(matches!(result, Err(RoutingSlipError::EmptyItinerary)));
    }

    #[test]
    fn build_keeps_itinerary_order_and_variables() {
        let tracking_number = TrackingNumber::new();
        let slip = RoutingSlipBuilder::new()
            .tracking_number(tracking_number)
            .add_activity(step("a"))
            .add_activity(step("b"))
            .add_variable("order_id", "ORD-1")
            .unwrap()
            .add_subscription(Subscription::all(Address::new("queue:audit")))
            .build()
            .unwrap();

        assert_eq!(slip.tracking_number(), tracking_number);
        assert_eq!(names(&slip), ["a", "b"]);
        assert_eq!(slip.variables()["order_id"], "ORD-1");
        assert_eq!(slip.subscriptions().len(), 1);
        assert!(slip.activity_logs().is_empty());
    }

    #[test]
    fn generated_tracking_numbers_differ() {
        let a = RoutingSlipBuilder::new().add_activity(step("a")).build().unwrap();
        let b = RoutingSlipBuilder::new().add_activity(step("a")).build().unwrap();
        assert_ne!(a.tracking_number(), b.tracking_number());
    }

    #[test]
    fn insert_next_and_append_surround_remaining_itinerary() {
        let base = RoutingSlipBuilder::new()
            .add_activity(step("b"))
            .add_activity(step("c"))
            .build()
            .unwrap();

        let revised = ItineraryBuilder::new(&base)
            .insert_next(step("x"))
            .insert_next(step("y"))
            .append(step("z"))
            .build();

        assert_eq!(names(&revised), ["x", "y", "b", "c", "z"]);
        assert_eq!(names(&base), ["b", "c"]);
        assert_eq!(revised.tracking_number(), base.tracking_number());
    }

    #[test]
    fn apply_revision_and_variables() {
        let base = RoutingSlipBuilder::new()
            .add_activity(step("b"))
            .build()
            .unwrap();
        let revision = ItineraryRevision {
            insert_next: vec![step("audit")],
            append: vec![],
            subscriptions: vec![Subscription::all(Address::new("queue:audit"))],
        };
        let mut variables = Variables::new();
        variables.insert("flag".into(), json!(true));

        let revised = ItineraryBuilder::new(&base)
            .apply(revision)
            .set_variables(&variables)
            .build();

        assert_eq!(names(&revised), ["audit", "b"]);
        assert_eq!(revised.subscriptions().len(), 1);
        assert_eq!(revised.variables()["flag"], true);
    }

    #[test]
    fn duplicate_subscriptions_are_not_added_twice() {
        let audit = Subscription::all(Address::new("queue:audit"));
        let base = RoutingSlipBuilder::new()
            .add_activity(step("a"))
            .add_subscription(audit.clone())
            .build()
            .unwrap();

        let revised = ItineraryBuilder::new(&base).add_subscription(audit).build();
        assert_eq!(revised.subscriptions().len(), 1);
    }

    #[test]
    fn empty_revision() {
        assert!(ItineraryRevision::default().is_empty());
        let revision = ItineraryRevision {
            append: vec![step("a")],
            ..Default::default()
        };
        assert!(!revision.is_empty());
    }
}
