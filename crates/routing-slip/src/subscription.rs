//! Event subscriptions carried by a routing slip.

use std::collections::BTreeSet;

use common::Address;
use serde::{Deserialize, Serialize};

/// The kinds of lifecycle event a routing slip can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoutingSlipEventKind {
    /// Every activity ran; the itinerary is empty.
    Completed,
    /// An activity faulted and every executed activity has been walked back.
    Faulted,
    /// An activity ended the slip early.
    Terminated,
    /// One activity executed successfully.
    ActivityCompleted,
    /// One activity faulted.
    ActivityFaulted,
    /// One activity was undone.
    ActivityCompensated,
    /// One activity's undo failed (the walk continues).
    CompensationFailed,
}

impl RoutingSlipEventKind {
    /// Every event kind.
    pub const ALL: [RoutingSlipEventKind; 7] = [
        RoutingSlipEventKind::Completed,
        RoutingSlipEventKind::Faulted,
        RoutingSlipEventKind::Terminated,
        RoutingSlipEventKind::ActivityCompleted,
        RoutingSlipEventKind::ActivityFaulted,
        RoutingSlipEventKind::ActivityCompensated,
        RoutingSlipEventKind::CompensationFailed,
    ];

    /// Returns true for events about a single activity.
    pub fn is_activity_event(&self) -> bool {
        matches!(
            self,
            RoutingSlipEventKind::ActivityCompleted
                | RoutingSlipEventKind::ActivityFaulted
                | RoutingSlipEventKind::ActivityCompensated
                | RoutingSlipEventKind::CompensationFailed
        )
    }

    /// Returns true for events after which the slip is never forwarded again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RoutingSlipEventKind::Completed
                | RoutingSlipEventKind::Faulted
                | RoutingSlipEventKind::Terminated
        )
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingSlipEventKind::Completed => "Completed",
            RoutingSlipEventKind::Faulted => "Faulted",
            RoutingSlipEventKind::Terminated => "Terminated",
            RoutingSlipEventKind::ActivityCompleted => "ActivityCompleted",
            RoutingSlipEventKind::ActivityFaulted => "ActivityFaulted",
            RoutingSlipEventKind::ActivityCompensated => "ActivityCompensated",
            RoutingSlipEventKind::CompensationFailed => "CompensationFailed",
        }
    }
}

impl std::fmt::Display for RoutingSlipEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address registered to receive lifecycle events for one routing slip.
///
/// An empty `events` set means every kind. `activity_name` narrows activity
/// events to one activity; routing-slip level events are unaffected by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub address: Address,
    #[serde(default)]
    pub events: BTreeSet<RoutingSlipEventKind>,
    #[serde(default)]
    pub activity_name: Option<String>,
}

impl Subscription {
    /// Subscribes `address` to every event.
    pub fn all(address: Address) -> Self {
        Self {
            address,
            events: BTreeSet::new(),
            activity_name: None,
        }
    }

    /// Subscribes `address` to the given event kinds.
    pub fn to_events(
        address: Address,
        events: impl IntoIterator<Item = RoutingSlipEventKind>,
    ) -> Self {
        Self {
            address,
            events: events.into_iter().collect(),
            activity_name: None,
        }
    }

    /// Restricts activity events to one activity.
    pub fn for_activity(mut self, activity_name: impl Into<String>) -> Self {
        self.activity_name = Some(activity_name.into());
        self
    }

    /// Returns true if an event of `kind` (about `activity_name`, for activity events)
    /// should be delivered to this subscription.
    pub fn matches(&self, kind: RoutingSlipEventKind, activity_name: Option<&str>) -> bool {
        if !self.events.is_empty() && !self.events.contains(&kind) {
            return false;
        }
        match (&self.activity_name, kind.is_activity_event()) {
            (Some(wanted), true) => activity_name == Some(wanted.as_str()),
            _ => true,
        }
    }
}
