//! Domain Events
//!
//! Immutable facts about a mortgage account's flex subsystem.
//! Each committed transition produces exactly one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FlexEvent, OperationContext};

/// Mortgage account events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MortgageEvent {
    /// A flex reduction was applied
    FlexApplied {
        account_id: Uuid,
        /// Calendar year the use counts against
        #[serde(default)]
        usage_year: i32,
        flex_event: FlexEvent,
    },

    /// Flex was switched on or off
    FlexToggled {
        account_id: Uuid,
        enabled: bool,
        toggled_at: DateTime<Utc>,
    },

    /// The yearly flex cap was changed
    MaxFlexUsageChanged {
        account_id: Uuid,
        max_flex_usage_per_year: u32,
        changed_at: DateTime<Utc>,
    },

    /// The usage counter was reset for a new calendar year
    FlexUsageReset {
        account_id: Uuid,
        year: i32,
        previous_count: u32,
        reset_at: DateTime<Utc>,
    },
}

impl MortgageEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            MortgageEvent::FlexApplied { .. } => "FlexApplied",
            MortgageEvent::FlexToggled { .. } => "FlexToggled",
            MortgageEvent::MaxFlexUsageChanged { .. } => "MaxFlexUsageChanged",
            MortgageEvent::FlexUsageReset { .. } => "FlexUsageReset",
        }
    }

    /// Get the account ID this event relates to
    pub fn account_id(&self) -> Uuid {
        match self {
            MortgageEvent::FlexApplied { account_id, .. } => *account_id,
            MortgageEvent::FlexToggled { account_id, .. } => *account_id,
            MortgageEvent::MaxFlexUsageChanged { account_id, .. } => *account_id,
            MortgageEvent::FlexUsageReset { account_id, .. } => *account_id,
        }
    }
}

/// An event as stored in the account's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Account version this event produced
    pub version: i64,
    pub event_type: String,
    pub event: MortgageEvent,
    pub context: OperationContext,
    pub recorded_at: DateTime<Utc>,
}

impl RecordedEvent {
    pub fn new(version: i64, event: MortgageEvent, context: &OperationContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: event.account_id(),
            version,
            event_type: event.event_type().to_string(),
            event,
            context: context.clone(),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mortgage_event_serialization() {
        let event = MortgageEvent::FlexToggled {
            account_id: Uuid::new_v4(),
            enabled: true,
            toggled_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"FlexToggled""#));

        let deserialized: MortgageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_recorded_event_carries_type_and_account() {
        let account_id = Uuid::new_v4();
        let event = MortgageEvent::FlexUsageReset {
            account_id,
            year: 2026,
            previous_count: 2,
            reset_at: Utc::now(),
        };

        let recorded = RecordedEvent::new(7, event, &OperationContext::system("test"));
        assert_eq!(recorded.account_id, account_id);
        assert_eq!(recorded.event_type, "FlexUsageReset");
        assert_eq!(recorded.version, 7);
    }
}
