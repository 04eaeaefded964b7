//! Static registry of system events.
//!
//! Event definitions are reference data compiled into the binary. The
//! registry is validated once at startup; the dispatcher only reads it.

use std::collections::{HashMap, HashSet};

use backoffice_common::{AppError, AppResult};
use serde::Serialize;

/// A group of related events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCategory {
    pub id: u32,
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

/// A domain occurrence that webhooks can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    pub id: u32,
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
}

const CATEGORIES: &[EventCategory] = &[
    EventCategory {
        id: 1,
        code: "LOAN",
        name: "Loans",
        description: "Loan application lifecycle",
        icon: "bank",
    },
    EventCategory {
        id: 2,
        code: "MEMBER",
        name: "Members",
        description: "Cooperative membership",
        icon: "users",
    },
    EventCategory {
        id: 3,
        code: "PAYMENT",
        name: "Payments",
        description: "Incoming and outgoing payments",
        icon: "credit-card",
    },
    EventCategory {
        id: 4,
        code: "ACCOUNT",
        name: "Accounts",
        description: "Savings and current accounts",
        icon: "wallet",
    },
    EventCategory {
        id: 5,
        code: "SYSTEM",
        name: "System",
        description: "Back-office configuration",
        icon: "settings",
    },
];

const EVENTS: &[SystemEvent] = &[
    SystemEvent {
        id: 1,
        code: "LOAN_APPROVED",
        name: "Loan approved",
        description: "A loan application was approved",
        category: "LOAN",
    },
    SystemEvent {
        id: 2,
        code: "LOAN_REJECTED",
        name: "Loan rejected",
        description: "A loan application was rejected",
        category: "LOAN",
    },
    SystemEvent {
        id: 3,
        code: "LOAN_DISBURSED",
        name: "Loan disbursed",
        description: "Approved funds were paid out",
        category: "LOAN",
    },
    SystemEvent {
        id: 4,
        code: "MEMBER_REGISTERED",
        name: "Member registered",
        description: "A new member joined",
        category: "MEMBER",
    },
    SystemEvent {
        id: 5,
        code: "MEMBER_UPDATED",
        name: "Member updated",
        description: "Member details changed",
        category: "MEMBER",
    },
    SystemEvent {
        id: 6,
        code: "PAYMENT_RECEIVED",
        name: "Payment received",
        description: "A payment was booked",
        category: "PAYMENT",
    },
    SystemEvent {
        id: 7,
        code: "PAYMENT_FAILED",
        name: "Payment failed",
        description: "A payment could not be processed",
        category: "PAYMENT",
    },
    SystemEvent {
        id: 8,
        code: "ACCOUNT_OPENED",
        name: "Account opened",
        description: "A new account was opened",
        category: "ACCOUNT",
    },
    SystemEvent {
        id: 9,
        code: "ACCOUNT_CLOSED",
        name: "Account closed",
        description: "An account was closed",
        category: "ACCOUNT",
    },
    SystemEvent {
        id: 10,
        code: "SETTINGS_CHANGED",
        name: "Settings changed",
        description: "A general configuration value changed",
        category: "SYSTEM",
    },
];

/// Lookup table from event code to its definition.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    categories: Vec<EventCategory>,
    events: Vec<SystemEvent>,
    by_code: HashMap<&'static str, usize>,
}

impl EventCatalog {
    /// The events shipped with the back-office.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_parts(CATEGORIES.to_vec(), EVENTS.to_vec())
    }

    /// Build a catalog from explicit definitions. Call [`validate`](Self::validate) before use.
    #[must_use]
    pub fn from_parts(categories: Vec<EventCategory>, events: Vec<SystemEvent>) -> Self {
        let by_code = events
            .iter()
            .enumerate()
            .map(|(index, event)| (event.code, index))
            .collect();
        Self {
            categories,
            events,
            by_code,
        }
    }

    /// Look up an event by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&SystemEvent> {
        self.by_code.get(code).map(|&index| &self.events[index])
    }

    /// Look up an event by code, failing with `UnknownEvent`.
    pub fn require(&self, code: &str) -> AppResult<&SystemEvent> {
        self.get(code)
            .ok_or_else(|| AppError::UnknownEvent(code.to_string()))
    }

    #[must_use]
    pub fn events(&self) -> &[SystemEvent] {
        &self.events
    }

    #[must_use]
    pub fn categories(&self) -> &[EventCategory] {
        &self.categories
    }

    /// Events belonging to one category, in registration order.
    #[must_use]
    pub fn events_in_category(&self, category: &str) -> Vec<&SystemEvent> {
        self.events
            .iter()
            .filter(|event| event.category == category)
            .collect()
    }

    /// Check the registry for duplicate codes or ids and dangling categories.
    pub fn validate(&self) -> AppResult<()> {
        let mut category_codes = HashSet::new();
        let mut category_ids = HashSet::new();
        for category in &self.categories {
            if !category_codes.insert(category.code) {
                return Err(AppError::Config(format!(
                    "duplicate event category code {}",
                    category.code
                )));
            }
            if !category_ids.insert(category.id) {
                return Err(AppError::Config(format!(
                    "duplicate event category id {}",
                    category.id
                )));
            }
        }

        let mut codes = HashSet::new();
        let mut ids = HashSet::new();
        for event in &self.events {
            if !codes.insert(event.code) {
                return Err(AppError::Config(format!(
                    "duplicate event code {}",
                    event.code
                )));
            }
            if !ids.insert(event.id) {
                return Err(AppError::Config(format!("duplicate event id {}", event.id)));
            }
            if !category_codes.contains(event.category) {
                return Err(AppError::Config(format!(
                    "event {} references unknown category {}",
                    event.code, event.category
                )));
            }
        }

        Ok(())
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        assert!(EventCatalog::builtin().validate().is_ok());
    }

    #[test]
    fn test_lookup() {
        let catalog = EventCatalog::builtin();

        assert_eq!(catalog.get("LOAN_APPROVED").unwrap().category, "LOAN");
        assert!(catalog.get("LOAN_FROZEN").is_none());
        assert!(matches!(
            catalog.require("LOAN_FROZEN"),
            Err(AppError::UnknownEvent(code)) if code == "LOAN_FROZEN"
        ));
    }

    #[test]
    fn test_events_in_category() {
        let catalog = EventCatalog::builtin();
        let codes: Vec<_> = catalog
            .events_in_category("PAYMENT")
            .iter()
            .map(|e| e.code)
            .collect();

        assert_eq!(codes, vec!["PAYMENT_RECEIVED", "PAYMENT_FAILED"]);
        assert!(catalog.events_in_category("NOPE").is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_code() {
        let mut events = EVENTS.to_vec();
        events.push(SystemEvent {
            id: 99,
            ..EVENTS[0].clone()
        });
        let catalog = EventCatalog::from_parts(CATEGORIES.to_vec(), events);

        assert!(matches!(catalog.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_dangling_category() {
        let events = vec![SystemEvent {
            id: 1,
            code: "ORPHAN",
            name: "Orphan",
            description: "",
            category: "MISSING",
        }];
        let catalog = EventCatalog::from_parts(CATEGORIES.to_vec(), events);

        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }
}
