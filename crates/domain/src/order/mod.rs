//! Order lifecycle: creation, edits, status transitions and cancellation.

mod commands;
mod lifecycle;
mod service;

pub use commands::*;
pub use lifecycle::{
    StatusEffect, ensure_mutable, item_deltas, plan_cancellation, plan_status_change,
};
pub use service::{CancelledOrder, CustomerWithOrders, OrderService};

/// How item edits on an existing order are reconciled with inventory.
///
/// Increases are always moved from Fulfillment to In Transit. Decreases stay
/// in transit under [`OrderEditPolicy::IncreaseOnly`] and are returned to
/// Fulfillment under [`OrderEditPolicy::Reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderEditPolicy {
    #[default]
    IncreaseOnly,
    Reconcile,
}

impl OrderEditPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEditPolicy::IncreaseOnly => "increase_only",
            OrderEditPolicy::Reconcile => "reconcile",
        }
    }
}

impl std::fmt::Display for OrderEditPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderEditPolicy {
    type Err = common::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase_only" => Ok(OrderEditPolicy::IncreaseOnly),
            "reconcile" => Ok(OrderEditPolicy::Reconcile),
            other => Err(common::ParseEnumError {
                kind: "order edit policy",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_policy_parses() {
        assert_eq!(
            "reconcile".parse::<OrderEditPolicy>().unwrap(),
            OrderEditPolicy::Reconcile
        );
        assert_eq!(OrderEditPolicy::default(), OrderEditPolicy::IncreaseOnly);
        assert!("sometimes".parse::<OrderEditPolicy>().is_err());
    }
}
