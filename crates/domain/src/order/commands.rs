//! Order and customer commands.

use common::{CustomerId, Money, OrderId, OrderStatus, ProductId};

use crate::error::{DomainError, Result};

/// A requested order line.
///
/// Without an explicit unit price the product's catalog price is
/// snapshotted.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Option<Money>,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn priced(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

/// Contact fields of a customer.
#[derive(Debug, Clone)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub location: String,
    pub preferred_delivery_time: Option<String>,
    pub notes: Option<String>,
}

impl CustomerDetails {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            location: location.into(),
            preferred_delivery_time: None,
            notes: None,
        }
    }

    pub fn preferred_delivery_time(mut self, time: impl Into<String>) -> Self {
        self.preferred_delivery_time = Some(time.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty()
            || self.phone.trim().is_empty()
            || self.location.trim().is_empty()
        {
            return Err(DomainError::validation(
                "Name, phone, and location are required",
            ));
        }
        Ok(())
    }
}

/// Command to register a customer, optionally with a first order.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub details: CustomerDetails,
    pub items: Option<Vec<OrderLine>>,
}

impl CreateCustomer {
    pub fn new(details: CustomerDetails) -> Self {
        Self {
            details,
            items: None,
        }
    }

    pub fn with_order(details: CustomerDetails, items: Vec<OrderLine>) -> Self {
        Self {
            details,
            items: Some(items),
        }
    }
}

/// Command to update a customer.
///
/// Non-empty `items` replace the lines of the customer's latest order.
#[derive(Debug, Clone)]
pub struct UpdateCustomer {
    pub customer_id: CustomerId,
    pub details: CustomerDetails,
    pub items: Option<Vec<OrderLine>>,
}

impl UpdateCustomer {
    pub fn new(customer_id: CustomerId, details: CustomerDetails) -> Self {
        Self {
            customer_id,
            details,
            items: None,
        }
    }

    pub fn items(mut self, items: Vec<OrderLine>) -> Self {
        self.items = Some(items);
        self
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl ChangeStatus {
    pub fn new(customer_id: CustomerId, order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            customer_id,
            order_id,
            status,
        }
    }
}

/// Command to cancel an order.
///
/// With `hold_return` the items stay in transit until the cancellation is
/// marked returned.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub notes: Option<String>,
    pub hold_return: bool,
}

impl CancelOrder {
    pub fn new(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
            notes: None,
            hold_return: false,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn hold_return(mut self, hold_return: bool) -> Self {
        self.hold_return = hold_return;
        self
    }
}
