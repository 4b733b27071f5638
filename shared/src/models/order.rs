//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fulfillment state of an order (admin-controlled)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Settlement state of an order, independent of fulfillment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Shipping address snapshot captured at order time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// One line of an order: product reference, quantity, and the unit price
/// captured at order time. Prices are snapshots, never live references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i32,
    /// Unit price at order time
    pub price: Decimal,
}

impl OrderLine {
    /// Line subtotal (price x quantity)
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    /// Server-computed total: the sum of line subtotals for direct orders,
    /// or the charged amount (subtotal + shipping + tax) for gateway orders
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    /// Gateway correlation id (gateway-initiated orders only)
    pub khalti_pidx: Option<String>,
    /// External transaction id, set once payment completes
    pub transaction_id: Option<String>,
    pub items: Vec<OrderLine>,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_db_roundtrip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_db(s.as_db()), Some(s));
        }
        assert_eq!(OrderStatus::from_db("voided"), None);
        assert_eq!(OrderStatus::from_db(""), None);
    }

    #[test]
    fn test_payment_status_db_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::from_db(s.as_db()), Some(s));
        }
        assert_eq!(PaymentStatus::from_db("refunded"), None);
    }

    #[test]
    fn test_order_line_subtotal() {
        let line = OrderLine {
            product_id: 1,
            quantity: 2,
            price: Decimal::new(500, 0),
        };
        assert_eq!(line.subtotal(), Decimal::new(1000, 0));

        let line = OrderLine {
            product_id: 2,
            quantity: 3,
            price: Decimal::new(999, 2), // 9.99
        };
        assert_eq!(line.subtotal(), Decimal::new(2997, 2)); // 29.97
    }

    #[test]
    fn test_shipping_address_wire_format() {
        let json = r#"{
            "fullName": "Asha Shrestha",
            "address": "Baluwatar-4",
            "city": "Kathmandu",
            "state": "Bagmati",
            "country": "Nepal"
        }"#;
        let addr: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.full_name, "Asha Shrestha");
        assert_eq!(addr.city, "Kathmandu");

        let out = serde_json::to_string(&addr).unwrap();
        assert!(out.contains("\"fullName\""));
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Shipped).unwrap(),
            "\"shipped\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Completed).unwrap(),
            "\"completed\""
        );
        let s: PaymentStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(s, PaymentStatus::Failed);
    }
}
