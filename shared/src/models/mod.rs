//! Domain models shared between services

pub mod order;
pub mod product;

pub use order::{Order, OrderLine, OrderStatus, PaymentStatus, ShippingAddress};
pub use product::{Product, ProductStatus};
