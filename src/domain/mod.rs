//! Domain layer: checkout types, validation rules, the checkout state machine
//! and the ports the application layer depends on.

pub mod checkout;
pub mod format;
pub mod notification;
pub mod order;
pub mod payment;
pub mod ports;
pub mod validation;
