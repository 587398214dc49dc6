//! Application layer containing the checkout orchestration.
//!
//! `CheckoutService` feeds UI events into the pure checkout state machine and
//! executes the effects it returns: running payment processors, appending to
//! the payment log and presenting notifications.

pub mod checkout;
pub mod live_validation;
pub mod notifier;
pub mod payment_log;
