// libs/payment-cell/src/services/mod.rs
pub mod checkout;

pub use checkout::CheckoutService;
