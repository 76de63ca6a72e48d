pub mod gateway;
pub mod memory;
pub mod stripe;
pub mod webhook;

pub use gateway::{
    to_cents, CreateSessionRequest, LineItem, PaymentError, PaymentGateway, PaymentVerification,
    RefundReceipt, SessionHandle,
};
pub use memory::InMemoryGateway;
pub use stripe::StripeClient;
