// libs/auth-cell/src/lib.rs
pub mod handlers;
pub mod router;
