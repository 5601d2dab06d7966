//! Stripe REST client.
//!
//! Wallet top-up intents, balance lookups, Connect onboarding and webhook
//! signature verification.

pub mod client;
pub mod config;
pub mod error;
pub mod webhook;

pub use client::{Balance, BalanceAmount, ConnectToken, StripeClient};
pub use config::{StripeConfig, DEFAULT_TOLERANCE_SECS};
pub use error::{SignatureError, StripeError};
pub use webhook::{construct_event, sign_payload, verify_signature_at, Event, PaymentIntent};
