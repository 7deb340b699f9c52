//! Business services and third-party integrations
//!
//! Each external system (payments, email, storage, PDF rendering) is wrapped
//! in its own module with its own error type.

pub mod documents;
pub mod email;
pub mod fulfillment;
pub mod html;
pub mod payments;
pub mod pdf;
pub mod pricing;
pub mod qr;
pub mod storage;
