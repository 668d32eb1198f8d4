//! # Presença Facial
//!
//! The remote face-verification service as seen by the attendance
//! controller: the [`FacialService`] trait with the four operations the
//! controller depends on, and [`HttpFacialService`], the JSON-over-HTTP
//! binding to the biometric module.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod service;
pub mod wire;

// Re-export main types
pub use client::{FacialServiceConfig, HttpFacialService};
pub use error::FacialApiError;
pub use service::{
    EnrollmentOutcome, FacialService, QualityCheck, ReferenceRecord, VerificationOutcome,
};
pub use wire::encode_data_url;
