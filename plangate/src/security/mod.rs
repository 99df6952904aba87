//! Audit trail for subscription decisions.
//!
//! Decisions taken by [`EntitlementService`](crate::account::EntitlementService) are logged as
//! structured [`AuditEvent`]s under the tracing target `audit`, stamped with the service's
//! injected clock:
//!
//! ```rust
//! use chrono::Utc;
//! use plangate::{
//!     account::AccountId,
//!     security::audit::{AuditEvent, AuditEventType, audit_log},
//! };
//! use uuid::Uuid;
//!
//! # fn example() -> plangate::error::Result<()> {
//! let account = AccountId::new("acct-1")?;
//! audit_log(&AuditEvent::new(AuditEventType::TrialStarted, &account, Uuid::new_v4(), Utc::now()));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! Account ids and payment references are partially redacted before they reach the log.

pub mod audit;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log, redact_identifier};
