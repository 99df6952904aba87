//! Audit logging for subscription events.
//!
//! Provides structured audit logging with identifier redaction and correlation IDs for tracking
//! one request across load, transition and save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    account::AccountId,
    catalog::{FeatureId, PlanId, ResourceType},
};

/// Types of auditable events.
///
/// Each variant is a subscription decision that support and billing staff may need to
/// reconstruct later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// New account started on the trial plan.
    TrialStarted,
    /// Confirmed payment moved an account onto a paid plan.
    UpgradeApplied,
    /// Upgrade attempt failed (unconfirmed, unknown plan, invalid transition).
    UpgradeRejected,
    /// Payment reference was already processed.
    DuplicatePaymentRejected,
    /// Record creation blocked by a quota.
    QuotaDenied,
    /// Feature use blocked.
    FeatureDenied,
}

/// Details for audit log entry.
///
/// Fields that do not apply to an event are left out of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuditDetails {
    /// Plan the event concerns (target plan for upgrades).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Plan before an upgrade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_plan_id: Option<String>,
    /// Payment reference (partially redacted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    /// Gated resource type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Gated feature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// Bonus days carried by an upgrade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_days: Option<u32>,
    /// Error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use plangate::{
///     account::AccountId,
///     catalog::PlanId,
///     security::audit::{AuditEvent, AuditEventType},
/// };
/// use uuid::Uuid;
///
/// # fn example() -> plangate::error::Result<()> {
/// let account = AccountId::new("acct-1234567")?;
/// let event = AuditEvent::new(AuditEventType::UpgradeApplied, &account, Uuid::new_v4(), Utc::now())
///     .with_plan(&PlanId::new("monthly")?)
///     .with_payment_ref("pay_9f8e7d6c")
///     .with_bonus_days(3);
///
/// plangate::security::audit::audit_log(&event);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event_type: AuditEventType,
    /// Account concerned (partially redacted).
    pub account_id: String,
    /// Request correlation ID.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event that occurred at `timestamp`.
    #[must_use]
    pub fn new(
        event_type: AuditEventType,
        account_id: &AccountId,
        request_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            event_type,
            account_id: redact_identifier(account_id.as_str()),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Adds the plan to details.
    #[must_use]
    pub fn with_plan(mut self, plan_id: &PlanId) -> Self {
        self.details.plan_id = Some(plan_id.to_string());
        self
    }

    /// Adds the pre-upgrade plan to details.
    #[must_use]
    pub fn with_previous_plan(mut self, plan_id: &PlanId) -> Self {
        self.details.previous_plan_id = Some(plan_id.to_string());
        self
    }

    /// Adds the payment reference to details, redacted.
    #[must_use]
    pub fn with_payment_ref(mut self, payment_ref: &str) -> Self {
        self.details.payment_ref = Some(redact_identifier(payment_ref));
        self
    }

    /// Adds the gated resource to details.
    #[must_use]
    pub fn with_resource(mut self, resource: &ResourceType) -> Self {
        self.details.resource = Some(resource.to_string());
        self
    }

    /// Adds the gated feature to details.
    #[must_use]
    pub fn with_feature(mut self, feature: &FeatureId) -> Self {
        self.details.feature = Some(feature.to_string());
        self
    }

    /// Adds carried bonus days to details.
    #[must_use]
    pub const fn with_bonus_days(mut self, days: u32) -> Self {
        self.details.bonus_days = Some(days);
        self
    }

    /// Adds an error message to details.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(error.into());
        self
    }
}

/// Logs audit event to tracing with target "audit".
///
/// Audit logs use a separate target so they can be routed to their own sink with an
/// `EnvFilter` directive such as `audit=info`.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = %event.timestamp.to_rfc3339(),
        event_type = ?event.event_type,
        account_id = %event.account_id,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Redacts an identifier to show only its last 4 characters.
///
/// A prefix up to the first `-` or `_` (e.g. `acct-` or `pay_`) is kept so the kind of
/// identifier stays recognizable.
///
/// # Examples
///
/// ```
/// use plangate::security::audit::redact_identifier;
///
/// assert_eq!(redact_identifier("acct-1234567890"), "acct-******7890");
/// assert_eq!(redact_identifier("pay_abcdef12"), "pay_****ef12");
/// assert_eq!(redact_identifier("abc"), "abc");
/// ```
#[must_use]
#[allow(
    clippy::string_slice,
    reason = "slicing happens on char boundaries found by char_indices"
)]
pub fn redact_identifier(id: &str) -> String {
    let len = id.chars().count();
    if len <= 4 {
        return id.to_owned();
    }

    let prefix_len = id
        .find(['-', '_'])
        .filter(|&pos| pos + 1 + 4 < id.len())
        .map_or(0, |pos| pos + 1);
    let prefix = &id[..prefix_len];
    let rest = &id[prefix_len..];

    let rest_len = rest.chars().count();
    let visible_start = rest.char_indices().nth(rest_len - 4).map_or(0, |(i, _)| i);
    let visible_end = &rest[visible_start..];

    format!("{prefix}{}{visible_end}", "*".repeat(rest_len - 4))
}
