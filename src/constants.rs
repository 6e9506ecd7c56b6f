//! # System Constants
//!
//! Integration event types, source-system tags, and canonical trigger names
//! shared by the orchestrator, the event processor, and the webhook boundary.
//! String values are wire-stable: they appear in persisted rows and in
//! payloads exchanged with the HTTP layer.

/// Integration event types recorded for every cross-system occurrence
pub mod events {
    pub const NEW_LEAD: &str = "new_lead";
    pub const LEAD_UPDATED: &str = "lead_updated";
    pub const BOOKING_CREATED: &str = "booking_created";
    pub const BOOKING_COMPLETED: &str = "booking_completed";
    pub const APPLICATION_SUBMITTED: &str = "application_submitted";
    pub const APPLICATION_APPROVED: &str = "application_approved";
    pub const LEASE_CONVERSION: &str = "lease_conversion";
    pub const PROPERTY_VACANCY: &str = "property_vacancy";
    pub const PROPERTY_OCCUPIED: &str = "property_occupied";
    pub const MAINTENANCE_CREATED: &str = "maintenance_created";
    pub const MAINTENANCE_COMPLETED: &str = "maintenance_completed";
    pub const TENANT_MOVE_IN: &str = "tenant_move_in";
    pub const TENANT_MOVE_OUT: &str = "tenant_move_out";
}

/// Source-system tags on integration events and sync queue items
pub mod sources {
    pub const RENTFLOW: &str = "rentflow";
    pub const CRM: &str = "crm";
    pub const LEDGER: &str = "ledger";
    pub const WEBHOOK: &str = "webhook";
    pub const MANUAL: &str = "manual";
}

/// Canonical trigger names emitted by the event processor sweeps
pub mod triggers {
    pub const PRICE_DROPPED: &str = "price_dropped";
    pub const LEAD_SCORED_HOT: &str = "lead_scored_hot";
    pub const SHOWING_COMPLETED: &str = "showing_completed";
}

/// Behavioral event types tracked against leads
pub mod behavior {
    pub const LEAD_CREATED: &str = "lead_created";
    pub const VIEWED: &str = "viewed";
    pub const BROWSED: &str = "browsed";
    pub const SAVED: &str = "saved";
    pub const SHARED: &str = "shared";
    pub const INQUIRY: &str = "inquiry";
    pub const APPLICATION: &str = "application";
    pub const SCHEDULED: &str = "scheduled";
    pub const CALLED: &str = "called";
    pub const CONVERTED: &str = "converted";
    pub const SESSION_START: &str = "session_start";
    pub const LONG_SESSION: &str = "long_session";
    pub const EMAIL_OPENED: &str = "email_opened";
    pub const EMAIL_CLICKED: &str = "email_clicked";
    pub const SMS_REPLIED: &str = "sms_replied";
    pub const UNSUBSCRIBED: &str = "unsubscribed";
}

/// Sync queue operation names
pub mod operations {
    pub const CREATE_CRM_LEAD: &str = "create_crm_lead";
    pub const SYNC_SCORE: &str = "sync_score";
    pub const CREATE_LEDGER_TENANT: &str = "create_ledger_tenant";
    pub const SCHEDULE_SHOWING: &str = "schedule_showing";
}
