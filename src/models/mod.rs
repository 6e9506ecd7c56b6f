//! # Data Model Layer
//!
//! Plain structs for every persisted entity in the integration core, plus
//! the status enums that gate their lifecycles. Persistence itself lives
//! behind the [`crate::storage::Storage`] trait; these types carry no
//! connection handles.

pub mod behavioral;
pub mod dashboard;
pub mod integration_event;
pub mod operational;
pub mod sync_queue_item;
pub mod sync_report;

pub use behavioral::{BehavioralEvent, BehavioralScore, NewBehavioralEvent, Segment};
pub use dashboard::{
    LastSyncInfo, LeadStats, MaintenanceStats, PropertyStats, RevenueStats, SystemHealthStats,
    UnifiedDashboard,
};
pub use integration_event::{EventStatus, IntegrationEvent, NewIntegrationEvent};
pub use operational::{
    Booking, Lead, MaintenanceTicket, PriceChangeEvent, PropertyState, Tenant, TriggerRecord,
};
pub use sync_queue_item::{NewSyncQueueItem, SyncItemStatus, SyncQueueItem};
pub use sync_report::{
    LeadSyncOutcome, MaintenanceSyncOutcome, PropertySyncOutcome, SyncError, SyncReport,
    SyncStatus, TenantSyncOutcome,
};
