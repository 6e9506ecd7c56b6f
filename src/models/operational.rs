//! # Operational Read Models
//!
//! Entities owned by other subsystems (lead intake, booking flow, ledger
//! ingestion) that the integration core reads, and in two narrow cases
//! updates: property status flags and tenant CRM back-references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// A lead/contact; the subject behavioral events and scores attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub source: Option<String>,
    /// Foreign key into the CRM; empty until the lead is mirrored there
    pub crm_contact_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Local mirror of a property's occupancy state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PropertyState {
    pub id: i64,
    /// Foreign key into the property ledger
    pub ledger_id: String,
    pub address: String,
    pub status: String,
    pub status_source: String,
    pub is_vacant: bool,
    pub is_bookable: bool,
    pub status_updated_at: DateTime<Utc>,
}

/// Local mirror of a ledger tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub ledger_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub crm_contact_id: Option<String>,
    pub lead_id: Option<i64>,
    pub rent_amount: f64,
    pub balance: f64,
}

/// A scheduled property showing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub reference: String,
    pub property_id: i64,
    pub property_address: String,
    pub crm_contact_id: Option<String>,
    pub showing_at: DateTime<Utc>,
    pub status: String,
}

/// A maintenance ticket mirrored from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MaintenanceTicket {
    pub id: i64,
    pub ledger_id: String,
    pub property_id: String,
    pub category: String,
    pub priority: String,
    pub description: String,
    pub is_emergency: bool,
}

/// A raw price-change row awaiting the trigger sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceChangeEvent {
    pub id: i64,
    pub property_id: i64,
    pub property_address: String,
    pub old_price: f64,
    pub new_price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub trigger_emitted: bool,
}

/// Append-only log of emitted canonical triggers; the watermark source for
/// duplicate suppression. `subject_id` is the cooldown key: the lead for
/// lead-keyed triggers, the booking for showing follow-ups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TriggerRecord {
    pub id: i64,
    pub trigger_type: String,
    pub subject_id: Option<i64>,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}
