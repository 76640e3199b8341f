//! Shared types for the booking core
//!
//! Field names follow the backend proxy's JSON so these types double as the
//! wire format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Newtype wrapper for service IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ServiceId(pub i64);

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for staff IDs. `StaffId::ANY` is the "any specialist" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StaffId(pub i64);

impl StaffId {
    pub const ANY: StaffId = StaffId(0);

    #[inline]
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl std::fmt::Display for StaffId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-staff duration override attached to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStaff {
    pub id: StaffId,
    /// Seconds
    pub seance_length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_min: u64,
    #[serde(default)]
    pub price_max: u64,
    /// Minutes
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub staff: Vec<ServiceStaff>,
}

impl Service {
    /// Duration override for a specific staff member, in seconds
    pub fn staff_duration(&self, staff_id: StaffId) -> Option<u32> {
        self.staff.iter().find(|s| s.id == staff_id).map(|s| s.seance_length)
    }

    /// Duration override of the first listed staff member, in seconds
    pub fn first_staff_duration(&self) -> Option<u32> {
        self.staff.first().map(|s| s.seance_length)
    }

    /// General duration converted to seconds
    pub fn general_duration_secs(&self) -> u32 {
        self.duration.saturating_mul(60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// Quick availability preview returned with the staff list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPreview {
    pub time: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_slots: Vec<SlotPreview>,
}

impl Staff {
    /// The "any specialist" choice
    pub fn any() -> Self {
        Self {
            id: StaffId::ANY,
            name: "Любой мастер".to_string(),
            specialization: None,
            avatar_url: None,
            rating: None,
            reviews_count: None,
            next_slots: Vec::new(),
        }
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        self.id.is_any()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    /// `HH:MM`
    pub time: String,
    /// ISO 8601
    pub datetime: String,
    pub available: bool,
    pub staff_id: StaffId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
}

impl ScheduleSlot {
    /// Parse `time` into (hour, minute)
    pub fn hour_minute(&self) -> Option<(u32, u32)> {
        let (h, m) = self.time.split_once(':')?;
        Some((h.trim().parse().ok()?, m.trim().parse().ok()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableDate {
    pub date: NaiveDate,
    pub slots_count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub service_ids: Vec<ServiceId>,
    pub staff_id: StaffId,
    pub datetime: String,
    pub client: ClientInfo,
    /// Hours before the visit to send an SMS reminder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_by_sms: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Pending => "pending",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// What the backend returns for a created record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BookingResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
    /// Code required to cancel the record
    #[serde(default)]
    pub code: Option<String>,
}

/// Confirmation shown to the visitor after a successful booking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingResult {
    pub id: i64,
    pub status: BookingStatus,
    pub code: Option<String>,
    pub services: Vec<Service>,
    pub staff: Staff,
    pub datetime: String,
    pub client: ClientInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_deserialize_minimal() {
        let json = r#"{"id": 7, "title": "Стрижка", "price_min": 1500, "duration": 45}"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.id, ServiceId(7));
        assert_eq!(service.price_max, 0);
        assert!(service.staff.is_empty());
        assert_eq!(service.general_duration_secs(), 2700);
    }

    #[test]
    fn test_service_staff_duration_lookup() {
        let json = r#"{
            "id": 1, "title": "Борода", "price_min": 900, "duration": 30,
            "staff": [{"id": 4, "seance_length": 2400}, {"id": 9, "seance_length": 1200}]
        }"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.staff_duration(StaffId(9)), Some(1200));
        assert_eq!(service.staff_duration(StaffId(5)), None);
        assert_eq!(service.first_staff_duration(), Some(2400));
    }

    #[test]
    fn test_slot_hour_minute() {
        let slot = ScheduleSlot {
            time: "09:05".to_string(),
            datetime: "2026-10-18T09:05:00+03:00".to_string(),
            available: true,
            staff_id: StaffId(3),
            staff_name: None,
        };
        assert_eq!(slot.hour_minute(), Some((9, 5)));

        let broken = ScheduleSlot { time: "soon".to_string(), ..slot };
        assert_eq!(broken.hour_minute(), None);
    }

    #[test]
    fn test_any_staff_sentinel() {
        assert!(Staff::any().is_any());
        assert!(StaffId(0).is_any());
        assert!(!StaffId(12).is_any());
    }

    #[test]
    fn test_payload_omits_absent_sms() {
        let payload = BookingPayload {
            service_ids: vec![ServiceId(1)],
            staff_id: StaffId(2),
            datetime: "2026-10-18T15:00:00+03:00".to_string(),
            client: ClientInfo {
                name: "Иван".to_string(),
                phone: "+7 900 000-00-00".to_string(),
                ..Default::default()
            },
            notify_by_sms: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("notify_by_sms").is_none());
        assert!(value["client"].get("email").is_none());
        assert_eq!(value["service_ids"][0], 1);
    }
}
