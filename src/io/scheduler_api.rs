//! Booking API client for the scheduling backend proxy
//!
//! `BookingApi` is the seam the wizard controller talks to. `HttpSchedulerApi`
//! is the production implementation over [`HttpClient`]; tests substitute
//! in-memory fakes.

use crate::domain::error::{BookingError, Result};
use crate::domain::types::{
    AvailableDate, BookingPayload, BookingResponse, ScheduleSlot, Service, ServiceCategory,
    ServiceId, Staff, StaffId,
};
use crate::domain::validation::validate_booking_payload;
use crate::infra::config::Config;
use crate::infra::metrics::ApiMetrics;
use crate::io::http_client::{HttpClient, RetryPolicy};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn fetch_services(&self) -> Result<Vec<Service>>;

    async fn fetch_services_by_category(&self) -> Result<Vec<ServiceCategory>>;

    async fn fetch_service(&self, id: ServiceId) -> Result<Service>;

    /// Staff able to perform `service_id` (all staff when `None`).
    /// `with_slots` asks for the nearest-slots preview on each member.
    async fn fetch_staff(&self, service_id: Option<ServiceId>, with_slots: bool)
        -> Result<Vec<Staff>>;

    async fn fetch_staff_member(&self, id: StaffId) -> Result<Staff>;

    async fn fetch_available_dates(
        &self,
        staff_id: StaffId,
        service_id: ServiceId,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<AvailableDate>>;

    /// Bookable slots only; implementations drop `available == false`.
    async fn fetch_available_time(
        &self,
        staff_id: StaffId,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>>;

    /// Slots of every specialist performing `service_id` on `date`,
    /// merged and ordered by time.
    ///
    /// A failure fetching one specialist's slots only drops that
    /// specialist; failing to list the staff fails the whole call.
    async fn fetch_available_time_all_staff(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>> {
        let staff = self.fetch_staff(Some(service_id), false).await?;

        let requests = staff.iter().filter(|member| !member.is_any()).map(|member| async move {
            match self.fetch_available_time(member.id, service_id, date).await {
                Ok(slots) => slots
                    .into_iter()
                    .map(|mut slot| {
                        slot.staff_name.get_or_insert_with(|| member.name.clone());
                        slot
                    })
                    .collect::<Vec<ScheduleSlot>>(),
                Err(e) => {
                    warn!(staff_id = %member.id, service_id = %service_id, date = %date, error = %e, "staff_slots_fetch_failed");
                    Vec::new()
                }
            }
        });

        let mut merged: Vec<ScheduleSlot> = join_all(requests).await.into_iter().flatten().collect();
        merged.sort_by(|a, b| a.time.cmp(&b.time));
        debug!(service_id = %service_id, date = %date, staff = %staff.len(), slots = %merged.len(), "all_staff_slots_merged");
        Ok(merged)
    }

    /// Validates the payload before anything is sent
    async fn create_booking(&self, payload: &BookingPayload) -> Result<BookingResponse>;

    async fn cancel_booking(&self, booking_id: i64, code: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct ServicesEnvelope {
    services: Vec<Service>,
}

#[derive(Deserialize)]
struct CategoriesEnvelope {
    categories: Vec<ServiceCategory>,
}

#[derive(Deserialize)]
struct ServiceEnvelope {
    service: Service,
}

#[derive(Deserialize)]
struct StaffListEnvelope {
    staff: Vec<Staff>,
}

#[derive(Deserialize)]
struct StaffEnvelope {
    staff: Staff,
}

#[derive(Deserialize)]
struct DatesEnvelope {
    dates: Vec<AvailableDate>,
}

#[derive(Deserialize)]
struct SlotsEnvelope {
    slots: Vec<ScheduleSlot>,
}

#[derive(Deserialize)]
struct BookingEnvelope {
    #[serde(default)]
    booking: BookingResponse,
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    code: &'a str,
}

pub struct HttpSchedulerApi {
    http: HttpClient,
}

impl HttpSchedulerApi {
    pub fn new(config: &Config, metrics: Arc<ApiMetrics>) -> Result<Self> {
        let http = HttpClient::new(config, metrics)?;
        info!(base_url = %http.base_url(), "scheduler_api_ready");
        Ok(Self { http })
    }

    pub fn from_client(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BookingApi for HttpSchedulerApi {
    async fn fetch_services(&self) -> Result<Vec<Service>> {
        let envelope: ServicesEnvelope = self
            .http
            .get("/services", &[])
            .await
            .map_err(|e| e.context("Не удалось загрузить список услуг"))?;
        Ok(envelope.services)
    }

    async fn fetch_services_by_category(&self) -> Result<Vec<ServiceCategory>> {
        let envelope: CategoriesEnvelope = self
            .http
            .get("/services/categories", &[])
            .await
            .map_err(|e| e.context("Не удалось загрузить категории услуг"))?;
        Ok(envelope.categories)
    }

    async fn fetch_service(&self, id: ServiceId) -> Result<Service> {
        let envelope: ServiceEnvelope = self
            .http
            .get(&format!("/services/{id}"), &[])
            .await
            .map_err(|e| e.context("Не удалось загрузить информацию об услуге"))?;
        Ok(envelope.service)
    }

    async fn fetch_staff(
        &self,
        service_id: Option<ServiceId>,
        with_slots: bool,
    ) -> Result<Vec<Staff>> {
        let mut query = Vec::with_capacity(2);
        if let Some(id) = service_id {
            query.push(("service_id", id.to_string()));
        }
        if with_slots {
            query.push(("with_slots", "true".to_string()));
        }
        let envelope: StaffListEnvelope = self
            .http
            .get("/staff", &query)
            .await
            .map_err(|e| e.context("Не удалось загрузить список мастеров"))?;
        Ok(envelope.staff)
    }

    async fn fetch_staff_member(&self, id: StaffId) -> Result<Staff> {
        let envelope: StaffEnvelope = self
            .http
            .get(&format!("/staff/{id}"), &[])
            .await
            .map_err(|e| e.context("Не удалось загрузить информацию о мастере"))?;
        Ok(envelope.staff)
    }

    async fn fetch_available_dates(
        &self,
        staff_id: StaffId,
        service_id: ServiceId,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<AvailableDate>> {
        let mut query = vec![("staff_id", staff_id.to_string()), ("service_id", service_id.to_string())];
        if let Some(from) = from_date {
            query.push(("from_date", from.format(DATE_FORMAT).to_string()));
        }
        let envelope: DatesEnvelope = self
            .http
            .get("/schedule/dates", &query)
            .await
            .map_err(|e| e.context("Не удалось загрузить доступные даты"))?;
        Ok(envelope.dates)
    }

    async fn fetch_available_time(
        &self,
        staff_id: StaffId,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>> {
        let query = [
            ("staff_id", staff_id.to_string()),
            ("service_id", service_id.to_string()),
            ("date", date.format(DATE_FORMAT).to_string()),
        ];
        let envelope: SlotsEnvelope = self
            .http
            .get("/schedule/slots", &query)
            .await
            .map_err(|e| e.context("Не удалось загрузить доступное время"))?;
        Ok(envelope.slots.into_iter().filter(|slot| slot.available).collect())
    }

    async fn create_booking(&self, payload: &BookingPayload) -> Result<BookingResponse> {
        validate_booking_payload(payload)?;

        // Not idempotent: a retried POST could book the slot twice
        let envelope: BookingEnvelope = self
            .http
            .post("/bookings", payload, RetryPolicy::none())
            .await
            .map_err(|e| match e {
                BookingError::Api { .. } => e,
                other => other.context("Не удалось создать запись. Попробуйте еще раз."),
            })?;

        info!(
            staff_id = %payload.staff_id,
            datetime = %payload.datetime,
            booking_id = ?envelope.booking.id,
            "booking_created"
        );
        Ok(envelope.booking)
    }

    async fn cancel_booking(&self, booking_id: i64, code: &str) -> Result<()> {
        let _: serde_json::Value = self
            .http
            .post(&format!("/bookings/{booking_id}/cancel"), &CancelRequest { code }, RetryPolicy::none())
            .await
            .map_err(|e| e.context("Не удалось отменить запись"))?;
        info!(booking_id = %booking_id, "booking_cancelled");
        Ok(())
    }
}
