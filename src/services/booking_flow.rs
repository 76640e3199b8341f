//! Booking flow controller
//!
//! Owns the wizard state and drives it against a [`BookingApi`]. Every
//! operation catches its own failures: the user-facing message lands in
//! `state().error` and nothing is returned as `Err`.
//!
//! Loads run in three phases so a caller can interleave selection changes
//! with a request in flight:
//! 1. [`BookingFlow::begin_load`] captures the parameters, "now" and the
//!    list's generation into a [`LoadTicket`]
//! 2. [`BookingFlow::execute`] performs the API call without touching state
//! 3. [`BookingFlow::finish_load`] applies the result if the ticket is still
//!    current and discards it otherwise

use crate::domain::error::{BookingError, Result};
use crate::domain::step::{BookingStep, StepSequence};
use crate::domain::types::{
    epoch_ms, AvailableDate, BookingPayload, BookingResult, BookingStatus, ClientInfo,
    ScheduleSlot, Service, ServiceId, Staff, StaffId,
};
use crate::domain::validation::validate_booking_payload;
use crate::domain::wizard::{
    self, filter_past_slots, reduce, Action, DurationEstimate, FormattedDateTime, LoadKind,
    StepConfig, WizardState,
};
use crate::io::scheduler_api::BookingApi;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

/// Log a failed load (cold path)
#[cold]
fn log_load_failed(kind: LoadKind, e: &BookingError) {
    error!(list = %kind.as_str(), error = %e, "booking_load_failed");
}

/// Parameters of a load, captured when it starts
#[derive(Debug, Clone, PartialEq)]
pub enum LoadRequest {
    Services,
    Staff { service_id: ServiceId },
    Dates { staff_id: StaffId, service_id: ServiceId, from_date: NaiveDate },
    /// `staff_id == None` fans out over every specialist
    Slots { staff_id: Option<StaffId>, service_id: ServiceId, date: NaiveDate },
}

impl LoadRequest {
    pub fn kind(&self) -> LoadKind {
        match self {
            LoadRequest::Services => LoadKind::Services,
            LoadRequest::Staff { .. } => LoadKind::Staff,
            LoadRequest::Dates { .. } => LoadKind::Dates,
            LoadRequest::Slots { .. } => LoadKind::Slots,
        }
    }

    /// Fallback text when the failure carries no message of its own
    fn fallback_message(&self) -> &'static str {
        match self {
            LoadRequest::Services => "Ошибка загрузки услуг",
            LoadRequest::Staff { .. } => "Ошибка загрузки мастеров",
            LoadRequest::Dates { .. } | LoadRequest::Slots { .. } => "Ошибка загрузки времени",
        }
    }
}

/// A started load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub request: LoadRequest,
    generation: u64,
    now: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Services(Vec<Service>),
    Staff(Vec<Staff>),
    Dates(Vec<AvailableDate>),
    Slots(Vec<ScheduleSlot>),
}

/// Pre-seeded selections, e.g. when arriving from a service page
#[derive(Debug, Clone, Default)]
pub struct InitialSelection {
    pub service: Option<Service>,
    pub staff: Option<Staff>,
}

fn user_message(e: &BookingError, fallback: &str) -> String {
    let message = e.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

pub struct BookingFlow {
    state: WizardState,
    steps: StepSequence,
    api: Arc<dyn BookingApi>,
    clock: Clock,
    multi_service: bool,
}

impl BookingFlow {
    pub fn new(api: Arc<dyn BookingApi>, steps: StepSequence) -> Self {
        let state = WizardState::starting_at(steps.first());
        Self { state, steps, api, clock: local_clock(), multi_service: false }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_multi_service(mut self, multi_service: bool) -> Self {
        self.multi_service = multi_service;
        self
    }

    pub fn with_notify_by_sms(mut self, hours: u32) -> Self {
        self.state.notify_by_sms = hours;
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    pub fn api(&self) -> &Arc<dyn BookingApi> {
        &self.api
    }

    pub fn multi_service(&self) -> bool {
        self.multi_service
    }

    fn dispatch(&mut self, action: Action) -> Vec<LoadKind> {
        reduce(&mut self.state, &self.steps, action)
    }

    async fn run_loads(&mut self, kinds: Vec<LoadKind>) {
        for kind in kinds {
            self.load(kind).await;
        }
    }

    // ------------------------------------------------------------------
    // Selections
    // ------------------------------------------------------------------

    pub fn select_service(&mut self, service: Service) {
        self.dispatch(Action::SelectService(service));
    }

    pub fn toggle_service(&mut self, service: Service) {
        self.dispatch(Action::ToggleService(service));
    }

    /// Toggle in multi-service mode, replace otherwise
    pub fn choose_service(&mut self, service: Service) {
        if self.multi_service {
            self.toggle_service(service);
        } else {
            self.select_service(service);
        }
    }

    pub fn select_staff(&mut self, staff: Staff) {
        self.dispatch(Action::SelectStaff(staff));
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.dispatch(Action::SelectDate(date));
    }

    pub fn select_time(&mut self, slot: ScheduleSlot) {
        self.dispatch(Action::SelectTime(slot));
    }

    pub fn set_client_info(&mut self, info: ClientInfo) {
        self.dispatch(Action::SetClientInfo(info));
    }

    /// Flip "all specialists" mode; reloads slots when a date is chosen
    pub async fn toggle_show_all_staff(&mut self) {
        let loads = self.dispatch(Action::ToggleShowAllStaff);
        self.run_loads(loads).await;
    }

    pub fn set_notify_by_sms(&mut self, hours: u32) {
        self.dispatch(Action::SetNotifyBySms(hours));
    }

    pub fn clear_error(&mut self) {
        self.dispatch(Action::ClearError);
    }

    // ------------------------------------------------------------------
    // Loads
    // ------------------------------------------------------------------

    pub async fn load_services(&mut self) {
        self.load(LoadKind::Services).await;
    }

    pub async fn load_staff(&mut self) {
        self.load(LoadKind::Staff).await;
    }

    pub async fn load_available_dates(&mut self) {
        self.load(LoadKind::Dates).await;
    }

    pub async fn load_available_slots(&mut self) {
        self.load(LoadKind::Slots).await;
    }

    pub async fn load(&mut self, kind: LoadKind) {
        let Some(ticket) = self.begin_load(kind) else {
            return;
        };
        let result = Self::execute(self.api.as_ref(), &ticket).await;
        self.finish_load(ticket, result);
    }

    /// Start a load of `kind`. `None` when its prerequisites are not selected.
    pub fn begin_load(&mut self, kind: LoadKind) -> Option<LoadTicket> {
        let now = (self.clock)();
        let request = match kind {
            LoadKind::Services => LoadRequest::Services,
            LoadKind::Staff => {
                LoadRequest::Staff { service_id: self.state.primary_service()?.id }
            }
            LoadKind::Dates => LoadRequest::Dates {
                staff_id: self.state.selected_staff.as_ref()?.id,
                service_id: self.state.primary_service()?.id,
                from_date: now.date(),
            },
            LoadKind::Slots => {
                let service_id = self.state.primary_service()?.id;
                let date = self.state.selected_date?;
                let staff_id = match &self.state.selected_staff {
                    Some(staff) if !self.state.show_all_staff && !staff.is_any() => Some(staff.id),
                    _ => None,
                };
                LoadRequest::Slots { staff_id, service_id, date }
            }
        };

        let generation = self.state.begin_load(kind);
        debug!(list = %kind.as_str(), generation = %generation, "booking_load_started");
        Some(LoadTicket { request, generation, now })
    }

    /// Run the API call for a ticket. Does not touch wizard state.
    pub async fn execute(api: &dyn BookingApi, ticket: &LoadTicket) -> Result<LoadOutcome> {
        match ticket.request {
            LoadRequest::Services => api.fetch_services().await.map(LoadOutcome::Services),
            LoadRequest::Staff { service_id } => {
                api.fetch_staff(Some(service_id), true).await.map(LoadOutcome::Staff)
            }
            LoadRequest::Dates { staff_id, service_id, from_date } => api
                .fetch_available_dates(staff_id, service_id, Some(from_date))
                .await
                .map(LoadOutcome::Dates),
            LoadRequest::Slots { staff_id: Some(staff_id), service_id, date } => api
                .fetch_available_time(staff_id, service_id, date)
                .await
                .map(LoadOutcome::Slots),
            LoadRequest::Slots { staff_id: None, service_id, date } => api
                .fetch_available_time_all_staff(service_id, date)
                .await
                .map(LoadOutcome::Slots),
        }
    }

    /// Apply a load result. Returns false when the ticket went stale and the
    /// result was discarded.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<LoadOutcome>) -> bool {
        let kind = ticket.request.kind();
        if !self.state.finish_load(kind, ticket.generation) {
            debug!(list = %kind.as_str(), generation = %ticket.generation, "booking_load_stale_discarded");
            return false;
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log_load_failed(kind, &e);
                self.state.error = Some(user_message(&e, ticket.request.fallback_message()));
                return true;
            }
        };

        match outcome {
            LoadOutcome::Services(services) => {
                info!(count = %services.len(), "services_loaded");
                self.state.services = services;
            }
            LoadOutcome::Staff(staff) => {
                info!(count = %staff.len(), "staff_loaded");
                let dropped = self
                    .state
                    .selected_staff
                    .as_ref()
                    .is_some_and(|sel| !sel.is_any() && !staff.iter().any(|s| s.id == sel.id));
                self.state.staff = staff;
                if dropped {
                    warn!(staff_id = ?self.state.selected_staff.as_ref().map(|s| s.id), "selected_staff_not_offered_dropped");
                    self.dispatch(Action::DeselectStaff);
                }
            }
            LoadOutcome::Dates(dates) => {
                info!(count = %dates.len(), "dates_loaded");
                self.state.available_dates = dates;
            }
            LoadOutcome::Slots(slots) => {
                let LoadRequest::Slots { date, .. } = ticket.request else {
                    return true;
                };
                let total = slots.len();
                let slots = filter_past_slots(slots, date, ticket.now);
                info!(date = %date, count = %slots.len(), past = %(total - slots.len()), "slots_loaded");
                self.state.available_slots = slots;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Advance if the current step is satisfied; loads what the new step shows
    pub async fn next_step(&mut self) {
        let loads = self.dispatch(Action::NextStep);
        self.run_loads(loads).await;
    }

    pub fn prev_step(&mut self) {
        self.dispatch(Action::PrevStep);
    }

    /// Jump without re-validating earlier steps
    pub fn go_to_step(&mut self, step: BookingStep) {
        self.dispatch(Action::GoToStep(step));
    }

    /// Pre-seed selections, then land on the first step still missing its
    /// selection, or on the last step when nothing is missing.
    pub async fn initialize_booking(&mut self, initial: InitialSelection) {
        if let Some(service) = initial.service {
            self.select_service(service);
        }
        if let Some(staff) = initial.staff {
            self.select_staff(staff);
        }

        let target = self
            .steps
            .iter()
            .find(|descriptor| !descriptor.is_valid(&self.state))
            .map(|descriptor| descriptor.step)
            .unwrap_or_else(|| self.steps.last());
        info!(step = %target, "booking_initialized");
        self.go_to_step(target);

        if target == BookingStep::Staff && self.state.primary_service().is_some() {
            self.load_staff().await;
        }
    }

    pub fn reset_booking(&mut self) {
        info!("booking_reset");
        self.dispatch(Action::Reset);
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    /// Submit the booking. Returns whether a record was created; failures
    /// leave their message in `state().error`.
    pub async fn create_booking(&mut self) -> bool {
        let (Some(slot), Some(client)) =
            (self.state.selected_time.clone(), self.state.client_info.clone())
        else {
            debug!("create_booking_incomplete_selection");
            return false;
        };
        if self.state.selected_services.is_empty() {
            debug!("create_booking_incomplete_selection");
            return false;
        }

        self.state.error = None;
        let Some(staff_id) = wizard::resolved_staff_id(&self.state) else {
            let e = BookingError::Business("Не выбран мастер".to_string());
            warn!(time = %slot.time, error = %e, "booking_staff_unresolved");
            self.state.error = Some(e.to_string());
            return false;
        };

        let payload = BookingPayload {
            service_ids: self.state.selected_services.iter().map(|s| s.id).collect(),
            staff_id,
            datetime: slot.datetime.clone(),
            client: client.clone(),
            notify_by_sms: (self.state.notify_by_sms > 0).then_some(self.state.notify_by_sms),
        };
        if let Err(e) = validate_booking_payload(&payload) {
            warn!(field = ?e.field().map(|f| f.as_str()), error = %e, "booking_payload_rejected");
            self.state.error = Some(e.to_string());
            return false;
        }

        self.state.begin_task();
        let result = self.api.create_booking(&payload).await;
        self.state.finish_task();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(staff_id = %staff_id, datetime = %payload.datetime, error = %e, "booking_create_failed");
                self.state.error = Some(user_message(&e, "Ошибка создания записи"));
                return false;
            }
        };

        let staff = match &self.state.selected_staff {
            Some(staff) if !staff.is_any() => staff.clone(),
            _ => Staff {
                id: slot.staff_id,
                name: slot.staff_name.clone().unwrap_or_else(|| "Мастер".to_string()),
                ..Staff::any()
            },
        };
        let id = response.id.unwrap_or_else(|| epoch_ms() as i64);
        let code = response.code.or_else(|| response.id.map(|id| id.to_string()));

        info!(booking_id = %id, staff_id = %staff_id, datetime = %payload.datetime, "booking_confirmed");
        self.state.booking_result = Some(BookingResult {
            id,
            status: response.status.unwrap_or(BookingStatus::Confirmed),
            code,
            services: self.state.selected_services.clone(),
            staff,
            datetime: slot.datetime,
            client,
        });
        true
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    pub fn is_step_complete(&self, step: BookingStep) -> bool {
        wizard::is_step_complete(&self.state, &self.steps, step)
    }

    pub fn step_config(&self) -> Option<StepConfig> {
        wizard::step_config(&self.state, &self.steps)
    }

    pub fn can_go_next(&self) -> bool {
        wizard::can_go_next(&self.state, &self.steps)
    }

    pub fn can_go_back(&self) -> bool {
        wizard::can_go_back(&self.state, &self.steps)
    }

    pub fn step_index(&self) -> usize {
        wizard::step_index(&self.state, &self.steps)
    }

    pub fn progress(&self) -> f64 {
        wizard::progress(&self.state, &self.steps)
    }

    pub fn total_price(&self) -> u64 {
        wizard::total_price(&self.state)
    }

    pub fn estimated_duration(&self) -> DurationEstimate {
        wizard::estimated_duration(&self.state)
    }

    pub fn formatted_date_time(&self) -> Option<FormattedDateTime> {
        wizard::formatted_date_time(&self.state)
    }
}
