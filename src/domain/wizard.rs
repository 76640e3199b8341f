//! Booking wizard state, its reducer and pure derivations
//!
//! All selection changes go through [`reduce`], which mutates the state and
//! returns the loads the caller should run as a consequence. Derived values
//! (price, duration, progress, step config) are recomputed on every read.
//!
//! Key invariant: changing a selection clears every later selection and the
//! lists loaded for it, and bumps those lists' generations so that any
//! request still in flight for the old selection is discarded on arrival.

use crate::domain::step::{BookingStep, StepSequence};
use crate::domain::types::{
    AvailableDate, BookingResult, ClientInfo, ScheduleSlot, Service, ServiceId, Staff, StaffId,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::debug;

/// Lists the wizard loads from the booking API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Services,
    Staff,
    Dates,
    Slots,
}

impl LoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKind::Services => "services",
            LoadKind::Staff => "staff",
            LoadKind::Dates => "dates",
            LoadKind::Slots => "slots",
        }
    }
}

/// Per-list generation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Generations {
    services: u64,
    staff: u64,
    dates: u64,
    slots: u64,
}

impl Generations {
    fn slot(&mut self, kind: LoadKind) -> &mut u64 {
        match kind {
            LoadKind::Services => &mut self.services,
            LoadKind::Staff => &mut self.staff,
            LoadKind::Dates => &mut self.dates,
            LoadKind::Slots => &mut self.slots,
        }
    }

    fn get(&self, kind: LoadKind) -> u64 {
        match kind {
            LoadKind::Services => self.services,
            LoadKind::Staff => self.staff,
            LoadKind::Dates => self.dates,
            LoadKind::Slots => self.slots,
        }
    }

    fn bump(&mut self, kind: LoadKind) -> u64 {
        let g = self.slot(kind);
        *g = g.wrapping_add(1);
        *g
    }
}

#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub current_step: BookingStep,
    pub selected_services: Vec<Service>,
    pub selected_staff: Option<Staff>,
    pub selected_date: Option<NaiveDate>,
    pub selected_time: Option<ScheduleSlot>,
    pub client_info: Option<ClientInfo>,
    pub services: Vec<Service>,
    pub staff: Vec<Staff>,
    pub available_dates: Vec<AvailableDate>,
    pub available_slots: Vec<ScheduleSlot>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub booking_result: Option<BookingResult>,
    /// "All specialists" mode; mirrored by `selected_staff` holding the any-staff sentinel
    pub show_all_staff: bool,
    /// Hours before the visit for an SMS reminder, 0 = none
    pub notify_by_sms: u32,
    generations: Generations,
    in_flight: u32,
}

impl WizardState {
    /// Fresh state positioned on `step`
    pub fn starting_at(step: BookingStep) -> Self {
        Self { current_step: step, ..Self::default() }
    }

    /// First selected service; the one staff and slot lookups are keyed on
    pub fn primary_service(&self) -> Option<&Service> {
        self.selected_services.first()
    }

    pub fn generation(&self, kind: LoadKind) -> u64 {
        self.generations.get(kind)
    }

    /// Register a new load of `kind`, superseding any older one still in flight
    pub(crate) fn begin_load(&mut self, kind: LoadKind) -> u64 {
        self.begin_task();
        self.generations.bump(kind)
    }

    /// Close a load. Returns whether its result is still current.
    pub(crate) fn finish_load(&mut self, kind: LoadKind, generation: u64) -> bool {
        self.finish_task();
        self.generations.get(kind) == generation
    }

    /// Track a network call that has no list of its own (booking submit)
    pub(crate) fn begin_task(&mut self) {
        self.in_flight += 1;
        self.is_loading = true;
        self.error = None;
    }

    pub(crate) fn finish_task(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.is_loading = self.in_flight > 0;
    }

    fn invalidate(&mut self, kinds: &[LoadKind]) {
        for &kind in kinds {
            self.generations.bump(kind);
            match kind {
                LoadKind::Services => self.services.clear(),
                LoadKind::Staff => self.staff.clear(),
                LoadKind::Dates => self.available_dates.clear(),
                LoadKind::Slots => self.available_slots.clear(),
            }
        }
    }

    /// Clear everything downstream of the staff selection
    fn clear_after_staff(&mut self) {
        self.selected_date = None;
        self.selected_time = None;
        self.invalidate(&[LoadKind::Dates, LoadKind::Slots]);
    }

    /// Clear everything downstream of the service selection
    fn clear_after_service(&mut self) {
        self.selected_staff = None;
        self.show_all_staff = false;
        self.selected_date = None;
        self.selected_time = None;
        self.invalidate(&[LoadKind::Staff, LoadKind::Dates, LoadKind::Slots]);
    }
}

/// State transitions driven by the visitor
#[derive(Debug, Clone)]
pub enum Action {
    SelectService(Service),
    ToggleService(Service),
    SelectStaff(Staff),
    /// Selected specialist is no longer offered
    DeselectStaff,
    SelectDate(NaiveDate),
    SelectTime(ScheduleSlot),
    SetClientInfo(ClientInfo),
    ToggleShowAllStaff,
    SetNotifyBySms(u32),
    NextStep,
    PrevStep,
    GoToStep(BookingStep),
    ClearError,
    Reset,
}

/// Apply an action. Returns the lists that should be (re)loaded as a result.
pub fn reduce(state: &mut WizardState, steps: &StepSequence, action: Action) -> Vec<LoadKind> {
    match action {
        Action::SelectService(service) => {
            debug!(service_id = %service.id, "wizard_select_service");
            state.selected_services = vec![service];
            state.error = None;
            state.clear_after_service();
            vec![]
        }
        Action::ToggleService(service) => {
            if let Some(idx) = state.selected_services.iter().position(|s| s.id == service.id) {
                debug!(service_id = %service.id, "wizard_deselect_service");
                state.selected_services.remove(idx);
            } else {
                debug!(service_id = %service.id, "wizard_add_service");
                state.selected_services.push(service);
            }
            state.error = None;
            state.clear_after_service();
            vec![]
        }
        Action::SelectStaff(staff) => {
            debug!(staff_id = %staff.id, "wizard_select_staff");
            state.show_all_staff = staff.is_any();
            state.selected_staff = Some(staff);
            state.error = None;
            state.clear_after_staff();
            vec![]
        }
        Action::DeselectStaff => {
            debug!("wizard_deselect_staff");
            state.selected_staff = None;
            state.show_all_staff = false;
            state.clear_after_staff();
            vec![]
        }
        Action::SelectDate(date) => {
            debug!(date = %date, "wizard_select_date");
            state.selected_date = Some(date);
            state.error = None;
            state.selected_time = None;
            state.invalidate(&[LoadKind::Slots]);
            vec![]
        }
        Action::SelectTime(slot) => {
            debug!(time = %slot.time, staff_id = %slot.staff_id, "wizard_select_time");
            state.selected_time = Some(slot);
            state.error = None;
            vec![]
        }
        Action::SetClientInfo(info) => {
            state.client_info = Some(info);
            vec![]
        }
        Action::ToggleShowAllStaff => {
            state.show_all_staff = !state.show_all_staff;
            if state.show_all_staff {
                state.selected_staff = Some(Staff::any());
            } else if state.selected_staff.as_ref().is_some_and(Staff::is_any) {
                state.selected_staff = None;
            }
            state.selected_time = None;
            state.invalidate(&[LoadKind::Slots]);
            if state.selected_date.is_some() {
                vec![LoadKind::Slots]
            } else {
                vec![]
            }
        }
        Action::SetNotifyBySms(hours) => {
            state.notify_by_sms = hours;
            vec![]
        }
        Action::NextStep => {
            if !can_go_next(state, steps) {
                return vec![];
            }
            let Some(next) = steps.next_after(state.current_step) else {
                return vec![];
            };
            debug!(from = %state.current_step, to = %next, "wizard_next_step");
            state.error = None;
            state.current_step = next;
            match next {
                BookingStep::Staff => vec![LoadKind::Staff],
                BookingStep::Date => vec![LoadKind::Dates],
                _ => vec![],
            }
        }
        Action::PrevStep => {
            if let Some(prev) = steps.prev_before(state.current_step) {
                debug!(from = %state.current_step, to = %prev, "wizard_prev_step");
                state.error = None;
                state.current_step = prev;
            }
            vec![]
        }
        Action::GoToStep(step) => {
            if steps.contains(step) {
                state.error = None;
                state.current_step = step;
            }
            vec![]
        }
        Action::ClearError => {
            state.error = None;
            vec![]
        }
        Action::Reset => {
            let mut generations = state.generations;
            for kind in [LoadKind::Services, LoadKind::Staff, LoadKind::Dates, LoadKind::Slots] {
                generations.bump(kind);
            }
            *state = WizardState {
                current_step: steps.first(),
                is_loading: state.is_loading,
                in_flight: state.in_flight,
                generations,
                ..WizardState::default()
            };
            vec![]
        }
    }
}

/// Per-step UI configuration for the current step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepConfig {
    pub step: BookingStep,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub is_valid: bool,
    pub can_go_next: bool,
    pub can_go_back: bool,
}

pub fn step_config(state: &WizardState, steps: &StepSequence) -> Option<StepConfig> {
    let descriptor = steps.get(state.current_step)?;
    Some(StepConfig {
        step: descriptor.step,
        title: descriptor.title,
        subtitle: descriptor.subtitle,
        is_valid: descriptor.is_valid(state),
        can_go_next: can_go_next(state, steps),
        can_go_back: can_go_back(state, steps),
    })
}

/// Current step is satisfied and is not the last one
pub fn can_go_next(state: &WizardState, steps: &StepSequence) -> bool {
    let Some(descriptor) = steps.get(state.current_step) else {
        return false;
    };
    descriptor.is_valid(state) && steps.next_after(state.current_step).is_some()
}

/// Anything but the first step can go back
pub fn can_go_back(state: &WizardState, steps: &StepSequence) -> bool {
    steps.prev_before(state.current_step).is_some()
}

pub fn step_index(state: &WizardState, steps: &StepSequence) -> usize {
    steps.index_of(state.current_step).unwrap_or(0)
}

/// Percentage for the progress indicator
pub fn progress(state: &WizardState, steps: &StepSequence) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    (step_index(state, steps) + 1) as f64 / steps.len() as f64 * 100.0
}

/// A step is complete when it is not ahead of the current step and its
/// required selection is populated.
pub fn is_step_complete(state: &WizardState, steps: &StepSequence, step: BookingStep) -> bool {
    let (Some(target), Some(current)) = (steps.index_of(step), steps.index_of(state.current_step))
    else {
        return false;
    };
    if target > current {
        return false;
    }
    steps.get(step).is_some_and(|d| d.is_valid(state))
}

/// Sum of `price_min` over the selected services
pub fn total_price(state: &WizardState) -> u64 {
    state.selected_services.iter().map(|s| s.price_min).sum()
}

/// Staff the booking will be made with: an explicit (non-sentinel)
/// selection, else the staff owning the chosen slot.
pub fn resolved_staff_id(state: &WizardState) -> Option<StaffId> {
    if let Some(staff) = state.selected_staff.as_ref().filter(|s| !s.is_any()) {
        return Some(staff.id);
    }
    state.selected_time.as_ref().map(|slot| slot.staff_id).filter(|id| !id.is_any())
}

/// Aggregate duration of the selected services
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DurationEstimate {
    pub total_seconds: u32,
    /// Services with no staff override and no general duration
    pub unresolved: Vec<ServiceId>,
}

impl DurationEstimate {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Whole minutes, or `None` while any service's duration is unknown
    pub fn total_minutes(&self) -> Option<u32> {
        self.is_complete().then_some(self.total_seconds / 60)
    }
}

/// Duration per service resolves as: resolved staff's override, then the
/// first listed staff's override, then the general duration in seconds.
pub fn estimated_duration(state: &WizardState) -> DurationEstimate {
    let staff_id = resolved_staff_id(state);
    let mut estimate = DurationEstimate::default();

    for service in &state.selected_services {
        let seconds = staff_id
            .and_then(|id| service.staff_duration(id))
            .or_else(|| service.first_staff_duration())
            .unwrap_or_else(|| service.general_duration_secs());
        if seconds == 0 {
            estimate.unresolved.push(service.id);
        }
        estimate.total_seconds = estimate.total_seconds.saturating_add(seconds);
    }
    estimate
}

const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Localized rendering of the chosen date and time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedDateTime {
    pub date: String,
    pub time: String,
    pub full: String,
}

pub fn format_date_ru(date: NaiveDate) -> String {
    let month = MONTHS_GENITIVE[date.month0() as usize];
    format!("{} {} {} г.", date.day(), month, date.year())
}

pub fn formatted_date_time(state: &WizardState) -> Option<FormattedDateTime> {
    let date = state.selected_date?;
    let slot = state.selected_time.as_ref()?;
    let (hours, minutes) = slot.time.split_once(':')?;

    let date = format_date_ru(date);
    let time = format!("{}:{}", hours, minutes);
    let full = format!("{} в {}", date, time);
    Some(FormattedDateTime { date, time, full })
}

/// Drop slots that already started when `date` is today.
///
/// A slot is kept iff its hour is later than now, or the same hour with a
/// later minute. Slots with an unparseable time are dropped on today only.
pub fn filter_past_slots(
    slots: Vec<ScheduleSlot>,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Vec<ScheduleSlot> {
    if date != now.date() {
        return slots;
    }
    let (hour, minute) = (now.hour(), now.minute());
    slots
        .into_iter()
        .filter(|slot| match slot.hour_minute() {
            Some((h, m)) => h > hour || (h == hour && m > minute),
            None => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ServiceStaff;

    fn service(id: i64, price: u64, duration: u32) -> Service {
        Service {
            id: ServiceId(id),
            title: format!("service-{id}"),
            description: None,
            price_min: price,
            price_max: price,
            duration,
            category_id: None,
            image_url: None,
            staff: vec![],
        }
    }

    fn staff(id: i64) -> Staff {
        Staff { id: StaffId(id), name: format!("staff-{id}"), ..Staff::any() }
    }

    fn slot(time: &str, staff_id: i64) -> ScheduleSlot {
        ScheduleSlot {
            time: time.to_string(),
            datetime: format!("2026-10-18T{time}:00+03:00"),
            available: true,
            staff_id: StaffId(staff_id),
            staff_name: None,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn fully_selected() -> WizardState {
        let steps = StepSequence::standard();
        let mut state = WizardState::default();
        reduce(&mut state, &steps, Action::SelectService(service(1, 1000, 30)));
        state.staff = vec![staff(5)];
        reduce(&mut state, &steps, Action::SelectStaff(staff(5)));
        state.available_dates = vec![AvailableDate { date: date(18), slots_count: 3 }];
        reduce(&mut state, &steps, Action::SelectDate(date(18)));
        state.available_slots = vec![slot("15:00", 5)];
        reduce(&mut state, &steps, Action::SelectTime(slot("15:00", 5)));
        state
    }

    #[test]
    fn test_select_service_clears_downstream() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        let before = state.generation(LoadKind::Slots);

        reduce(&mut state, &steps, Action::SelectService(service(2, 500, 20)));

        assert_eq!(state.selected_services.len(), 1);
        assert!(state.selected_staff.is_none());
        assert!(state.selected_date.is_none());
        assert!(state.selected_time.is_none());
        assert!(state.staff.is_empty());
        assert!(state.available_dates.is_empty());
        assert!(state.available_slots.is_empty());
        assert!(state.generation(LoadKind::Slots) > before);
    }

    #[test]
    fn test_select_staff_clears_date_and_time() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();

        reduce(&mut state, &steps, Action::SelectStaff(staff(6)));

        assert_eq!(state.selected_staff.as_ref().map(|s| s.id), Some(StaffId(6)));
        assert!(state.selected_date.is_none());
        assert!(state.selected_time.is_none());
        assert!(state.available_dates.is_empty());
        assert!(state.available_slots.is_empty());
        assert_eq!(state.staff.len(), 1);
    }

    #[test]
    fn test_starting_at_is_idle() {
        let state = WizardState::starting_at(BookingStep::Staff);
        assert_eq!(state.current_step, BookingStep::Staff);
        assert!(!state.is_loading);
        assert_eq!(state.generation(LoadKind::Staff), 0);
    }

    #[test]
    fn test_deselect_staff_clears_date_and_time() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        let before = state.generation(LoadKind::Dates);

        reduce(&mut state, &steps, Action::DeselectStaff);

        assert!(state.selected_staff.is_none());
        assert!(state.selected_date.is_none());
        assert!(state.selected_time.is_none());
        assert!(state.available_slots.is_empty());
        assert!(state.generation(LoadKind::Dates) > before);
        assert_eq!(resolved_staff_id(&state), None);
    }

    #[test]
    fn test_select_date_clears_time_only() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();

        reduce(&mut state, &steps, Action::SelectDate(date(19)));

        assert!(state.selected_time.is_none());
        assert!(state.available_slots.is_empty());
        assert_eq!(state.available_dates.len(), 1);
        assert!(state.selected_staff.is_some());
    }

    #[test]
    fn test_selection_clears_error() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        state.error = Some("boom".to_string());
        reduce(&mut state, &steps, Action::SelectTime(slot("16:00", 5)));
        assert!(state.error.is_none());
    }

    #[test]
    fn test_toggle_service_adds_and_removes() {
        let steps = StepSequence::standard();
        let mut state = WizardState::default();
        reduce(&mut state, &steps, Action::ToggleService(service(1, 10000, 30)));
        reduce(&mut state, &steps, Action::ToggleService(service(2, 15000, 30)));
        assert_eq!(total_price(&state), 25000);

        reduce(&mut state, &steps, Action::ToggleService(service(1, 10000, 30)));
        assert_eq!(state.selected_services.len(), 1);
        assert_eq!(state.selected_services[0].id, ServiceId(2));
    }

    #[test]
    fn test_total_price_empty() {
        assert_eq!(total_price(&WizardState::default()), 0);
    }

    #[test]
    fn test_toggle_show_all_staff() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();

        let loads = reduce(&mut state, &steps, Action::ToggleShowAllStaff);
        assert!(state.show_all_staff);
        assert!(state.selected_staff.as_ref().is_some_and(Staff::is_any));
        assert!(state.selected_time.is_none());
        assert_eq!(loads, vec![LoadKind::Slots]);

        reduce(&mut state, &steps, Action::ToggleShowAllStaff);
        assert!(!state.show_all_staff);
        assert!(state.selected_staff.is_none());
    }

    #[test]
    fn test_next_step_gated() {
        let steps = StepSequence::standard();
        let mut state = WizardState::default();

        let loads = reduce(&mut state, &steps, Action::NextStep);
        assert_eq!(state.current_step, BookingStep::Service);
        assert!(loads.is_empty());

        reduce(&mut state, &steps, Action::SelectService(service(1, 100, 30)));
        let loads = reduce(&mut state, &steps, Action::NextStep);
        assert_eq!(state.current_step, BookingStep::Staff);
        assert_eq!(loads, vec![LoadKind::Staff]);
    }

    #[test]
    fn test_next_step_into_date_loads_dates() {
        let steps = StepSequence::with_date();
        let mut state = fully_selected();
        state.current_step = BookingStep::Staff;
        let loads = reduce(&mut state, &steps, Action::NextStep);
        assert_eq!(state.current_step, BookingStep::Date);
        assert_eq!(loads, vec![LoadKind::Dates]);
    }

    #[test]
    fn test_confirmation_never_goes_forward() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        state.client_info = Some(ClientInfo::default());
        state.current_step = BookingStep::Confirmation;

        assert!(!can_go_next(&state, &steps));
        reduce(&mut state, &steps, Action::NextStep);
        assert_eq!(state.current_step, BookingStep::Confirmation);
    }

    #[test]
    fn test_prev_and_go_to_step() {
        let steps = StepSequence::standard();
        let mut state = WizardState::default();
        assert!(!can_go_back(&state, &steps));
        reduce(&mut state, &steps, Action::PrevStep);
        assert_eq!(state.current_step, BookingStep::Service);

        reduce(&mut state, &steps, Action::GoToStep(BookingStep::Time));
        assert_eq!(state.current_step, BookingStep::Time);
        assert!(can_go_back(&state, &steps));

        // Not part of the standard sequence
        reduce(&mut state, &steps, Action::GoToStep(BookingStep::Date));
        assert_eq!(state.current_step, BookingStep::Time);

        reduce(&mut state, &steps, Action::PrevStep);
        assert_eq!(state.current_step, BookingStep::Staff);
    }

    #[test]
    fn test_is_step_complete_ignores_future_steps() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        state.current_step = BookingStep::Staff;

        assert!(is_step_complete(&state, &steps, BookingStep::Service));
        assert!(is_step_complete(&state, &steps, BookingStep::Staff));
        assert!(!is_step_complete(&state, &steps, BookingStep::Time));
        assert!(!is_step_complete(&state, &steps, BookingStep::Date));
    }

    #[test]
    fn test_progress_increases() {
        let steps = StepSequence::standard();
        let mut state = WizardState::default();
        assert_eq!(progress(&state, &steps), 25.0);
        state.current_step = BookingStep::Confirmation;
        assert_eq!(progress(&state, &steps), 100.0);
    }

    #[test]
    fn test_step_config() {
        let steps = StepSequence::standard();
        let state = WizardState::default();
        let config = step_config(&state, &steps).unwrap();
        assert_eq!(config.step, BookingStep::Service);
        assert!(!config.is_valid);
        assert!(!config.can_go_next);
        assert!(!config.can_go_back);
    }

    #[test]
    fn test_duration_general_fallback() {
        let mut state = WizardState::default();
        state.selected_services = vec![service(1, 100, 30)];
        state.selected_staff = Some(staff(42));
        assert_eq!(estimated_duration(&state).total_seconds, 1800);
    }

    #[test]
    fn test_duration_resolution_order() {
        let mut svc = service(1, 100, 30);
        svc.staff = vec![
            ServiceStaff { id: StaffId(4), seance_length: 2400 },
            ServiceStaff { id: StaffId(9), seance_length: 1200 },
        ];
        let mut state = WizardState::default();
        state.selected_services = vec![svc];

        state.selected_staff = Some(staff(9));
        assert_eq!(estimated_duration(&state).total_seconds, 1200);

        state.selected_staff = Some(staff(77));
        assert_eq!(estimated_duration(&state).total_seconds, 2400);

        // Any-staff: resolved through the chosen slot
        state.selected_staff = Some(Staff::any());
        state.selected_time = Some(slot("12:00", 9));
        assert_eq!(estimated_duration(&state).total_seconds, 1200);
    }

    #[test]
    fn test_duration_flags_unknown() {
        let mut state = WizardState::default();
        state.selected_services = vec![service(1, 100, 0), service(2, 100, 15)];
        let estimate = estimated_duration(&state);
        assert_eq!(estimate.total_seconds, 900);
        assert_eq!(estimate.unresolved, vec![ServiceId(1)]);
        assert!(!estimate.is_complete());
        assert_eq!(estimate.total_minutes(), None);
    }

    #[test]
    fn test_formatted_date_time() {
        let state = fully_selected();
        let formatted = formatted_date_time(&state).unwrap();
        assert_eq!(formatted.date, "18 октября 2026 г.");
        assert_eq!(formatted.time, "15:00");
        assert_eq!(formatted.full, "18 октября 2026 г. в 15:00");

        let mut partial = state.clone();
        partial.selected_time = None;
        assert!(formatted_date_time(&partial).is_none());
    }

    #[test]
    fn test_filter_past_slots_today() {
        let now = date(18).and_hms_opt(14, 5, 0).unwrap();
        let slots = vec![slot("14:00", 1), slot("14:10", 1), slot("15:00", 1)];
        let kept: Vec<String> =
            filter_past_slots(slots, date(18), now).into_iter().map(|s| s.time).collect();
        assert_eq!(kept, vec!["14:10", "15:00"]);
    }

    #[test]
    fn test_filter_past_slots_other_day() {
        let now = date(18).and_hms_opt(23, 59, 0).unwrap();
        let slots = vec![slot("09:00", 1), slot("10:00", 1)];
        assert_eq!(filter_past_slots(slots, date(19), now).len(), 2);
    }

    #[test]
    fn test_reset_supersedes_in_flight_loads() {
        let steps = StepSequence::standard();
        let mut state = fully_selected();
        let generation = state.begin_load(LoadKind::Services);
        assert!(state.is_loading);

        reduce(&mut state, &steps, Action::Reset);
        assert!(state.selected_services.is_empty());
        assert!(state.is_loading);

        assert!(!state.finish_load(LoadKind::Services, generation));
        assert!(!state.is_loading);
    }

    #[test]
    fn test_newer_load_supersedes_older() {
        let mut state = WizardState::default();
        let first = state.begin_load(LoadKind::Slots);
        let second = state.begin_load(LoadKind::Slots);

        assert!(state.finish_load(LoadKind::Slots, second));
        assert!(state.is_loading);
        assert!(!state.finish_load(LoadKind::Slots, first));
        assert!(!state.is_loading);
    }
}
