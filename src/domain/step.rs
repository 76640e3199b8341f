//! Wizard steps and the configurable step sequence
//!
//! The sequence is data: an ordered list of descriptors, each carrying the
//! validator that decides whether its step is satisfied. The flow
//! controller never branches on which steps are enabled.

use crate::domain::wizard::WizardState;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStep {
    #[default]
    Service,
    Staff,
    Date,
    Time,
    Confirmation,
}

impl BookingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStep::Service => "service",
            BookingStep::Staff => "staff",
            BookingStep::Date => "date",
            BookingStep::Time => "time",
            BookingStep::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for BookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStep {
    type Err = StepSequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(BookingStep::Service),
            "staff" => Ok(BookingStep::Staff),
            "date" => Ok(BookingStep::Date),
            "time" => Ok(BookingStep::Time),
            "confirmation" => Ok(BookingStep::Confirmation),
            other => Err(StepSequenceError::UnknownStep(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepSequenceError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),
    #[error("a step sequence needs at least two steps")]
    TooShort,
    #[error("first step must be 'service'")]
    MustStartWithService,
    #[error("last step must be 'confirmation'")]
    MustEndWithConfirmation,
    #[error("step '{0}' listed more than once")]
    Duplicate(BookingStep),
    #[error("step '{step}' must come after '{requires}'")]
    OutOfOrder { step: BookingStep, requires: BookingStep },
}

/// Steps whose lists are keyed on an earlier selection
const PREREQUISITES: [(BookingStep, BookingStep); 2] =
    [(BookingStep::Date, BookingStep::Staff), (BookingStep::Time, BookingStep::Date)];

pub type StepValidator = fn(&WizardState) -> bool;

fn service_selected(state: &WizardState) -> bool {
    !state.selected_services.is_empty()
}

fn staff_selected(state: &WizardState) -> bool {
    state.selected_staff.is_some()
}

fn date_selected(state: &WizardState) -> bool {
    state.selected_date.is_some()
}

fn time_selected(state: &WizardState) -> bool {
    state.selected_time.is_some()
}

fn client_provided(state: &WizardState) -> bool {
    state.client_info.is_some()
}

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub step: BookingStep,
    pub title: &'static str,
    pub subtitle: &'static str,
    validator: StepValidator,
}

impl StepDescriptor {
    pub fn for_step(step: BookingStep) -> Self {
        let (title, subtitle, validator): (&'static str, &'static str, StepValidator) = match step {
            BookingStep::Service => {
                ("Выберите услугу", "Какую услугу вы хотите получить?", service_selected)
            }
            BookingStep::Staff => {
                ("Выберите мастера", "К кому вы хотите записаться?", staff_selected)
            }
            BookingStep::Date => ("Выберите дату", "Когда вам удобно?", date_selected),
            BookingStep::Time => ("Выберите время", "Во сколько вам удобно?", time_selected),
            BookingStep::Confirmation => {
                ("Подтверждение", "Проверьте данные записи", client_provided)
            }
        };
        Self { step, title, subtitle, validator }
    }

    /// Whether this step's required selection is populated
    #[inline]
    pub fn is_valid(&self, state: &WizardState) -> bool {
        (self.validator)(state)
    }
}

/// Ordered, validated list of wizard steps
#[derive(Debug, Clone)]
pub struct StepSequence {
    steps: Vec<StepDescriptor>,
}

impl Default for StepSequence {
    fn default() -> Self {
        Self::standard()
    }
}

impl StepSequence {
    /// service → staff → time → confirmation
    pub fn standard() -> Self {
        Self::build(&[
            BookingStep::Service,
            BookingStep::Staff,
            BookingStep::Time,
            BookingStep::Confirmation,
        ])
    }

    /// service → staff → date → time → confirmation
    pub fn with_date() -> Self {
        Self::build(&[
            BookingStep::Service,
            BookingStep::Staff,
            BookingStep::Date,
            BookingStep::Time,
            BookingStep::Confirmation,
        ])
    }

    fn build(steps: &[BookingStep]) -> Self {
        Self { steps: steps.iter().copied().map(StepDescriptor::for_step).collect() }
    }

    pub fn from_steps(steps: &[BookingStep]) -> Result<Self, StepSequenceError> {
        if steps.len() < 2 {
            return Err(StepSequenceError::TooShort);
        }
        if steps[0] != BookingStep::Service {
            return Err(StepSequenceError::MustStartWithService);
        }
        if steps[steps.len() - 1] != BookingStep::Confirmation {
            return Err(StepSequenceError::MustEndWithConfirmation);
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].contains(step) {
                return Err(StepSequenceError::Duplicate(*step));
            }
        }
        // Date needs a staff member; time needs the date when a date step exists
        let position = |step: BookingStep| steps.iter().position(|s| *s == step);
        for (step, requires) in PREREQUISITES {
            let Some(at) = position(step) else { continue };
            let required = requires == BookingStep::Staff || position(requires).is_some();
            if required && position(requires).map_or(true, |before| before > at) {
                return Err(StepSequenceError::OutOfOrder { step, requires });
            }
        }
        Ok(Self::build(steps))
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, StepSequenceError> {
        let steps = names
            .iter()
            .map(|n| n.as_ref().parse::<BookingStep>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_steps(&steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> BookingStep {
        self.steps[0].step
    }

    pub fn last(&self) -> BookingStep {
        self.steps[self.steps.len() - 1].step
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepDescriptor> {
        self.steps.iter()
    }

    pub fn contains(&self, step: BookingStep) -> bool {
        self.index_of(step).is_some()
    }

    pub fn index_of(&self, step: BookingStep) -> Option<usize> {
        self.steps.iter().position(|d| d.step == step)
    }

    pub fn get(&self, step: BookingStep) -> Option<&StepDescriptor> {
        self.steps.iter().find(|d| d.step == step)
    }

    pub fn next_after(&self, step: BookingStep) -> Option<BookingStep> {
        let idx = self.index_of(step)?;
        self.steps.get(idx + 1).map(|d| d.step)
    }

    pub fn prev_before(&self, step: BookingStep) -> Option<BookingStep> {
        let idx = self.index_of(step)?;
        idx.checked_sub(1).map(|i| self.steps[i].step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let seq = StepSequence::standard();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.first(), BookingStep::Service);
        assert_eq!(seq.last(), BookingStep::Confirmation);
        assert_eq!(seq.next_after(BookingStep::Staff), Some(BookingStep::Time));
        assert!(!seq.contains(BookingStep::Date));
    }

    #[test]
    fn test_with_date_order() {
        let seq = StepSequence::with_date();
        assert_eq!(seq.next_after(BookingStep::Staff), Some(BookingStep::Date));
        assert_eq!(seq.prev_before(BookingStep::Time), Some(BookingStep::Date));
        assert_eq!(seq.prev_before(BookingStep::Service), None);
        assert_eq!(seq.next_after(BookingStep::Confirmation), None);
    }

    #[test]
    fn test_from_names() {
        let seq = StepSequence::from_names(&["service", "Staff", " date ", "time", "confirmation"])
            .unwrap();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.index_of(BookingStep::Date), Some(2));
    }

    #[test]
    fn test_rejects_bad_sequences() {
        assert_eq!(
            StepSequence::from_names(&["service", "haircut", "confirmation"]).unwrap_err(),
            StepSequenceError::UnknownStep("haircut".to_string())
        );
        assert_eq!(
            StepSequence::from_steps(&[BookingStep::Service]).unwrap_err(),
            StepSequenceError::TooShort
        );
        assert_eq!(
            StepSequence::from_steps(&[BookingStep::Staff, BookingStep::Confirmation])
                .unwrap_err(),
            StepSequenceError::MustStartWithService
        );
        assert_eq!(
            StepSequence::from_steps(&[BookingStep::Service, BookingStep::Time]).unwrap_err(),
            StepSequenceError::MustEndWithConfirmation
        );
        assert_eq!(
            StepSequence::from_steps(&[
                BookingStep::Service,
                BookingStep::Time,
                BookingStep::Time,
                BookingStep::Confirmation
            ])
            .unwrap_err(),
            StepSequenceError::Duplicate(BookingStep::Time)
        );
    }

    #[test]
    fn test_rejects_unreachable_order() {
        assert_eq!(
            StepSequence::from_names(&["service", "date", "staff", "time", "confirmation"])
                .unwrap_err(),
            StepSequenceError::OutOfOrder { step: BookingStep::Date, requires: BookingStep::Staff }
        );
        assert_eq!(
            StepSequence::from_names(&["service", "date", "time", "confirmation"]).unwrap_err(),
            StepSequenceError::OutOfOrder { step: BookingStep::Date, requires: BookingStep::Staff }
        );
        assert_eq!(
            StepSequence::from_names(&["service", "staff", "time", "date", "confirmation"])
                .unwrap_err(),
            StepSequenceError::OutOfOrder { step: BookingStep::Time, requires: BookingStep::Date }
        );
        // No date step: time fans out over staff on its own
        assert!(StepSequence::from_names(&["service", "time", "confirmation"]).is_ok());
    }

    #[test]
    fn test_descriptor_validators() {
        let mut state = WizardState::default();
        let staff = StepDescriptor::for_step(BookingStep::Staff);
        assert!(!staff.is_valid(&state));
        state.selected_staff = Some(crate::domain::types::Staff::any());
        assert!(staff.is_valid(&state));
        assert_eq!(staff.title, "Выберите мастера");
    }
}
