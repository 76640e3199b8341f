//! Local checks run on a booking payload before it is sent

use crate::domain::error::{BookingError, Field, Result};
use crate::domain::types::{BookingPayload, ClientInfo};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Russian numbers with or without the country prefix
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (10..=11).contains(&digits)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

pub fn is_valid_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}

/// Contact details only, checked as they are entered at confirmation
pub fn validate_client(client: &ClientInfo) -> Result<()> {
    if !is_valid_name(&client.name) {
        return Err(BookingError::validation(Field::ClientName, "Укажите корректное имя"));
    }
    if !is_valid_phone(&client.phone) {
        return Err(BookingError::validation(
            Field::ClientPhone,
            "Укажите корректный номер телефона",
        ));
    }
    if let Some(email) = client.email.as_deref().filter(|e| !e.is_empty()) {
        if !is_valid_email(email) {
            return Err(BookingError::validation(Field::ClientEmail, "Укажите корректный email"));
        }
    }
    Ok(())
}

/// Checks run in a fixed order; the first failing field is reported.
pub fn validate_booking_payload(payload: &BookingPayload) -> Result<()> {
    if payload.service_ids.is_empty() {
        return Err(BookingError::validation(Field::Service, "Не выбрана услуга"));
    }
    if payload.staff_id.is_any() {
        return Err(BookingError::validation(Field::Staff, "Не выбран мастер"));
    }
    if payload.datetime.trim().is_empty() {
        return Err(BookingError::validation(Field::Datetime, "Не выбрано время"));
    }
    validate_client(&payload.client)
}
