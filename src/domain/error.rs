//! Booking error taxonomy
//!
//! Every failure the booking core can observe maps to one variant here.
//! The `Display` text is the user-facing (ru-RU) message the wizard stores
//! in its error slot, so it must stay short and human readable.

use thiserror::Error;

/// Payload field that failed local validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Service,
    Staff,
    Datetime,
    ClientName,
    ClientPhone,
    ClientEmail,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Service => "service_id",
            Field::Staff => "staff_id",
            Field::Datetime => "datetime",
            Field::ClientName => "client.name",
            Field::ClientPhone => "client.phone",
            Field::ClientEmail => "client.email",
        }
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    /// Rejected before any network call
    #[error("{message}")]
    Validation { field: Field, message: String },

    /// No response from the backend (connect failure, timeout)
    #[error("Не удалось связаться с сервером. Проверьте подключение к интернету.")]
    Network(#[source] reqwest::Error),

    /// Backend answered with a 5xx status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Backend answered with a 4xx status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Domain rule violated (no staff resolvable, slot taken, ...)
    #[error("{0}")]
    Business(String),

    /// Response body did not match the expected shape
    #[error("Некорректный ответ сервера")]
    Decode(#[source] serde_json::Error),

    /// Local persistent storage failure
    #[error("Ошибка локального хранилища: {0}")]
    Storage(String),

    /// Operation-level message wrapping the underlying failure
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<BookingError>,
    },
}

impl BookingError {
    pub fn validation(field: Field, message: impl Into<String>) -> Self {
        BookingError::Validation { field, message: message.into() }
    }

    /// Replace the user-facing message, keeping `self` as the source
    pub fn context(self, message: impl Into<String>) -> Self {
        BookingError::Context { message: message.into(), source: Box::new(self) }
    }

    /// Network failures and 5xx responses may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            BookingError::Network(_) | BookingError::Server { .. } => true,
            BookingError::Context { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// HTTP status of a backend rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BookingError::Server { status, .. } | BookingError::Api { status, .. } => Some(*status),
            BookingError::Context { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Offending payload field for validation failures
    pub fn field(&self) -> Option<Field> {
        match self {
            BookingError::Validation { field, .. } => Some(*field),
            BookingError::Context { source, .. } => source.field(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
