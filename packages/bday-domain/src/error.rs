use crate::status::{NotificationStatus, StatusEvent};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Malformed birthdate: {message}")]
	MalformedBirthdate { message: String },
	#[error("Cannot apply {event} to a {from} notification.")]
	InvalidTransition { from: NotificationStatus, event: StatusEvent },
	#[error("Unknown notification status {value:?}.")]
	UnknownStatus { value: String },
}
