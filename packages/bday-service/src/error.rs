use bday_domain::{NotificationStatus, StatusEvent};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Cannot apply {event} to a {from} notification.")]
	InvalidTransition { from: NotificationStatus, event: StatusEvent },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<bday_storage::Error> for Error {
	fn from(err: bday_storage::Error) -> Self {
		match err {
			bday_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			bday_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			bday_storage::Error::InvalidData(message) => Self::Storage { message },
			bday_storage::Error::NotFound(message) => Self::NotFound { message },
			bday_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}
impl From<bday_domain::Error> for Error {
	fn from(err: bday_domain::Error) -> Self {
		match err {
			bday_domain::Error::InvalidTransition { from, event } =>
				Self::InvalidTransition { from, event },
			other => Self::InvalidRequest { message: other.to_string() },
		}
	}
}
