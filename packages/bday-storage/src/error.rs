#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Invalid stored data: {0}")]
	InvalidData(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
impl From<bday_domain::Error> for Error {
	fn from(err: bday_domain::Error) -> Self {
		Self::InvalidData(err.to_string())
	}
}
