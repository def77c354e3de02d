pub mod birthday;
pub mod status;

mod error;

pub use birthday::{
	Birthday, MonthDayRange, Occurrence, days_since_last_occurrence, days_until_next_occurrence,
	occurrence_in_year,
};
pub use error::{Error, Result};
pub use status::{NotificationStatus, StatusEvent, transition};
