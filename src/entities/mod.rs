pub mod client;
pub mod customer_issue;
pub mod email_notification;
pub mod note;
pub mod prediction;
pub mod user;

pub use client::{Client, Contact};
pub use customer_issue::CustomerIssue;
pub use email_notification::{EmailNotification, NotificationStatus};
pub use note::Note;
pub use prediction::{CustomerIncidentPrediction, IncidentType};
pub use user::{User, UserRole};
