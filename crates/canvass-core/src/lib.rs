//! Core types, services, and the storage trait for Canvass questionnaires.
//!
//! Free of HTTP and database dependencies; backends implement
//! [`store::SurveyStore`] and transports call the services.

pub mod directory;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod page;
pub mod principal;
pub mod questionnaire;
pub mod recorder;
pub mod report;
pub mod store;
pub mod submission;

pub use error::{Error, ErrorKind, IntoCore, Result};
