//! Backend access for EpiDash: the HTTP client adapter, the auth controller
//! and the data/forecast clients built on it.

pub mod auth;
pub mod data;
pub mod error;
pub mod forecast;
pub mod http;
pub mod types;

pub use auth::{AuthController, LOGIN_FAILED_MESSAGE, REGISTER_FAILED_MESSAGE};
pub use data::DataClient;
pub use error::{AuthFailure, ErrorPayload, ForecastError, HttpError};
pub use forecast::{ForecastClient, ForecastPlan};
pub use http::{AuthEvent, HttpClient};
pub use types::{Dataset, DateRange, TimeSeriesPoint};
