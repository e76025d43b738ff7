//! View models for the three screens.
//!
//! Each model owns its form state behind a `parking_lot` lock and talks to
//! the backend through the shared service clients. Locks are never held
//! across an `.await`.

pub mod data_model;
pub mod forecast_model;
pub mod login_model;

pub use data_model::DataModel;
pub use forecast_model::ForecastModel;
pub use login_model::LoginModel;
