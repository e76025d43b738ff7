//! Screens, navigation and the service container for the EpiDash front-end.

pub mod app;
pub mod chart;
pub mod error_mapping;
pub mod models;
pub mod router;

pub use app::AppServices;
pub use chart::render_chart;
pub use error_mapping::ToAppError;
pub use models::{DataModel, ForecastModel, LoginModel};
pub use router::{Decision, Navigator, Route, RouteGuard};
