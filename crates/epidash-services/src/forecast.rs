//! Forecast flow: fetch the recent window, then ask the model to predict.
//!
//! The two calls are strictly sequential because the prediction payload is
//! the window's values. A [`CancellationToken`] lets a newer submission
//! abandon an older one at either await point.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use epidash_core::ValidationError;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::data::DataClient;
use crate::error::{ForecastError, HttpError};
use crate::http::HttpClient;
use crate::types::{Dataset, DateRange, PredictRequest, PredictResponse, TimeSeriesPoint};

/// Dates and model for one forecast submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastPlan {
    dataset: Dataset,
    history: DateRange,
    prediction: DateRange,
}

impl ForecastPlan {
    /// Plan a forecast of `horizon` days starting `today`.
    ///
    /// The history window is the `window_days` days ending today.
    pub fn new(
        dataset: Dataset,
        today: NaiveDate,
        window_days: u32,
        horizon: u32,
        max_horizon: u32,
    ) -> Result<Self, ValidationError> {
        if horizon == 0 || horizon > max_horizon {
            return Err(ValidationError::new(
                "horizon",
                format!("must be between 1 and {} days", max_horizon),
            ));
        }
        if window_days == 0 {
            return Err(ValidationError::new("window_days", "must be at least 1"));
        }

        let window_start = today
            .checked_sub_days(Days::new(u64::from(window_days - 1)))
            .ok_or_else(|| ValidationError::new("window_days", "reaches before the calendar"))?;
        let horizon_end = today
            .checked_add_days(Days::new(u64::from(horizon - 1)))
            .ok_or_else(|| ValidationError::new("horizon", "reaches past the calendar"))?;

        Ok(Self {
            dataset,
            history: DateRange::new(window_start, today)?,
            prediction: DateRange::new(today, horizon_end)?,
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Range of the `/data` request
    pub fn history_range(&self) -> DateRange {
        self.history
    }

    /// Range of the `/predict` request
    pub fn prediction_range(&self) -> DateRange {
        self.prediction
    }

    pub fn horizon(&self) -> i64 {
        self.prediction.days()
    }

    /// Date the `i`-th forecast value to `today + i`, in order.
    pub fn points(&self, forecast: &[f64]) -> Vec<TimeSeriesPoint> {
        let today = self.prediction.begin();
        forecast
            .iter()
            .zip(0u64..)
            .filter_map(|(value, offset)| {
                today
                    .checked_add_days(Days::new(offset))
                    .map(|date| TimeSeriesPoint::new(date, *value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Arc<HttpClient>,
    data: DataClient,
}

impl ForecastClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            data: DataClient::new(http.clone()),
            http,
        }
    }

    /// `POST /predict` for `model` over `range` with input vector `x`.
    #[instrument(skip(self, x), fields(inputs = x.len()), level = "info")]
    pub async fn predict(
        &self,
        model: &str,
        range: DateRange,
        x: &[f64],
    ) -> Result<Vec<f64>, HttpError> {
        let [begin, end] = range.query();
        let params = [begin, end, ("model", model.to_string())];

        let response: PredictResponse = self
            .http
            .post_json("/predict", &PredictRequest { x }, &params)
            .await?;

        Ok(response.forecast)
    }

    /// Run the whole flow for `plan`.
    pub async fn run(&self, plan: &ForecastPlan) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
        self.run_cancellable(plan, &CancellationToken::new()).await
    }

    /// Run the flow, giving up with [`ForecastError::Superseded`] as soon as
    /// `cancel` fires. A result that arrives after cancellation is discarded.
    #[instrument(skip(self, plan, cancel), fields(dataset = %plan.dataset()), level = "info")]
    pub async fn run_cancellable(
        &self,
        plan: &ForecastPlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeriesPoint>, ForecastError> {
        let history = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForecastError::Superseded),
            result = self.data.fetch(plan.dataset(), plan.history_range()) => result?,
        };

        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        tracing::debug!("History window has {} values", values.len());

        let model = plan.dataset().model_name();
        let forecast = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForecastError::Superseded),
            result = self.predict(&model, plan.prediction_range(), &values) => result?,
        };

        if cancel.is_cancelled() {
            return Err(ForecastError::Superseded);
        }

        Ok(plan.points(&forecast))
    }
}
