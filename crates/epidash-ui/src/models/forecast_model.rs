use chrono::{Local, NaiveDate};
use epidash_core::ForecastConfig;
use epidash_services::{Dataset, ForecastClient, ForecastError, ForecastPlan, TimeSeriesPoint};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error_mapping::request_error_text;

struct ForecastState {
    dataset: Dataset,
    horizon: u32,
    points: Vec<TimeSeriesPoint>,
    error_message: Option<String>,
    loading: bool,
    current: CancellationToken,
}

/// Forecast screen.
pub struct ForecastModel {
    client: ForecastClient,
    window_days: u32,
    max_horizon: u32,
    state: Mutex<ForecastState>,
}

impl ForecastModel {
    pub fn new(client: ForecastClient, config: &ForecastConfig, dataset: Dataset) -> Self {
        Self {
            client,
            window_days: config.window_days,
            max_horizon: config.max_horizon,
            state: Mutex::new(ForecastState {
                dataset,
                horizon: 1,
                points: Vec::new(),
                error_message: None,
                loading: false,
                current: CancellationToken::new(),
            }),
        }
    }

    pub fn set_dataset(&self, dataset: Dataset) {
        self.state.lock().dataset = dataset;
    }

    pub fn dataset(&self) -> Dataset {
        self.state.lock().dataset
    }

    /// Out-of-range values are accepted here and rejected on submit.
    pub fn set_horizon(&self, horizon: u32) {
        self.state.lock().horizon = horizon;
    }

    pub fn horizon(&self) -> u32 {
        self.state.lock().horizon
    }

    pub fn max_horizon(&self) -> u32 {
        self.max_horizon
    }

    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.state.lock().points.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.lock().error_message.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Forecast from today's local date.
    pub async fn forecast(&self) -> Result<usize, ForecastError> {
        self.forecast_on(Local::now().date_naive()).await
    }

    /// Run the forecast flow as of `today`.
    ///
    /// Starting a new forecast cancels the one in flight, so the chart
    /// always reflects the most recent submission.
    pub async fn forecast_on(&self, today: NaiveDate) -> Result<usize, ForecastError> {
        let (plan, cancel) = {
            let mut state = self.state.lock();
            let plan = match ForecastPlan::new(
                state.dataset,
                today,
                self.window_days,
                state.horizon,
                self.max_horizon,
            ) {
                Ok(plan) => plan,
                Err(e) => {
                    state.error_message = Some(e.to_string());
                    return Err(e.into());
                }
            };
            state.current.cancel();
            state.current = CancellationToken::new();
            state.loading = true;
            state.error_message = None;
            (plan, state.current.clone())
        };

        let result = self.client.run_cancellable(&plan, &cancel).await;

        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            return Err(ForecastError::Superseded);
        }
        state.loading = false;
        match result {
            Ok(points) => {
                let count = points.len();
                state.points = points;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Forecast failed: {}", e);
                state.error_message = Some(request_error_text(&e));
                Err(e)
            }
        }
    }
}
