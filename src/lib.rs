pub mod analytics;
pub mod charts;
pub mod error;
pub mod export;
pub mod filter;
pub mod normalize;
pub mod report;
pub mod service;
pub mod store;

use analytics::{compute_metrics_with, AggregateMetrics, TrendGranularity};
use charts::{ChartManager, ChartRenderer};
use error::{ChartRenderError, DataLoadError};
use service::DataService;

/// Application context tying the data service to the chart boundary.
/// Constructed once by the entry point (CLI, request handler, UI
/// bootstrap) and passed where needed; there is no ambient singleton.
pub struct Dashboard<R: ChartRenderer> {
    pub service: DataService,
    charts: ChartManager<R>,
    granularity: TrendGranularity,
}

impl<R: ChartRenderer> Dashboard<R> {
    pub fn new(service: DataService, renderer: R) -> Self {
        Self {
            service,
            charts: ChartManager::new(renderer),
            granularity: TrendGranularity::default(),
        }
    }

    pub fn with_granularity(mut self, granularity: TrendGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// One-time chart setup; awaited before the first update.
    pub async fn initialize(&self) -> Result<(), ChartRenderError> {
        self.charts.initialize_charts().await
    }

    /// Reload from disk, then refresh every dashboard section.
    pub async fn refresh(&mut self) -> Result<AggregateMetrics, DataLoadError> {
        self.service.load_data().await?;
        Ok(self.update_dashboard().await)
    }

    /// Recompute aggregates over the filtered view and push them to the
    /// charts, awaiting the (serialized) render. A chart failure is
    /// logged and absorbed so metrics and tables still update.
    pub async fn update_dashboard(&mut self) -> AggregateMetrics {
        let metrics = compute_metrics_with(self.service.filtered_data(), self.granularity);
        if let Err(err) = self
            .charts
            .update_charts(&metrics, self.service.filtered_data())
            .await
        {
            log::warn!("chart update failed: {err}");
        }
        metrics
    }
}
