use tokio::sync::Mutex;

use crate::analytics::AggregateMetrics;
use crate::error::ChartRenderError;
use crate::store::models::ResponseRecord;

/// Boundary contract for the chart rendering backend. The pipeline only
/// depends on this two-phase protocol: one awaited initialization, then
/// idempotent re-renders with fresh aggregates.
pub trait ChartRenderer: Send {
    fn initialize(&mut self) -> Result<(), ChartRenderError>;

    fn render(
        &mut self,
        metrics: &AggregateMetrics,
        records: &[ResponseRecord],
    ) -> Result<(), ChartRenderError>;
}

/// Renderer for headless contexts; accepts every update and draws
/// nothing.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl ChartRenderer for NullRenderer {
    fn initialize(&mut self) -> Result<(), ChartRenderError> {
        Ok(())
    }

    fn render(
        &mut self,
        _metrics: &AggregateMetrics,
        _records: &[ResponseRecord],
    ) -> Result<(), ChartRenderError> {
        Ok(())
    }
}

struct ChartState<R> {
    renderer: R,
    initialized: bool,
}

/// Serializes access to the renderer: updates are asynchronous but never
/// overlap, and initialization happens exactly once.
pub struct ChartManager<R: ChartRenderer> {
    state: Mutex<ChartState<R>>,
}

impl<R: ChartRenderer> ChartManager<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            state: Mutex::new(ChartState {
                renderer,
                initialized: false,
            }),
        }
    }

    /// One-time setup; further calls are no-ops.
    pub async fn initialize_charts(&self) -> Result<(), ChartRenderError> {
        let mut state = self.state.lock().await;
        if state.initialized {
            return Ok(());
        }
        state.renderer.initialize()?;
        state.initialized = true;
        Ok(())
    }

    /// Re-render with a fresh filtered set. The lock is the in-flight
    /// guard: a second caller awaits the running update instead of
    /// rendering over it.
    pub async fn update_charts(
        &self,
        metrics: &AggregateMetrics,
        records: &[ResponseRecord],
    ) -> Result<(), ChartRenderError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(ChartRenderError::NotInitialized);
        }
        state.renderer.render(metrics, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::compute_metrics;

    #[derive(Default)]
    struct CountingRenderer {
        initializations: usize,
        renders: usize,
        fail_next_render: bool,
    }

    impl ChartRenderer for CountingRenderer {
        fn initialize(&mut self) -> Result<(), ChartRenderError> {
            self.initializations += 1;
            Ok(())
        }

        fn render(
            &mut self,
            _metrics: &AggregateMetrics,
            _records: &[ResponseRecord],
        ) -> Result<(), ChartRenderError> {
            if self.fail_next_render {
                self.fail_next_render = false;
                return Err(ChartRenderError::Backend("boom".to_string()));
            }
            self.renders += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn update_before_initialize_is_an_error() {
        let manager = ChartManager::new(CountingRenderer::default());
        let metrics = compute_metrics(&[]);

        let err = manager.update_charts(&metrics, &[]).await.unwrap_err();
        assert!(matches!(err, ChartRenderError::NotInitialized));
    }

    #[tokio::test]
    async fn initialization_happens_once() {
        let manager = ChartManager::new(CountingRenderer::default());
        manager.initialize_charts().await.unwrap();
        manager.initialize_charts().await.unwrap();

        let state = manager.state.lock().await;
        assert_eq!(state.renderer.initializations, 1);
    }

    #[tokio::test]
    async fn concurrent_updates_serialize_and_all_complete() {
        let manager = ChartManager::new(CountingRenderer::default());
        manager.initialize_charts().await.unwrap();
        let metrics = compute_metrics(&[]);

        let (first, second) = tokio::join!(
            manager.update_charts(&metrics, &[]),
            manager.update_charts(&metrics, &[]),
        );
        first.unwrap();
        second.unwrap();

        let state = manager.state.lock().await;
        assert_eq!(state.renderer.renders, 2);
    }

    #[tokio::test]
    async fn a_failed_render_does_not_poison_the_manager() {
        let manager = ChartManager::new(CountingRenderer {
            fail_next_render: true,
            ..Default::default()
        });
        manager.initialize_charts().await.unwrap();
        let metrics = compute_metrics(&[]);

        assert!(manager.update_charts(&metrics, &[]).await.is_err());
        manager.update_charts(&metrics, &[]).await.unwrap();
    }
}
