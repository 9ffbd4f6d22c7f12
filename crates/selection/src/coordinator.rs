//! Entry point for trip selection: admission, manifest, orchestration, response.

use std::sync::Arc;

use crate::assembler::{self, SelectionResponse};
use crate::dedupe::DedupeGuard;
use crate::error::{Result, SelectionError};
use crate::manifest;
use crate::observer::OrchestrationObserver;
use crate::orchestrator::{LegOrchestrator, OrchestratorConfig};
use crate::request::SelectionRequest;
use crate::services::cart::CartClient;

/// Runs `selectTrip` requests.
///
/// Identical concurrent selections are rejected through the shared
/// [`DedupeGuard`]; the guard is injected so several coordinators (or tests)
/// can share or isolate it.
pub struct SelectionCoordinator<C: CartClient> {
    orchestrator: LegOrchestrator<C>,
    dedupe: DedupeGuard,
}

impl<C: CartClient> SelectionCoordinator<C> {
    /// Creates a coordinator with its own guard and default config.
    pub fn new(client: C) -> Self {
        Self::with_parts(LegOrchestrator::new(client), DedupeGuard::new())
    }

    /// Creates a coordinator from an orchestrator and a guard.
    pub fn with_parts(orchestrator: LegOrchestrator<C>, dedupe: DedupeGuard) -> Self {
        Self {
            orchestrator,
            dedupe,
        }
    }

    /// Creates a coordinator with explicit config and observer.
    pub fn with_config(
        client: C,
        config: OrchestratorConfig,
        observer: Arc<dyn OrchestrationObserver>,
        dedupe: DedupeGuard,
    ) -> Self {
        let orchestrator = LegOrchestrator::with_config(client, config).with_observer(observer);
        Self::with_parts(orchestrator, dedupe)
    }

    pub fn dedupe(&self) -> &DedupeGuard {
        &self.dedupe
    }

    pub fn orchestrator(&self) -> &LegOrchestrator<C> {
        &self.orchestrator
    }

    /// Selects one or two legs into a fresh remote cart.
    ///
    /// The dedupe key is released on every exit path, including panics and
    /// cancellation of the returned future.
    #[tracing::instrument(skip(self, request))]
    pub async fn select_trip(&self, request: &SelectionRequest) -> Result<SelectionResponse> {
        metrics::counter!("trip_selections_total").increment(1);
        let started = std::time::Instant::now();

        let legs = request.validate()?;
        let key = legs.dedupe_key();
        let Some(_permit) = self.dedupe.admit(key.clone()) else {
            metrics::counter!("trip_selections_rejected_total").increment(1);
            tracing::debug!(%key, "identical selection already in flight");
            return Err(SelectionError::DuplicateInFlight { key });
        };

        let passengers = manifest::build_for(&request.passengers);
        let result = self.orchestrator.orchestrate(request, &passengers).await;

        metrics::histogram!("trip_selection_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match result {
            Ok(outcome) => {
                metrics::counter!("trip_selections_completed").increment(1);
                tracing::info!(
                    %key,
                    cart_id = %outcome.cart_id,
                    legs = outcome.leg_count,
                    "trip selected"
                );
                Ok(assembler::assemble(&outcome))
            }
            Err(err) => {
                metrics::counter!("trip_selections_failed", "reason" => err.code()).increment(1);
                Err(err)
            }
        }
    }
}
