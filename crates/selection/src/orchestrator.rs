//! Leg orchestrator: provisions a remote cart and writes one or two legs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{CartId, Currency, SelectionId, TripId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectionError};
use crate::events::{
    CartData, CompletedData, FailedData, InvalidatedData, Leg, LegAddedData, OrchestrationEvent,
    RedirectData, StartedData, TransitionData,
};
use crate::manifest::PassengerRecord;
use crate::observer::{OrchestrationObserver, TracingObserver};
use crate::request::{ResolvedLegs, SelectionRequest};
use crate::services::cart::{AddTripResponse, CartClient};
use crate::state::{OrchestrationState, StepOutcome};

/// Locale used for consistency reads when none is configured.
pub const DEFAULT_LOCALE: &str = "en";

/// Pause before retrying an invalidated return leg.
pub const DEFAULT_RETURN_LEG_BACKOFF: Duration = Duration::from_millis(600);

/// Tuning for [`LegOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub locale: String,
    pub return_leg_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            return_leg_backoff: DEFAULT_RETURN_LEG_BACKOFF,
        }
    }
}

/// Result of a successful orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationOutcome {
    pub selection_id: SelectionId,
    pub cart_id: CartId,
    pub status: String,
    pub item_count: usize,
    pub leg_count: usize,
    pub is_round_trip: bool,
    pub outbound_trip_id: TripId,
    pub return_trip_id: Option<TripId>,
}

/// Mutable context of one run. The working cart may be replaced mid-flow.
struct Run<'a> {
    selection_id: SelectionId,
    legs: ResolvedLegs,
    currency: &'a Currency,
    passengers: &'a [PassengerRecord],
    working_cart: Option<CartId>,
    last_add: Option<AddTripResponse>,
}

impl Run<'_> {
    fn working_cart(&self) -> Result<CartId> {
        self.working_cart.clone().ok_or_else(|| {
            SelectionError::UpstreamUnavailable("no cart acquired for selection".to_string())
        })
    }

    fn return_trip(&self) -> Result<&TripId> {
        self.legs.inbound.as_ref().ok_or_else(|| {
            SelectionError::ValidationFailed("return leg requested without trip id".to_string())
        })
    }
}

/// Drives the leg orchestration state machine against a [`CartClient`].
///
/// Each call to [`orchestrate`](Self::orchestrate) is one sequential task;
/// the only suspension points are the cart client calls and the return-leg
/// backoff.
pub struct LegOrchestrator<C: CartClient> {
    client: C,
    config: OrchestratorConfig,
    observer: Arc<dyn OrchestrationObserver>,
}

impl<C: CartClient> LegOrchestrator<C> {
    /// Creates an orchestrator with default config and a tracing observer.
    pub fn new(client: C) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    pub fn with_config(client: C, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the observer sink.
    pub fn with_observer(mut self, observer: Arc<dyn OrchestrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Provisions a fresh cart holding the request's leg(s).
    ///
    /// Fails with `ValidationFailed` before any upstream call if the request
    /// names no trip.
    #[tracing::instrument(skip(self, request, passengers), fields(passengers = passengers.len()))]
    pub async fn orchestrate(
        &self,
        request: &SelectionRequest,
        passengers: &[PassengerRecord],
    ) -> Result<OrchestrationOutcome> {
        let legs = request.resolve_legs()?;
        let round_trip = legs.is_round_trip();
        let mut run = Run {
            selection_id: SelectionId::new(),
            legs,
            currency: &request.currency,
            passengers,
            working_cart: None,
            last_add: None,
        };

        self.emit(OrchestrationEvent::Started(StartedData {
            selection_id: run.selection_id,
            key: run.legs.dedupe_key(),
            round_trip,
            started_at: Utc::now(),
        }));

        let mut state = OrchestrationState::Acquiring;
        while state != OrchestrationState::Complete {
            let result = match state {
                OrchestrationState::Acquiring => self.acquire(&mut run).await,
                OrchestrationState::AddingOutbound => self.add_outbound(&mut run).await,
                OrchestrationState::RecoveringOutbound => self.recover_outbound(&mut run).await,
                OrchestrationState::AddingReturn => self.add_return(&mut run).await,
                OrchestrationState::RecoveringReturn => self.recover_return(&mut run).await,
                OrchestrationState::Complete | OrchestrationState::Failed => break,
            };

            let next = state.transition(StepOutcome::of(&result), round_trip);
            self.emit(OrchestrationEvent::Transitioned(TransitionData {
                selection_id: run.selection_id,
                from: state,
                to: next,
            }));

            if let Err(err) = result {
                if next == OrchestrationState::Failed {
                    self.emit(OrchestrationEvent::Failed(FailedData {
                        selection_id: run.selection_id,
                        state,
                        code: err.code().to_string(),
                        error: err.to_string(),
                        failed_at: Utc::now(),
                    }));
                    return Err(err);
                }
                if next.is_recovering() {
                    let leg = if next == OrchestrationState::RecoveringOutbound {
                        Leg::Outbound
                    } else {
                        Leg::Return
                    };
                    metrics::counter!("cart_recoveries_total", "leg" => leg.as_str())
                        .increment(1);
                }
            }
            state = next;
        }

        self.complete(run)
    }

    fn complete(&self, run: Run<'_>) -> Result<OrchestrationOutcome> {
        let response = run.last_add.ok_or_else(|| {
            SelectionError::UpstreamUnavailable("no leg was added to the cart".to_string())
        })?;
        let cart_id = match (response.cart_id, run.working_cart) {
            (Some(id), _) | (None, Some(id)) => id,
            (None, None) => {
                return Err(SelectionError::UpstreamUnavailable(
                    "upstream reported no cart id".to_string(),
                ));
            }
        };

        let outcome = OrchestrationOutcome {
            selection_id: run.selection_id,
            cart_id,
            status: response.status,
            item_count: response.items.len(),
            leg_count: run.legs.leg_count(),
            is_round_trip: run.legs.is_round_trip(),
            outbound_trip_id: run.legs.outbound,
            return_trip_id: run.legs.inbound,
        };

        self.emit(OrchestrationEvent::Completed(CompletedData {
            selection_id: outcome.selection_id,
            cart_id: outcome.cart_id.clone(),
            leg_count: outcome.leg_count,
            completed_at: Utc::now(),
        }));
        Ok(outcome)
    }

    /// Always starts from a brand-new cart.
    async fn acquire(&self, run: &mut Run<'_>) -> Result<()> {
        let cart = self.client.create_cart(run.currency).await?;
        self.emit(OrchestrationEvent::CartAcquired(CartData {
            selection_id: run.selection_id,
            cart_id: cart.id.clone(),
            replacement: false,
        }));
        run.working_cart = Some(cart.id);
        Ok(())
    }

    async fn add_outbound(&self, run: &mut Run<'_>) -> Result<()> {
        let cart_id = run.working_cart()?;
        let trip_id = run.legs.outbound.clone();
        self.add_leg(run, Leg::Outbound, &cart_id, &trip_id).await
    }

    /// Swaps in a new cart, confirms it is live, and retries the outbound leg.
    async fn recover_outbound(&self, run: &mut Run<'_>) -> Result<()> {
        let cart = self.client.create_cart(run.currency).await?;
        self.emit(OrchestrationEvent::CartAcquired(CartData {
            selection_id: run.selection_id,
            cart_id: cart.id.clone(),
            replacement: true,
        }));
        let live = self
            .client
            .get_cart(&cart.id, &self.config.locale, run.currency)
            .await?;
        run.working_cart = Some(live.id.clone());

        let trip_id = run.legs.outbound.clone();
        self.add_leg(run, Leg::Outbound, &live.id, &trip_id).await
    }

    async fn add_return(&self, run: &mut Run<'_>) -> Result<()> {
        let cart_id = run.working_cart()?;
        self.client
            .get_cart(&cart_id, &self.config.locale, run.currency)
            .await?;

        let trip_id = run.return_trip()?.clone();
        self.add_leg(run, Leg::Return, &cart_id, &trip_id).await
    }

    async fn recover_return(&self, run: &mut Run<'_>) -> Result<()> {
        tokio::time::sleep(self.config.return_leg_backoff).await;
        self.add_return(run).await
    }

    async fn add_leg(
        &self,
        run: &mut Run<'_>,
        leg: Leg,
        cart_id: &CartId,
        trip_id: &TripId,
    ) -> Result<()> {
        let response = match self.client.add_trip(cart_id, trip_id, run.passengers).await {
            Ok(response) => response,
            Err(SelectionError::UpstreamCartInvalid { cart_id, reason }) => {
                self.emit(OrchestrationEvent::CartInvalidated(InvalidatedData {
                    selection_id: run.selection_id,
                    leg,
                    cart_id: cart_id.clone(),
                    reason: reason.clone(),
                }));
                return Err(SelectionError::UpstreamCartInvalid { cart_id, reason });
            }
            Err(err) => return Err(err),
        };

        // The upstream may file the leg under another cart; its word wins.
        if let Some(reported) = &response.cart_id
            && reported != cart_id
        {
            self.emit(OrchestrationEvent::CartRedirected(RedirectData {
                selection_id: run.selection_id,
                from: cart_id.clone(),
                to: reported.clone(),
            }));
            run.working_cart = Some(reported.clone());
        }

        self.emit(OrchestrationEvent::LegAdded(LegAddedData {
            selection_id: run.selection_id,
            leg,
            cart_id: response.cart_id.clone().unwrap_or_else(|| cart_id.clone()),
            item_count: response.items.len(),
        }));
        run.last_add = Some(response);
        Ok(())
    }

    fn emit(&self, event: OrchestrationEvent) {
        self.observer.on_event(&event);
    }
}
