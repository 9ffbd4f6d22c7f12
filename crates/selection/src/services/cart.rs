//! Remote cart client trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartId, Currency, TripId};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::SelectionError;
use crate::manifest::PassengerRecord;

/// A trip leg held in a remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub trip_id: TripId,
    #[serde(default)]
    pub passengers: usize,
}

/// A cart as reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    pub id: CartId,
    pub status: String,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Upstream answer to adding a trip to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTripResponse {
    /// Cart the trip ended up in; may differ from the one requested.
    pub cart_id: Option<CartId>,
    pub status: String,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Operations the orchestrator needs from the remote cart service.
#[async_trait]
pub trait CartClient: Send + Sync {
    /// Creates an empty cart priced in `currency`.
    async fn create_cart(&self, currency: &Currency) -> Result<RemoteCart, SelectionError>;

    /// Fetches a cart. Used to force upstream consistency before a write.
    async fn get_cart(
        &self,
        cart_id: &CartId,
        locale: &str,
        currency: &Currency,
    ) -> Result<RemoteCart, SelectionError>;

    /// Adds one trip leg for `passengers` to a cart.
    ///
    /// Fails with [`SelectionError::UpstreamCartInvalid`] when the cart
    /// reference is stale.
    async fn add_trip(
        &self,
        cart_id: &CartId,
        trip_id: &TripId,
        passengers: &[PassengerRecord],
    ) -> Result<AddTripResponse, SelectionError>;
}

#[async_trait]
impl<T: CartClient + ?Sized> CartClient for Arc<T> {
    async fn create_cart(&self, currency: &Currency) -> Result<RemoteCart, SelectionError> {
        (**self).create_cart(currency).await
    }

    async fn get_cart(
        &self,
        cart_id: &CartId,
        locale: &str,
        currency: &Currency,
    ) -> Result<RemoteCart, SelectionError> {
        (**self).get_cart(cart_id, locale, currency).await
    }

    async fn add_trip(
        &self,
        cart_id: &CartId,
        trip_id: &TripId,
        passengers: &[PassengerRecord],
    ) -> Result<AddTripResponse, SelectionError> {
        (**self).add_trip(cart_id, trip_id, passengers).await
    }
}

/// Scripted outcome for the next `add_trip` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddScript {
    Succeed,
    CartInvalid,
    Unavailable,
    /// Succeed, but place the trip in (and report) another cart.
    RedirectTo(CartId),
}

/// A call received by [`InMemoryCartClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartCall {
    Create {
        currency: Currency,
    },
    Get {
        cart_id: CartId,
    },
    Add {
        cart_id: CartId,
        trip_id: TripId,
        passengers: usize,
    },
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CartId, RemoteCart>,
    next_id: u32,
    add_script: VecDeque<AddScript>,
    fail_on_create: bool,
    fail_on_get: bool,
    add_gate: Option<Arc<Notify>>,
    calls: Vec<CartCall>,
}

impl InMemoryCartState {
    fn next_cart_id(&mut self) -> CartId {
        self.next_id += 1;
        CartId::new(format!("CART-{:04}", self.next_id))
    }
}

/// In-memory cart service for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartClient {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartClient {
    /// Creates a new in-memory cart service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of a future `add_trip` call. Calls beyond the
    /// queue succeed.
    pub fn script_add(&self, script: AddScript) {
        self.state.write().unwrap().add_script.push_back(script);
    }

    /// Configures the service to fail every create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the service to fail every get call.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Parks every `add_trip` call until the gate is notified.
    pub fn set_add_gate(&self, gate: Option<Arc<Notify>>) {
        self.state.write().unwrap().add_gate = gate;
    }

    /// Drops a cart, as if it expired upstream; later writes to it are
    /// rejected as invalid.
    pub fn expire_cart(&self, cart_id: &CartId) {
        self.state.write().unwrap().carts.remove(cart_id);
    }

    /// Returns every call received so far, in order.
    pub fn calls(&self) -> Vec<CartCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Returns the number of carts created (or redirected to) so far.
    pub fn cart_count(&self) -> usize {
        self.state.read().unwrap().carts.len()
    }

    /// Returns a cart by id, if it is live.
    pub fn cart(&self, cart_id: &CartId) -> Option<RemoteCart> {
        self.state.read().unwrap().carts.get(cart_id).cloned()
    }
}

#[async_trait]
impl CartClient for InMemoryCartClient {
    async fn create_cart(&self, currency: &Currency) -> Result<RemoteCart, SelectionError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(CartCall::Create {
            currency: currency.clone(),
        });

        if state.fail_on_create {
            return Err(SelectionError::UpstreamUnavailable(
                "cart creation rejected".to_string(),
            ));
        }

        let cart = RemoteCart {
            id: state.next_cart_id(),
            status: "open".to_string(),
            items: Vec::new(),
        };
        state.carts.insert(cart.id.clone(), cart.clone());
        Ok(cart)
    }

    async fn get_cart(
        &self,
        cart_id: &CartId,
        _locale: &str,
        _currency: &Currency,
    ) -> Result<RemoteCart, SelectionError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(CartCall::Get {
            cart_id: cart_id.clone(),
        });

        if state.fail_on_get {
            return Err(SelectionError::UpstreamUnavailable(
                "cart lookup failed".to_string(),
            ));
        }

        state
            .carts
            .get(cart_id)
            .cloned()
            .ok_or_else(|| SelectionError::UpstreamUnavailable(format!("cart {cart_id} not found")))
    }

    async fn add_trip(
        &self,
        cart_id: &CartId,
        trip_id: &TripId,
        passengers: &[PassengerRecord],
    ) -> Result<AddTripResponse, SelectionError> {
        let gate = {
            let mut state = self.state.write().unwrap();
            state.calls.push(CartCall::Add {
                cart_id: cart_id.clone(),
                trip_id: trip_id.clone(),
                passengers: passengers.len(),
            });
            state.add_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.write().unwrap();
        let script = state.add_script.pop_front().unwrap_or(AddScript::Succeed);
        let target = match script {
            AddScript::Succeed => cart_id.clone(),
            AddScript::CartInvalid => {
                return Err(SelectionError::UpstreamCartInvalid {
                    cart_id: cart_id.clone(),
                    reason: "cart expired".to_string(),
                });
            }
            AddScript::Unavailable => {
                return Err(SelectionError::UpstreamUnavailable(
                    "cart service returned 503".to_string(),
                ));
            }
            AddScript::RedirectTo(other) => {
                let items = state
                    .carts
                    .get(cart_id)
                    .map(|c| c.items.clone())
                    .unwrap_or_default();
                state.carts.entry(other.clone()).or_insert(RemoteCart {
                    id: other.clone(),
                    status: "open".to_string(),
                    items,
                });
                other
            }
        };

        let cart = state
            .carts
            .get_mut(&target)
            .ok_or_else(|| SelectionError::UpstreamCartInvalid {
                cart_id: target.clone(),
                reason: "cart not found".to_string(),
            })?;
        cart.items.push(CartItem {
            trip_id: trip_id.clone(),
            passengers: passengers.len(),
        });

        Ok(AddTripResponse {
            cart_id: Some(cart.id.clone()),
            status: cart.status.clone(),
            items: cart.items.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest;

    #[tokio::test]
    async fn test_create_and_add() {
        let client = InMemoryCartClient::new();
        let cart = client.create_cart(&Currency::default()).await.unwrap();
        assert_eq!(cart.id.as_str(), "CART-0001");

        let passengers = manifest::build(2, 0, &[], None);
        let response = client
            .add_trip(&cart.id, &TripId::new("T1"), &passengers)
            .await
            .unwrap();

        assert_eq!(response.cart_id, Some(cart.id.clone()));
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].passengers, 2);
        assert_eq!(client.cart(&cart.id).unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_cart_ids() {
        let client = InMemoryCartClient::new();
        let c1 = client.create_cart(&Currency::default()).await.unwrap();
        let c2 = client.create_cart(&Currency::default()).await.unwrap();
        assert_eq!(c1.id.as_str(), "CART-0001");
        assert_eq!(c2.id.as_str(), "CART-0002");
        assert_eq!(client.cart_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_invalidation_is_transient() {
        let client = InMemoryCartClient::new();
        let cart = client.create_cart(&Currency::default()).await.unwrap();
        client.script_add(AddScript::CartInvalid);

        let result = client.add_trip(&cart.id, &TripId::new("T1"), &[]).await;
        assert!(matches!(
            result,
            Err(SelectionError::UpstreamCartInvalid { .. })
        ));
        assert!(client.cart(&cart.id).is_some());

        let retried = client.add_trip(&cart.id, &TripId::new("T1"), &[]).await;
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn test_expired_cart_rejects_writes() {
        let client = InMemoryCartClient::new();
        let cart = client.create_cart(&Currency::default()).await.unwrap();
        client.expire_cart(&cart.id);

        let result = client.add_trip(&cart.id, &TripId::new("T1"), &[]).await;
        assert!(matches!(
            result,
            Err(SelectionError::UpstreamCartInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_reports_other_cart() {
        let client = InMemoryCartClient::new();
        let cart = client.create_cart(&Currency::default()).await.unwrap();
        client.script_add(AddScript::RedirectTo(CartId::new("CART-MOVED")));

        let response = client
            .add_trip(&cart.id, &TripId::new("T1"), &[])
            .await
            .unwrap();
        assert_eq!(response.cart_id, Some(CartId::new("CART-MOVED")));
        assert!(client.cart(&CartId::new("CART-MOVED")).is_some());
    }

    #[tokio::test]
    async fn test_get_unknown_cart_is_unavailable() {
        let client = InMemoryCartClient::new();
        let result = client
            .get_cart(&CartId::new("nope"), "en", &Currency::default())
            .await;
        assert!(matches!(
            result,
            Err(SelectionError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_call_log() {
        let client = InMemoryCartClient::new();
        client.set_fail_on_create(true);
        let _ = client.create_cart(&Currency::new("eur")).await;

        assert_eq!(
            client.calls(),
            vec![CartCall::Create {
                currency: Currency::new("EUR")
            }]
        );
    }
}
