//! Remote cart service clients.

pub mod cart;
pub mod http;

pub use cart::{
    AddScript, AddTripResponse, CartCall, CartClient, CartItem, InMemoryCartClient, RemoteCart,
};
pub use http::HttpCartClient;
