//! HTTP API server for the shop backend.
//!
//! Provides REST endpoints for accounts, catalog, reviews, carts, addresses
//! and checkout, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{addresses, auth, cart, categories, orders, products, reviews, system};

    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health))
        .route("/auth/register", post(auth::register::<S>))
        .route("/auth/login", post(auth::login::<S>))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route(
            "/products",
            get(products::list::<S>).post(products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(products::get::<S>).patch(products::update::<S>),
        )
        .route(
            "/products/{id}/reviews",
            get(reviews::list::<S>).post(reviews::create::<S>),
        )
        .route(
            "/reviews/{id}",
            get(reviews::get::<S>)
                .put(reviews::update::<S>)
                .delete(reviews::delete::<S>),
        )
        .route(
            "/categories",
            get(categories::list::<S>).post(categories::create::<S>),
        )
        .route(
            "/categories/{id}",
            get(categories::get::<S>)
                .put(categories::rename::<S>)
                .delete(categories::delete::<S>),
        )
        .route("/cart", get(cart::get::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(cart::update_item::<S>).delete(cart::remove_item::<S>),
        )
        .route(
            "/addresses",
            get(addresses::list::<S>).post(addresses::create::<S>),
        )
        .route("/orders", get(orders::list::<S>).post(orders::place::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
        .route("/admin/orders", get(orders::list_all::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
