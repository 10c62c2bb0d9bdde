//! Shared application state.

use std::sync::Arc;

use domain::{
    AddressService, AuthService, CartService, CatalogService, CategoryService, OrderService,
    ReviewService, TokenSigner,
};
use store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub auth: AuthService<S>,
    pub catalog: CatalogService<S>,
    pub categories: CategoryService<S>,
    pub reviews: ReviewService<S>,
    pub carts: CartService<S>,
    pub addresses: AddressService<S>,
    pub orders: OrderService<S>,
}

/// Wires every service to one store handle.
pub fn create_state<S: Store + Clone + 'static>(store: S, signer: TokenSigner) -> Arc<AppState<S>> {
    Arc::new(AppState {
        auth: AuthService::new(store.clone(), signer),
        catalog: CatalogService::new(store.clone()),
        categories: CategoryService::new(store.clone()),
        reviews: ReviewService::new(store.clone()),
        carts: CartService::new(store.clone()),
        addresses: AddressService::new(store.clone()),
        orders: OrderService::new(store),
    })
}
