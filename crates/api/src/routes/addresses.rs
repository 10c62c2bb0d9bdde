//! Address book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::AddressInput;
use serde::{Deserialize, Serialize};
use store::{Address, Store};

use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateAddressRequest {
    #[serde(default)]
    pub label: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub id: String,
    pub label: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal: String,
    pub country: String,
    pub phone: String,
}

impl From<Address> for AddressResponse {
    fn from(address: Address) -> Self {
        Self {
            id: address.id.to_string(),
            label: address.label,
            street: address.street,
            city: address.city,
            province: address.province,
            postal: address.postal,
            country: address.country,
            phone: address.phone,
        }
    }
}

/// GET /addresses
#[tracing::instrument(skip(state, identity))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<AddressResponse>>, ApiError> {
    let addresses = state.addresses.list_addresses(&identity).await?;
    Ok(Json(addresses.into_iter().map(Into::into).collect()))
}

/// POST /addresses
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(identity): CurrentUser,
    JsonBody(req): JsonBody<CreateAddressRequest>,
) -> Result<(StatusCode, Json<AddressResponse>), ApiError> {
    let address = state
        .addresses
        .create_address(
            &identity,
            AddressInput {
                label: req.label,
                street: req.street,
                city: req.city,
                province: req.province,
                postal: req.postal,
                country: req.country,
                phone: req.phone,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(address.into())))
}
