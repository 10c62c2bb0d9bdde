//! Shipping addresses owned by users.

use store::{Address, NewAddress, Store, StoreTx};

use crate::auth::Identity;
use crate::error::DomainError;

/// Input for creating an address.
#[derive(Debug, Clone, Default)]
pub struct AddressInput {
    pub label: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal: String,
    pub country: String,
    pub phone: String,
}

pub struct AddressService<S: Store> {
    store: S,
}

impl<S: Store> AddressService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saves a new address for the caller. Street and city are required.
    #[tracing::instrument(skip(self, identity, input), fields(user_id = %identity.user_id))]
    pub async fn create_address(
        &self,
        identity: &Identity,
        input: AddressInput,
    ) -> Result<Address, DomainError> {
        let street = input.street.trim().to_string();
        let city = input.city.trim().to_string();
        if street.is_empty() || city.is_empty() {
            return Err(DomainError::invalid("street and city are required"));
        }

        let mut tx = self.store.begin().await?;
        let address = tx
            .insert_address(NewAddress {
                user_id: identity.user_id,
                label: input.label,
                street,
                city,
                province: input.province,
                postal: input.postal,
                country: input.country,
                phone: input.phone,
            })
            .await?;
        tx.commit().await?;
        Ok(address)
    }

    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn list_addresses(&self, identity: &Identity) -> Result<Vec<Address>, DomainError> {
        let mut tx = self.store.begin().await?;
        let addresses = tx.list_addresses(identity.user_id).await?;
        tx.commit().await?;
        Ok(addresses)
    }
}
