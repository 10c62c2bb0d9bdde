//! Fixtures shared by the service tests.

use store::{
    Address, InMemoryStore, Money, NewAddress, NewProduct, NewUser, Product, ProductId, Store,
    StoreTx,
};

use crate::auth::Identity;

pub(crate) async fn seed_user(store: &InMemoryStore, name: &str, is_admin: bool) -> Identity {
    let mut tx = store.begin().await.unwrap();
    let user = tx
        .insert_user(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "unused".to_string(),
            is_admin,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    Identity {
        user_id: user.id,
        email: user.email,
        is_admin,
    }
}

pub(crate) async fn seed_product(
    store: &InMemoryStore,
    name: &str,
    price_cents: i64,
    stock: i64,
) -> Product {
    let mut tx = store.begin().await.unwrap();
    let product = tx
        .insert_product(NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(price_cents),
            stock_on_hand: stock,
            is_active: true,
            category_id: None,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    product
}

pub(crate) async fn seed_address(store: &InMemoryStore, owner: &Identity) -> Address {
    let mut tx = store.begin().await.unwrap();
    let address = tx
        .insert_address(NewAddress {
            user_id: owner.user_id,
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    address
}

pub(crate) async fn stock_of(store: &InMemoryStore, id: ProductId) -> i64 {
    let mut tx = store.begin().await.unwrap();
    tx.get_product(id).await.unwrap().unwrap().stock_on_hand
}
