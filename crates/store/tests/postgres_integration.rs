//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use store::{
    Money, NewAddress, NewCategory, NewOrder, NewProduct, NewReview, NewUser, OrderLine,
    OrderStatus, PostgresStore, Product, ProductUpdate, StockDecrement, Store, StoreError, StoreTx,
    User,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE reviews, order_lines, orders, cart_lines, carts, addresses, products, categories, users",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_user(store: &PostgresStore, name: &str) -> User {
    let mut tx = store.begin().await.unwrap();
    let user = tx
        .insert_user(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            is_admin: false,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    user
}

async fn seed_product(store: &PostgresStore, price: i64, stock: i64) -> Product {
    let mut tx = store.begin().await.unwrap();
    let product = tx
        .insert_product(NewProduct {
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            price: Money::from_cents(price),
            stock_on_hand: stock,
            is_active: true,
            category_id: None,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    product
}

#[tokio::test]
async fn user_uniqueness_is_enforced() {
    let store = get_test_store().await;
    seed_user(&store, "alice").await;

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .insert_user(NewUser {
            username: "alice2".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
        })
        .await;

    match result {
        Err(StoreError::UniqueViolation(constraint)) => {
            assert_eq!(constraint, "users_email_key")
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[tokio::test]
async fn uncommitted_writes_are_discarded() {
    let store = get_test_store().await;

    let product_id = {
        let mut tx = store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: "Ghost".to_string(),
                description: String::new(),
                price: Money::from_cents(100),
                stock_on_hand: 1,
                is_active: true,
                category_id: None,
            })
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        product.id
    };

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_product(product_id).await.unwrap().is_none());
}

#[tokio::test]
async fn product_update_and_listing() {
    let store = get_test_store().await;
    let first = seed_product(&store, 1000, 5).await;
    let second = seed_product(&store, 2000, 1).await;

    let mut tx = store.begin().await.unwrap();
    let updated = tx
        .update_product(
            first.id,
            ProductUpdate {
                price: Some(Money::from_cents(1500)),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price.cents(), 1500);
    assert_eq!(updated.stock_on_hand, 5);
    assert!(!updated.is_active);

    let active = tx.list_products(true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
    assert_eq!(tx.list_products(false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn negative_stock_is_rejected_by_constraint() {
    let store = get_test_store().await;
    let product = seed_product(&store, 1000, 5).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .update_product(
            product.id,
            ProductUpdate {
                stock_on_hand: Some(-1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(StoreError::CheckViolation(_))));
}

#[tokio::test]
async fn guarded_decrement() {
    let store = get_test_store().await;
    let product = seed_product(&store, 1000, 3).await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.decrement_stock(product.id, 2).await.unwrap(),
        StockDecrement::Decremented { remaining: 1 }
    );
    assert_eq!(
        tx.decrement_stock(product.id, 2).await.unwrap(),
        StockDecrement::Insufficient { available: 1 }
    );
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let product = tx.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock_on_hand, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_decrements_cannot_oversell() {
    let store = get_test_store().await;
    let product = seed_product(&store, 1000, 1).await;

    // First transaction takes the last unit and holds the row lock.
    let mut first = store.begin().await.unwrap();
    assert_eq!(
        first.decrement_stock(product.id, 1).await.unwrap(),
        StockDecrement::Decremented { remaining: 0 }
    );

    // Second transaction blocks on the row lock until the first commits.
    let contender = store.clone();
    let product_id = product.id;
    let second = tokio::spawn(async move {
        let mut tx = contender.begin().await.unwrap();
        let outcome = tx.decrement_stock(product_id, 1).await.unwrap();
        tx.commit().await.unwrap();
        outcome
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    first.commit().await.unwrap();

    let outcome = second.await.unwrap();
    assert_eq!(outcome, StockDecrement::Insufficient { available: 0 });

    let mut tx = store.begin().await.unwrap();
    let product = tx.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock_on_hand, 0);
}

#[tokio::test]
async fn cart_lines_merge_and_clear() {
    let store = get_test_store().await;
    let user = seed_user(&store, "alice").await;
    let product = seed_product(&store, 1000, 10).await;

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_cart(user.id).await.unwrap().is_none());

    let cart_id = tx.ensure_cart(user.id).await.unwrap();
    assert_eq!(tx.ensure_cart(user.id).await.unwrap(), cart_id);
    assert_eq!(tx.add_cart_line(cart_id, product.id, 2).await.unwrap(), 2);
    assert_eq!(tx.add_cart_line(cart_id, product.id, 3).await.unwrap(), 5);

    let cart = tx.get_cart(user.id).await.unwrap().unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 5);

    assert_eq!(tx.clear_cart(cart_id).await.unwrap(), 1);
    assert!(tx.get_cart(user.id).await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn orders_keep_line_snapshots() {
    let store = get_test_store().await;
    let user = seed_user(&store, "alice").await;
    let a = seed_product(&store, 1000, 5).await;
    let b = seed_product(&store, 2000, 1).await;

    let mut tx = store.begin().await.unwrap();
    let address = tx
        .insert_address(NewAddress {
            user_id: user.id,
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let order = tx
        .insert_order(NewOrder {
            user_id: user.id,
            address_id: address.id,
            total: Money::from_cents(5500),
            shipping_cost: Money::from_cents(500),
            shipping_method: "standard".to_string(),
            payment_method: "transfer".to_string(),
            lines: vec![
                OrderLine {
                    product_id: a.id,
                    quantity: 3,
                    unit_price: a.price,
                },
                OrderLine {
                    product_id: b.id,
                    quantity: 1,
                    unit_price: b.price,
                },
            ],
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.update_product(
        a.id,
        ProductUpdate {
            price: Some(Money::from_cents(9999)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let loaded = tx.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.total.cents(), 5500);
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.lines[0].product_id, a.id);
    assert_eq!(loaded.lines[0].unit_price.cents(), 1000);
    assert_eq!(loaded.lines[1].quantity, 1);

    assert!(
        tx.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap()
    );
    assert!(
        !tx.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Canceled)
            .await
            .unwrap()
    );

    let mine = tx.list_orders(Some(user.id)).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].lines.len(), 2);
    assert_eq!(tx.list_orders(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn address_lookup_is_scoped_to_owner() {
    let store = get_test_store().await;
    let alice = seed_user(&store, "alice").await;
    let bob = seed_user(&store, "bob").await;

    let mut tx = store.begin().await.unwrap();
    let address = tx
        .insert_address(NewAddress {
            user_id: alice.id,
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(
        tx.get_address(address.id, alice.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(tx.get_address(address.id, bob.id).await.unwrap().is_none());
}

#[tokio::test]
async fn categories_count_and_detach_products() {
    let store = get_test_store().await;
    let product = seed_product(&store, 1000, 5).await;

    let mut tx = store.begin().await.unwrap();
    let category = tx
        .insert_category(NewCategory {
            name: "Lamps".to_string(),
            slug: "lamps".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(category.product_count, 0);

    let updated = tx
        .update_product(
            product.id,
            ProductUpdate {
                category_id: Some(Some(category.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.category_id, Some(category.id));
    assert_eq!(updated.price.cents(), 1000);

    let listed = tx.list_categories().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].product_count, 1);

    let renamed = tx
        .update_category(
            category.id,
            NewCategory {
                name: "Desk lamps".to_string(),
                slug: "desk-lamps".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.slug, "desk-lamps");
    assert_eq!(renamed.product_count, 1);

    assert!(tx.delete_category(category.id).await.unwrap());
    let product = tx.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.category_id, None);
    assert!(tx.get_category(category.id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_category_slug_is_rejected() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();
    tx.insert_category(NewCategory {
        name: "Lamps".to_string(),
        slug: "lamps".to_string(),
    })
    .await
    .unwrap();

    let result = tx
        .insert_category(NewCategory {
            name: "LAMPS".to_string(),
            slug: "lamps".to_string(),
        })
        .await;
    match result {
        Err(StoreError::UniqueViolation(constraint)) => {
            assert_eq!(constraint, "categories_slug_key")
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[tokio::test]
async fn reviews_join_author_and_enforce_constraints() {
    let store = get_test_store().await;
    let alice = seed_user(&store, "alice").await;
    let product = seed_product(&store, 1000, 5).await;

    let mut tx = store.begin().await.unwrap();
    let review = tx
        .insert_review(NewReview {
            product_id: product.id,
            user_id: alice.id,
            rating: 5,
            comment: "Great".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(review.username, "alice");
    assert_eq!(review.rating, 5);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let duplicate = tx
        .insert_review(NewReview {
            product_id: product.id,
            user_id: alice.id,
            rating: 1,
            comment: String::new(),
        })
        .await;
    assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let out_of_range = tx.update_review(review.id, 6, String::new()).await;
    assert!(matches!(out_of_range, Err(StoreError::CheckViolation(_))));
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let updated = tx
        .update_review(review.id, 3, "Dimmer than hoped".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.rating, 3);
    assert_eq!(updated.username, "alice");
    assert_eq!(tx.list_reviews(product.id).await.unwrap(), vec![updated]);

    assert!(tx.delete_review(review.id).await.unwrap());
    assert!(tx.list_reviews(product.id).await.unwrap().is_empty());
}
