//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use domain::TokenSigner;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryStore, Money, NewProduct, NewUser, Store, StoreTx};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    store: InMemoryStore,
    state: Arc<api::AppState<InMemoryStore>>,
}

fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let signer = TokenSigner::new("test-secret", Duration::hours(1));
    let state = api::create_state(store.clone(), signer);
    let app = api::create_app(state.clone(), get_metrics_handle());
    TestApp { app, store, state }
}

impl TestApp {
    /// Creates a user directly in the store and returns a session token.
    async fn user(&self, name: &str, is_admin: bool) -> String {
        let mut tx = self.store.begin().await.unwrap();
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
        self.state.auth.issue_session(&user).unwrap().token
    }

    async fn product(&self, name: &str, price: i64, stock: i64) -> String {
        let mut tx = self.store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Money::from_cents(price),
                stock_on_hand: stock,
                is_active: true,
                category_id: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        product.id.to_string()
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn address(&self, token: &str) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/addresses",
                Some(token),
                Some(json!({ "street": "1 Main St", "city": "Springfield" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    async fn add_to_cart(&self, token: &str, product_id: &str, quantity: u32) {
        let (status, _) = self
            .send(
                "POST",
                "/cart/items",
                Some(token),
                Some(json!({ "product_id": product_id, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn checkout(&self, token: &str, address_id: &str, shipping: i64) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/orders",
            Some(token),
            Some(json!({
                "address_id": address_id,
                "shipping_method": "standard",
                "payment_method": "bank_transfer",
                "shipping_cost": shipping,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn register_login_and_me() {
        let app = setup();

        let (status, json) = app
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["user"]["email"], "alice@example.com");
        assert_eq!(json["token_type"], "Bearer");

        let (status, _) = app
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "username": "alice",
                    "email": "other@example.com",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = json["token"].as_str().unwrap().to_string();

        let (status, json) = app.send("GET", "/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["is_admin"], false);

        let (status, _) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "username": "alice", "password": "wrong password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_with_username_and_email_fields_together() {
        let app = setup();
        let (status, _) = app
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "username": "alice",
                    "email": "Alice@Example.com",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({
                    "username": "alice",
                    "email": "Alice@Example.com",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["email"], "alice@example.com");

        let (status, json) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "password": "correct horse battery" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn session_cookie_authenticates() {
        let app = setup();
        let token = app.user("alice", false).await;

        let request = Request::builder()
            .uri("/me")
            .header(header::COOKIE, format!("theme=dark; auth_token={token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _) = app.send("POST", "/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let app = setup();

        let (status, json) = app.send("GET", "/cart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].as_str().is_some());

        let (status, _) = app.send("GET", "/orders", Some("not.a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn only_admins_manage_products() {
        let app = setup();
        let customer = app.user("alice", false).await;
        let admin = app.user("admin", true).await;
        let body = json!({ "name": "Lamp", "price": 2500, "stock_on_hand": 4 });

        let (status, _) = app
            .send("POST", "/products", Some(&customer), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app
            .send("POST", "/products", Some(&admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["price"], 2500);
        let id = created["id"].as_str().unwrap();

        let (status, updated) = app
            .send(
                "PATCH",
                &format!("/products/{id}"),
                Some(&admin),
                Some(json!({ "price": 2000 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 2000);
        assert_eq!(updated["stock_on_hand"], 4);

        let (status, listed) = app.send("GET", "/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn product_lookup_errors() {
        let app = setup();

        let (status, _) = app.send("GET", "/products/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(
                "GET",
                &format!("/products/{}", uuid::Uuid::new_v4()),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn successful_checkout() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let address = app.address(&alice).await;
        let a = app.product("A", 1000, 5).await;
        let b = app.product("B", 2000, 1).await;
        app.add_to_cart(&alice, &a, 3).await;
        app.add_to_cart(&alice, &b, 1).await;

        let (status, cart) = app.send("GET", "/cart", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["subtotal"], 5000);

        let (status, placed) = app.checkout(&alice, &address, 500).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(placed["total"], 5500);
        let order_id = placed["order_id"].as_str().unwrap();

        let (_, cart) = app.send("GET", "/cart", Some(&alice), None).await;
        assert!(cart["items"].as_array().unwrap().is_empty());

        let (_, product_a) = app.send("GET", &format!("/products/{a}"), None, None).await;
        assert_eq!(product_a["stock_on_hand"], 2);
        let (_, product_b) = app.send("GET", &format!("/products/{b}"), None, None).await;
        assert_eq!(product_b["stock_on_hand"], 0);

        let (status, order) = app
            .send("GET", &format!("/orders/{order_id}"), Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "pending");
        assert_eq!(order["shipping_cost"], 500);
        assert_eq!(order["lines"].as_array().unwrap().len(), 2);

        let (_, orders) = app.send("GET", "/orders", Some(&alice), None).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);

        let (status, _) = app.checkout(&alice, &address, 500).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, metrics) = {
            let request = Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap();
            let response = app.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, String::from_utf8(bytes.to_vec()).unwrap())
        };
        assert_eq!(status, StatusCode::OK);
        assert!(metrics.contains("orders_placed_total"));
    }

    #[tokio::test]
    async fn insufficient_stock_is_a_conflict() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let address = app.address(&alice).await;
        let c = app.product("C", 1000, 2).await;
        app.add_to_cart(&alice, &c, 5).await;

        let (status, json) = app.checkout(&alice, &address, 0).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let message = json["error"].as_str().unwrap();
        assert!(message.contains("'C'"));
        assert!(message.contains("Available: 2"));
        assert!(message.contains("Requested: 5"));

        let (_, cart) = app.send("GET", "/cart", Some(&alice), None).await;
        assert_eq!(cart["items"][0]["quantity"], 5);
    }

    #[tokio::test]
    async fn malformed_order_bodies_are_bad_requests() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let address = app.address(&alice).await;

        let (status, json) = app
            .send(
                "POST",
                "/orders",
                Some(&alice),
                Some(json!({ "address_id": address })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some());

        let (status, json) = app
            .send(
                "POST",
                "/orders",
                Some(&alice),
                Some(json!({
                    "address_id": address,
                    "shipping_method": "standard",
                    "payment_method": "bank_transfer",
                    "shipping_cost": "five",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some());

        let request = Request::builder()
            .method("POST")
            .uri("/orders")
            .header(header::AUTHORIZATION, format!("Bearer {alice}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_cart_and_bad_addresses() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let bob = app.user("bob", false).await;
        let alice_address = app.address(&alice).await;
        let bob_address = app.address(&bob).await;

        let (status, _) = app.checkout(&alice, &alice_address, 0).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let widget = app.product("Widget", 100, 10).await;
        app.add_to_cart(&alice, &widget, 1).await;

        let (status, _) = app.checkout(&alice, &bob_address, 0).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.checkout(&alice, "not-a-uuid", 0).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.checkout(&alice, &alice_address, -100).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod order_management {
    use super::*;

    async fn placed_order(app: &TestApp, token: &str) -> String {
        let address = app.address(token).await;
        let product = app.product("Widget", 1000, 10).await;
        app.add_to_cart(token, &product, 1).await;
        let (status, placed) = app.checkout(token, &address, 0).await;
        assert_eq!(status, StatusCode::CREATED);
        placed["order_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn orders_are_private_to_owner_and_admin() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let bob = app.user("bob", false).await;
        let admin = app.user("admin", true).await;
        let order_id = placed_order(&app, &alice).await;

        let (status, _) = app
            .send("GET", &format!("/orders/{order_id}"), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send("GET", &format!("/orders/{order_id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.send("GET", "/admin/orders", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, all) = app.send("GET", "/admin/orders", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_moves_order_through_statuses() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let admin = app.user("admin", true).await;
        let order_id = placed_order(&app, &alice).await;
        let uri = format!("/orders/{order_id}/status");

        let (status, _) = app
            .send("PUT", &uri, Some(&alice), Some(json!({ "status": "processing" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send("PUT", &uri, Some(&admin), Some(json!({ "status": "teleported" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send("PUT", &uri, Some(&admin), Some(json!({ "status": "completed" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, order) = app
            .send("PUT", &uri, Some(&admin), Some(json!({ "status": "processing" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "processing");

        let (status, order) = app
            .send("PUT", &uri, Some(&admin), Some(json!({ "status": "canceled" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "canceled");
    }
}

mod categories_and_reviews {
    use super::*;

    #[tokio::test]
    async fn products_are_browsed_by_category() {
        let app = setup();
        let admin = app.user("admin", true).await;
        let customer = app.user("alice", false).await;

        let (status, _) = app
            .send(
                "POST",
                "/categories",
                Some(&customer),
                Some(json!({ "name": "Lamps" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, category) = app
            .send(
                "POST",
                "/categories",
                Some(&admin),
                Some(json!({ "name": "Desk Lamps" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(category["slug"], "desk-lamps");
        let category_id = category["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(
                "POST",
                "/categories",
                Some(&admin),
                Some(json!({ "name": "desk lamps" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, lamp) = app
            .send(
                "POST",
                "/products",
                Some(&admin),
                Some(json!({
                    "name": "Lamp",
                    "price": 2500,
                    "stock_on_hand": 4,
                    "category_id": category_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lamp["category_id"], category_id.as_str());
        app.product("Rug", 9000, 1).await;

        let (status, filtered) = app
            .send(
                "GET",
                &format!("/products?category={category_id}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filtered.as_array().unwrap().len(), 1);
        assert_eq!(filtered[0]["name"], "Lamp");

        let (_, listed) = app.send("GET", "/categories", None, None).await;
        assert_eq!(listed[0]["product_count"], 1);

        let lamp_id = lamp["id"].as_str().unwrap();
        let (status, detached) = app
            .send(
                "PATCH",
                &format!("/products/{lamp_id}"),
                Some(&admin),
                Some(json!({ "category_id": null })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(detached["category_id"].is_null());

        let (status, _) = app
            .send(
                "DELETE",
                &format!("/categories/{category_id}"),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(
                "GET",
                &format!("/products?category={category_id}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn review_lifecycle() {
        let app = setup();
        let alice = app.user("alice", false).await;
        let bob = app.user("bob", false).await;
        let admin = app.user("admin", true).await;
        let product = app.product("Lamp", 2500, 4).await;
        let reviews_uri = format!("/products/{product}/reviews");

        let (status, _) = app
            .send(
                "POST",
                &reviews_uri,
                Some(&alice),
                Some(json!({ "rating": 6 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, review) = app
            .send(
                "POST",
                &reviews_uri,
                Some(&alice),
                Some(json!({ "rating": 4, "comment": "Bright enough" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["username"], "alice");
        let review_uri = format!("/reviews/{}", review["id"].as_str().unwrap());

        let (status, _) = app
            .send(
                "POST",
                &reviews_uri,
                Some(&alice),
                Some(json!({ "rating": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send("PUT", &review_uri, Some(&bob), Some(json!({ "rating": 1 })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, edited) = app
            .send(
                "PUT",
                &review_uri,
                Some(&alice),
                Some(json!({ "rating": 3, "comment": "Flickers" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["rating"], 3);

        let (status, listed) = app.send("GET", &reviews_uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = app.send("DELETE", &review_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send("DELETE", &review_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.send("GET", &review_uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(
                "GET",
                &format!("/products/{}/reviews", uuid::Uuid::new_v4()),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
