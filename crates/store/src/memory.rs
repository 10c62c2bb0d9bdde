use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Address, AddressId, Cart, CartId, CartLine, Category, CategoryId, NewAddress, NewCategory,
    NewOrder, NewProduct, NewReview, NewUser, Order, OrderId, OrderStatus, Product, ProductId,
    ProductUpdate, Result, Review, ReviewId, StockDecrement, StoreError, User, UserId,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    categories: Vec<Category>,
    reviews: Vec<Review>,
    addresses: Vec<Address>,
    carts: HashMap<UserId, CartId>,
    cart_lines: HashMap<CartId, Vec<CartLine>>,
    orders: Vec<Order>,
}

impl Tables {
    fn product_mut(&mut self, id: ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    fn require_product(&self, id: ProductId) -> Result<()> {
        if self.products.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "product {id} does not exist"
            )))
        }
    }

    fn require_category(&self, id: Option<CategoryId>) -> Result<()> {
        match id {
            Some(id) if !self.categories.iter().any(|c| c.id == id) => Err(
                StoreError::ForeignKeyViolation(format!("category {id} does not exist")),
            ),
            _ => Ok(()),
        }
    }

    fn with_product_count(&self, category: &Category) -> Category {
        let product_count = self
            .products
            .iter()
            .filter(|p| p.category_id == Some(category.id))
            .count() as i64;
        Category {
            product_count,
            ..category.clone()
        }
    }

    fn require_user(&self, id: UserId) -> Result<()> {
        if self.users.iter().any(|u| u.id == id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "user {id} does not exist"
            )))
        }
    }

    fn require_cart(&self, id: CartId) -> Result<()> {
        if self.carts.values().any(|c| *c == id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "cart {id} does not exist"
            )))
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_clear_cart: AtomicBool,
}

/// In-memory store implementation for testing and local runs.
///
/// A transaction holds the store lock for its whole lifetime and works on a
/// private copy of the tables, which replaces the shared tables on commit.
/// Transactions are therefore fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `clear_cart` call fail until reset.
    pub fn set_fail_on_clear_cart(&self, fail: bool) {
        self.faults.fail_on_clear_cart.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }
}

/// A unit of work against an [`InMemoryStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn commit(self) -> Result<()> {
        let InMemoryTx {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let tables = &mut self.working;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let record = User {
            id: UserId::new(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        if product.stock_on_hand < 0 {
            return Err(StoreError::CheckViolation(
                "products_stock_non_negative".to_string(),
            ));
        }
        self.working.require_category(product.category_id)?;

        let now = Utc::now();
        let record = Product {
            id: ProductId::new(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock_on_hand: product.stock_on_hand,
            is_active: product.is_active,
            category_id: product.category_id,
            created_at: now,
            updated_at: now,
        };
        self.working.products.push(record.clone());
        Ok(record)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&mut self, active_only: bool) -> Result<Vec<Product>> {
        Ok(self
            .working
            .products
            .iter()
            .rev()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect())
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        if let Some(category_id) = update.category_id {
            self.working.require_category(category_id)?;
        }
        let Some(product) = self.working.product_mut(id) else {
            return Ok(None);
        };

        if let Some(stock) = update.stock_on_hand
            && stock < 0
        {
            return Err(StoreError::CheckViolation(
                "products_stock_non_negative".to_string(),
            ));
        }

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock_on_hand {
            product.stock_on_hand = stock;
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }
        if let Some(category_id) = update.category_id {
            product.category_id = category_id;
        }
        product.updated_at = Utc::now();

        Ok(Some(product.clone()))
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockDecrement> {
        let product = self.working.product_mut(id).ok_or_else(|| {
            StoreError::ForeignKeyViolation(format!("product {id} does not exist"))
        })?;

        let quantity = i64::from(quantity);
        if product.stock_on_hand < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock_on_hand,
            });
        }

        product.stock_on_hand -= quantity;
        product.updated_at = Utc::now();
        Ok(StockDecrement::Decremented {
            remaining: product.stock_on_hand,
        })
    }

    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        if self.working.categories.iter().any(|c| c.slug == category.slug) {
            return Err(StoreError::UniqueViolation(
                "categories_slug_key".to_string(),
            ));
        }

        let now = Utc::now();
        let record = Category {
            id: CategoryId::new(),
            name: category.name,
            slug: category.slug,
            product_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.working.categories.push(record.clone());
        Ok(record)
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let tables = &self.working;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.with_product_count(c)))
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>> {
        let tables = &self.working;
        Ok(tables
            .categories
            .iter()
            .map(|c| tables.with_product_count(c))
            .collect())
    }

    async fn update_category(
        &mut self,
        id: CategoryId,
        category: NewCategory,
    ) -> Result<Option<Category>> {
        let tables = &mut self.working;
        if tables
            .categories
            .iter()
            .any(|c| c.slug == category.slug && c.id != id)
        {
            return Err(StoreError::UniqueViolation(
                "categories_slug_key".to_string(),
            ));
        }

        let Some(record) = tables.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        record.name = category.name;
        record.slug = category.slug;
        record.updated_at = Utc::now();

        let record = record.clone();
        Ok(Some(tables.with_product_count(&record)))
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        let tables = &mut self.working;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        if tables.categories.len() == before {
            return Ok(false);
        }

        for product in tables
            .products
            .iter_mut()
            .filter(|p| p.category_id == Some(id))
        {
            product.category_id = None;
        }
        Ok(true)
    }

    async fn insert_review(&mut self, review: NewReview) -> Result<Review> {
        let tables = &mut self.working;
        tables.require_product(review.product_id)?;
        let username = tables
            .users
            .iter()
            .find(|u| u.id == review.user_id)
            .map(|u| u.username.clone())
            .ok_or_else(|| {
                StoreError::ForeignKeyViolation(format!("user {} does not exist", review.user_id))
            })?;
        if !(1..=5).contains(&review.rating) {
            return Err(StoreError::CheckViolation(
                "reviews_rating_range".to_string(),
            ));
        }
        if tables
            .reviews
            .iter()
            .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
        {
            return Err(StoreError::UniqueViolation(
                "reviews_product_user_key".to_string(),
            ));
        }

        let now = Utc::now();
        let record = Review {
            id: ReviewId::new(),
            product_id: review.product_id,
            user_id: review.user_id,
            username,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        tables.reviews.push(record.clone());
        Ok(record)
    }

    async fn get_review(&mut self, id: ReviewId) -> Result<Option<Review>> {
        Ok(self.working.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn list_reviews(&mut self, product_id: ProductId) -> Result<Vec<Review>> {
        Ok(self
            .working
            .reviews
            .iter()
            .rev()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn update_review(
        &mut self,
        id: ReviewId,
        rating: u8,
        comment: String,
    ) -> Result<Option<Review>> {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::CheckViolation(
                "reviews_rating_range".to_string(),
            ));
        }
        let Some(review) = self.working.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        review.rating = rating;
        review.comment = comment;
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }

    async fn delete_review(&mut self, id: ReviewId) -> Result<bool> {
        let before = self.working.reviews.len();
        self.working.reviews.retain(|r| r.id != id);
        Ok(self.working.reviews.len() != before)
    }

    async fn insert_address(&mut self, address: NewAddress) -> Result<Address> {
        self.working.require_user(address.user_id)?;

        let record = Address {
            id: AddressId::new(),
            user_id: address.user_id,
            label: address.label,
            street: address.street,
            city: address.city,
            province: address.province,
            postal: address.postal,
            country: address.country,
            phone: address.phone,
            created_at: Utc::now(),
        };
        self.working.addresses.push(record.clone());
        Ok(record)
    }

    async fn get_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>> {
        Ok(self
            .working
            .addresses
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }

    async fn list_addresses(&mut self, user_id: UserId) -> Result<Vec<Address>> {
        Ok(self
            .working
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let tables = &self.working;
        Ok(tables.carts.get(&user_id).map(|cart_id| Cart {
            id: *cart_id,
            user_id,
            lines: tables.cart_lines.get(cart_id).cloned().unwrap_or_default(),
        }))
    }

    async fn ensure_cart(&mut self, user_id: UserId) -> Result<CartId> {
        self.working.require_user(user_id)?;
        Ok(*self.working.carts.entry(user_id).or_default())
    }

    async fn add_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32> {
        self.working.require_cart(cart_id)?;
        self.working.require_product(product_id)?;

        let lines = self.working.cart_lines.entry(cart_id).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                StoreError::CheckViolation("cart line quantity overflow".to_string())
            })?;
            return Ok(line.quantity);
        }

        lines.push(CartLine {
            product_id,
            quantity,
        });
        Ok(quantity)
    }

    async fn set_cart_line_quantity(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool> {
        let line = self
            .working
            .cart_lines
            .get_mut(&cart_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.product_id == product_id));

        match line {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_line(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let Some(lines) = self.working.cart_lines.get_mut(&cart_id) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() != before)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        if self.faults.fail_on_clear_cart.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("clear_cart"));
        }

        let removed = self
            .working
            .cart_lines
            .remove(&cart_id)
            .map(|lines| lines.len())
            .unwrap_or(0);
        Ok(removed as u64)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        self.working.require_user(order.user_id)?;
        if !self
            .working
            .addresses
            .iter()
            .any(|a| a.id == order.address_id)
        {
            return Err(StoreError::ForeignKeyViolation(format!(
                "address {} does not exist",
                order.address_id
            )));
        }
        for line in &order.lines {
            self.working.require_product(line.product_id)?;
        }

        let now = Utc::now();
        let record = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            address_id: order.address_id,
            status: OrderStatus::Pending,
            total: order.total,
            shipping_cost: order.shipping_cost,
            shipping_method: order.shipping_method,
            payment_method: order.payment_method,
            lines: order.lines,
            created_at: now,
            updated_at: now,
        };
        self.working.orders.push(record.clone());
        Ok(record)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&mut self, user_id: Option<UserId>) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .iter()
            .rev()
            .filter(|o| user_id.is_none_or(|u| o.user_id == u))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        match self
            .working
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == from)
        {
            Some(order) => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
