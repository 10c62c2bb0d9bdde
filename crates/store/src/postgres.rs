use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Address, AddressId, Cart, CartId, CartLine, Category, CategoryId, Money, NewAddress,
    NewCategory, NewOrder, NewProduct, NewReview, NewUser, Order, OrderId, OrderLine, OrderStatus,
    Product, ProductId, ProductUpdate, Result, Review, ReviewId, StockDecrement, StoreError, User,
    UserId,
    store::{Store, StoreTx},
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, stock_on_hand, is_active, category_id, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.slug, c.created_at, c.updated_at, \
     (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count";

const REVIEW_COLUMNS: &str =
    "r.id, r.product_id, r.user_id, u.username, r.rating, r.comment, r.created_at, r.updated_at";

const ADDRESS_COLUMNS: &str =
    "id, user_id, label, street, city, province, postal, country, phone, created_at";

const ORDER_COLUMNS: &str = "id, user_id, address_id, status, total_cents, shipping_cost_cents, shipping_method, payment_method, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        tracing::info!("running database migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx })
    }
}

/// A unit of work backed by one PostgreSQL transaction (read committed).
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

/// Maps constraint violations onto the store's error variants.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(constraint);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKeyViolation(constraint);
        }
        if db_err.is_check_violation() {
            return StoreError::CheckViolation(constraint);
        }
    }
    StoreError::Database(err)
}

fn quantity_from_row(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StoreError::CorruptRow(format!("{column} = {raw}")))
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_on_hand: row.try_get("stock_on_hand")?,
        is_active: row.try_get("is_active")?,
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")?
            .map(CategoryId::from_uuid),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        product_count: row.try_get("product_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_review(row: PgRow) -> Result<Review> {
    let rating: i16 = row.try_get("rating")?;
    Ok(Review {
        id: ReviewId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        username: row.try_get("username")?,
        rating: u8::try_from(rating)
            .map_err(|_| StoreError::CorruptRow(format!("rating = {rating}")))?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_address(row: PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        label: row.try_get("label")?,
        street: row.try_get("street")?,
        city: row.try_get("city")?,
        province: row.try_get("province")?,
        postal: row.try_get("postal")?,
        country: row.try_get("country")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_header(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e: common::ParseStatusError| StoreError::CorruptRow(e.to_string()))?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("address_id")?),
        status,
        total: Money::from_cents(row.try_get("total_cents")?),
        shipping_cost: Money::from_cents(row.try_get("shipping_cost_cents")?),
        shipping_method: row.try_get("shipping_method")?,
        payment_method: row.try_get("payment_method")?,
        lines: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: quantity_from_row(row, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

impl PostgresTx {
    /// Loads the lines of the given orders and attaches them in position order.
    async fn attach_lines(&mut self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(row_to_order_line(row)?);
        }

        for order in &mut orders {
            order.lines = lines.remove(&order.id.as_uuid()).unwrap_or_default();
        }
        Ok(orders)
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, is_admin, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_user(row)
    }

    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, is_admin, created_at
            FROM users
            WHERE username = $1 OR email = $1
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_user).transpose()
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, is_admin, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_user).transpose()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO products (id, name, description, price_cents, stock_on_hand, is_active, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.cents())
            .bind(product.stock_on_hand)
            .bind(product.is_active)
            .bind(product.category_id.map(|c| c.as_uuid()))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row_to_product(row)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_product).transpose()
    }

    async fn list_products(&mut self, active_only: bool) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1 = FALSE OR is_active) \
             ORDER BY created_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(active_only)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let sql = format!(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                price_cents = COALESCE($4, price_cents), \
                stock_on_hand = COALESCE($5, stock_on_hand), \
                is_active = COALESCE($6, is_active), \
                category_id = CASE WHEN $7 THEN $8 ELSE category_id END, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(update.name)
            .bind(update.description)
            .bind(update.price.map(|p| p.cents()))
            .bind(update.stock_on_hand)
            .bind(update.is_active)
            .bind(update.category_id.is_some())
            .bind(update.category_id.flatten().map(|c| c.as_uuid()))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row.map(row_to_product).transpose()
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockDecrement> {
        // Concurrent decrements of the same row queue on its lock; the guard is
        // re-evaluated against the committed value once the lock is granted.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_on_hand = stock_on_hand - $2, updated_at = NOW()
            WHERE id = $1 AND stock_on_hand >= $2
            RETURNING stock_on_hand
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Decremented { remaining });
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_on_hand FROM products WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => {
                tracing::debug!(product_id = %id, available, quantity, "stock decrement refused");
                Ok(StockDecrement::Insufficient { available })
            }
            None => Err(StoreError::ForeignKeyViolation(format!(
                "product {id} does not exist"
            ))),
        }
    }

    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        let row = sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, created_at, updated_at, 0::BIGINT AS product_count
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&category.name)
        .bind(&category.slug)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_category(row)
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_category).transpose()
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM categories c ORDER BY c.created_at ASC, c.id ASC");
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;

        rows.into_iter().map(row_to_category).collect()
    }

    async fn update_category(
        &mut self,
        id: CategoryId,
        category: NewCategory,
    ) -> Result<Option<Category>> {
        let sql = format!(
            "UPDATE categories c SET name = $2, slug = $3, updated_at = NOW() \
             WHERE c.id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(&category.name)
            .bind(&category.slug)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row.map(row_to_category).transpose()
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        // Products are detached by the ON DELETE SET NULL foreign key.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_review(&mut self, review: NewReview) -> Result<Review> {
        let sql = format!(
            "WITH r AS ( \
                INSERT INTO reviews (id, product_id, user_id, rating, comment) \
                VALUES ($1, $2, $3, $4, $5) RETURNING * \
             ) \
             SELECT {REVIEW_COLUMNS} FROM r JOIN users u ON u.id = r.user_id"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(review.product_id.as_uuid())
            .bind(review.user_id.as_uuid())
            .bind(i16::from(review.rating))
            .bind(&review.comment)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row_to_review(row)
    }

    async fn get_review(&mut self, id: ReviewId) -> Result<Option<Review>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews r JOIN users u ON u.id = r.user_id WHERE r.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_review).transpose()
    }

    async fn list_reviews(&mut self, product_id: ProductId) -> Result<Vec<Review>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.product_id = $1 \
             ORDER BY r.created_at DESC, r.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_review).collect()
    }

    async fn update_review(
        &mut self,
        id: ReviewId,
        rating: u8,
        comment: String,
    ) -> Result<Option<Review>> {
        let sql = format!(
            "WITH r AS ( \
                UPDATE reviews SET rating = $2, comment = $3, updated_at = NOW() \
                WHERE id = $1 RETURNING * \
             ) \
             SELECT {REVIEW_COLUMNS} FROM r JOIN users u ON u.id = r.user_id"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(i16::from(rating))
            .bind(comment)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row.map(row_to_review).transpose()
    }

    async fn delete_review(&mut self, id: ReviewId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_address(&mut self, address: NewAddress) -> Result<Address> {
        let sql = format!(
            "INSERT INTO addresses (id, user_id, label, street, city, province, postal, country, phone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ADDRESS_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(address.user_id.as_uuid())
            .bind(&address.label)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.province)
            .bind(&address.postal)
            .bind(&address.country)
            .bind(&address.phone)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        row_to_address(row)
    }

    async fn get_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_address).transpose()
    }

    async fn list_addresses(&mut self, user_id: UserId) -> Result<Vec<Address>> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(row_to_address).collect()
    }

    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let cart_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        let Some(cart_id) = cart_id else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY created_at ASC, product_id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let lines = rows
            .iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: quantity_from_row(row, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart {
            id: CartId::from_uuid(cart_id),
            user_id,
            lines,
        }))
    }

    async fn ensure_cart(&mut self, user_id: UserId) -> Result<CartId> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(CartId::from_uuid(id))
    }

    async fn add_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32> {
        let merged: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cart_lines (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING quantity
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        u32::try_from(merged).map_err(|_| StoreError::CheckViolation(format!("quantity = {merged}")))
    }

    async fn set_cart_line_quantity(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE cart_lines SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_cart_line(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (id, user_id, address_id, status, total_cents, shipping_cost_cents, shipping_method, payment_method) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id.as_uuid())
            .bind(order.address_id.as_uuid())
            .bind(OrderStatus::Pending.as_str())
            .bind(order.total.cents())
            .bind(order.shipping_cost.cents())
            .bind(&order.shipping_method)
            .bind(&order.payment_method)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        let mut header = row_to_order_header(&row)?;

        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::CheckViolation("too many order lines".to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(header.id.as_uuid())
            .bind(position)
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        }

        header.lines = order.lines;
        Ok(header)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = row_to_order_header(&row)?;
        Ok(self.attach_lines(vec![header]).await?.pop())
    }

    async fn list_orders(&mut self, user_id: Option<UserId>) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.map(|u| u.as_uuid()))
            .fetch_all(&mut *self.tx)
            .await?;

        let headers = rows
            .iter()
            .map(row_to_order_header)
            .collect::<Result<Vec<_>>>()?;
        self.attach_lines(headers).await
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
