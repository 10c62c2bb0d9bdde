use async_trait::async_trait;

use crate::{
    Address, AddressId, Cart, CartId, Category, CategoryId, NewAddress, NewCategory, NewOrder,
    NewProduct, NewReview, NewUser, Order, OrderId, OrderStatus, Product, ProductId, ProductUpdate,
    Result, Review, ReviewId, StockDecrement, User, UserId,
};

/// Entry point to a transactional store.
///
/// Implementations must be thread-safe (Send + Sync); one store handle is
/// shared by every request.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx + 'static;

    /// Starts a new unit of work.
    ///
    /// Writes made through the returned transaction become visible to others
    /// only after [`StoreTx::commit`]. Dropping the transaction without
    /// committing discards them.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One unit of work against the store.
#[async_trait]
pub trait StoreTx: Send {
    /// Makes every write in this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write in this transaction.
    async fn rollback(self) -> Result<()>;

    // -- Users --

    /// Inserts a user. Fails with `UniqueViolation` if the username or email is taken.
    async fn insert_user(&mut self, user: NewUser) -> Result<User>;

    /// Looks a user up by username or email.
    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>>;

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;

    // -- Catalog --

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products, newest first.
    async fn list_products(&mut self, active_only: bool) -> Result<Vec<Product>>;

    /// Applies a partial update. Returns `None` if the product does not exist.
    async fn update_product(
        &mut self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>>;

    /// Atomically subtracts `quantity` from the product's stock-on-hand.
    ///
    /// The subtraction is evaluated by the store and guarded so the counter
    /// can never go negative: if fewer than `quantity` units remain, nothing
    /// changes and [`StockDecrement::Insufficient`] reports what is left.
    ///
    /// The decrement locks the product row until the transaction ends, so a
    /// caller touching several products must decrement them in ascending
    /// [`ProductId`] order.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockDecrement>;

    // -- Categories --

    /// Inserts a category. Fails with `UniqueViolation` if the slug is taken.
    async fn insert_category(&mut self, category: NewCategory) -> Result<Category>;

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>>;

    /// Lists categories in creation order.
    async fn list_categories(&mut self) -> Result<Vec<Category>>;

    /// Renames a category. Returns `None` if it does not exist.
    async fn update_category(
        &mut self,
        id: CategoryId,
        category: NewCategory,
    ) -> Result<Option<Category>>;

    /// Deletes a category and detaches its products. Returns false if it did not exist.
    async fn delete_category(&mut self, id: CategoryId) -> Result<bool>;

    // -- Reviews --

    /// Inserts a review. Fails with `UniqueViolation` if the user already
    /// reviewed the product.
    async fn insert_review(&mut self, review: NewReview) -> Result<Review>;

    async fn get_review(&mut self, id: ReviewId) -> Result<Option<Review>>;

    /// Lists a product's reviews, newest first.
    async fn list_reviews(&mut self, product_id: ProductId) -> Result<Vec<Review>>;

    /// Replaces a review's rating and comment. Returns `None` if it does not exist.
    async fn update_review(
        &mut self,
        id: ReviewId,
        rating: u8,
        comment: String,
    ) -> Result<Option<Review>>;

    async fn delete_review(&mut self, id: ReviewId) -> Result<bool>;

    // -- Addresses --

    async fn insert_address(&mut self, address: NewAddress) -> Result<Address>;

    /// Returns the address only if it belongs to `user_id`.
    async fn get_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>>;

    async fn list_addresses(&mut self, user_id: UserId) -> Result<Vec<Address>>;

    // -- Carts --

    /// Returns the user's cart with its lines, or `None` if none was created yet.
    ///
    /// The cart is locked for the rest of the transaction, so two transactions
    /// working on the same cart run one after the other.
    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Returns the id of the user's cart, creating the cart if needed.
    async fn ensure_cart(&mut self, user_id: UserId) -> Result<CartId>;

    /// Adds `quantity` units of a product, merging into an existing line.
    /// Returns the resulting line quantity.
    async fn add_cart_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32>;

    /// Overwrites a line's quantity. Returns false if the line does not exist.
    async fn set_cart_line_quantity(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool>;

    /// Removes a line. Returns false if the line does not exist.
    async fn delete_cart_line(&mut self, cart_id: CartId, product_id: ProductId) -> Result<bool>;

    /// Removes every line of the cart. Returns the number of lines removed.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;

    // -- Orders --

    /// Inserts an order header and its lines with status `pending`.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders newest first, optionally restricted to one user.
    async fn list_orders(&mut self, user_id: Option<UserId>) -> Result<Vec<Order>>;

    /// Moves an order from `from` to `to`.
    ///
    /// Returns false if the order does not exist or is no longer in `from`.
    async fn update_order_status(
        &mut self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool>;
}
