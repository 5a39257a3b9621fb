//! Persistence seam. Handlers talk to `dyn Store`; MySQL backs production and
//! the in-memory store backs local runs and tests.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::model::delivery::{
    Delivery, DeliveryChanges, DeliveryFilter, DeliveryStatus, NewDelivery,
};
use crate::model::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::model::reorder::{
    ReorderCounts, ReorderDraft, ReorderFilter, ReorderRequest, ReorderStatus, SupplierResponse,
};
use crate::model::supplier::{
    NewSupplier, Supplier, SupplierChanges, SupplierCounts, SupplierFilter,
};
use crate::model::user::{NewUser, RefreshToken, User};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Receiving a delivery would push the product's stock past `u32::MAX`.
    pub fn stock_overflow() -> Self {
        StoreError::Conflict("Delivered quantity would overflow the product's stock".into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Applies the window to an already ordered, fully materialized result.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.per_page as usize)
            .cloned()
            .collect()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Creates a supplier profile and its login account together.
    async fn create_supplier_account(
        &self,
        user: NewUser,
        supplier: NewSupplier,
    ) -> StoreResult<(User, Supplier)>;

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn username_exists(&self, username: &str) -> StoreResult<bool>;

    async fn record_login(&self, user_id: u64, at: DateTime<Utc>) -> StoreResult<()>;

    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> StoreResult<()>;

    fn usernames(&self) -> BoxStream<'_, StoreResult<String>>;

    fn usernames_active_since(&self, since: DateTime<Utc>) -> BoxStream<'_, StoreResult<String>>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save_refresh_token(&self, token: RefreshToken) -> StoreResult<()>;

    /// Returns false when the token is unknown or was already revoked.
    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool>;

    async fn revoke_user_tokens(&self, user_id: u64) -> StoreResult<u64>;
}

#[async_trait]
pub trait SupplierStore: Send + Sync {
    async fn create_supplier(&self, supplier: NewSupplier) -> StoreResult<Supplier>;

    async fn get_supplier(&self, id: u64) -> StoreResult<Option<Supplier>>;

    async fn list_suppliers(
        &self,
        filter: &SupplierFilter,
        page: Page,
    ) -> StoreResult<(Vec<Supplier>, u64)>;

    async fn update_supplier(
        &self,
        id: u64,
        changes: &SupplierChanges,
    ) -> StoreResult<Option<Supplier>>;

    async fn supplier_counts(&self) -> StoreResult<SupplierCounts>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fails with `Conflict` when the SKU is already used by this supplier.
    async fn create_product(&self, supplier_id: u64, product: NewProduct) -> StoreResult<Product>;

    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>>;

    /// Newest first. `page = None` returns every match.
    async fn list_products(
        &self,
        supplier_id: u64,
        filter: &ProductFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Product>, u64)>;

    async fn update_product(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &ProductChanges,
    ) -> StoreResult<Option<Product>>;

    /// Fails with `Conflict` while deliveries or reorder requests reference the product.
    async fn delete_product(&self, supplier_id: u64, id: u64) -> StoreResult<bool>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn create_delivery(
        &self,
        supplier_id: u64,
        delivery: NewDelivery,
    ) -> StoreResult<Delivery>;

    async fn get_delivery(&self, supplier_id: u64, id: u64) -> StoreResult<Option<Delivery>>;

    async fn list_deliveries(
        &self,
        supplier_id: u64,
        filter: &DeliveryFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Delivery>, u64)>;

    /// Applies only while the delivery is not in a terminal state.
    async fn update_delivery(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &DeliveryChanges,
    ) -> StoreResult<Option<Delivery>>;

    /// Compare-and-set on status. Reaching `Delivered` stamps `delivered_at`
    /// and adds the quantity to the product's stock in the same unit of work.
    /// Fails with `Conflict`, leaving both untouched, when the stock would overflow.
    async fn transition_delivery(
        &self,
        supplier_id: u64,
        id: u64,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Delivery>>;

    async fn count_deliveries(&self, supplier_id: u64, status: DeliveryStatus) -> StoreResult<u64>;
}

#[async_trait]
pub trait ReorderStore: Send + Sync {
    async fn create_reorder(&self, draft: ReorderDraft) -> StoreResult<ReorderRequest>;

    async fn get_reorder(&self, id: u64) -> StoreResult<Option<ReorderRequest>>;

    /// Newest first. `page = None` returns every match.
    async fn list_reorders(
        &self,
        filter: &ReorderFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<ReorderRequest>, u64)>;

    /// Requests carrying a supplier response, most recent response first.
    async fn list_responses(&self, page: Page) -> StoreResult<(Vec<ReorderRequest>, u64)>;

    /// Stores the response only if the request is still pending.
    async fn record_response(
        &self,
        supplier_id: u64,
        id: u64,
        response: &SupplierResponse,
        status: ReorderStatus,
    ) -> StoreResult<Option<ReorderRequest>>;

    async fn transition_reorder(
        &self,
        id: u64,
        from: ReorderStatus,
        to: ReorderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ReorderRequest>>;

    async fn reorder_counts(&self, supplier_id: Option<u64>) -> StoreResult<ReorderCounts>;
}

pub trait Store:
    UserStore + TokenStore + SupplierStore + ProductStore + DeliveryStore + ReorderStore
{
}

impl<T> Store for T where
    T: UserStore + TokenStore + SupplierStore + ProductStore + DeliveryStore + ReorderStore
{
}
