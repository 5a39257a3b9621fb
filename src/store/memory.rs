use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};

use super::{
    DeliveryStore, Page, ProductStore, ReorderStore, StoreError, StoreResult, SupplierStore,
    TokenStore, UserStore,
};
use crate::model::delivery::{
    Delivery, DeliveryChanges, DeliveryFilter, DeliveryStatus, NewDelivery,
};
use crate::model::non_blank;
use crate::model::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::model::reorder::{
    ReorderCounts, ReorderDraft, ReorderFilter, ReorderRequest, ReorderStatus, SupplierResponse,
};
use crate::model::supplier::{
    NewSupplier, Supplier, SupplierChanges, SupplierCounts, SupplierFilter, SupplierStatus,
};
use crate::model::user::{NewUser, RefreshToken, User, normalize_username};

#[derive(Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    tokens: HashMap<String, RefreshToken>,
    suppliers: BTreeMap<u64, Supplier>,
    products: BTreeMap<u64, Product>,
    deliveries: BTreeMap<u64, Delivery>,
    reorders: BTreeMap<u64, ReorderRequest>,
    last_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn username_taken(&self, username: &str) -> bool {
        let username = normalize_username(username);
        self.users.values().any(|u| u.username == username)
    }

    fn insert_user(&mut self, user: NewUser, supplier_id: Option<u64>) -> StoreResult<User> {
        if self.username_taken(&user.username) {
            return Err(StoreError::Conflict("Username already exists".into()));
        }
        let id = self.next_id();
        let record = User {
            id,
            username: normalize_username(&user.username),
            password_hash: user.password_hash,
            role: user.role,
            supplier_id,
            last_login_at: None,
            created_at: Utc::now(),
        };
        self.users.insert(id, record.clone());
        Ok(record)
    }

    fn insert_supplier(&mut self, supplier: NewSupplier, user_id: Option<u64>) -> Supplier {
        let id = self.next_id();
        let now = Utc::now();
        let record = Supplier {
            id,
            user_id,
            company_name: supplier.company_name.trim().to_string(),
            contact_name: supplier.contact_name.trim().to_string(),
            email: supplier.email.trim().to_string(),
            phone: non_blank(supplier.phone.as_deref()),
            address: non_blank(supplier.address.as_deref()),
            status: SupplierStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.suppliers.insert(id, record.clone());
        record
    }

    fn sku_taken(&self, supplier_id: u64, sku: &str, except: Option<u64>) -> bool {
        self.products.values().any(|p| {
            p.supplier_id == supplier_id
                && p.sku.eq_ignore_ascii_case(sku.trim())
                && Some(p.id) != except
        })
    }
}

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn paginate<T: Clone>(items: Vec<T>, page: Option<Page>) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    match page {
        Some(page) => (page.slice(&items), total),
        None => (items, total),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.write().insert_user(user, None)
    }

    async fn create_supplier_account(
        &self,
        user: NewUser,
        supplier: NewSupplier,
    ) -> StoreResult<(User, Supplier)> {
        let mut tables = self.write();
        if tables.username_taken(&user.username) {
            return Err(StoreError::Conflict("Username already exists".into()));
        }
        let mut supplier = tables.insert_supplier(supplier, None);
        let user = tables.insert_user(user, Some(supplier.id))?;
        supplier.user_id = Some(user.id);
        tables.suppliers.insert(supplier.id, supplier.clone());
        Ok((user, supplier))
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let username = normalize_username(username);
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.read().username_taken(username))
    }

    async fn record_login(&self, user_id: u64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.write();
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.write();
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    fn usernames(&self) -> BoxStream<'_, StoreResult<String>> {
        let names: Vec<_> = self.read().users.values().map(|u| u.username.clone()).collect();
        stream::iter(names.into_iter().map(Ok)).boxed()
    }

    fn usernames_active_since(&self, since: DateTime<Utc>) -> BoxStream<'_, StoreResult<String>> {
        let mut recent: Vec<_> = self
            .read()
            .users
            .values()
            .filter_map(|u| {
                u.last_login_at
                    .filter(|at| *at >= since)
                    .map(|at| (at, u.username.clone()))
            })
            .collect();
        recent.sort_by(|a, b| b.0.cmp(&a.0));
        stream::iter(recent.into_iter().map(|(_, name)| Ok(name))).boxed()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn save_refresh_token(&self, token: RefreshToken) -> StoreResult<()> {
        self.write().tokens.insert(token.jti.clone(), token);
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let mut tables = self.write();
        match tables.tokens.get_mut(jti) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_tokens(&self, user_id: u64) -> StoreResult<u64> {
        let mut tables = self.write();
        let mut revoked = 0;
        for token in tables.tokens.values_mut() {
            if token.user_id == user_id && !token.revoked {
                token.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl SupplierStore for MemoryStore {
    async fn create_supplier(&self, supplier: NewSupplier) -> StoreResult<Supplier> {
        Ok(self.write().insert_supplier(supplier, None))
    }

    async fn get_supplier(&self, id: u64) -> StoreResult<Option<Supplier>> {
        Ok(self.read().suppliers.get(&id).cloned())
    }

    async fn list_suppliers(
        &self,
        filter: &SupplierFilter,
        page: Page,
    ) -> StoreResult<(Vec<Supplier>, u64)> {
        let search = search_term(&filter.search);
        let matches: Vec<_> = self
            .read()
            .suppliers
            .values()
            .rev()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .filter(|s| {
                search.is_none_or(|q| {
                    contains_ci(&s.company_name, q)
                        || contains_ci(&s.contact_name, q)
                        || contains_ci(&s.email, q)
                })
            })
            .cloned()
            .collect();
        Ok(paginate(matches, Some(page)))
    }

    async fn update_supplier(
        &self,
        id: u64,
        changes: &SupplierChanges,
    ) -> StoreResult<Option<Supplier>> {
        let mut tables = self.write();
        let Some(supplier) = tables.suppliers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &changes.company_name {
            supplier.company_name = v.trim().to_string();
        }
        if let Some(v) = &changes.contact_name {
            supplier.contact_name = v.trim().to_string();
        }
        if let Some(v) = &changes.email {
            supplier.email = v.trim().to_string();
        }
        if let Some(v) = &changes.phone {
            supplier.phone = non_blank(Some(v));
        }
        if let Some(v) = &changes.address {
            supplier.address = non_blank(Some(v));
        }
        if let Some(status) = changes.status {
            supplier.status = status;
        }
        supplier.updated_at = Utc::now();
        Ok(Some(supplier.clone()))
    }

    async fn supplier_counts(&self) -> StoreResult<SupplierCounts> {
        let mut counts = SupplierCounts::default();
        for supplier in self.read().suppliers.values() {
            match supplier.status {
                SupplierStatus::Active => counts.active += 1,
                SupplierStatus::Inactive => counts.inactive += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn create_product(&self, supplier_id: u64, product: NewProduct) -> StoreResult<Product> {
        let mut tables = self.write();
        if tables.sku_taken(supplier_id, &product.sku, None) {
            return Err(StoreError::Conflict("SKU already exists".into()));
        }
        let id = tables.next_id();
        let now = Utc::now();
        let record = Product {
            id,
            supplier_id,
            name: product.name.trim().to_string(),
            sku: product.sku.trim().to_string(),
            category: product.category.trim().to_string(),
            description: non_blank(product.description.as_deref()),
            price: product.price,
            stock_quantity: product.stock_quantity,
            reorder_level: product.reorder_level,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, record.clone());
        Ok(record)
    }

    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>> {
        Ok(self.read().products.get(&id).cloned())
    }

    async fn list_products(
        &self,
        supplier_id: u64,
        filter: &ProductFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Product>, u64)> {
        let search = search_term(&filter.search);
        let category = search_term(&filter.category);
        let matches: Vec<_> = self
            .read()
            .products
            .values()
            .rev()
            .filter(|p| p.supplier_id == supplier_id)
            .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
            .filter(|p| search.is_none_or(|q| contains_ci(&p.name, q) || contains_ci(&p.sku, q)))
            .filter(|p| filter.low_stock != Some(true) || p.is_low_stock())
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_product(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &ProductChanges,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.write();
        let owned = tables
            .products
            .get(&id)
            .is_some_and(|p| p.supplier_id == supplier_id);
        if !owned {
            return Ok(None);
        }
        if let Some(sku) = &changes.sku {
            if tables.sku_taken(supplier_id, sku, Some(id)) {
                return Err(StoreError::Conflict("SKU already exists".into()));
            }
        }
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &changes.name {
            product.name = v.trim().to_string();
        }
        if let Some(v) = &changes.sku {
            product.sku = v.trim().to_string();
        }
        if let Some(v) = &changes.category {
            product.category = v.trim().to_string();
        }
        if let Some(v) = &changes.description {
            product.description = non_blank(Some(v));
        }
        if let Some(v) = changes.price {
            product.price = v;
        }
        if let Some(v) = changes.stock_quantity {
            product.stock_quantity = v;
        }
        if let Some(v) = changes.reorder_level {
            product.reorder_level = v;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, supplier_id: u64, id: u64) -> StoreResult<bool> {
        let mut tables = self.write();
        let owned = tables
            .products
            .get(&id)
            .is_some_and(|p| p.supplier_id == supplier_id);
        if !owned {
            return Ok(false);
        }
        let referenced = tables.deliveries.values().any(|d| d.product_id == id)
            || tables.reorders.values().any(|r| r.product_id == id);
        if referenced {
            return Err(StoreError::Conflict(
                "Product is referenced by deliveries or reorder requests".into(),
            ));
        }
        tables.products.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create_delivery(
        &self,
        supplier_id: u64,
        delivery: NewDelivery,
    ) -> StoreResult<Delivery> {
        let mut tables = self.write();
        let id = tables.next_id();
        let now = Utc::now();
        let record = Delivery {
            id,
            supplier_id,
            product_id: delivery.product_id,
            quantity: delivery.quantity,
            status: DeliveryStatus::Scheduled,
            scheduled_date: delivery.scheduled_date,
            delivered_at: None,
            tracking_number: non_blank(delivery.tracking_number.as_deref()),
            notes: non_blank(delivery.notes.as_deref()),
            created_at: now,
            updated_at: now,
        };
        tables.deliveries.insert(id, record.clone());
        Ok(record)
    }

    async fn get_delivery(&self, supplier_id: u64, id: u64) -> StoreResult<Option<Delivery>> {
        Ok(self
            .read()
            .deliveries
            .get(&id)
            .filter(|d| d.supplier_id == supplier_id)
            .cloned())
    }

    async fn list_deliveries(
        &self,
        supplier_id: u64,
        filter: &DeliveryFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Delivery>, u64)> {
        let matches: Vec<_> = self
            .read()
            .deliveries
            .values()
            .rev()
            .filter(|d| d.supplier_id == supplier_id)
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| filter.product_id.is_none_or(|p| d.product_id == p))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_delivery(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &DeliveryChanges,
    ) -> StoreResult<Option<Delivery>> {
        let mut guard = self.write();
        let tables = &mut *guard;
        let Some(delivery) = tables
            .deliveries
            .get_mut(&id)
            .filter(|d| d.supplier_id == supplier_id && d.status == from)
        else {
            return Ok(None);
        };

        if to == DeliveryStatus::Delivered {
            if let Some(product) = tables.products.get_mut(&delivery.product_id) {
                product.stock_quantity = product
                    .stock_quantity
                    .checked_add(delivery.quantity)
                    .ok_or_else(StoreError::stock_overflow)?;
                product.updated_at = at;
            }
            delivery.delivered_at = Some(at);
        }
        delivery.status = to;
        delivery.updated_at = at;
        Ok(Some(delivery.clone()))
    }

    async fn count_deliveries(&self, supplier_id: u64, status: DeliveryStatus) -> StoreResult<u64> {
        Ok(self
            .read()
            .deliveries
            .values()
            .filter(|d| d.supplier_id == supplier_id && d.status == status)
            .count() as u64)
    }
}

#[async_trait]
impl ReorderStore for MemoryStore {
    async fn create_reorder(&self, draft: ReorderDraft) -> StoreResult<ReorderRequest> {
        let mut tables = self.write();
        let id = tables.next_id();
        let now = Utc::now();
        let record = ReorderRequest {
            id,
            supplier_id: draft.supplier_id,
            product_id: draft.product_id,
            quantity: draft.quantity,
            notes: non_blank(draft.notes.as_deref()),
            status: ReorderStatus::Pending,
            requested_by: draft.requested_by,
            supplier_response: None,
            created_at: now,
            updated_at: now,
        };
        tables.reorders.insert(id, record.clone());
        Ok(record)
    }

    async fn get_reorder(&self, id: u64) -> StoreResult<Option<ReorderRequest>> {
        Ok(self.read().reorders.get(&id).cloned())
    }

    async fn list_reorders(
        &self,
        filter: &ReorderFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<ReorderRequest>, u64)> {
        let matches: Vec<_> = self
            .read()
            .reorders
            .values()
            .rev()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.supplier_id.is_none_or(|s| r.supplier_id == s))
            .filter(|r| filter.product_id.is_none_or(|p| r.product_id == p))
            .filter(|r| {
                filter
                    .responded
                    .is_none_or(|responded| r.supplier_response.is_some() == responded)
            })
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn list_responses(&self, page: Page) -> StoreResult<(Vec<ReorderRequest>, u64)> {
        let mut answered: Vec<_> = self
            .read()
            .reorders
            .values()
            .filter(|r| r.supplier_response.is_some())
            .cloned()
            .collect();
        answered.sort_by(|a, b| {
            let at = |r: &ReorderRequest| r.supplier_response.as_ref().map(|s| s.responded_at);
            at(b).cmp(&at(a)).then(b.id.cmp(&a.id))
        });
        Ok(paginate(answered, Some(page)))
    }

    async fn record_response(
        &self,
        supplier_id: u64,
        id: u64,
        response: &SupplierResponse,
        status: ReorderStatus,
    ) -> StoreResult<Option<ReorderRequest>> {
        let mut tables = self.write();
        let Some(request) = tables
            .reorders
            .get_mut(&id)
            .filter(|r| r.supplier_id == supplier_id && r.status.accepts_response())
        else {
            return Ok(None);
        };
        request.status = status;
        request.supplier_response = Some(response.clone());
        request.updated_at = response.responded_at;
        Ok(Some(request.clone()))
    }

    async fn transition_reorder(
        &self,
        id: u64,
        from: ReorderStatus,
        to: ReorderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ReorderRequest>> {
        let mut tables = self.write();
        let Some(request) = tables.reorders.get_mut(&id).filter(|r| r.status == from) else {
            return Ok(None);
        };
        request.status = to;
        request.updated_at = at;
        Ok(Some(request.clone()))
    }

    async fn reorder_counts(&self, supplier_id: Option<u64>) -> StoreResult<ReorderCounts> {
        let mut counts = ReorderCounts::default();
        for request in self
            .read()
            .reorders
            .values()
            .filter(|r| supplier_id.is_none_or(|s| r.supplier_id == s))
        {
            counts.add(request.status, 1);
        }
        Ok(counts)
    }
}
