use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::sql::{Assignments, Conditions};
use super::{MySqlStore, conflict_or_backend, count};
use crate::model::non_blank;
use crate::model::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::store::{Page, ProductStore, StoreError, StoreResult};

const SKU_TAKEN: &str = "SKU already exists";

#[derive(FromRow)]
struct ProductRow {
    id: u64,
    supplier_id: u64,
    name: String,
    sku: String,
    category: String,
    description: Option<String>,
    price: f64,
    stock_quantity: u32,
    reorder_level: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            supplier_id: row.supplier_id,
            name: row.name,
            sku: row.sku,
            category: row.category,
            description: row.description,
            price: row.price,
            stock_quantity: row.stock_quantity,
            reorder_level: row.reorder_level,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, supplier_id, name, sku, category, description, price, stock_quantity, reorder_level, created_at, updated_at";

async fn fetch_product(pool: &MySqlPool, id: u64) -> StoreResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
    Ok(sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Product::from))
}

fn product_conditions(supplier_id: u64, filter: &ProductFilter) -> Conditions {
    let mut conditions = Conditions::new();
    conditions
        .eq("supplier_id", supplier_id)
        .eq_opt(
            "category",
            filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()),
        )
        .contains(&["name", "sku"], filter.search.as_deref());
    if filter.low_stock == Some(true) {
        conditions.raw("stock_quantity <= reorder_level");
    }
    conditions
}

#[async_trait]
impl ProductStore for MySqlStore {
    async fn create_product(&self, supplier_id: u64, product: NewProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO products
                (supplier_id, name, sku, category, description, price,
                 stock_quantity, reorder_level, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(supplier_id)
        .bind(product.name.trim())
        .bind(product.sku.trim())
        .bind(product.category.trim())
        .bind(non_blank(product.description.as_deref()))
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, SKU_TAKEN))?;

        fetch_product(&self.pool, result.last_insert_id())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    async fn list_products(
        &self,
        supplier_id: u64,
        filter: &ProductFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Product>, u64)> {
        let conditions = product_conditions(supplier_id, filter);

        let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM products");
        conditions.push_to(&mut count_q);
        let (total,) = count_q
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut data_q =
            QueryBuilder::<MySql>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        conditions.push_to(&mut data_q);
        data_q.push(" ORDER BY created_at DESC, id DESC");
        if let Some(page) = page {
            data_q
                .push(" LIMIT ")
                .push_bind(page.limit())
                .push(" OFFSET ")
                .push_bind(page.offset());
        }

        let products = data_q
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Product::from)
            .collect();
        Ok((products, count(total)))
    }

    async fn update_product(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &ProductChanges,
    ) -> StoreResult<Option<Product>> {
        let mut set = Assignments::new();
        set.set_opt("name", changes.name.as_deref().map(str::trim))
            .set_opt("sku", changes.sku.as_deref().map(str::trim))
            .set_opt("category", changes.category.as_deref().map(str::trim))
            .set_opt("price", changes.price)
            .set_opt("stock_quantity", changes.stock_quantity)
            .set_opt("reorder_level", changes.reorder_level);
        if let Some(description) = &changes.description {
            set.set("description", non_blank(Some(description)));
        }
        set.set("updated_at", Utc::now());

        let mut qb = set.into_update("products");
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND supplier_id = ")
            .push_bind(supplier_id);
        qb.build()
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_backend(e, SKU_TAKEN))?;

        Ok(fetch_product(&self.pool, id)
            .await?
            .filter(|p| p.supplier_id == supplier_id))
    }

    async fn delete_product(&self, supplier_id: u64, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND supplier_id = ?")
            .bind(id)
            .bind(supplier_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                conflict_or_backend(e, "Product is referenced by deliveries or reorder requests")
            })?;
        Ok(result.rows_affected() == 1)
    }
}
