use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::sql::{Assignments, Conditions};
use super::{MySqlStore, count, parse_column};
use crate::model::non_blank;
use crate::model::supplier::{
    NewSupplier, Supplier, SupplierChanges, SupplierCounts, SupplierFilter, SupplierStatus,
};
use crate::store::{Page, StoreError, StoreResult, SupplierStore};

#[derive(FromRow)]
struct SupplierRow {
    id: u64,
    user_id: Option<u64>,
    company_name: String,
    contact_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = StoreError;

    fn try_from(row: SupplierRow) -> Result<Self, Self::Error> {
        Ok(Supplier {
            id: row.id,
            user_id: row.user_id,
            company_name: row.company_name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            status: parse_column("suppliers.status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SUPPLIER_COLUMNS: &str = "id, user_id, company_name, contact_name, email, phone, address, status, created_at, updated_at";

pub(super) async fn fetch_supplier(pool: &MySqlPool, id: u64) -> StoreResult<Option<Supplier>> {
    let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?");
    sqlx::query_as::<_, SupplierRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Supplier::try_from)
        .transpose()
}

fn supplier_conditions(filter: &SupplierFilter) -> Conditions {
    let mut conditions = Conditions::new();
    conditions
        .eq_opt("status", filter.status.map(|s| s.to_string()))
        .contains(
            &["company_name", "contact_name", "email"],
            filter.search.as_deref(),
        );
    conditions
}

#[async_trait]
impl SupplierStore for MySqlStore {
    async fn create_supplier(&self, supplier: NewSupplier) -> StoreResult<Supplier> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO suppliers
                (company_name, contact_name, email, phone, address, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(supplier.company_name.trim())
        .bind(supplier.contact_name.trim())
        .bind(supplier.email.trim())
        .bind(non_blank(supplier.phone.as_deref()))
        .bind(non_blank(supplier.address.as_deref()))
        .bind(SupplierStatus::Active.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        fetch_supplier(&self.pool, result.last_insert_id())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_supplier(&self, id: u64) -> StoreResult<Option<Supplier>> {
        fetch_supplier(&self.pool, id).await
    }

    async fn list_suppliers(
        &self,
        filter: &SupplierFilter,
        page: Page,
    ) -> StoreResult<(Vec<Supplier>, u64)> {
        let conditions = supplier_conditions(filter);

        let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM suppliers");
        conditions.push_to(&mut count_q);
        let (total,) = count_q
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut data_q = QueryBuilder::<MySql>::new(format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers"
        ));
        conditions.push_to(&mut data_q);
        data_q
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = data_q
            .build_query_as::<SupplierRow>()
            .fetch_all(&self.pool)
            .await?;
        let suppliers = rows
            .into_iter()
            .map(Supplier::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((suppliers, count(total)))
    }

    async fn update_supplier(
        &self,
        id: u64,
        changes: &SupplierChanges,
    ) -> StoreResult<Option<Supplier>> {
        let mut set = Assignments::new();
        set.set_opt("company_name", changes.company_name.as_deref().map(str::trim))
            .set_opt("contact_name", changes.contact_name.as_deref().map(str::trim))
            .set_opt("email", changes.email.as_deref().map(str::trim))
            .set_opt("status", changes.status.map(|s| s.to_string()));
        if let Some(phone) = &changes.phone {
            set.set("phone", non_blank(Some(phone)));
        }
        if let Some(address) = &changes.address {
            set.set("address", non_blank(Some(address)));
        }
        set.set("updated_at", Utc::now());

        let mut qb = set.into_update("suppliers");
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().execute(&self.pool).await?;
        fetch_supplier(&self.pool, id).await
    }

    async fn supplier_counts(&self) -> StoreResult<SupplierCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM suppliers GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = SupplierCounts::default();
        for (status, n) in rows {
            match parse_column("suppliers.status", &status)? {
                SupplierStatus::Active => counts.active = count(n),
                SupplierStatus::Inactive => counts.inactive = count(n),
            }
        }
        Ok(counts)
    }
}
