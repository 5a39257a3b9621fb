use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::sql::{Assignments, Conditions};
use super::{MySqlStore, conflict_or_backend, count, parse_column};
use crate::model::delivery::{
    Delivery, DeliveryChanges, DeliveryFilter, DeliveryStatus, NewDelivery,
};
use crate::model::non_blank;
use crate::store::{DeliveryStore, Page, StoreError, StoreResult};

#[derive(FromRow)]
struct DeliveryRow {
    id: u64,
    supplier_id: u64,
    product_id: u64,
    quantity: u32,
    status: String,
    scheduled_date: NaiveDate,
    delivered_at: Option<DateTime<Utc>>,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = StoreError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        Ok(Delivery {
            id: row.id,
            supplier_id: row.supplier_id,
            product_id: row.product_id,
            quantity: row.quantity,
            status: parse_column("deliveries.status", &row.status)?,
            scheduled_date: row.scheduled_date,
            delivered_at: row.delivered_at,
            tracking_number: row.tracking_number,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const DELIVERY_COLUMNS: &str = "id, supplier_id, product_id, quantity, status, scheduled_date, delivered_at, tracking_number, notes, created_at, updated_at";

async fn fetch_delivery(
    pool: &MySqlPool,
    supplier_id: u64,
    id: u64,
) -> StoreResult<Option<Delivery>> {
    let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = ? AND supplier_id = ?");
    sqlx::query_as::<_, DeliveryRow>(&sql)
        .bind(id)
        .bind(supplier_id)
        .fetch_optional(pool)
        .await?
        .map(Delivery::try_from)
        .transpose()
}

#[async_trait]
impl DeliveryStore for MySqlStore {
    async fn create_delivery(
        &self,
        supplier_id: u64,
        delivery: NewDelivery,
    ) -> StoreResult<Delivery> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO deliveries
                (supplier_id, product_id, quantity, status, scheduled_date,
                 tracking_number, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(supplier_id)
        .bind(delivery.product_id)
        .bind(delivery.quantity)
        .bind(DeliveryStatus::Scheduled.to_string())
        .bind(delivery.scheduled_date)
        .bind(non_blank(delivery.tracking_number.as_deref()))
        .bind(non_blank(delivery.notes.as_deref()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, "Product does not exist"))?;

        fetch_delivery(&self.pool, supplier_id, result.last_insert_id())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_delivery(&self, supplier_id: u64, id: u64) -> StoreResult<Option<Delivery>> {
        fetch_delivery(&self.pool, supplier_id, id).await
    }

    async fn list_deliveries(
        &self,
        supplier_id: u64,
        filter: &DeliveryFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Delivery>, u64)> {
        let mut conditions = Conditions::new();
        conditions
            .eq("supplier_id", supplier_id)
            .eq_opt("status", filter.status.map(|s| s.to_string()))
            .eq_opt("product_id", filter.product_id);

        let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM deliveries");
        conditions.push_to(&mut count_q);
        let (total,) = count_q
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut data_q =
            QueryBuilder::<MySql>::new(format!("SELECT {DELIVERY_COLUMNS} FROM deliveries"));
        conditions.push_to(&mut data_q);
        data_q.push(" ORDER BY created_at DESC, id DESC");
        if let Some(page) = page {
            data_q
                .push(" LIMIT ")
                .push_bind(page.limit())
                .push(" OFFSET ")
                .push_bind(page.offset());
        }

        let deliveries = data_q
            .build_query_as::<DeliveryRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Delivery::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((deliveries, count(total)))
    }

    async fn update_delivery(
        &self,
        supplier_id: u64,
        id: u64,
        changes: &DeliveryChanges,
    ) -> StoreResult<Option<Delivery>> {
        let mut set = Assignments::new();
        set.set_opt("quantity", changes.quantity)
            .set_opt("scheduled_date", changes.scheduled_date);
        if let Some(tracking) = &changes.tracking_number {
            set.set("tracking_number", non_blank(Some(tracking)));
        }
        if let Some(notes) = &changes.notes {
            set.set("notes", non_blank(Some(notes)));
        }
        set.set("updated_at", Utc::now());

        let mut qb = set.into_update("deliveries");
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND supplier_id = ")
            .push_bind(supplier_id)
            .push(" AND status IN (")
            .push_bind(DeliveryStatus::Scheduled.to_string())
            .push(", ")
            .push_bind(DeliveryStatus::InTransit.to_string())
            .push(")");
        qb.build().execute(&self.pool).await?;

        // MySQL reports matched-but-unchanged rows as unaffected, so re-read instead
        Ok(fetch_delivery(&self.pool, supplier_id, id)
            .await?
            .filter(|d| !d.status.is_terminal()))
    }

    async fn transition_delivery(
        &self,
        supplier_id: u64,
        id: u64,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Delivery>> {
        let delivered_at = (to == DeliveryStatus::Delivered).then_some(at);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = ?, delivered_at = COALESCE(?, delivered_at), updated_at = ?
            WHERE id = ?
            AND supplier_id = ?
            AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(delivered_at)
        .bind(at)
        .bind(id)
        .bind(supplier_id)
        .bind(from.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if to == DeliveryStatus::Delivered {
            let stocked = sqlx::query(
                r#"
                UPDATE products p
                JOIN deliveries d ON d.product_id = p.id
                SET p.stock_quantity = p.stock_quantity + d.quantity, p.updated_at = ?
                WHERE d.id = ?
                AND p.stock_quantity <= ? - d.quantity
                "#,
            )
            .bind(at)
            .bind(id)
            .bind(u32::MAX)
            .execute(&mut *tx)
            .await?;

            if stocked.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::stock_overflow());
            }
        }

        tx.commit().await?;
        fetch_delivery(&self.pool, supplier_id, id).await
    }

    async fn count_deliveries(&self, supplier_id: u64, status: DeliveryStatus) -> StoreResult<u64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM deliveries WHERE supplier_id = ? AND status = ?",
        )
        .bind(supplier_id)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count(total))
    }
}
