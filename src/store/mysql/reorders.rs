use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::sql::Conditions;
use super::{MySqlStore, conflict_or_backend, count, parse_column};
use crate::model::non_blank;
use crate::model::reorder::{
    ReorderCounts, ReorderDraft, ReorderFilter, ReorderRequest, ReorderStatus, SupplierResponse,
};
use crate::store::{Page, ReorderStore, StoreError, StoreResult};

#[derive(FromRow)]
struct ReorderRow {
    id: u64,
    supplier_id: u64,
    product_id: u64,
    quantity: u32,
    notes: Option<String>,
    status: String,
    requested_by: u64,
    response_acknowledged: Option<bool>,
    response_message: Option<String>,
    response_estimated_delivery: Option<NaiveDate>,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReorderRow> for ReorderRequest {
    type Error = StoreError;

    fn try_from(row: ReorderRow) -> Result<Self, Self::Error> {
        // A response exists once responded_at is stamped
        let supplier_response = row.responded_at.map(|responded_at| SupplierResponse {
            acknowledged: row.response_acknowledged.unwrap_or(false),
            message: row.response_message.unwrap_or_default(),
            estimated_delivery: row.response_estimated_delivery,
            responded_at,
        });
        Ok(ReorderRequest {
            id: row.id,
            supplier_id: row.supplier_id,
            product_id: row.product_id,
            quantity: row.quantity,
            notes: row.notes,
            status: parse_column("reorder_requests.status", &row.status)?,
            requested_by: row.requested_by,
            supplier_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const REORDER_COLUMNS: &str = "id, supplier_id, product_id, quantity, notes, status, requested_by, response_acknowledged, response_message, response_estimated_delivery, responded_at, created_at, updated_at";

async fn fetch_reorder(pool: &MySqlPool, id: u64) -> StoreResult<Option<ReorderRequest>> {
    let sql = format!("SELECT {REORDER_COLUMNS} FROM reorder_requests WHERE id = ?");
    sqlx::query_as::<_, ReorderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(ReorderRequest::try_from)
        .transpose()
}

async fn fetch_page(
    pool: &MySqlPool,
    conditions: &Conditions,
    order_by: &'static str,
    page: Option<Page>,
) -> StoreResult<(Vec<ReorderRequest>, u64)> {
    let mut count_q = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM reorder_requests");
    conditions.push_to(&mut count_q);
    let (total,) = count_q.build_query_as::<(i64,)>().fetch_one(pool).await?;

    let mut data_q =
        QueryBuilder::<MySql>::new(format!("SELECT {REORDER_COLUMNS} FROM reorder_requests"));
    conditions.push_to(&mut data_q);
    data_q.push(order_by);
    if let Some(page) = page {
        data_q
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
    }

    let requests = data_q
        .build_query_as::<ReorderRow>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(ReorderRequest::try_from)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok((requests, count(total)))
}

#[async_trait]
impl ReorderStore for MySqlStore {
    async fn create_reorder(&self, draft: ReorderDraft) -> StoreResult<ReorderRequest> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO reorder_requests
                (supplier_id, product_id, quantity, notes, status, requested_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.supplier_id)
        .bind(draft.product_id)
        .bind(draft.quantity)
        .bind(non_blank(draft.notes.as_deref()))
        .bind(ReorderStatus::Pending.to_string())
        .bind(draft.requested_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, "Product or supplier does not exist"))?;

        fetch_reorder(&self.pool, result.last_insert_id())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_reorder(&self, id: u64) -> StoreResult<Option<ReorderRequest>> {
        fetch_reorder(&self.pool, id).await
    }

    async fn list_reorders(
        &self,
        filter: &ReorderFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<ReorderRequest>, u64)> {
        let mut conditions = Conditions::new();
        conditions
            .eq_opt("status", filter.status.map(|s| s.to_string()))
            .eq_opt("supplier_id", filter.supplier_id)
            .eq_opt("product_id", filter.product_id);
        match filter.responded {
            Some(true) => {
                conditions.raw("responded_at IS NOT NULL");
            }
            Some(false) => {
                conditions.raw("responded_at IS NULL");
            }
            None => {}
        }
        fetch_page(
            &self.pool,
            &conditions,
            " ORDER BY created_at DESC, id DESC",
            page,
        )
        .await
    }

    async fn list_responses(&self, page: Page) -> StoreResult<(Vec<ReorderRequest>, u64)> {
        let mut conditions = Conditions::new();
        conditions.raw("responded_at IS NOT NULL");
        fetch_page(
            &self.pool,
            &conditions,
            " ORDER BY responded_at DESC, id DESC",
            Some(page),
        )
        .await
    }

    async fn record_response(
        &self,
        supplier_id: u64,
        id: u64,
        response: &SupplierResponse,
        status: ReorderStatus,
    ) -> StoreResult<Option<ReorderRequest>> {
        let result = sqlx::query(
            r#"
            UPDATE reorder_requests
            SET status = ?,
                response_acknowledged = ?,
                response_message = ?,
                response_estimated_delivery = ?,
                responded_at = ?,
                updated_at = ?
            WHERE id = ?
            AND supplier_id = ?
            AND status = ?
            "#,
        )
        .bind(status.to_string())
        .bind(response.acknowledged)
        .bind(&response.message)
        .bind(response.estimated_delivery)
        .bind(response.responded_at)
        .bind(response.responded_at)
        .bind(id)
        .bind(supplier_id)
        .bind(ReorderStatus::Pending.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_reorder(&self.pool, id).await
    }

    async fn transition_reorder(
        &self,
        id: u64,
        from: ReorderStatus,
        to: ReorderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ReorderRequest>> {
        let result = sqlx::query(
            "UPDATE reorder_requests SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.to_string())
        .bind(at)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_reorder(&self.pool, id).await
    }

    async fn reorder_counts(&self, supplier_id: Option<u64>) -> StoreResult<ReorderCounts> {
        let mut conditions = Conditions::new();
        conditions.eq_opt("supplier_id", supplier_id);

        let mut qb = QueryBuilder::<MySql>::new("SELECT status, COUNT(*) FROM reorder_requests");
        conditions.push_to(&mut qb);
        qb.push(" GROUP BY status");
        let rows = qb
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await?;

        let mut counts = ReorderCounts::default();
        for (status, n) in rows {
            counts.add(parse_column("reorder_requests.status", &status)?, count(n));
        }
        Ok(counts)
    }
}
