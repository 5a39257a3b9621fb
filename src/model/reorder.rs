use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use super::{ValidationError, require_non_empty};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReorderStatus {
    Pending,
    Acknowledged,
    Declined,
    Fulfilled,
    Cancelled,
}

impl ReorderStatus {
    /// Only a pending request can be answered by its supplier.
    pub fn accepts_response(self) -> bool {
        self == ReorderStatus::Pending
    }

    pub fn can_fulfill(self) -> bool {
        self == ReorderStatus::Acknowledged
    }

    pub fn can_cancel(self) -> bool {
        matches!(self, ReorderStatus::Pending | ReorderStatus::Acknowledged)
    }
}

/// The supplier's answer, embedded in its reorder request.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SupplierResponse {
    pub acknowledged: bool,
    #[schema(example = "Can ship the full quantity next week")]
    pub message: String,
    #[schema(value_type = Option<String>, format = "date", example = "2026-02-14")]
    pub estimated_delivery: Option<NaiveDate>,
    #[schema(value_type = String, format = "date-time")]
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReorderRequest {
    pub id: u64,
    pub supplier_id: u64,
    pub product_id: u64,
    pub quantity: u32,
    pub notes: Option<String>,
    pub status: ReorderStatus,
    /// Admin user who raised the request
    pub requested_by: u64,
    pub supplier_response: Option<SupplierResponse>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewReorder {
    #[schema(example = 31)]
    pub product_id: u64,
    #[schema(example = 500)]
    pub quantity: u32,
    #[schema(example = "Spring promotion stock")]
    pub notes: Option<String>,
}

impl NewReorder {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity == 0 {
            return Err(ValidationError::new("quantity must be greater than zero"));
        }
        Ok(())
    }
}

/// Everything the store needs to persist a new request.
#[derive(Debug, Clone)]
pub struct ReorderDraft {
    pub supplier_id: u64,
    pub product_id: u64,
    pub quantity: u32,
    pub notes: Option<String>,
    pub requested_by: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RespondToReorder {
    pub acknowledged: bool,
    #[schema(example = "Can ship the full quantity next week")]
    pub message: String,
    #[schema(value_type = Option<String>, format = "date", example = "2026-02-14")]
    pub estimated_delivery: Option<NaiveDate>,
}

impl RespondToReorder {
    /// An acknowledgment must promise a delivery date that is not in the past.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        require_non_empty("message", &self.message)?;
        if self.acknowledged {
            match self.estimated_delivery {
                None => {
                    return Err(ValidationError::new(
                        "estimated_delivery is required when acknowledging",
                    ));
                }
                Some(date) if date < today => {
                    return Err(ValidationError::new(
                        "estimated_delivery cannot be in the past",
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn into_response(self, at: DateTime<Utc>) -> (SupplierResponse, ReorderStatus) {
        let status = if self.acknowledged {
            ReorderStatus::Acknowledged
        } else {
            ReorderStatus::Declined
        };
        let response = SupplierResponse {
            acknowledged: self.acknowledged,
            message: self.message.trim().to_string(),
            estimated_delivery: self.estimated_delivery,
            responded_at: at,
        };
        (response, status)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReorderFilter {
    /// Filter by request status
    pub status: Option<ReorderStatus>,
    /// Filter by supplier (admin only)
    pub supplier_id: Option<u64>,
    /// Filter by product
    pub product_id: Option<u64>,
    /// Only requests that have (true) or lack (false) a supplier response
    pub responded: Option<bool>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReorderCounts {
    pub pending: u64,
    pub acknowledged: u64,
    pub declined: u64,
    pub fulfilled: u64,
    pub cancelled: u64,
}

impl ReorderCounts {
    pub fn add(&mut self, status: ReorderStatus, n: u64) {
        match status {
            ReorderStatus::Pending => self.pending += n,
            ReorderStatus::Acknowledged => self.acknowledged += n,
            ReorderStatus::Declined => self.declined += n,
            ReorderStatus::Fulfilled => self.fulfilled += n,
            ReorderStatus::Cancelled => self.cancelled += n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn acknowledgment_needs_a_future_or_current_date() {
        let mut reply = RespondToReorder {
            acknowledged: true,
            message: "On it".into(),
            estimated_delivery: None,
        };
        assert!(reply.validate(today()).is_err());

        reply.estimated_delivery = NaiveDate::from_ymd_opt(2026, 2, 28);
        assert_eq!(
            reply.validate(today()).unwrap_err().to_string(),
            "estimated_delivery cannot be in the past"
        );

        reply.estimated_delivery = Some(today());
        assert!(reply.validate(today()).is_ok());
    }

    #[test]
    fn decline_needs_only_a_message() {
        let reply = RespondToReorder {
            acknowledged: false,
            message: "Out of raw material".into(),
            estimated_delivery: None,
        };
        assert!(reply.validate(today()).is_ok());

        let (response, status) = reply.into_response(Utc::now());
        assert_eq!(status, ReorderStatus::Declined);
        assert!(!response.acknowledged);
    }

    #[test]
    fn blank_message_is_rejected() {
        let reply = RespondToReorder {
            acknowledged: false,
            message: "   ".into(),
            estimated_delivery: None,
        };
        assert_eq!(
            reply.validate(today()).unwrap_err().to_string(),
            "message must not be empty"
        );
    }

    #[test]
    fn state_rules() {
        assert!(ReorderStatus::Pending.accepts_response());
        assert!(!ReorderStatus::Acknowledged.accepts_response());
        assert!(ReorderStatus::Acknowledged.can_fulfill());
        assert!(!ReorderStatus::Pending.can_fulfill());
        assert!(ReorderStatus::Acknowledged.can_cancel());
        assert!(!ReorderStatus::Declined.can_cancel());
    }
}
