use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use super::ValidationError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Scheduled,
    InTransit,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Scheduled, InTransit)
                | (Scheduled, Cancelled)
                | (InTransit, Delivered)
                | (InTransit, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 4,
    "supplier_id": 7,
    "product_id": 31,
    "quantity": 200,
    "status": "in_transit",
    "scheduled_date": "2026-02-10",
    "delivered_at": null,
    "tracking_number": "TRK-99812",
    "notes": "Dock 4",
    "created_at": "2026-02-01T09:00:00Z",
    "updated_at": "2026-02-03T09:00:00Z"
}))]
pub struct Delivery {
    pub id: u64,
    pub supplier_id: u64,
    pub product_id: u64,
    pub quantity: u32,
    pub status: DeliveryStatus,
    #[schema(value_type = String, format = "date")]
    pub scheduled_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewDelivery {
    #[schema(example = 31)]
    pub product_id: u64,
    #[schema(example = 200)]
    pub quantity: u32,
    #[schema(example = "2026-02-10", value_type = String, format = "date")]
    pub scheduled_date: NaiveDate,
    #[schema(example = "TRK-99812")]
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl NewDelivery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DeliveryChanges {
    pub quantity: Option<u32>,
    #[schema(value_type = Option<String>, format = "date")]
    pub scheduled_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl DeliveryChanges {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.scheduled_date.is_none()
            && self.tracking_number.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("No fields provided for update"));
        }
        match self.quantity {
            Some(quantity) => validate_quantity(quantity),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliveryStatusUpdate {
    #[schema(example = "in_transit")]
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DeliveryFilter {
    /// Filter by delivery status
    pub status: Option<DeliveryStatus>,
    /// Filter by product
    pub product_id: Option<u64>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

fn validate_quantity(quantity: u32) -> Result<(), ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::new("quantity must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Scheduled, InTransit, true)]
    #[case(Scheduled, Cancelled, true)]
    #[case(InTransit, Delivered, true)]
    #[case(InTransit, Cancelled, true)]
    #[case(Scheduled, Delivered, false)]
    #[case(Delivered, Cancelled, false)]
    #[case(Cancelled, InTransit, false)]
    #[case(InTransit, Scheduled, false)]
    fn transitions(
        #[case] from: DeliveryStatus,
        #[case] to: DeliveryStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        assert_eq!(InTransit.to_string(), "in_transit");
        assert_eq!("in_transit".parse::<DeliveryStatus>(), Ok(InTransit));
        assert_eq!(serde_json::to_string(&InTransit).unwrap(), "\"in_transit\"");
    }
}
