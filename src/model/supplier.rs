use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use super::{ValidationError, require_email, require_non_empty};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SupplierStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "user_id": 12,
    "company_name": "Northwind Traders",
    "contact_name": "Ada Park",
    "email": "sales@northwind.example.com",
    "phone": "+1 555 0100",
    "address": "12 Harbour Rd",
    "status": "active",
    "created_at": "2026-01-01T00:00:00Z",
    "updated_at": "2026-01-01T00:00:00Z"
}))]
pub struct Supplier {
    pub id: u64,
    /// Login account linked to this supplier, if any
    pub user_id: Option<u64>,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: SupplierStatus,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    pub fn is_active(&self) -> bool {
        self.status == SupplierStatus::Active
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewSupplier {
    #[schema(example = "Northwind Traders")]
    pub company_name: String,
    #[schema(example = "Ada Park")]
    pub contact_name: String,
    #[schema(example = "sales@northwind.example.com")]
    pub email: String,
    #[schema(example = "+1 555 0100")]
    pub phone: Option<String>,
    #[schema(example = "12 Harbour Rd")]
    pub address: Option<String>,
}

impl NewSupplier {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("company_name", &self.company_name)?;
        require_non_empty("email", &self.email)?;
        require_email(&self.email)
    }
}

/// Partial update; `None` leaves a field untouched, a blank string clears an optional one.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SupplierChanges {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<SupplierStatus>,
}

impl SupplierChanges {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none()
            && self.contact_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("No fields provided for update"));
        }
        if let Some(name) = &self.company_name {
            require_non_empty("company_name", name)?;
        }
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        Ok(())
    }
}

/// Fields a supplier may edit on its own profile.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileChanges {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<ProfileChanges> for SupplierChanges {
    fn from(changes: ProfileChanges) -> Self {
        SupplierChanges {
            company_name: changes.company_name,
            contact_name: changes.contact_name,
            email: changes.email,
            phone: changes.phone,
            address: changes.address,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SupplierFilter {
    /// Filter by supplier status
    pub status: Option<SupplierStatus>,
    /// Case-insensitive match on company, contact or email
    #[schema(example = "northwind")]
    pub search: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SupplierCounts {
    pub active: u64,
    pub inactive: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_from_snake_case() {
        assert_eq!("inactive".parse::<SupplierStatus>(), Ok(SupplierStatus::Inactive));
        assert_eq!(SupplierStatus::Active.to_string(), "active");
        assert!("archived".parse::<SupplierStatus>().is_err());
    }

    #[test]
    fn empty_changes_are_rejected() {
        let err = SupplierChanges::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "No fields provided for update");
    }

    #[test]
    fn new_supplier_requires_company_and_valid_email() {
        let mut supplier = NewSupplier {
            company_name: "Northwind".into(),
            contact_name: "Ada".into(),
            email: "sales@northwind.example.com".into(),
            phone: None,
            address: None,
        };
        assert!(supplier.validate().is_ok());

        supplier.email = "not-an-email".into();
        assert!(supplier.validate().is_err());

        supplier.email = "sales@northwind.example.com".into();
        supplier.company_name = "  ".into();
        assert_eq!(
            supplier.validate().unwrap_err().to_string(),
            "company_name must not be empty"
        );
    }
}
