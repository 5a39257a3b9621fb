use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{ValidationError, require_non_empty};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 31,
    "supplier_id": 7,
    "name": "Oat milk 1L",
    "sku": "OAT-1L",
    "category": "dairy-alternatives",
    "description": "Barista edition",
    "price": 2.4,
    "stock_quantity": 120,
    "reorder_level": 40,
    "created_at": "2026-01-01T00:00:00Z",
    "updated_at": "2026-01-01T00:00:00Z"
}))]
pub struct Product {
    pub id: u64,
    pub supplier_id: u64,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: u32,
    pub reorder_level: u32,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }

    pub fn stock_value(&self) -> f64 {
        self.price * f64::from(self.stock_quantity)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProduct {
    #[schema(example = "Oat milk 1L")]
    pub name: String,
    #[schema(example = "OAT-1L")]
    pub sku: String,
    #[schema(example = "dairy-alternatives")]
    pub category: String,
    pub description: Option<String>,
    #[schema(example = 2.4)]
    pub price: f64,
    #[schema(example = 120)]
    pub stock_quantity: u32,
    #[schema(example = 40)]
    pub reorder_level: u32,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("sku", &self.sku)?;
        require_non_empty("category", &self.category)?;
        validate_price(self.price)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<u32>,
    pub reorder_level: Option<u32>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.sku.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
            && self.reorder_level.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("No fields provided for update"));
        }
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(sku) = &self.sku {
            require_non_empty("sku", sku)?;
        }
        if let Some(category) = &self.category {
            require_non_empty("category", category)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::new("price must be a non-negative number"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    /// Exact category match
    #[schema(example = "dairy-alternatives")]
    pub category: Option<String>,
    /// Case-insensitive match on name or SKU
    #[schema(example = "oat")]
    pub search: Option<String>,
    /// Only products at or below their reorder level
    pub low_stock: Option<bool>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}
