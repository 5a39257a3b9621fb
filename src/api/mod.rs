pub mod dashboard;
pub mod deliveries;
pub mod products;
pub mod profile;
pub mod reorders;
pub mod reports;
pub mod suppliers;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::store::Page;

/// Bare pagination for endpoints without filters.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page (max 100)
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page::new(query.page, query.per_page)
    }
}
