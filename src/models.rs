use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "northwind")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "Northwind Traders")]
    pub company_name: String,
    #[schema(example = "Ada Park")]
    pub contact_name: String,
    #[schema(example = "sales@northwind.example.com")]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "Supplier registered successfully")]
    pub message: String,
    #[schema(example = 7)]
    pub supplier_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "northwind")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "supplier")]
    pub role: String,
    pub supplier_id: Option<u64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: u64,
    pub username: String,
    #[schema(example = "supplier")]
    pub role: String,
    pub supplier_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only for supplier accounts
    pub supplier_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    #[schema(example = "s3cret-pass")]
    pub current_password: String,
    #[schema(example = "n3w-s3cret-pass")]
    pub new_password: String,
}
