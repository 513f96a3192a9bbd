use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role a user holds within their business.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// Membership status. Redeemed invites always produce `active` members.
pub const STATUS_ACTIVE: &str = "active";

pub fn is_valid_role(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_MEMBER
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub business_id: Option<Uuid>,
    pub role: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::businesses)]
pub struct Business {
    pub id: Uuid,
    #[schema(example = "Acme Ltd")]
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::businesses)]
pub struct NewBusiness {
    pub name: String,
    pub owner_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::members)]
pub struct Member {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "Bob Jones")]
    pub name: String,
    #[schema(example = "member")]
    pub role: String,
    #[schema(example = "active")]
    pub status: String,
    pub invited_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::members)]
pub struct NewMember {
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::invites)]
pub struct Invite {
    pub id: Uuid,
    pub business_id: Uuid,
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "member")]
    pub role: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::invites)]
pub struct NewInvite {
    pub business_id: Uuid,
    pub email: String,
    pub role: String,
    pub created_by: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::transactions)]
pub struct Transaction {
    pub id: Uuid,
    pub business_id: Uuid,
    #[schema(example = "Office supplies")]
    pub description: String,
    /// Signed amount: positive for deposits, negative for withdrawals.
    #[schema(value_type = f64, example = 50.0)]
    pub amount: BigDecimal,
    pub receipt_url: Option<String>,
    pub created_by: Uuid,
    #[schema(example = "Alice Smith")]
    pub created_by_name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct NewTransaction {
    pub business_id: Uuid,
    pub description: String,
    pub amount: BigDecimal,
    pub receipt_url: Option<String>,
    pub created_by: Uuid,
    pub created_by_name: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_validation() {
        assert!(is_valid_role("admin"));
        assert!(is_valid_role("member"));
        assert!(!is_valid_role("owner"));
        assert!(!is_valid_role(""));
        assert!(!is_valid_role("Admin"));
    }
}
