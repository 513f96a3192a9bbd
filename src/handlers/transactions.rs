//! Ledger handlers.
//!
//! The ledger is append-only plus admin delete. Every entry stores a
//! signed amount (deposits positive, withdrawals negative) and the
//! business balance is always derived as the sum of those amounts, never
//! stored. Withdrawals take a row lock on the business so two concurrent
//! withdrawals cannot both pass the balance check.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::auth::ErrorResponse,
    helpers::{get_business_id, get_user_id},
    models::{NewTransaction, Transaction, User},
    schema::{businesses, transactions, users},
    AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    pub kind: TransactionKind,
    /// Magnitude of the entry. Must be positive; the sign is derived from
    /// `kind`.
    #[schema(example = 50.0)]
    pub amount: f64,
    #[schema(example = "Office supplies")]
    pub description: String,
    /// Hosted receipt URL from a prior `/receipts` upload.
    pub receipt_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    #[schema(example = "Office supplies")]
    pub description: String,
    /// Signed amount: positive for deposits, negative for withdrawals.
    #[schema(example = -25.5)]
    pub amount: f64,
    pub receipt_url: Option<String>,
    pub created_by: Uuid,
    #[schema(example = "Alice Smith")]
    pub created_by_name: String,
    pub created_at: NaiveDateTime,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            description: t.description,
            amount: t.amount.to_f64().unwrap_or(0.0),
            receipt_url: t.receipt_url,
            created_by: t.created_by,
            created_by_name: t.created_by_name,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub data: Vec<TransactionResponse>,
    /// Sum of all signed amounts for the business.
    #[schema(example = 124.5)]
    pub balance: f64,
}

/// Parses the request amount into a two-decimal ledger amount.
fn parse_amount(amount: f64) -> Result<BigDecimal, (StatusCode, Json<ApiError>)> {
    let amount = BigDecimal::try_from(amount).map_err(|_| {
        ApiError::bad_request("Amount must be a valid number", "VALIDATION_ERROR")
    })?;

    if amount <= BigDecimal::from(0) {
        return Err(ApiError::bad_request(
            "Amount must be positive",
            "VALIDATION_ERROR",
        ));
    }

    Ok(amount.with_scale_round(2, RoundingMode::HalfUp))
}

fn business_balance(
    conn: &mut PgConnection,
    business_id: Uuid,
) -> Result<BigDecimal, diesel::result::Error> {
    let sum: Option<BigDecimal> = transactions::table
        .filter(transactions::business_id.eq(business_id))
        .select(diesel::dsl::sum(transactions::amount))
        .first(conn)?;

    Ok(sum.unwrap_or_else(|| BigDecimal::from(0)))
}

enum LedgerError {
    InsufficientFunds,
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for LedgerError {
    fn from(e: diesel::result::Error) -> Self {
        LedgerError::Db(e)
    }
}

/// Appends a withdrawal after re-checking the balance under a lock on the
/// business row. The lock serializes concurrent withdrawals for the same
/// business, so the balance read cannot go stale before the insert.
fn insert_withdrawal(
    conn: &mut PgConnection,
    new_transaction: &NewTransaction,
) -> Result<Transaction, LedgerError> {
    conn.transaction::<_, LedgerError, _>(|conn| {
        businesses::table
            .find(new_transaction.business_id)
            .select(businesses::id)
            .for_update()
            .first::<Uuid>(conn)?;

        let balance = business_balance(conn, new_transaction.business_id)?;

        // amount is already negative here
        if &balance + &new_transaction.amount < BigDecimal::from(0) {
            return Err(LedgerError::InsufficientFunds);
        }

        let transaction = diesel::insert_into(transactions::table)
            .values(new_transaction)
            .get_result(conn)?;

        Ok(transaction)
    })
}

/// Lists the caller's business ledger, newest first, with the derived
/// balance.
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "Transactions",
    responses(
        (status = 200, description = "Ledger entries and balance", body = TransactionListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "No business context", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<TransactionListResponse>> {
    let business_id = get_business_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let results: Vec<Transaction> = transactions::table
        .filter(transactions::business_id.eq(business_id))
        .order(transactions::created_at.desc())
        .load(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to list transactions");
            ApiError::db_error()
        })?;

    // Summed over the loaded rows, not a second query, so the balance
    // always agrees with the entries returned alongside it.
    let balance = results
        .iter()
        .fold(BigDecimal::from(0), |acc, t| acc + &t.amount);

    Ok(Json(TransactionListResponse {
        data: results.into_iter().map(Into::into).collect(),
        balance: balance.to_f64().unwrap_or(0.0),
    }))
}

/// Appends a ledger entry for the caller's business.
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "Transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Entry recorded", body = TransactionResponse),
        (status = 400, description = "Validation error or insufficient funds", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "No business context", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<TransactionResponse>)> {
    let business_id = get_business_id(&claims)?;
    let user_id = get_user_id(&claims)?;

    let description = payload.description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::bad_request(
            "Description is required",
            "VALIDATION_ERROR",
        ));
    }

    let amount = parse_amount(payload.amount)?;
    let signed_amount = match payload.kind {
        TransactionKind::Deposit => amount,
        TransactionKind::Withdraw => -amount,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    // Name snapshot: the entry keeps the author's name as it was at
    // write time, even if the account is later renamed.
    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .map_err(|_| ApiError::unauthorized("User not found", "USER_NOT_FOUND"))?;
    let created_by_name = user.name.unwrap_or(user.email);

    let new_transaction = NewTransaction {
        business_id,
        description,
        amount: signed_amount,
        receipt_url: payload.receipt_url.filter(|u| !u.trim().is_empty()),
        created_by: user_id,
        created_by_name,
    };

    let transaction: Transaction = match payload.kind {
        TransactionKind::Deposit => diesel::insert_into(transactions::table)
            .values(&new_transaction)
            .get_result(&mut conn)
            .map_err(|e| {
                error!(error = %e, "Failed to record deposit");
                ApiError::db_error()
            })?,
        TransactionKind::Withdraw => {
            insert_withdrawal(&mut conn, &new_transaction).map_err(|e| match e {
                LedgerError::InsufficientFunds => {
                    warn!(business_id = %business_id, "Withdrawal rejected - would overdraw");
                    ApiError::bad_request(
                        "Withdrawal exceeds current balance",
                        "INSUFFICIENT_FUNDS",
                    )
                }
                LedgerError::Db(e) => {
                    error!(error = %e, "Failed to record withdrawal");
                    ApiError::db_error()
                }
            })?
        }
    };

    info!(
        transaction_id = %transaction.id,
        business_id = %business_id,
        amount = %transaction.amount,
        "Ledger entry recorded"
    );

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// Deletes a ledger entry. Admin-only and scoped to the caller's business.
#[utoipa::path(
    delete,
    path = "/transactions/{transaction_id}",
    tag = "Transactions",
    params(("transaction_id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let business_id = get_business_id(&claims)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(
        transactions::table
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::business_id.eq(business_id)),
    )
    .execute(&mut conn)
    .map_err(|e| {
        error!(error = %e, "Failed to delete transaction");
        ApiError::db_error()
    })?;

    if deleted == 0 {
        return Err(ApiError::not_found(
            "Transaction not found",
            "TRANSACTION_NOT_FOUND",
        ));
    }

    info!(transaction_id = %transaction_id, business_id = %business_id, "Ledger entry deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_amount_rounds_to_cents() {
        let amount = parse_amount(10.555).unwrap();
        assert_eq!(amount, BigDecimal::from_str("10.56").unwrap());
    }

    #[test]
    fn test_parse_amount_rejects_zero_and_negative() {
        assert!(parse_amount(0.0).is_err());
        assert!(parse_amount(-5.0).is_err());
    }

    #[test]
    fn test_parse_amount_rejects_nan() {
        assert!(parse_amount(f64::NAN).is_err());
    }
}
