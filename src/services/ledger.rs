//! Transaction workflow: approve, post (moves account balances) and reconcile.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::CONFIG;
use crate::database::manager::DatabaseError;
use crate::database::repository::{lock_active_404, save_record};
use crate::error::ApiError;
use crate::models::account::AccountType;
use crate::models::transaction::LedgerEntry;
use crate::models::{Entity, Transaction};
use crate::workflow::transaction::transition;
use crate::workflow::TransactionAction;

/// Applies `action` to an active transaction inside one database transaction.
pub async fn advance(pool: &PgPool, id: Uuid, action: TransactionAction, actor: Uuid) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await.map_err(DatabaseError::from)?;
    let mut record = lock_active_404::<Transaction>(&mut *tx, id).await?;
    let next = transition(record.status, action)?;
    let now = Utc::now();

    match action {
        TransactionAction::Approve => {
            record.approved_by = Some(actor);
            record.approved_at = Some(now);
        }
        TransactionAction::Post => {
            if CONFIG.ledger.require_balanced_posting && !record.is_balanced() {
                return Err(ApiError::invalid_state("Transaction entries are not balanced"));
            }
            apply_to_accounts(&mut *tx, &record.entries.0, actor).await?;
            record.posted_by = Some(actor);
            record.posted_at = Some(now);
        }
        TransactionAction::Reconcile => {
            record.reconciled_by = Some(actor);
            record.reconciled_at = Some(now);
        }
    }

    record.status = next;
    record.audit_mut().touch(actor);
    let saved = save_record(&mut *tx, &record).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(transaction = %id, status = %saved.status, "Transaction advanced");
    Ok(saved)
}

async fn apply_to_accounts(conn: &mut PgConnection, entries: &[LedgerEntry], actor: Uuid) -> Result<(), ApiError> {
    let ids: Vec<Uuid> = entries.iter().map(|e| e.account).collect();
    let rows: Vec<(Uuid, AccountType)> = sqlx::query_as(
        "SELECT \"id\", \"type\" FROM \"accounts\" WHERE \"id\" = ANY($1) AND \"is_active\" = true FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(DatabaseError::from)?;
    let types: HashMap<Uuid, AccountType> = rows.into_iter().collect();

    for (account, delta) in balance_deltas(entries, &types)? {
        sqlx::query(
            "UPDATE \"accounts\" SET \"balance\" = \"balance\" + $2, \"last_updated_by\" = $3, \"updated_at\" = now() \
             WHERE \"id\" = $1",
        )
        .bind(account)
        .bind(delta)
        .bind(actor)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::from)?;
    }
    Ok(())
}

/// Net balance change per account, in account id order.
fn balance_deltas(
    entries: &[LedgerEntry],
    types: &HashMap<Uuid, AccountType>,
) -> Result<Vec<(Uuid, Decimal)>, ApiError> {
    let mut deltas: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for entry in entries {
        let account_type = types
            .get(&entry.account)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;
        *deltas.entry(entry.account).or_insert(Decimal::ZERO) += account_type.balance_delta(entry.debit, entry.credit);
    }
    Ok(deltas.into_iter().collect())
}
