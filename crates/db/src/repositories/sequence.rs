//! Atomic business-number allocation.

use chrono::NaiveDate;
use lessonbook_core::sequence::{BusinessNumber, SequencePrefix};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};

const NEXT_VALUE_SQL: &str = r"
INSERT INTO business_sequences (prefix, seq_date, value)
VALUES ($1, $2, 1)
ON CONFLICT (prefix, seq_date)
DO UPDATE SET value = business_sequences.value + 1
RETURNING value
";

/// Allocates the next number for `prefix` on `date`.
///
/// Runs inside the caller's transaction; the counter row stays locked until
/// it commits, and a rollback gives the number back.
pub(crate) async fn next_number<C: ConnectionTrait>(
    conn: &C,
    prefix: SequencePrefix,
    date: NaiveDate,
) -> Result<BusinessNumber, DbErr> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_VALUE_SQL,
            [prefix.code().into(), date.into()],
        ))
        .await?
        .ok_or_else(|| DbErr::Custom(format!("sequence {prefix} returned no row")))?;

    let value: i64 = row.try_get("", "value")?;
    let seq = u64::try_from(value)
        .map_err(|_| DbErr::Custom(format!("sequence {prefix} returned {value}")))?;

    Ok(BusinessNumber::new(prefix, date, seq))
}
