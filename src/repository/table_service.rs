use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};

use crate::error::AppError;

const ALLOWED_TABLES: &[&str] = &[
    "bookings",
    "clients",
    "invoice_counters",
    "invoices",
    "price_rates",
];

pub async fn list_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: Option<&Map<String, Value>>,
    limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let table_name = validate_table(table)?;
    let order_name = if order_by.trim().is_empty() {
        "created_at"
    } else {
        validate_identifier(order_by)?
    };

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE 1=1");

    if let Some(filter_map) = filters {
        for (key, value) in filter_map {
            let column = validate_identifier(key)?;
            query.push(" AND ");
            push_eq_filter(&mut query, column, value);
        }
    }

    query.push(" ORDER BY t.").push(order_name);
    query.push(if ascending { " ASC" } else { " DESC" });
    query
        .push(" LIMIT ")
        .push_bind(limit.clamp(1, 1000))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows))
}

pub async fn get_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE ");
    push_eq_filter(&mut query, id_name, &Value::String(row_id.to_string()));
    query.push(" LIMIT 1");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::NotFound(format!("{table_name} record not found.")))
}

// jsonb_populate_record lets PostgreSQL resolve column types (uuid, numeric,
// smallint, jsonb) from the table definition instead of binding each value.
pub async fn create_row(
    pool: &sqlx::PgPool,
    table: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Could not create {table_name} record."
        )));
    }

    let mut keys = payload.keys().cloned().collect::<Vec<_>>();
    keys.sort_unstable();

    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
    query.push(table_name).push(" (");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(validate_identifier(key)?);
        }
    }
    query.push(") SELECT ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push("r.");
            separated.push_unseparated(validate_identifier(key)?);
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query
        .push(") r RETURNING row_to_json(")
        .push(table_name)
        .push(".*) AS row");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::Internal(format!("Could not create {table_name} record.")))
}

pub async fn update_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    payload: &Map<String, Value>,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let mut keys = payload.keys().cloned().collect::<Vec<_>>();
    keys.sort_unstable();

    let mut query = QueryBuilder::<Postgres>::new("UPDATE ");
    query.push(table_name).push(" t SET ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            let column = validate_identifier(key)?;
            separated.push(column);
            separated.push_unseparated(" = r.");
            separated.push_unseparated(column);
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query.push(") r WHERE ");
    push_eq_filter(&mut query, id_name, &Value::String(row_id.to_string()));
    query.push(" RETURNING row_to_json(t) AS row");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::NotFound(format!("{table_name} record not found.")))
}

/// Deletes a row and returns the deleted record.
pub async fn delete_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let existing = get_row(pool, table, row_id, id_field).await?;
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM ");
    query.push(table_name).push(" t WHERE ");
    push_eq_filter(&mut query, id_name, &Value::String(row_id.to_string()));
    query.build().execute(pool).await.map_err(map_db_error)?;

    Ok(existing)
}

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .collect()
}

fn validate_table(table: &str) -> Result<&str, AppError> {
    let normalized = validate_identifier(table)?;
    if ALLOWED_TABLES.contains(&normalized) {
        return Ok(normalized);
    }
    Err(AppError::Forbidden(format!(
        "Table '{normalized}' is not allowed."
    )))
}

fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    if !trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    }) {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    if trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit())
    {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

fn push_eq_filter(query: &mut QueryBuilder<Postgres>, column: &str, value: &Value) {
    query.push("t.").push(column);
    match value {
        Value::Bool(flag) => {
            query.push(" = ").push_bind(*flag);
        }
        Value::Number(number) => {
            if let Some(as_i64) = number.as_i64() {
                query.push(" = ").push_bind(as_i64);
            } else if let Some(as_f64) = number.as_f64() {
                query.push(" = ").push_bind(as_f64);
            } else {
                query.push("::text = ").push_bind(number.to_string());
            }
        }
        Value::String(text) => {
            if is_uuid_column(column) {
                if let Ok(parsed) = uuid::Uuid::parse_str(text.trim()) {
                    query.push(" = ").push_bind(parsed);
                    return;
                }
            }
            query.push("::text = ").push_bind(text.clone());
        }
        other => {
            query.push("::text = ").push_bind(other.to_string());
        }
    }
}

fn is_uuid_column(column: &str) -> bool {
    let normalized = column.trim();
    // invoice_id is the sequential invoice number, not a row reference.
    normalized == "id" || (normalized.ends_with("_id") && normalized != "invoice_id")
}

fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};
    use sqlx::{Postgres, QueryBuilder};

    use super::{is_uuid_column, push_eq_filter, validate_identifier, validate_table};

    #[test]
    fn only_domain_tables_are_allowed() {
        assert!(validate_table("bookings").is_ok());
        assert!(validate_table("invoices").is_ok());
        assert!(validate_table("pg_catalog").is_err());
        assert!(validate_table("bookings; drop table bookings").is_err());
    }

    #[test]
    fn identifiers_reject_injection_attempts() {
        assert!(validate_identifier("flat_number").is_ok());
        assert!(validate_identifier("  created_at ").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("name\"").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn uuid_columns_are_the_row_references() {
        assert!(is_uuid_column("id"));
        assert!(is_uuid_column("client_id"));
        assert!(is_uuid_column("booking_id"));
        assert!(!is_uuid_column("invoice_id"));
        assert!(!is_uuid_column("flat_number"));
    }

    #[test]
    fn eq_filter_binds_by_inferred_type() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 WHERE ");
        push_eq_filter(&mut query, "flat_number", &Value::from(4));
        assert_eq!(query.sql(), "SELECT 1 WHERE t.flat_number = $1");

        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 WHERE ");
        push_eq_filter(
            &mut query,
            "client_id",
            &Value::String("550e8400-e29b-41d4-a716-446655440000".to_string()),
        );
        assert_eq!(query.sql(), "SELECT 1 WHERE t.client_id = $1");

        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 WHERE ");
        push_eq_filter(
            &mut query,
            "category",
            &Value::String("cleaning".to_string()),
        );
        assert_eq!(query.sql(), "SELECT 1 WHERE t.category::text = $1");
    }

    #[test]
    fn insert_sql_uses_jsonb_populate_record() {
        let mut payload = Map::new();
        payload.insert("flat_number".to_string(), Value::from(4));
        payload.insert(
            "arrival_date".to_string(),
            Value::String("01-03-2026".to_string()),
        );
        payload.insert(
            "leaving_date".to_string(),
            Value::String("05-03-2026".to_string()),
        );

        let mut keys = payload.keys().cloned().collect::<Vec<_>>();
        keys.sort_unstable();

        let mut query = QueryBuilder::<Postgres>::new("INSERT INTO bookings (");
        {
            let mut separated = query.separated(", ");
            for key in &keys {
                separated.push(key.as_str());
            }
        }
        query.push(") SELECT ");
        {
            let mut separated = query.separated(", ");
            for key in &keys {
                separated.push("r.");
                separated.push_unseparated(key.as_str());
            }
        }
        query.push(" FROM jsonb_populate_record(NULL::bookings, ");
        query.push_bind(Value::Object(payload));
        query.push(") r");

        let sql = query.sql();
        assert!(
            sql.contains("jsonb_populate_record(NULL::bookings"),
            "Expected jsonb_populate_record in SQL but got: {sql}"
        );
        assert!(
            sql.contains("SELECT r.arrival_date, r.flat_number, r.leaving_date"),
            "Expected r.col references in SQL but got: {sql}"
        );
    }
}
