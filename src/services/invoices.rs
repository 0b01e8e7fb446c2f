use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::Row;

use crate::{
    error::AppError,
    repository::table_service::{create_row, get_row, update_row},
    services::dates::BOOKING_DATE_FORMAT,
};

const INVOICE_COUNTER: &str = "invoice";

// Seeded from the highest already-assigned id so the sequence continues
// gaplessly after migration; the increment-and-return is a single statement
// so concurrent requests serialize inside the store.
const COUNTER_SEED_SQL: &str = "INSERT INTO invoice_counters (name, value)
         SELECT $1, COALESCE(MAX(invoice_id), 0) FROM invoices
         ON CONFLICT (name) DO NOTHING";
const COUNTER_NEXT_SQL: &str =
    "UPDATE invoice_counters SET value = value + 1 WHERE name = $1 RETURNING value";

/// Corrected sequencing rule: one past the highest assigned id, independent of
/// insertion order. Used to seed the store-owned counter.
pub fn next_id_after(existing_ids: &[i64]) -> i64 {
    existing_ids.iter().copied().max().unwrap_or(0) + 1
}

/// Reserves the next sequential invoice id through an atomically incremented
/// counter row, so concurrent invoice requests can never read the same value.
/// On first use the counter is seeded from the highest invoice id already
/// assigned.
pub async fn next_invoice_id(pool: &sqlx::PgPool) -> Result<i64, AppError> {
    sqlx::query(COUNTER_SEED_SQL)
        .bind(INVOICE_COUNTER)
        .execute(pool)
        .await
        .map_err(|error| AppError::Dependency(format!("Invoice counter seed failed: {error}")))?;

    let row = sqlx::query(COUNTER_NEXT_SQL)
        .bind(INVOICE_COUNTER)
        .fetch_one(pool)
        .await
        .map_err(|error| {
            AppError::Dependency(format!("Invoice counter update failed: {error}"))
        })?;

    row.try_get::<i64, _>("value")
        .map_err(|error| AppError::Internal(format!("Invoice counter returned no value: {error}")))
}

/// Snapshot of client contact data plus the booking's occupancy and pricing
/// fields, frozen at invoicing time so later edits to either record cannot
/// change an issued invoice.
pub fn build_invoice_data(invoice_id: i64, booking: &Value, client: &Value) -> Value {
    json!({
        "invoice_id": invoice_id,
        "issued_on": Utc::now().format(BOOKING_DATE_FORMAT).to_string(),
        "client": {
            "gender": field(client, "gender"),
            "full_name": field(client, "full_name"),
            "mobile_phone": field(client, "mobile_phone"),
            "phone": field(client, "phone"),
            "email": field(client, "email"),
            "street": field(client, "street"),
            "house_number": field(client, "house_number"),
            "postal_code": field(client, "postal_code"),
            "city": field(client, "city"),
            "country": field(client, "country"),
            "tax_id": field(client, "tax_id"),
        },
        "booking": {
            "flat_number": field(booking, "flat_number"),
            "arrival_date": field(booking, "arrival_date"),
            "leaving_date": field(booking, "leaving_date"),
            "number_of_nights": field(booking, "number_of_nights"),
            "number_of_adults": field(booking, "number_of_adults"),
            "number_of_children": field(booking, "number_of_children"),
            "number_of_animals": field(booking, "number_of_animals"),
            "list_of_names": field(booking, "list_of_names"),
            "price_per_night_two": field(booking, "price_per_night_two"),
            "price_per_night_additional_person": field(booking, "price_per_night_additional_person"),
            "price_per_night_animal": field(booking, "price_per_night_animal"),
            "cleaning_price": field(booking, "cleaning_price"),
            "discount": field(booking, "discount"),
            "total_price": field(booking, "total_price"),
        },
    })
}

fn field(record: &Value, key: &str) -> Value {
    record
        .as_object()
        .and_then(|obj| obj.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

/// A booking may be invoiced exactly once; anything but status 0 is rejected.
fn ensure_uninvoiced(booking: &Value) -> Result<(), AppError> {
    let invoice_status = booking
        .as_object()
        .and_then(|obj| obj.get("invoice_status"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if invoice_status != 0 {
        return Err(AppError::Conflict(
            "An invoice was already generated for this booking.".to_string(),
        ));
    }
    Ok(())
}

fn invoiced_status_patch() -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("invoice_status".to_string(), Value::from(1));
    patch
}

/// Generates the invoice for an uninvoiced booking: loads the booking and its
/// client, reserves the next sequential id, persists the invoice and then
/// flips the booking's invoice status to 1.
///
/// The two writes are not wrapped in a transaction. If the status update fails
/// after the invoice row exists, the mismatch is logged as a distinct
/// inconsistency event (recoverable by cross-referencing invoices against
/// bookings still flagged 0) and surfaced to the caller.
pub async fn generate_invoice(pool: &sqlx::PgPool, booking_id: &str) -> Result<Value, AppError> {
    let booking = get_row(pool, "bookings", booking_id, "id").await?;
    ensure_uninvoiced(&booking)?;

    let client_id = booking
        .as_object()
        .and_then(|obj| obj.get("client_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::UnprocessableEntity("Booking has no linked client.".to_string())
        })?
        .to_string();
    let client = get_row(pool, "clients", &client_id, "id").await?;

    let invoice_id = next_invoice_id(pool).await?;

    let mut invoice_payload = Map::new();
    invoice_payload.insert("invoice_id".to_string(), Value::from(invoice_id));
    invoice_payload.insert(
        "booking_id".to_string(),
        Value::String(booking_id.to_string()),
    );
    invoice_payload.insert(
        "data".to_string(),
        build_invoice_data(invoice_id, &booking, &client),
    );
    let invoice = create_row(pool, "invoices", &invoice_payload).await?;

    let status_patch = invoiced_status_patch();
    if let Err(error) = update_row(pool, "bookings", booking_id, &status_patch, "id").await {
        tracing::error!(
            booking_id,
            invoice_id,
            %error,
            inconsistency = "invoice_without_status_flag",
            "invoice persisted but booking status update failed; booking still reads as uninvoiced"
        );
        return Err(AppError::Internal(
            "Invoice was created but the booking could not be marked as invoiced.".to_string(),
        ));
    }

    Ok(invoice)
}
