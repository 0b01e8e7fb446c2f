use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    repository::table_service::{get_row, list_rows},
    schemas::{validate_input, GenerateInvoiceInput, InvoiceBookingPath, ListQuery},
    services::invoices::generate_invoice,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/",
            axum::routing::post(create_invoice).get(list_invoices),
        )
        .route("/{booking}", axum::routing::get(get_invoice_for_booking))
}

async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateInvoiceInput>,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let invoice = generate_invoice(pool, &payload.booking_id).await?;
    Ok(Json(invoice))
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = list_rows(
        pool,
        "invoices",
        None,
        query.limit(),
        query.offset(),
        "invoice_id",
        true,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn get_invoice_for_booking(
    State(state): State<AppState>,
    Path(path): Path<InvoiceBookingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let row = get_row(pool, "invoices", &path.booking, "booking_id").await?;
    Ok(Json(row))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
