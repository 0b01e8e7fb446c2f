use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    repository::table_service::{create_row, delete_row, get_row, list_rows},
    schemas::{
        remove_nulls, serialize_to_map, validate_input, AvailabilityInput, BookingPath,
        ClientPath, CreateBookingInput, CreateClientInput, ListQuery,
    },
    services::{
        availability::is_available,
        dates::{nights_between, parse_booking_date},
        pricing::{apply_discount, compute_total_price, format_amount, load_rate_card},
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/create", axum::routing::post(create_booking))
        .route(
            "/client",
            axum::routing::post(create_client).get(list_clients),
        )
        .route("/client/{id}", axum::routing::get(get_client))
        .route("/available", axum::routing::post(check_availability))
        .route("/all", axum::routing::get(list_bookings))
        .route("/delete/{id}", axum::routing::delete(delete_booking))
        .route("/no-invoice", axum::routing::get(list_uninvoiced_bookings))
}

/// Create a booking: look up the rate table, price the stay and persist the
/// record with invoice status 0. Availability is re-checked right before the
/// insert to narrow the check-then-act window between the availability
/// endpoint and booking submission.
async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingInput>,
) -> AppResult<impl IntoResponse> {
    require_user_id(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let (arrival, leaving) = parse_stay_dates(&payload.arrival_date, &payload.leaving_date)?;

    // Unknown client ids fail here instead of as an opaque FK violation.
    get_row(pool, "clients", &payload.client_id, "id").await?;

    let existing = bookings_for_flat(pool, payload.flat_number).await?;
    if !is_available(arrival, leaving, &existing) {
        return Err(AppError::Conflict(
            "Requested dates overlap with an existing booking for this flat.".to_string(),
        ));
    }

    let rates = load_rate_card(pool).await?;
    let nights = nights_between(arrival, leaving);
    let mut total = compute_total_price(
        &rates,
        payload.number_of_adults,
        payload.number_of_children,
        payload.number_of_animals,
        nights,
    );
    if let Some(discount) = payload.discount.as_deref() {
        let discount = discount.trim().parse::<f64>().map_err(|_| {
            AppError::BadRequest("Discount must be a decimal number.".to_string())
        })?;
        total = apply_discount(total, discount);
    }

    let mut record = Map::new();
    record.insert("flat_number".to_string(), Value::from(payload.flat_number));
    record.insert(
        "number_of_adults".to_string(),
        Value::from(payload.number_of_adults),
    );
    record.insert(
        "number_of_children".to_string(),
        Value::from(payload.number_of_children),
    );
    record.insert(
        "number_of_animals".to_string(),
        Value::from(payload.number_of_animals),
    );
    record.insert(
        "arrival_date".to_string(),
        Value::String(payload.arrival_date.trim().to_string()),
    );
    record.insert(
        "leaving_date".to_string(),
        Value::String(payload.leaving_date.trim().to_string()),
    );
    record.insert(
        "price_per_night_two".to_string(),
        Value::String(format_amount(rates.two_guests)),
    );
    record.insert(
        "price_per_night_additional_person".to_string(),
        Value::String(format_amount(rates.additional_person)),
    );
    record.insert(
        "cleaning_price".to_string(),
        Value::String(format_amount(rates.cleaning)),
    );
    record.insert(
        "price_per_night_animal".to_string(),
        Value::String(format_amount(rates.animal)),
    );
    record.insert(
        "total_price".to_string(),
        Value::String(format_amount(total)),
    );
    record.insert("number_of_nights".to_string(), Value::from(nights));
    record.insert(
        "client_id".to_string(),
        Value::String(payload.client_id.clone()),
    );
    record.insert("invoice_status".to_string(), Value::from(0));
    if let Some(discount) = &payload.discount {
        record.insert(
            "discount".to_string(),
            Value::String(discount.trim().to_string()),
        );
    }
    if let Some(names) = &payload.list_of_names {
        record.insert("list_of_names".to_string(), Value::String(names.clone()));
    }

    let created = create_row(pool, "bookings", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateClientInput>,
) -> AppResult<impl IntoResponse> {
    require_user_id(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let record = remove_nulls(serialize_to_map(&payload));
    let created = create_row(pool, "clients", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = list_rows(
        pool,
        "clients",
        None,
        query.limit(),
        query.offset(),
        "created_at",
        true,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn get_client(
    State(state): State<AppState>,
    Path(path): Path<ClientPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let row = get_row(pool, "clients", &path.id, "id").await?;
    Ok(Json(row))
}

async fn check_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AvailabilityInput>,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let (arrival, leaving) = parse_stay_dates(&payload.arrival_date, &payload.leaving_date)?;

    let existing = bookings_for_flat(pool, payload.flat_number).await?;
    let available = is_available(arrival, leaving, &existing);
    Ok(Json(json!({ "available": available })))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    // Most recently created first.
    let rows = list_rows(
        pool,
        "bookings",
        None,
        query.limit(),
        query.offset(),
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn delete_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "bookings", &path.id, "id").await?;
    Ok(Json(deleted))
}

async fn list_uninvoiced_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert("invoice_status".to_string(), Value::from(0));
    let rows = list_rows(
        pool,
        "bookings",
        Some(&filters),
        query.limit(),
        query.offset(),
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

fn parse_stay_dates(arrival: &str, leaving: &str) -> Result<(NaiveDate, NaiveDate), AppError> {
    let arrival = parse_booking_date(arrival).ok_or_else(|| {
        AppError::BadRequest("Invalid arrival date; expected DD-MM-YYYY.".to_string())
    })?;
    let leaving = parse_booking_date(leaving).ok_or_else(|| {
        AppError::BadRequest("Invalid leaving date; expected DD-MM-YYYY.".to_string())
    })?;
    // Same-day arrival and departure is a valid zero-night stay (it is priced
    // at the cleaning fee alone); only a reversed range is rejected.
    if leaving < arrival {
        return Err(AppError::BadRequest(
            "Leaving date must not be before arrival date.".to_string(),
        ));
    }
    Ok((arrival, leaving))
}

const FLAT_SCAN_PAGE: i64 = 1000;

/// The overlap check must see every booking for the flat, so this pages
/// through the full set rather than trusting a single capped fetch.
async fn bookings_for_flat(pool: &sqlx::PgPool, flat_number: i64) -> Result<Vec<Value>, AppError> {
    let mut filters = Map::new();
    filters.insert("flat_number".to_string(), Value::from(flat_number));

    let mut bookings = Vec::new();
    let mut offset = 0;
    loop {
        let page = list_rows(
            pool,
            "bookings",
            Some(&filters),
            FLAT_SCAN_PAGE,
            offset,
            "created_at",
            true,
        )
        .await?;
        let fetched = page.len() as i64;
        bookings.extend(page);
        if fetched < FLAT_SCAN_PAGE {
            return Ok(bookings);
        }
        offset += FLAT_SCAN_PAGE;
    }
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
