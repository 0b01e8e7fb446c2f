use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_zero() -> i64 {
    0
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateBookingInput {
    #[validate(range(min = 1))]
    pub flat_number: i64,
    #[validate(range(min = 1, max = 50))]
    pub number_of_adults: i64,
    #[serde(default = "default_zero")]
    #[validate(range(min = 0, max = 50))]
    pub number_of_children: i64,
    #[serde(default = "default_zero")]
    #[validate(range(min = 0, max = 50))]
    pub number_of_animals: i64,
    #[validate(length(min = 1))]
    pub arrival_date: String,
    #[validate(length(min = 1))]
    pub leaving_date: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    pub discount: Option<String>,
    pub list_of_names: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateClientInput {
    pub gender: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    pub mobile_phone: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<i64>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct AvailabilityInput {
    #[validate(range(min = 1))]
    pub flat_number: i64,
    #[validate(length(min = 1))]
    pub arrival_date: String,
    #[validate(length(min = 1))]
    pub leaving_date: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct GenerateInvoiceInput {
    #[serde(alias = "bookingId")]
    #[validate(length(min = 1))]
    pub booking_id: String,
}

const DEFAULT_LIST_LIMIT: i64 = 500;
pub const MAX_LIST_LIMIT: i64 = 1000;

fn default_list_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}

/// Explicit pagination for list endpoints, e.g. `?limit=100&offset=200`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default = "default_zero")]
    pub offset: i64,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ClientPath {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct BookingPath {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct InvoiceBookingPath {
    pub booking: String,
}

pub fn serialize_to_map<T>(value: &T) -> serde_json::Map<String, serde_json::Value>
where
    T: serde::Serialize,
{
    let json = serde_json::to_value(value)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
    json.as_object().cloned().unwrap_or_default()
}

pub fn remove_nulls(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.retain(|_, value| !value.is_null());
    map
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{remove_nulls, serialize_to_map, validate_input, CreateBookingInput,
        CreateClientInput, ListQuery};

    #[test]
    fn booking_input_requires_at_least_one_adult() {
        let input: CreateBookingInput = serde_json::from_value(json!({
            "flat_number": 2,
            "number_of_adults": 0,
            "arrival_date": "01-03-2026",
            "leaving_date": "05-03-2026",
            "client_id": "550e8400-e29b-41d4-a716-446655440000",
        }))
        .expect("deserializes");
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn occupancy_counts_default_to_zero() {
        let input: CreateBookingInput = serde_json::from_value(json!({
            "flat_number": 2,
            "number_of_adults": 2,
            "arrival_date": "01-03-2026",
            "leaving_date": "05-03-2026",
            "client_id": "550e8400-e29b-41d4-a716-446655440000",
        }))
        .expect("deserializes");
        assert_eq!(input.number_of_children, 0);
        assert_eq!(input.number_of_animals, 0);
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn client_input_checks_email_shape() {
        let valid: CreateClientInput = serde_json::from_value(json!({
            "full_name": "Max Mustermann",
            "email": "max@example.com",
        }))
        .expect("deserializes");
        assert!(validate_input(&valid).is_ok());

        let invalid: CreateClientInput = serde_json::from_value(json!({
            "full_name": "Max Mustermann",
            "email": "not-an-email",
        }))
        .expect("deserializes");
        assert!(validate_input(&invalid).is_err());
    }

    #[test]
    fn list_query_defaults_and_clamps() {
        let defaults: ListQuery = serde_json::from_value(json!({})).expect("deserializes");
        assert_eq!(defaults.limit(), 500);
        assert_eq!(defaults.offset(), 0);

        let oversized: ListQuery =
            serde_json::from_value(json!({"limit": 5000, "offset": -3})).expect("deserializes");
        assert_eq!(oversized.limit(), 1000);
        assert_eq!(oversized.offset(), 0);

        let undersized: ListQuery =
            serde_json::from_value(json!({"limit": 0, "offset": 40})).expect("deserializes");
        assert_eq!(undersized.limit(), 1);
        assert_eq!(undersized.offset(), 40);
    }

    #[test]
    fn null_fields_are_stripped_before_insert() {
        let input: CreateClientInput = serde_json::from_value(json!({
            "full_name": "Max Mustermann",
            "city": "Berlin",
        }))
        .expect("deserializes");
        let record = remove_nulls(serialize_to_map(&input));
        assert!(record.contains_key("full_name"));
        assert!(record.contains_key("city"));
        assert!(!record.contains_key("email"));
        assert!(!record.contains_key("tax_id"));
    }
}
