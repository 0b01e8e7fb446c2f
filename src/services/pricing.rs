use serde_json::{Map, Value};

use crate::{error::AppError, repository::table_service::list_rows};

pub const RATE_TWO_GUESTS: &str = "two_guests";
pub const RATE_ADDITIONAL_PERSON: &str = "additional_person";
pub const RATE_CLEANING: &str = "cleaning";
pub const RATE_ANIMAL: &str = "animal";

/// Nightly rate table for a flat: base rate covering two occupants, a
/// per-night surcharge when more occupants are present, a flat cleaning fee
/// and a per-animal per-night rate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateCard {
    pub two_guests: f64,
    pub additional_person: f64,
    pub cleaning: f64,
    pub animal: f64,
}

/// Loads the read-only rate table. Every category must be present; a partial
/// table means the deployment is misconfigured.
pub async fn load_rate_card(pool: &sqlx::PgPool) -> Result<RateCard, AppError> {
    let rows = list_rows(pool, "price_rates", None, 10, 0, "category", true).await?;

    let mut card = RateCard::default();
    let mut seen = [false; 4];
    for row in &rows {
        let Some(obj) = row.as_object() else {
            continue;
        };
        let category = obj
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(amount) = rate_amount(obj) else {
            continue;
        };
        match category {
            RATE_TWO_GUESTS => (card.two_guests, seen[0]) = (amount, true),
            RATE_ADDITIONAL_PERSON => (card.additional_person, seen[1]) = (amount, true),
            RATE_CLEANING => (card.cleaning, seen[2]) = (amount, true),
            RATE_ANIMAL => (card.animal, seen[3]) = (amount, true),
            _ => {}
        }
    }

    if seen.iter().all(|found| *found) {
        return Ok(card);
    }
    Err(AppError::Dependency(
        "Price rate table is incomplete; expected categories two_guests, additional_person, cleaning and animal.".to_string(),
    ))
}

fn rate_amount(row: &Map<String, Value>) -> Option<f64> {
    match row.get("nightly_amount")? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Total price for a stay. The base rate covers the first two occupants; any
/// further occupant triggers the additional-person surcharge exactly once per
/// night, regardless of how many extra occupants there are. Zero nights leaves
/// the cleaning fee as the only charge. Negative nights are not rejected here;
/// the HTTP boundary validates date order.
pub fn compute_total_price(
    rates: &RateCard,
    adults: i64,
    children: i64,
    animals: i64,
    nights: i64,
) -> f64 {
    let nights = nights as f64;
    let base_price = nights * rates.two_guests;
    let animal_price = nights * rates.animal * animals as f64;

    let mut total = base_price + animal_price + rates.cleaning;
    if adults + children - 2 > 0 {
        total += rates.additional_person * nights;
    }
    total
}

/// Raw subtraction, unvalidated against the total; a discount larger than the
/// total produces a negative price.
pub fn apply_discount(total: f64, discount: f64) -> f64 {
    total - discount
}

/// Monetary amounts are stored as strings rounded to two decimal places.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::{apply_discount, compute_total_price, format_amount, RateCard};

    fn sample_rates() -> RateCard {
        RateCard {
            two_guests: 100.0,
            additional_person: 20.0,
            cleaning: 15.0,
            animal: 10.0,
        }
    }

    #[test]
    fn two_occupants_pay_base_plus_animal_and_cleaning() {
        let total = compute_total_price(&sample_rates(), 2, 0, 1, 3);
        assert_eq!(format_amount(total), "345.00");
    }

    #[test]
    fn extra_occupant_adds_flat_surcharge_once() {
        // Surcharge is per night but not per additional person.
        let three = compute_total_price(&sample_rates(), 3, 0, 1, 3);
        assert_eq!(format_amount(three), "405.00");

        let five = compute_total_price(&sample_rates(), 4, 1, 1, 3);
        assert_eq!(format_amount(five), "405.00");
    }

    #[test]
    fn children_count_toward_occupancy() {
        let total = compute_total_price(&sample_rates(), 2, 1, 0, 2);
        assert_eq!(format_amount(total), "255.00");
    }

    #[test]
    fn zero_nights_is_cleaning_fee_only() {
        let total = compute_total_price(&sample_rates(), 2, 0, 2, 0);
        assert_eq!(format_amount(total), "15.00");
    }

    #[test]
    fn discount_is_raw_subtraction() {
        assert_eq!(format_amount(apply_discount(345.0, 45.0)), "300.00");
        // Oversized discounts are not clamped.
        assert_eq!(format_amount(apply_discount(100.0, 150.0)), "-50.00");
    }

    #[test]
    fn amounts_round_to_two_places() {
        assert_eq!(format_amount(99.999), "100.00");
        assert_eq!(format_amount(0.1), "0.10");
        assert_eq!(format_amount(345.678), "345.68");
    }
}
