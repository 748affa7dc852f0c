//! Deterministic pricing. Pure functions, no I/O.

use rust_decimal::{Decimal, RoundingStrategy};

use super::ItemRequest;

pub fn tax_rate() -> Decimal {
    Decimal::new(8, 2) // 8%
}

/// Fixed discount table. Unknown or empty codes yield no discount.
pub fn discount_rate(code: &str) -> Decimal {
    match code {
        "SAVE10" => Decimal::new(10, 2),
        "SAVE20" => Decimal::new(20, 2),
        "WELCOME" => Decimal::new(15, 2),
        "VIP" => Decimal::new(25, 2),
        _ => Decimal::ZERO,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// An item contributes to the subtotal only with a positive quantity and a
/// non-negative unit price. Anything else is skipped, not rejected.
pub fn is_billable(item: &ItemRequest) -> bool {
    item.quantity > 0 && item.price >= Decimal::ZERO
}

pub fn has_billable_items(items: &[ItemRequest]) -> bool {
    items.iter().any(is_billable)
}

/// Computes the full breakdown. Discount and tax are rounded to two decimals
/// at their boundary; the total is the exact sum of the rounded components,
/// so `total == subtotal - discount + tax` holds identically.
pub fn price(items: &[ItemRequest], discount_code: Option<&str>) -> PricingBreakdown {
    let raw_subtotal: Decimal = items
        .iter()
        .filter(|item| is_billable(item))
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum();

    let subtotal = to_money(raw_subtotal);
    let rate = discount_code.map(discount_rate).unwrap_or(Decimal::ZERO);
    let discount = to_money(subtotal * rate);
    let tax = to_money((subtotal - discount) * tax_rate());
    let total = subtotal - discount + tax;

    PricingBreakdown {
        subtotal,
        discount,
        tax,
        total,
    }
}

fn to_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32) -> ItemRequest {
        ItemRequest {
            id: "prod-1".to_string(),
            name: "widget".to_string(),
            price,
            quantity,
            category: None,
        }
    }

    #[test]
    fn test_reference_breakdown_with_save10() {
        let items = vec![item(dec!(699.00), 1), item(dec!(24.99), 4)];
        let breakdown = price(&items, Some("SAVE10"));

        assert_eq!(breakdown.subtotal, dec!(798.96));
        assert_eq!(breakdown.discount, dec!(79.90));
        assert_eq!(breakdown.tax, dec!(57.52));
        assert_eq!(breakdown.total, dec!(776.58));
    }

    #[test]
    fn test_total_equals_subtotal_minus_discount_plus_tax() {
        let items = vec![item(dec!(13.37), 3), item(dec!(0.99), 7)];
        for code in [None, Some("SAVE10"), Some("SAVE20"), Some("WELCOME"), Some("VIP")] {
            let b = price(&items, code);
            assert_eq!(b.total, b.subtotal - b.discount + b.tax);
            assert!(b.subtotal >= Decimal::ZERO);
            assert!(b.discount >= Decimal::ZERO);
            assert!(b.tax >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_unknown_code_yields_zero_discount() {
        let items = vec![item(dec!(50.00), 2)];
        let breakdown = price(&items, Some("TOTALLY-MADE-UP"));

        assert_eq!(breakdown.discount, dec!(0.00));
        assert_eq!(breakdown.subtotal, dec!(100.00));
    }

    #[test]
    fn test_missing_code_yields_zero_discount() {
        let breakdown = price(&[item(dec!(10.00), 1)], None);
        assert_eq!(breakdown.discount, dec!(0.00));
    }

    #[test]
    fn test_known_codes_apply_fixed_rates() {
        let items = vec![item(dec!(100.00), 1)];

        assert_eq!(price(&items, Some("SAVE10")).discount, dec!(10.00));
        assert_eq!(price(&items, Some("SAVE20")).discount, dec!(20.00));
        assert_eq!(price(&items, Some("WELCOME")).discount, dec!(15.00));
        assert_eq!(price(&items, Some("VIP")).discount, dec!(25.00));
    }

    #[test]
    fn test_invalid_items_are_excluded_not_rejected() {
        let items = vec![
            item(dec!(10.00), 1),
            item(dec!(10.00), 0),   // non-positive quantity
            item(dec!(10.00), -2),  // negative quantity
            item(dec!(-5.00), 3),   // negative price
        ];
        let breakdown = price(&items, None);

        assert_eq!(breakdown.subtotal, dec!(10.00));
    }

    #[test]
    fn test_all_invalid_items_produce_zero_subtotal() {
        let items = vec![item(dec!(-1.00), 1), item(dec!(5.00), 0)];

        assert!(!has_billable_items(&items));
        let breakdown = price(&items, Some("VIP"));
        assert_eq!(breakdown.subtotal, dec!(0.00));
        assert_eq!(breakdown.total, dec!(0.00));
    }

    #[test]
    fn test_whole_number_prices_keep_two_decimal_scale() {
        let breakdown = price(&[item(dec!(699), 1)], None);
        assert_eq!(breakdown.subtotal.to_string(), "699.00");
        assert_eq!(breakdown.tax.to_string(), "55.92");
    }

    #[test]
    fn test_rounding_happens_at_the_boundary_not_per_item() {
        // Three items at 0.333 each: per-item rounding would give 0.99,
        // boundary rounding gives 1.00.
        let items = vec![item(dec!(0.333), 3)];
        let breakdown = price(&items, None);

        assert_eq!(breakdown.subtotal, dec!(1.00));
    }
}
