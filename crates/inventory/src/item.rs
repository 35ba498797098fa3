use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{DomainError, FieldViolation, ItemId};

/// A stored stock-keeping record.
///
/// Only the store constructs these (on insert); `last_updated` is always set
/// because an item does not exist before its first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quantity: i64,
    pub price: Decimal,
    pub category: String,
    pub last_updated: DateTime<Utc>,
}

impl Item {
    /// The client-editable part of the record.
    pub fn fields(&self) -> ItemFields {
        ItemFields {
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
            category: self.category.clone(),
        }
    }
}

/// Client-supplied values for create/update.
///
/// Every field is required; `None` is reported as a violation rather than
/// defaulted, so an update is always a full replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCandidate {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
}

impl ItemCandidate {
    pub fn new(
        name: impl Into<String>,
        quantity: i64,
        price: Decimal,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            quantity: Some(quantity),
            price: Some(price),
            category: Some(category.into()),
        }
    }

    /// Check every field and collect all violations, in field order.
    pub fn validate(&self) -> Result<ItemFields, DomainError> {
        let mut violations = Vec::new();

        let name = required_text("name", self.name.as_deref(), &mut violations);

        let quantity = match self.quantity {
            None => {
                violations.push(FieldViolation::new("quantity", "is required"));
                None
            }
            Some(q) if q < 0 => {
                violations.push(FieldViolation::new("quantity", "must be at least 0"));
                None
            }
            Some(q) => Some(q),
        };

        let price = match self.price {
            None => {
                violations.push(FieldViolation::new("price", "is required"));
                None
            }
            Some(p) if p < Decimal::ZERO => {
                violations.push(FieldViolation::new("price", "must be at least 0"));
                None
            }
            // `-0.00` compares equal to zero; store it unsigned.
            Some(p) if p.is_zero() => Some(p.abs()),
            Some(p) => Some(p),
        };

        let category = required_text("category", self.category.as_deref(), &mut violations);

        match (name, quantity, price, category) {
            (Some(name), Some(quantity), Some(price), Some(category)) if violations.is_empty() => {
                Ok(ItemFields {
                    name,
                    quantity,
                    price,
                    category,
                })
            }
            _ => Err(DomainError::validation(violations)),
        }
    }
}

impl From<ItemFields> for ItemCandidate {
    fn from(f: ItemFields) -> Self {
        Self::new(f.name, f.quantity, f.price, f.category)
    }
}

fn required_text(
    field: &'static str,
    value: Option<&str>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match value {
        None => {
            violations.push(FieldViolation::new(field, "is required"));
            None
        }
        Some(v) if v.trim().is_empty() => {
            violations.push(FieldViolation::new(field, "must not be blank"));
            None
        }
        Some(v) => Some(v.to_string()),
    }
}

/// Validated, client-editable item fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub name: String,
    pub quantity: i64,
    pub price: Decimal,
    pub category: String,
}

/// A validated record ready for its first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub fields: ItemFields,
    pub last_updated: DateTime<Utc>,
}

impl NewItem {
    /// Attach the store-assigned id.
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.fields.name,
            quantity: self.fields.quantity,
            price: self.fields.price,
            category: self.fields.category,
            last_updated: self.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fields_of(err: DomainError) -> Vec<&'static str> {
        err.violations().iter().map(|v| v.field).collect()
    }

    #[test]
    fn valid_candidate_passes() {
        let fields = ItemCandidate::new("Widget", 4, dec!(2.50), "Hardware")
            .validate()
            .unwrap();
        assert_eq!(fields.name, "Widget");
        assert_eq!(fields.quantity, 4);
        assert_eq!(fields.price, dec!(2.50));
        assert_eq!(fields.category, "Hardware");
    }

    #[test]
    fn zero_quantity_and_price_are_allowed() {
        assert!(ItemCandidate::new("Free sample", 0, dec!(0), "Promo")
            .validate()
            .is_ok());
    }

    #[test]
    fn negative_zero_price_is_stored_unsigned() {
        let fields = ItemCandidate::new("Sample", 1, dec!(-0.00), "Promo")
            .validate()
            .unwrap();
        assert!(!fields.price.is_sign_negative());
        assert_eq!(fields.price.to_string(), "0.00");
    }

    #[test]
    fn reports_every_violation_not_just_the_first() {
        let candidate = ItemCandidate {
            name: Some("  ".to_string()),
            quantity: Some(-1),
            price: Some(dec!(-0.01)),
            category: Some(String::new()),
        };
        let err = candidate.validate().unwrap_err();
        assert_eq!(fields_of(err), vec!["name", "quantity", "price", "category"]);
    }

    #[test]
    fn missing_fields_are_required() {
        let err = ItemCandidate::default().validate().unwrap_err();
        assert!(err.violations().iter().all(|v| v.message == "is required"));
        assert_eq!(fields_of(err), vec!["name", "quantity", "price", "category"]);
    }

    #[test]
    fn only_offending_fields_are_reported() {
        let candidate = ItemCandidate {
            price: None,
            ..ItemCandidate::new("Bolt", -3, dec!(1), "Hardware")
        };
        let err = candidate.validate().unwrap_err();
        assert_eq!(fields_of(err), vec!["quantity", "price"]);
    }

    #[test]
    fn stored_text_is_not_trimmed() {
        let fields = ItemCandidate::new(" Nut ", 1, dec!(1), "Hardware")
            .validate()
            .unwrap();
        assert_eq!(fields.name, " Nut ");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a candidate is accepted iff every field is individually valid.
            #[test]
            fn validation_matches_field_rules(
                name in "[ a-z]{0,8}",
                quantity in -5i64..5,
                cents in -500i64..500,
                category in "[ a-z]{0,8}",
            ) {
                let price = Decimal::new(cents, 2);
                let candidate = ItemCandidate::new(name.clone(), quantity, price, category.clone());

                let expected_violations = [
                    name.trim().is_empty(),
                    quantity < 0,
                    cents < 0,
                    category.trim().is_empty(),
                ]
                .iter()
                .filter(|bad| **bad)
                .count();

                match candidate.validate() {
                    Ok(fields) => {
                        prop_assert_eq!(expected_violations, 0);
                        prop_assert!(fields.quantity >= 0);
                        prop_assert!(fields.price >= Decimal::ZERO);
                    }
                    Err(err) => prop_assert_eq!(err.violations().len(), expected_violations),
                }
            }
        }
    }
}
