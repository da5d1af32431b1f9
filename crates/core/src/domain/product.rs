use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

/// Maximum number of fractional digits accepted for a product price.
pub const PRICE_MAX_SCALE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload. The store assigns `id` and defaults `available` to true,
/// so neither field exists here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self { name: name.into(), description: None, price }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        validate_name(&self.name)?;
        validate_price(self.price)
    }
}

/// Partial update. Absent fields are left untouched by the store.
///
/// Has no `id` or `available` field: an `id` supplied in a request body is
/// dropped during deserialization and never reaches the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.price.is_none()
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Merges the present fields into `product`. Returns whether anything changed.
    pub fn apply_to(&self, product: &mut Product) -> bool {
        let mut changed = false;
        if let Some(name) = &self.name {
            changed |= product.name != *name;
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            changed |= product.description.as_deref() != Some(description.as_str());
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            changed |= product.price != price;
            product.price = price;
        }
        changed
    }
}

fn validate_name(name: &str) -> Result<(), PayloadError> {
    if name.trim().is_empty() {
        return Err(PayloadError::new("name", "name must be a non-empty string"));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), PayloadError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(PayloadError::new("price", "price must not be less than 0"));
    }
    if price.normalize().scale() > PRICE_MAX_SCALE {
        return Err(PayloadError::new(
            "price",
            format!("price must have at most {PRICE_MAX_SCALE} decimal places"),
        ));
    }
    Ok(())
}
