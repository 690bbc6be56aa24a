use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::identity::Identity;

/// Sequential product identifier, assigned by the ledger starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a product is in its journey. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    Created,
    InTransit,
    Delivered,
    Verified,
    Recalled,
}

impl ProductStatus {
    pub fn all() -> &'static [ProductStatus] {
        &[
            ProductStatus::Created,
            ProductStatus::InTransit,
            ProductStatus::Delivered,
            ProductStatus::Verified,
            ProductStatus::Recalled,
        ]
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            ProductStatus::Created => 0,
            ProductStatus::InTransit => 1,
            ProductStatus::Delivered => 2,
            ProductStatus::Verified => 3,
            ProductStatus::Recalled => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProductStatus::Created => "Created",
            ProductStatus::InTransit => "InTransit",
            ProductStatus::Delivered => "Delivered",
            ProductStatus::Verified => "Verified",
            ProductStatus::Recalled => "Recalled",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u8> for ProductStatus {
    type Error = LedgerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ProductStatus::all()
            .get(value as usize)
            .copied()
            .ok_or_else(|| LedgerError::InvalidArgument(format!("unknown status ordinal {value}")))
    }
}

impl FromStr for ProductStatus {
    type Err = LedgerError;

    /// Accepts the variant name (case-insensitive, `_`/`-`/space ignored) or its ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        if let Ok(ordinal) = normalized.parse::<u8>() {
            return ProductStatus::try_from(ordinal);
        }
        ProductStatus::all()
            .iter()
            .find(|status| status.label().to_ascii_lowercase() == normalized)
            .copied()
            .ok_or_else(|| LedgerError::InvalidArgument(format!("unknown status '{s}'")))
    }
}

/// One stop in a product's journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub location: String,
    pub recorded_at: DateTime<Utc>,
}

/// A registered product with its full audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub manufacturer: Identity,
    pub created_at: DateTime<Utc>,
    pub current_location: String,
    pub status: ProductStatus,
    /// Append-only; index 0 is the location given at registration.
    pub history: Vec<Waypoint>,
    /// Every identity that has acted on the product, in first-seen order.
    pub handlers: Vec<Identity>,
}

impl Product {
    pub fn location_history(&self) -> Vec<&str> {
        self.history.iter().map(|w| w.location.as_str()).collect()
    }

    pub fn time_history(&self) -> Vec<DateTime<Utc>> {
        self.history.iter().map(|w| w.recorded_at).collect()
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            status: self.status,
            current_location: self.current_location.clone(),
        }
    }
}

/// Public view of a product: no history, no handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub manufacturer: Identity,
    pub status: ProductStatus,
    pub current_location: String,
}
