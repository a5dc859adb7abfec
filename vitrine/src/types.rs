//! Core identifier and scalar types.
//!
//! All identifiers use smart constructors so a value that exists is valid,
//! following the "parse, don't validate" principle. Generated ids use UUIDv7
//! for time-ordered uniqueness.

use chrono::{DateTime, NaiveDate, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted order.
///
/// `ORD-` prefixed, generated from a UUIDv7 so ids sort by creation time.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 50, regex = r"^ORD-[A-Z0-9]+$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct OrderId(String);

impl OrderId {
    /// Generates a new unique `OrderId`.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        Self::try_new(format!("ORD-{}", uuid.simple().to_string().to_uppercase())).unwrap()
    }
}

/// Identifier of a catalog product.
///
/// Assigned by the catalog backend; opaque here.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct ProductId(String);

/// Identifier of a buyer, owned by the external identity provider.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct BuyerId(String);

/// Idempotency key supplied by a checkout attempt.
///
/// Blind retries of `create_order` with the same key are deduplicated at the
/// store's insert path instead of double-creating an order.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 128),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct CheckoutKey(String);

/// Carrier tracking code attached to a shipped order.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct TrackingCode(String);

/// Store-assigned sequential order number, starting at 1.
///
/// Assignment happens inside the store's insert path (a persistent counter
/// or database sequence), so concurrent checkouts can never observe the
/// same number.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct OrderNumber(u64);

impl OrderNumber {
    /// The first order number.
    pub fn first() -> Self {
        Self::try_new(1).expect("1 is always a valid order number")
    }

    /// Returns the next number in the sequence.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("next order number should always be valid")
    }
}

/// A line quantity, always at least 1.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

impl Quantity {
    /// One unit.
    pub fn one() -> Self {
        Self::try_new(1).expect("1 is always a valid quantity")
    }

    /// Adds another quantity, saturating at `u32::MAX`.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        let sum = u32::from(self).saturating_add(u32::from(other));
        Self::try_new(sum).expect("sum of positive quantities is positive")
    }
}

/// Optimistic-concurrency token on a stored order.
///
/// Every successful `update_order` bumps the revision; a writer that read an
/// older revision gets a conflict instead of silently losing the race.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct Revision(u64);

impl Revision {
    /// The revision of a freshly inserted order.
    pub fn initial() -> Self {
        Self::new(0)
    }

    /// Returns the revision after one more write.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::new(current.saturating_add(1))
    }
}

/// A UTC timestamp.
///
/// Wraps `chrono` so call sites stay decoupled from the underlying library
/// and reporting gets its day/month bucketing helpers in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// The current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The calendar day this timestamp falls on (UTC).
    pub fn day(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Whether this timestamp falls on the same UTC day as `other`.
    pub fn same_day_as(&self, other: &Self) -> bool {
        self.day() == other.day()
    }

    /// Whether this timestamp falls in the same UTC month as `other`.
    pub fn same_month_as(&self, other: &Self) -> bool {
        use chrono::Datelike;
        self.0.year() == other.0.year() && self.0.month() == other.0.month()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
