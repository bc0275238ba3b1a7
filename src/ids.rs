use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentId;
use crate::time::{Clock, SystemClock};

/// Number of trailing native-id characters kept in timestamp identifiers.
pub const NATIVE_ID_SUFFIX_LEN: usize = 6;

/// Produces a fresh `employee_id` for a document that has none.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, native_id: &DocumentId) -> String;
}

/// `emp-<epoch-millis>-<last6>`. Two documents stamped in the same
/// millisecond with the same id tail collide; the unique index catches it.
#[derive(Debug, Clone)]
pub struct TimestampSuffixGenerator<C = SystemClock> {
    clock: C,
}

impl TimestampSuffixGenerator<SystemClock> {
    pub fn new() -> Self {
        TimestampSuffixGenerator { clock: SystemClock }
    }
}

impl Default for TimestampSuffixGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TimestampSuffixGenerator<C> {
    pub fn with_clock(clock: C) -> Self {
        TimestampSuffixGenerator { clock }
    }
}

impl<C: Clock> IdGenerator for TimestampSuffixGenerator<C> {
    fn generate(&self, native_id: &DocumentId) -> String {
        format!(
            "emp-{}-{}",
            self.clock.now_ms(),
            native_id.tail(NATIVE_ID_SUFFIX_LEN)
        )
    }
}

/// `emp-<uuidv7>`; unique without relying on the index.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self, _native_id: &DocumentId) -> String {
        format!("emp-{}", Uuid::now_v7().as_simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Wall-clock millis plus the native id tail.
    #[default]
    Timestamp,
    /// Time-ordered random UUID.
    Uuid,
}

impl IdStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            IdStrategy::Timestamp => "timestamp",
            IdStrategy::Uuid => "uuid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Some(IdStrategy::Timestamp),
            "uuid" => Some(IdStrategy::Uuid),
            _ => None,
        }
    }

    pub fn generator(self) -> Box<dyn IdGenerator> {
        match self {
            IdStrategy::Timestamp => Box::new(TimestampSuffixGenerator::new()),
            IdStrategy::Uuid => Box::new(UuidGenerator),
        }
    }
}
