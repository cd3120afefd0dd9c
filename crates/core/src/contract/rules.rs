//! Base per-field rules.
//!
//! A rule parses one raw item into a typed [`ParamValue`]. Batching and
//! defaults are layered on top by the contract builder, so a rule only ever
//! sees a single, trimmed, non-empty item.

use crate::value::ParamValue;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static NETWORK_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").unwrap());

static EVM_ADDRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0x)?[0-9a-fA-F]{40}$").unwrap());

static TX_HASH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(0x)?[0-9a-fA-F]{64}$").unwrap());

// Base58 alphabet, no 0/O/I/l
static SVM_ADDRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").unwrap());

pub trait Rule: fmt::Debug + Send + Sync {
    /// Short type label used in contract documentation.
    fn type_name(&self) -> &'static str;

    fn parse(&self, input: &str) -> Result<ParamValue, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkIdRule;

impl Rule for NetworkIdRule {
    fn type_name(&self) -> &'static str {
        "network_id"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if NETWORK_ID_REGEX.is_match(input) {
            Ok(ParamValue::Text(input.to_string()))
        } else {
            Err("expected a lowercase network identifier".to_string())
        }
    }
}

/// 20-byte hex address, normalized to lowercase with a `0x` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmAddressRule;

impl Rule for EvmAddressRule {
    fn type_name(&self) -> &'static str {
        "evm_address"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if !EVM_ADDRESS_REGEX.is_match(input) {
            return Err("expected 0x followed by 40 hex characters".to_string());
        }
        Ok(ParamValue::Text(normalize_hex(input)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TxHashRule;

impl Rule for TxHashRule {
    fn type_name(&self) -> &'static str {
        "tx_hash"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if !TX_HASH_REGEX.is_match(input) {
            return Err("expected 0x followed by 64 hex characters".to_string());
        }
        Ok(ParamValue::Text(normalize_hex(input)))
    }
}

fn normalize_hex(input: &str) -> String {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    format!("0x{}", digits.to_ascii_lowercase())
}

/// Base58 account or mint address. Case-sensitive, kept verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvmAddressRule;

impl Rule for SvmAddressRule {
    fn type_name(&self) -> &'static str {
        "svm_address"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if SVM_ADDRESS_REGEX.is_match(input) {
            Ok(ParamValue::Text(input.to_string()))
        } else {
            Err("expected a base58 address of 32 to 44 characters".to_string())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntegerRule {
    pub min: u64,
    pub max: u64,
}

impl IntegerRule {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: u64) -> Self {
        Self { min, max: u64::MAX }
    }
}

impl Rule for IntegerRule {
    fn type_name(&self) -> &'static str {
        "integer"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        let value: u64 = input
            .parse()
            .map_err(|_| format!("expected an integer, got '{}'", input))?;
        if value < self.min || value > self.max {
            return Err(format!(
                "must be between {} and {}, got {}",
                self.min, self.max, value
            ));
        }
        Ok(ParamValue::UInt(value))
    }
}

/// Point in time as unix seconds. Accepts unix seconds, RFC 3339 or
/// `YYYY-MM-DD` (midnight UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampRule;

impl Rule for TimestampRule {
    fn type_name(&self) -> &'static str {
        "timestamp"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if let Ok(seconds) = input.parse::<u64>() {
            return Ok(ParamValue::UInt(seconds));
        }
        let seconds = if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
            datetime.timestamp()
        } else if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            date.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default()
        } else {
            return Err(format!(
                "expected unix seconds, RFC 3339 or YYYY-MM-DD, got '{}'",
                input
            ));
        };
        u64::try_from(seconds)
            .map(ParamValue::UInt)
            .map_err(|_| "timestamps before 1970 are not supported".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct EnumRule {
    pub values: Vec<&'static str>,
}

impl EnumRule {
    pub fn new(values: &[&'static str]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }
}

impl Rule for EnumRule {
    fn type_name(&self) -> &'static str {
        "enum"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if self.values.contains(&input) {
            Ok(ParamValue::Text(input.to_string()))
        } else {
            Err(format!("expected one of: {}", self.values.join(", ")))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub max_len: usize,
}

impl TextRule {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Rule for TextRule {
    fn type_name(&self) -> &'static str {
        "string"
    }

    fn parse(&self, input: &str) -> Result<ParamValue, String> {
        if input.chars().count() > self.max_len {
            return Err(format!("must be at most {} characters", self.max_len));
        }
        Ok(ParamValue::Text(input.to_string()))
    }
}
