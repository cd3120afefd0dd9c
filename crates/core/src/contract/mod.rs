//! Query contracts.
//!
//! A contract is the compiled validator for one route's parameters. It is
//! built once at startup from an ordered list of [`FieldSpec`]s and is
//! immutable afterwards, so a single instance is shared by every request.
//!
//! Each field combines a base [`Rule`] with:
//! - a [`Batching`] mode: batched fields accept a scalar, a delimiter-joined
//!   string or a native sequence and always produce a sequence
//! - a [`DefaultMode`]: required, an output default returned verbatim, or an
//!   input prefault substituted before the rule runs

pub mod rules;

pub use rules::Rule;

use crate::value::{ParamValue, ParamsRecord, RawParams, RawValue};
use chaingate_common::config::QueryLimits;
use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, FieldIssue, Result};
use rules::IntegerRule;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_SEPARATOR: char = ',';
pub const MAX_DESCRIPTION_LEN: usize = 512;

pub const LIMIT_FIELD: &str = "limit";
pub const PAGE_FIELD: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batching {
    Single,
    Batched { separator: char },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultMode {
    /// Missing input fails validation
    Required,
    /// Missing input yields this value; the rule never runs
    OutputDefault(ParamValue),
    /// Missing input is replaced by this raw literal, which the rule then parses
    InputPrefault(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// The full contract of one request parameter.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    rule: Arc<dyn Rule>,
    batching: Batching,
    default: DefaultMode,
    meta: FieldMeta,
}

impl FieldSpec {
    /// A required, single-valued field.
    pub fn new(name: impl Into<String>, rule: impl Rule + 'static) -> Self {
        Self {
            name: name.into(),
            rule: Arc::new(rule),
            batching: Batching::Single,
            default: DefaultMode::Required,
            meta: FieldMeta::default(),
        }
    }

    pub fn batched(self) -> Self {
        self.batched_with(DEFAULT_SEPARATOR)
    }

    pub fn batched_with(mut self, separator: char) -> Self {
        self.batching = Batching::Batched { separator };
        self
    }

    pub fn output_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = DefaultMode::OutputDefault(value.into());
        self
    }

    pub fn input_prefault(mut self, raw: impl Into<String>) -> Self {
        self.default = DefaultMode::InputPrefault(raw.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.meta.example = Some(example.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batching(&self) -> Batching {
        self.batching
    }

    pub fn default_mode(&self) -> &DefaultMode {
        &self.default
    }

    /// Resolve this field's value from its raw input, if any.
    fn resolve(&self, raw: Option<&RawValue>) -> std::result::Result<ParamValue, Vec<FieldIssue>> {
        let items = raw.map(|r| self.split(r)).unwrap_or_default();
        if items.is_empty() {
            return match &self.default {
                DefaultMode::Required => Err(vec![self.issue(None, "missing required field")]),
                DefaultMode::OutputDefault(value) => Ok(value.clone()),
                DefaultMode::InputPrefault(prefault) => {
                    self.parse_items(self.split(&RawValue::Single(prefault.clone())))
                }
            };
        }
        self.parse_items(items)
    }

    /// Trimmed, non-empty items of a raw input.
    fn split(&self, raw: &RawValue) -> Vec<String> {
        let values = raw.values().iter();
        let items: Vec<&str> = match self.batching {
            Batching::Single => values.map(|v| v.trim()).collect(),
            Batching::Batched { separator } => {
                values.flat_map(|v| v.split(separator)).map(str::trim).collect()
            }
        };
        items
            .into_iter()
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn parse_items(&self, items: Vec<String>) -> std::result::Result<ParamValue, Vec<FieldIssue>> {
        match self.batching {
            Batching::Single => {
                if items.len() > 1 {
                    return Err(vec![self.issue(None, "multiple values are not allowed")]);
                }
                let item = items.into_iter().next().unwrap_or_default();
                self.rule
                    .parse(&item)
                    .map_err(|reason| vec![self.issue(Some(item), &reason)])
            }
            Batching::Batched { .. } => {
                if items.is_empty() {
                    return Err(vec![self.issue(None, "at least one value is required")]);
                }
                let mut parsed = Vec::with_capacity(items.len());
                let mut issues = Vec::new();
                for item in items {
                    match self.rule.parse(&item) {
                        Ok(value) => parsed.push(value),
                        Err(reason) => issues.push(self.issue(Some(item), &reason)),
                    }
                }
                if issues.is_empty() {
                    Ok(ParamValue::List(parsed))
                } else {
                    Err(issues)
                }
            }
        }
    }

    fn issue(&self, item: Option<String>, reason: &str) -> FieldIssue {
        FieldIssue {
            field: self.name.clone(),
            item,
            reason: reason.to_string(),
        }
    }

    fn doc(&self) -> FieldDoc {
        FieldDoc {
            name: self.name.clone(),
            type_name: self.rule.type_name(),
            batched: matches!(self.batching, Batching::Batched { .. }),
            required: matches!(self.default, DefaultMode::Required),
            default: match &self.default {
                DefaultMode::Required => None,
                DefaultMode::OutputDefault(value) => serde_json::to_value(value).ok(),
                DefaultMode::InputPrefault(raw) => Some(serde_json::Value::String(raw.clone())),
            },
            meta: self.meta.clone(),
        }
    }
}

/// Documentation view of one compiled field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub batched: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(flatten)]
    pub meta: FieldMeta,
}

/// Compiles field specs into a [`QueryContract`].
pub struct ContractBuilder {
    fields: Vec<FieldSpec>,
    include_pagination: bool,
    limits: QueryLimits,
}

impl ContractBuilder {
    pub fn new(limits: QueryLimits) -> Self {
        Self {
            fields: Vec::new(),
            include_pagination: true,
            limits,
        }
    }

    pub fn include_pagination(mut self, include: bool) -> Self {
        self.include_pagination = include;
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Compile the contract.
    ///
    /// Fails with `invalid_contract` on duplicate or empty names, oversized
    /// descriptions, or an input prefault the field's own rule rejects.
    pub fn build(self) -> Result<QueryContract> {
        let mut fields = self.fields;
        if self.include_pagination {
            fields.push(
                FieldSpec::new(LIMIT_FIELD, IntegerRule::new(1, self.limits.max_limit))
                    .output_default(self.limits.default_limit)
                    .describe(format!(
                        "Number of results per page, at most {}",
                        self.limits.max_limit
                    ))
                    .example(self.limits.default_limit.to_string()),
            );
            fields.push(
                FieldSpec::new(PAGE_FIELD, IntegerRule::at_least(1))
                    .output_default(1u64)
                    .describe("Page number, starting at 1")
                    .example("1"),
            );
        }

        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(fields.len());
        for mut field in fields {
            if field.name.is_empty() {
                return Err(contract_error("", "field name must not be empty"));
            }
            if !seen.insert(field.name.clone()) {
                return Err(contract_error(&field.name, "field is declared more than once"));
            }
            if let Some(description) = &field.meta.description {
                let len = description.chars().count();
                if len > MAX_DESCRIPTION_LEN {
                    return Err(contract_error(
                        &field.name,
                        &format!(
                            "description is {} characters, the limit is {}",
                            len, MAX_DESCRIPTION_LEN
                        ),
                    ));
                }
            }
            if let DefaultMode::InputPrefault(_) = field.default {
                if let Err(issues) = field.resolve(None) {
                    let reasons: Vec<String> = issues.into_iter().map(|i| i.reason).collect();
                    return Err(contract_error(
                        &field.name,
                        &format!(
                            "input prefault is rejected by its rule: {}",
                            reasons.join("; ")
                        ),
                    ));
                }
            }
            // batched output is always a sequence, defaults included
            let wrapped = match (&field.default, field.batching) {
                (DefaultMode::OutputDefault(value), Batching::Batched { .. })
                    if !matches!(value, ParamValue::List(_)) =>
                {
                    Some(ParamValue::List(vec![value.clone()]))
                }
                _ => None,
            };
            if let Some(value) = wrapped {
                field.default = DefaultMode::OutputDefault(value);
            }
            compiled.push(field);
        }

        Ok(QueryContract { fields: compiled })
    }
}

fn contract_error(field: &str, reason: &str) -> ChainGateError {
    ChainGateError::new(
        ErrorCode::InvalidContract,
        format!("Invalid contract for field '{}': {}", field, reason),
    )
    .with_context(ErrorContext::Contract {
        field: field.to_string(),
    })
}

/// Compiled, immutable request validator.
#[derive(Debug, Clone)]
pub struct QueryContract {
    fields: Vec<FieldSpec>,
}

impl QueryContract {
    /// Validate raw inputs into a typed record.
    ///
    /// Every declared field is checked; all failures are reported together in
    /// one `bad_query_input` error. Undeclared inputs are ignored.
    pub fn validate(&self, raw: &RawParams) -> Result<ParamsRecord> {
        let mut record = ParamsRecord::new();
        let mut issues = Vec::new();

        for field in &self.fields {
            match field.resolve(raw.get(&field.name)) {
                Ok(value) => record.insert(field.name.clone(), value),
                Err(mut field_issues) => issues.append(&mut field_issues),
            }
        }

        if issues.is_empty() {
            return Ok(record);
        }

        let message = issues
            .iter()
            .map(|issue| match &issue.item {
                Some(item) => format!("'{}': invalid value '{}': {}", issue.field, item, issue.reason),
                None => format!("'{}': {}", issue.field, issue.reason),
            })
            .collect::<Vec<_>>()
            .join("; ");

        Err(
            ChainGateError::new(ErrorCode::BadQueryInput, format!("Invalid parameters: {}", message))
                .with_context(ErrorContext::Validation { issues }),
        )
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn docs(&self) -> Vec<FieldDoc> {
        self.fields.iter().map(FieldSpec::doc).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
