//! Rule-based field validation.
//!
//! A field is checked against an ordered list of [`Rule`]s. Every rule runs,
//! even after an earlier one failed, and failure messages are collected in
//! declaration order. Only `required` rejects an empty value; every other rule
//! treats an empty value as "nothing to check".

use super::ports::Clock;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("static phone pattern"));
static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("static numeric pattern"));

const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// A validation rule together with its typed parameter.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Email,
    Phone,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(Regex),
    CardNumber,
    ExpiryDate,
    Cvv,
    Url,
    Numeric,
    Alpha,
    Alphanumeric,
    StrongPassword,
    /// A caller-registered rule, see [`RuleRegistry::register`].
    Custom(CustomRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Required => "required",
            Rule::Email => "email",
            Rule::Phone => "phone",
            Rule::MinLength(_) => "minLength",
            Rule::MaxLength(_) => "maxLength",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Pattern(_) => "pattern",
            Rule::CardNumber => "cardNumber",
            Rule::ExpiryDate => "expiryDate",
            Rule::Cvv => "cvv",
            Rule::Url => "url",
            Rule::Numeric => "numeric",
            Rule::Alpha => "alpha",
            Rule::Alphanumeric => "alphanumeric",
            Rule::StrongPassword => "strongPassword",
            Rule::Custom(custom) => &custom.name,
        }
    }

    /// Evaluates the rule. `now` only matters for `ExpiryDate`.
    pub fn check(&self, value: &str, now: DateTime<Utc>) -> bool {
        match self {
            Rule::Required => !value.trim().is_empty(),
            _ if value.is_empty() => true,
            Rule::Email => EMAIL.is_match(value),
            Rule::Phone => is_valid_phone(value),
            Rule::MinLength(n) => value.chars().count() >= *n,
            Rule::MaxLength(n) => value.chars().count() <= *n,
            Rule::Min(n) => value.trim().parse::<f64>().is_ok_and(|v| v >= *n),
            Rule::Max(n) => value.trim().parse::<f64>().is_ok_and(|v| v <= *n),
            Rule::Pattern(re) => re.is_match(value),
            Rule::CardNumber => validate_card_number(value),
            Rule::ExpiryDate => validate_expiry(value, now),
            Rule::Cvv => validate_cvv(value),
            Rule::Url => url::Url::parse(value).is_ok(),
            Rule::Numeric => NUMERIC.is_match(value),
            Rule::Alpha => value
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c.is_whitespace()),
            Rule::Alphanumeric => value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace()),
            Rule::StrongPassword => is_strong_password(value),
            Rule::Custom(custom) => (custom.check)(value),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Rule::Required => "This field is required".to_string(),
            Rule::Email => "Please enter a valid email address".to_string(),
            Rule::Phone => "Please enter a valid phone number".to_string(),
            Rule::MinLength(n) => format!("Must be at least {n} characters long"),
            Rule::MaxLength(n) => format!("Must be no more than {n} characters long"),
            Rule::Min(n) => format!("Must be at least {n}"),
            Rule::Max(n) => format!("Must be no more than {n}"),
            Rule::Pattern(_) => "Invalid format".to_string(),
            Rule::CardNumber => "Please enter a valid card number".to_string(),
            Rule::ExpiryDate => "Please enter a valid expiry date (MM/YY)".to_string(),
            Rule::Cvv => "Please enter a valid CVV (3-4 digits)".to_string(),
            Rule::Url => "Please enter a valid URL".to_string(),
            Rule::Numeric => "Please enter a valid number".to_string(),
            Rule::Alpha => "Only letters and spaces are allowed".to_string(),
            Rule::Alphanumeric => "Only letters, numbers and spaces are allowed".to_string(),
            Rule::StrongPassword => "Password must contain at least 8 characters, including uppercase, lowercase, number and special character".to_string(),
            Rule::Custom(custom) => custom.message.clone(),
        }
    }
}

impl FromStr for Rule {
    type Err = CheckoutError;

    /// Parses the `name` or `name:param` form, e.g. `"minLength:2"`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, param) = match s.split_once(':') {
            Some((name, param)) => (name, Some(param)),
            None => (s, None),
        };

        let invalid = || CheckoutError::InvalidRuleParameter {
            rule: name.to_string(),
            param: param.unwrap_or_default().to_string(),
        };
        let length = || param.and_then(|p| p.trim().parse::<usize>().ok()).ok_or_else(invalid);
        let bound = || param.and_then(|p| p.trim().parse::<f64>().ok()).ok_or_else(invalid);

        let rule = match name {
            "required" => Rule::Required,
            "email" => Rule::Email,
            "phone" => Rule::Phone,
            "minLength" => Rule::MinLength(length()?),
            "maxLength" => Rule::MaxLength(length()?),
            "min" => Rule::Min(bound()?),
            "max" => Rule::Max(bound()?),
            "pattern" => {
                let re = param.and_then(|p| Regex::new(p).ok()).ok_or_else(invalid)?;
                Rule::Pattern(re)
            }
            "cardNumber" => Rule::CardNumber,
            "expiryDate" => Rule::ExpiryDate,
            "cvv" => Rule::Cvv,
            "url" => Rule::Url,
            "numeric" => Rule::Numeric,
            "alpha" => Rule::Alpha,
            "alphanumeric" => Rule::Alphanumeric,
            "strongPassword" => Rule::StrongPassword,
            other => return Err(CheckoutError::UnknownRule(other.to_string())),
        };
        Ok(rule)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::MinLength(n) | Rule::MaxLength(n) => write!(f, "{}:{n}", self.name()),
            Rule::Min(n) | Rule::Max(n) => write!(f, "{}:{n}", self.name()),
            Rule::Pattern(re) => write!(f, "pattern:{}", re.as_str()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Predicate of a [`CustomRule`].
pub type RuleCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A named predicate with a fixed failure message.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    check: RuleCheck,
    message: String,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Resolves rule descriptors against the built-in table plus any rules
/// registered at runtime. Registered names shadow built-ins.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    custom: HashMap<String, CustomRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, check: F, message: impl Into<String>)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(rule = %name, "Custom validation rule added");
        self.custom.insert(
            name.clone(),
            CustomRule {
                name,
                check: Arc::new(check),
                message: message.into(),
            },
        );
    }

    /// Parses one descriptor. Custom rules take no parameter.
    pub fn resolve(&self, descriptor: &str) -> Result<Rule> {
        let (name, param) = match descriptor.split_once(':') {
            Some((name, param)) => (name, Some(param)),
            None => (descriptor, None),
        };
        match (self.custom.get(name), param) {
            (Some(custom), None) => Ok(Rule::Custom(custom.clone())),
            (Some(_), Some(param)) => Err(CheckoutError::InvalidRuleParameter {
                rule: name.to_string(),
                param: param.to_string(),
            }),
            (None, _) => descriptor.parse(),
        }
    }
}

fn is_valid_phone(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '-' | '(' | ')')))
        .collect();
    PHONE.is_match(&cleaned)
}

fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c))
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Luhn checksum over a digit string. The caller checks the charset.
pub fn luhn_checksum_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Whitespace is ignored; 13 to 19 digits that pass the Luhn checksum.
///
/// Luhn does not catch every transposition (e.g. `09` <-> `90`), so a small
/// class of mistyped numbers still validates.
pub fn validate_card_number(value: &str) -> bool {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    (13..=19).contains(&cleaned.len())
        && cleaned.chars().all(|c| c.is_ascii_digit())
        && luhn_checksum_valid(&cleaned)
}

/// `MM/YY` with a month in 01..=12 whose first day is still ahead of `now`.
pub fn validate_expiry(value: &str, now: DateTime<Utc>) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return false;
    }
    let (mm, yy) = (&value[..2], &value[3..]);
    if !mm.chars().chain(yy.chars()).all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (Ok(month), Ok(year)) = (mm.parse::<u32>(), yy.parse::<i32>()) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }
    match Utc.with_ymd_and_hms(2000 + year, month, 1, 0, 0, 0).single() {
        Some(expiry) => expiry > now,
        None => false,
    }
}

pub fn validate_cvv(value: &str) -> bool {
    (3..=4).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit())
}

/// A field name plus its ordered rules.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// Builds a field from string rule descriptors, failing on the first
    /// unknown or malformed one.
    pub fn parse(name: &str, rules: &[&str]) -> Result<Self> {
        Self::parse_with(name, rules, &RuleRegistry::default())
    }

    /// Like [`FieldSpec::parse`], also accepting the rules in `registry`.
    pub fn parse_with(name: &str, rules: &[&str], registry: &RuleRegistry) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| registry.resolve(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(name, rules))
    }

    /// Like [`FieldSpec::parse`] but drops unusable descriptors with a warning.
    pub fn parse_lenient(name: &str, rules: &[&str]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|r| match r.parse::<Rule>() {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(field = name, descriptor = *r, "Skipping validation rule: {}", e);
                    None
                }
            })
            .collect();
        Self::new(name, rules)
    }
}

/// Submitted form values keyed by field name. Absent fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(BTreeMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map(String::as_str).unwrap_or_default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn merge(&mut self, other: FormData) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl FieldResult {
    /// The message surfaced next to the field.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

/// Aggregate of one validation pass, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormReport {
    pub fields: Vec<(String, FieldResult)>,
}

impl FormReport {
    pub fn is_valid(&self) -> bool {
        self.fields.iter().all(|(_, r)| r.is_valid)
    }

    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn invalid_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, r)| !r.is_valid)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// First error of every invalid field.
    pub fn first_errors(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(n, r)| r.first_error().map(|e| (n.as_str(), e)))
            .collect()
    }
}

/// Evaluates rules against values. Holds the clock used for expiry checks
/// and the rules registered on top of the built-in table.
#[derive(Clone)]
pub struct Validator {
    clock: Arc<dyn Clock>,
    registry: RuleRegistry,
}

impl Validator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_rules(clock, RuleRegistry::default())
    }

    pub fn with_rules(clock: Arc<dyn Clock>, registry: RuleRegistry) -> Self {
        Self { clock, registry }
    }

    pub fn add_rule<F>(&mut self, name: impl Into<String>, check: F, message: impl Into<String>)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.registry.register(name, check, message);
    }

    /// Builds a field whose descriptors may name registered rules.
    pub fn field(&self, name: &str, rules: &[&str]) -> Result<FieldSpec> {
        FieldSpec::parse_with(name, rules, &self.registry)
    }

    pub fn validate(&self, value: &str, rules: &[Rule]) -> FieldResult {
        let now = self.clock.now();
        let errors: Vec<String> = rules
            .iter()
            .filter(|rule| !rule.check(value, now))
            .map(Rule::message)
            .collect();
        FieldResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn validate_field(&self, data: &FormData, spec: &FieldSpec) -> FieldResult {
        self.validate(data.get(&spec.name), &spec.rules)
    }

    /// Validates exactly the given fields; anything else in `data` is ignored.
    pub fn validate_fields<'a>(
        &self,
        data: &FormData,
        fields: impl IntoIterator<Item = &'a FieldSpec>,
    ) -> FormReport {
        let fields: Vec<(String, FieldResult)> = fields
            .into_iter()
            .map(|spec| (spec.name.clone(), self.validate_field(data, spec)))
            .collect();
        let report = FormReport { fields };
        debug!(
            valid = report.is_valid(),
            invalid = ?report.invalid_fields(),
            "Form validated"
        );
        report
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}
