use crate::error::ForumError;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

pub const MAX_CONTENT_LENGTH: usize = 50_000;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_SIGNATURE_LENGTH: usize = 500;
pub const MAX_URL_LENGTH: usize = 500;
pub const MAX_SEARCH_LENGTH: usize = 200;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_ID: i64 = 2_147_483_647;

static AGENT_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\s-]+$").expect("valid regex"));
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on\w+=").expect("valid regex"));

/// Parse the leading integer of `raw` the way browsers' `parseInt` does:
/// surrounding whitespace and trailing garbage are ignored.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Path ids are positive 32-bit integers.
pub fn parse_id(raw: &str) -> Option<i64> {
    parse_leading_int(raw).filter(|id| (1..=MAX_ID).contains(id))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Missing, zero or malformed values fall back to page 1 and the default limit.
    pub fn new(page: Option<&str>, limit: Option<&str>, max_limit: i64) -> Self {
        let page = page
            .and_then(parse_leading_int)
            .filter(|p| *p != 0)
            .unwrap_or(1)
            .max(1);
        let limit = limit
            .and_then(parse_leading_int)
            .filter(|l| *l != 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .max(1)
            .min(max_limit);

        Pagination {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    pub fn from_params(params: &PageParams) -> Self {
        Self::new(params.page.as_deref(), params.limit.as_deref(), MAX_PAGE_LIMIT)
    }
}

/// Trimmed `value` if its length (in characters) is within bounds.
pub fn validate_string(value: &str, max_length: usize, min_length: usize) -> Option<String> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if length < min_length || length > max_length {
        return None;
    }
    Some(trimmed.to_string())
}

/// 3-50 characters of ASCII letters, digits, underscores, hyphens and spaces.
pub fn validate_agent_name(name: &str) -> Option<String> {
    validate_string(name, MAX_NAME_LENGTH, 3).filter(|trimmed| AGENT_NAME.is_match(trimmed))
}

/// Only absolute http(s) URLs are accepted.
pub fn validate_url(raw: &str) -> Option<String> {
    let trimmed = validate_string(raw, MAX_URL_LENGTH, 0)?;
    let parsed = url::Url::parse(&trimmed).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(trimmed)
}

/// Strip script blocks, `javascript:` and inline event handlers from user content.
pub fn sanitize_content(content: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(content, "");
    let without_scheme = JAVASCRIPT_SCHEME.replace_all(&without_scripts, "");
    EVENT_HANDLER.replace_all(&without_scheme, "").into_owned()
}

/// Checks the fields of a JSON request body, collecting every failure.
pub struct BodyValidator<'a> {
    body: &'a Value,
    errors: Vec<String>,
}

impl<'a> BodyValidator<'a> {
    pub fn new(body: &'a Value) -> Self {
        Self {
            body,
            errors: Vec::new(),
        }
    }

    /// The field's value, or None when absent or null.
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.body.get(field).filter(|value| !value.is_null())
    }

    fn required(&mut self, field: &str) -> Option<&'a Value> {
        match self.present(field) {
            Some(Value::String(s)) if s.is_empty() => None,
            other => other,
        }
        .or_else(|| {
            self.errors.push(format!("{field} is required"));
            None
        })
    }

    fn check_string(
        &mut self,
        field: &str,
        value: &Value,
        min_length: usize,
        max_length: usize,
    ) -> Option<String> {
        let validated = value
            .as_str()
            .and_then(|s| validate_string(s, max_length, min_length));
        if validated.is_none() {
            self.errors.push(format!(
                "{field} must be a string between {min_length} and {max_length} characters"
            ));
        }
        validated
    }

    pub fn required_string(
        &mut self,
        field: &str,
        min_length: usize,
        max_length: usize,
    ) -> Option<String> {
        let value = self.required(field)?;
        self.check_string(field, value, min_length, max_length)
    }

    /// Like [`Self::required_string`], with the result sanitized.
    pub fn required_content(
        &mut self,
        field: &str,
        min_length: usize,
        max_length: usize,
    ) -> Option<String> {
        self.required_string(field, min_length, max_length)
            .map(|content| sanitize_content(&content))
    }

    pub fn optional_string(&mut self, field: &str, max_length: usize) -> Option<String> {
        let value = self.present(field)?;
        self.check_string(field, value, 0, max_length)
    }

    pub fn required_int(&mut self, field: &str) -> Option<i64> {
        let value = self.required(field)?;
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => parse_leading_int(s),
            _ => None,
        }
        .filter(|n| (1..=MAX_ID).contains(n));

        if parsed.is_none() {
            self.errors.push(format!("{field} must be a positive integer"));
        }
        parsed
    }

    /// An empty value counts as absent.
    pub fn optional_url(&mut self, field: &str) -> Option<String> {
        let value = self.present(field)?;
        if value.as_str().is_some_and(str::is_empty) {
            return None;
        }

        let validated = value.as_str().and_then(validate_url);
        if validated.is_none() {
            self.errors.push(format!("{field} must be a valid HTTP/HTTPS URL"));
        }
        validated
    }

    pub fn required_name(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?;
        let validated = value.as_str().and_then(validate_agent_name);
        if validated.is_none() {
            self.errors.push(format!(
                "{field} must be 3-50 characters, alphanumeric with spaces/hyphens/underscores only"
            ));
        }
        validated
    }

    pub fn finish(self) -> Result<(), ForumError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ForumError::Validation(self.errors.join(", ")))
        }
    }
}
