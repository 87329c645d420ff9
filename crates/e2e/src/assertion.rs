//! Response contracts and their evaluation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::Observed;
use crate::state::{FixtureKey, FixtureStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Any 2xx
    Ok,
    /// Any 4xx
    Rejected,
    NotFound,
}

/// Expected response status: a class or an exact code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusExpectation {
    Code(u16),
    Class(StatusClass),
}

impl Default for StatusExpectation {
    fn default() -> Self {
        StatusExpectation::Class(StatusClass::Ok)
    }
}

impl StatusExpectation {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusExpectation::Code(code) => *code == status,
            StatusExpectation::Class(StatusClass::Ok) => (200..300).contains(&status),
            StatusExpectation::Class(StatusClass::Rejected) => (400..500).contains(&status),
            StatusExpectation::Class(StatusClass::NotFound) => status == 404,
        }
    }

    pub fn expects_success(&self) -> bool {
        match self {
            StatusExpectation::Code(code) => (200..300).contains(code),
            StatusExpectation::Class(class) => *class == StatusClass::Ok,
        }
    }

    fn describe(&self) -> String {
        match self {
            StatusExpectation::Code(code) => code.to_string(),
            StatusExpectation::Class(StatusClass::Ok) => "2xx".to_string(),
            StatusExpectation::Class(StatusClass::Rejected) => "4xx".to_string(),
            StatusExpectation::Class(StatusClass::NotFound) => "404".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyShape {
    Object,
    Empty,
    Any,
}

/// Rules applied to one field of the response body.
///
/// Every rule that is set produces its own check. A field check with no
/// rules only requires the field to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCheck {
    /// Dot-separated path into the body, e.g. `links.mybooks`
    pub path: String,
    #[serde(default)]
    pub present: bool,
    #[serde(default)]
    pub non_empty: bool,
    #[serde(default)]
    pub string: bool,
    #[serde(default)]
    pub number: bool,
    #[serde(default)]
    pub equals: Option<Value>,
    #[serde(default)]
    pub equals_fixture: Option<FixtureKey>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub contains_fixture: Option<FixtureKey>,
}

impl FieldCheck {
    /// Fixtures this check compares against
    pub fn fixture_refs(&self) -> impl Iterator<Item = FixtureKey> + '_ {
        self.equals_fixture.iter().chain(self.contains_fixture.iter()).copied()
    }
}

/// Expected shape of a scenario's response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub status: StatusExpectation,

    /// Defaults to `object` for success expectations, `any` otherwise
    #[serde(default)]
    pub body: Option<BodyShape>,

    #[serde(default)]
    pub fields: Vec<FieldCheck>,

    /// Expected page path after the action (UI only)
    #[serde(default)]
    pub location: Option<String>,
}

impl Expectation {
    pub fn body_shape(&self) -> BodyShape {
        self.body.unwrap_or(if self.status.expects_success() {
            BodyShape::Object
        } else {
            BodyShape::Any
        })
    }

    pub fn fixture_refs(&self) -> Vec<FixtureKey> {
        self.fields.iter().flat_map(FieldCheck::fixture_refs).collect()
    }
}

/// A response field copied into the fixture store after success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub key: FixtureKey,
    /// Dot-separated path into the body
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub description: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckOutcome {
    fn new(description: impl Into<String>, passed: bool, detail: Option<String>) -> Self {
        Self {
            description: description.into(),
            passed,
            detail: if passed { None } else { detail },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionReport {
    pub checks: Vec<CheckOutcome>,
}

impl AssertionReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// One-line summary of the failing checks
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|c| match &c.detail {
                Some(detail) => format!("{} ({})", c.description, detail),
                None => c.description.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Look up a dot-separated path in a JSON value
pub fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }
    path.split('.').try_fold(body, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a scalar as the string a fixture would hold
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Values to write into the store once every check has passed
pub fn captured_values(captures: &[Capture], observed: &Observed) -> Vec<(FixtureKey, String)> {
    captures
        .iter()
        .filter_map(|c| {
            lookup(&observed.body, &c.from)
                .and_then(scalar_text)
                .filter(|v| !v.is_empty())
                .map(|v| (c.key, v))
        })
        .collect()
}

/// Evaluate an observed response against its expectation
pub fn evaluate(
    expect: &Expectation,
    captures: &[Capture],
    observed: &Observed,
    store: &FixtureStore,
) -> AssertionReport {
    let mut checks = Vec::new();
    let success = expect.status.expects_success();

    checks.push(CheckOutcome::new(
        format!("status is {}", expect.status.describe()),
        expect.status.matches(observed.status),
        Some(format!("got {}", observed.status)),
    ));

    if success {
        checks.push(CheckOutcome::new(
            "response is ok",
            observed.ok,
            Some(format!("status {}", observed.status)),
        ));
    }

    match expect.body_shape() {
        BodyShape::Object => checks.push(CheckOutcome::new(
            "body is an object",
            observed.body.is_object(),
            Some(format!("got {}", kind_of(&observed.body))),
        )),
        BodyShape::Empty => checks.push(CheckOutcome::new(
            "body is empty",
            observed.body.is_null(),
            Some(format!("got {}", kind_of(&observed.body))),
        )),
        BodyShape::Any => {}
    }

    if success {
        for capture in captures {
            let value = lookup(&observed.body, &capture.from);
            checks.push(CheckOutcome::new(
                format!("{} is present and non-empty", capture.from),
                value.map(is_non_empty).unwrap_or(false),
                Some(format!("got {}", value.map(kind_of).unwrap_or("nothing"))),
            ));
        }
    }

    for field in &expect.fields {
        check_field(field, &observed.body, store, &mut checks);
    }

    if let Some(expected) = &expect.location {
        let actual = observed.location.as_deref().unwrap_or("");
        checks.push(CheckOutcome::new(
            format!("location is {}", expected),
            actual == expected,
            Some(format!("got {}", actual)),
        ));
    }

    AssertionReport { checks }
}

fn check_field(
    field: &FieldCheck,
    body: &Value,
    store: &FixtureStore,
    checks: &mut Vec<CheckOutcome>,
) {
    let path = &field.path;
    let value = lookup(body, path);
    let mut any_rule = false;

    if field.present {
        any_rule = true;
        checks.push(CheckOutcome::new(
            format!("{} is present", path),
            value.is_some(),
            Some("missing".to_string()),
        ));
    }

    if field.non_empty {
        any_rule = true;
        checks.push(CheckOutcome::new(
            format!("{} is non-empty", path),
            value.map(is_non_empty).unwrap_or(false),
            Some(format!("got {}", describe(value))),
        ));
    }

    if field.string {
        any_rule = true;
        checks.push(CheckOutcome::new(
            format!("{} is a string", path),
            matches!(value, Some(Value::String(_))),
            Some(format!("got {}", value.map(kind_of).unwrap_or("nothing"))),
        ));
    }

    if field.number {
        any_rule = true;
        checks.push(CheckOutcome::new(
            format!("{} is a number", path),
            matches!(value, Some(Value::Number(_))),
            Some(format!("got {}", value.map(kind_of).unwrap_or("nothing"))),
        ));
    }

    if let Some(expected) = &field.equals {
        any_rule = true;
        checks.push(CheckOutcome::new(
            format!("{} equals {}", path, expected),
            value == Some(expected),
            Some(format!("got {}", describe(value))),
        ));
    }

    if let Some(key) = field.equals_fixture {
        any_rule = true;
        let expected = store.get(key);
        let actual = value.and_then(scalar_text);
        let passed = matches!((expected, actual.as_deref()), (Some(e), Some(a)) if e == a);
        checks.push(CheckOutcome::new(
            format!("{} equals fixture {}", path, key),
            passed,
            Some(match expected {
                Some(e) => format!("expected {:?}, got {}", e, describe(value)),
                None => format!("fixture {} is not set", key),
            }),
        ));
    }

    if let Some(needle) = &field.contains {
        any_rule = true;
        let actual = value.and_then(scalar_text);
        checks.push(CheckOutcome::new(
            format!("{} contains {:?}", path, needle),
            actual.map(|a| a.contains(needle.as_str())).unwrap_or(false),
            Some(format!("got {}", describe(value))),
        ));
    }

    if let Some(key) = field.contains_fixture {
        any_rule = true;
        let expected = store.get(key);
        let actual = value.and_then(scalar_text);
        let passed = matches!((expected, actual.as_deref()), (Some(e), Some(a)) if a.contains(e));
        checks.push(CheckOutcome::new(
            format!("{} contains fixture {}", path, key),
            passed,
            Some(format!("got {}", describe(value))),
        ));
    }

    if !any_rule {
        checks.push(CheckOutcome::new(
            format!("{} is present", path),
            value.is_some(),
            Some("missing".to_string()),
        ));
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "nothing".to_string(),
    }
}
