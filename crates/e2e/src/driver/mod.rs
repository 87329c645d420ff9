//! Drivers perform logical actions against the system under test.
//!
//! Two variants share one contract: [`api::ApiDriver`] issues protocol calls
//! directly and [`ui::UiDriver`] drives a browser through Playwright. Both
//! return an [`Observed`] result tagged with the [`Operation`] that produced
//! it. Drivers never see the fixture store; the orchestrator resolves every
//! value they need into an [`ActionPlan`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessResult;
use crate::fixtures::{BookDraft, Credentials};

pub mod api;
pub mod ui;

pub use api::{ApiConfig, ApiDriver};
pub use ui::{UiConfig, UiDriver};

/// Which verification surface a module runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Api,
    Ui,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Api => f.write_str("api"),
            Surface::Ui => f.write_str("ui"),
        }
    }
}

/// Logical operation a scenario performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Register,
    Login,
    Logout,
    CreateBook,
    EditBook,
    DeleteBook,
    FetchBook,
    /// Read which navbar links are visible (UI only)
    Navigation,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Login => "login",
            Operation::Logout => "logout",
            Operation::CreateBook => "create_book",
            Operation::EditBook => "edit_book",
            Operation::DeleteBook => "delete_book",
            Operation::FetchBook => "fetch_book",
            Operation::Navigation => "navigation",
        }
    }

    /// HTTP method of the service call this operation triggers
    pub fn method(&self) -> Option<reqwest::Method> {
        use reqwest::Method;
        match self {
            Operation::Register | Operation::Login | Operation::CreateBook => Some(Method::POST),
            Operation::Logout | Operation::FetchBook => Some(Method::GET),
            Operation::EditBook => Some(Method::PUT),
            Operation::DeleteBook => Some(Method::DELETE),
            Operation::Navigation => None,
        }
    }

    /// Service path, with the entity id substituted where the endpoint takes one
    pub fn path(&self, book_id: Option<&str>) -> Option<String> {
        match self {
            Operation::Register => Some("/users/register".to_string()),
            Operation::Login => Some("/users/login".to_string()),
            Operation::Logout => Some("/users/logout".to_string()),
            Operation::CreateBook => Some("/data/books".to_string()),
            Operation::EditBook | Operation::DeleteBook | Operation::FetchBook => {
                book_id.map(|id| format!("/data/books/{}", id))
            }
            Operation::Navigation => None,
        }
    }

    /// Whether the endpoint addresses a single book
    pub fn needs_book_id(&self) -> bool {
        matches!(
            self,
            Operation::EditBook | Operation::DeleteBook | Operation::FetchBook
        )
    }

    /// Whether the request carries a book body
    pub fn sends_book(&self) -> bool {
        matches!(self, Operation::CreateBook | Operation::EditBook)
    }

    /// Whether the request carries credentials
    pub fn sends_credentials(&self) -> bool {
        matches!(self, Operation::Register | Operation::Login)
    }

    pub fn supported_on(&self, surface: Surface) -> bool {
        match self {
            Operation::Navigation => surface == Surface::Ui,
            Operation::FetchBook => surface == Surface::Api,
            _ => true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a protected call attaches the session token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Attach `X-Authorization: <token>` from the session
    #[default]
    Session,
    /// Send no authorization header at all
    None,
}

/// Precondition re-established inside a fresh context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    Login,
}

/// Fully resolved input for one primary action
#[derive(Debug, Clone)]
pub struct ActionPlan {
    pub operation: Operation,
    pub auth: AuthMode,
    pub credentials: Option<Credentials>,
    pub token: Option<String>,
    pub book: Option<BookDraft>,
    pub book_id: Option<String>,
}

impl ActionPlan {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            auth: AuthMode::Session,
            credentials: None,
            token: None,
            book: None,
            book_id: None,
        }
    }
}

/// Response observed for one action, tagged with its operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observed {
    pub operation: Operation,
    pub status: u16,
    pub ok: bool,
    /// `Null` when the response had no body
    #[serde(default)]
    pub body: Value,
    /// Page path after the action (UI only)
    #[serde(default)]
    pub location: Option<String>,
}

impl Observed {
    /// Decode a raw response body: empty is `Null`, invalid JSON is kept as a string
    pub fn decode_body(text: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

/// Creates isolated driver contexts, one per scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    fn surface(&self) -> Surface;

    /// Allocate a fresh context. Failure here is a setup failure.
    async fn open(&self, scenario: &str) -> HarnessResult<Box<dyn DriverContext>>;
}

/// One isolated browsing context or bare API client
#[async_trait]
pub trait DriverContext: Send {
    /// Re-establish preconditions that do not survive across contexts
    async fn prepare(&mut self, setup: &[SetupStep], plan: &ActionPlan) -> HarnessResult<()>;

    /// Perform the primary action and wait for its response
    async fn perform(&mut self, plan: &ActionPlan) -> HarnessResult<Observed>;

    /// Tear the context down
    async fn release(self: Box<Self>) -> HarnessResult<()>;
}
