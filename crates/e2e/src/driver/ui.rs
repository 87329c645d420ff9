//! Playwright browser driver
//!
//! Every context runs one generated Node script. The script launches the
//! browser, opens a fresh browsing context, replays the setup steps, performs
//! the action and prints a single tagged line:
//!
//! ```text
//! @@observed {"operation":"create_book","status":200,"ok":true,"body":{..},"location":".."}
//! @@failure  {"stage":"action","timeout":true,"message":".."}
//! ```
//!
//! Submissions are correlated with the network response they trigger by HTTP
//! method and service path (including the entity id when one is known), and
//! the result is tagged with the originating operation.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::process::Command as TokioCommand;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{ActionPlan, DriverContext, DriverFactory, Observed, Operation, SetupStep, Surface};
use crate::error::{HarnessError, HarnessResult};
use crate::state::FixtureKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Parse a browser name, falling back to Chromium
    pub fn from_name(name: &str) -> Self {
        match name {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }
}

/// Element selectors of the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSelectors {
    pub form: String,
    pub email: String,
    pub password: String,
    pub repeat_password: String,
    pub submit: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub book_type: String,
    pub details: String,
    pub edit: String,
    pub delete: String,
}

impl Default for UiSelectors {
    fn default() -> Self {
        Self {
            form: "form".to_string(),
            email: "#email".to_string(),
            password: "#password".to_string(),
            repeat_password: "#repeat-pass".to_string(),
            submit: ".button.submit".to_string(),
            title: "#title".to_string(),
            description: "#description".to_string(),
            image: "#image".to_string(),
            book_type: "select[id='type']".to_string(),
            details: "text=Details >> nth=0".to_string(),
            edit: "text=Edit".to_string(),
            delete: "text=Delete".to_string(),
        }
    }
}

impl UiSelectors {
    /// Navbar link pointing at `path`
    pub fn nav_link(path: &str) -> String {
        format!("a[href='{}']", path)
    }
}

/// Navbar links reported by a navigation check
pub const NAV_LINKS: [(&str, &str); 6] = [
    ("home", "/"),
    ("mybooks", "/mybooks"),
    ("create", "/create"),
    ("logout", "/logout"),
    ("login", "/login"),
    ("register", "/register"),
];

/// Configuration for the Playwright driver
#[derive(Debug, Clone)]
pub struct UiConfig {
    /// Base URL of the application (not the service)
    pub app_url: String,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    /// Where failure screenshots go, if anywhere
    pub screenshot_dir: Option<PathBuf>,

    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,

    /// Bounded wait for a single element or network completion
    pub action_timeout: Duration,

    /// Hard deadline for the whole script
    pub script_timeout: Duration,

    pub selectors: UiSelectors,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3001".to_string(),
            project_dir: PathBuf::from("."),
            screenshot_dir: None,
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            action_timeout: Duration::from_secs(10),
            script_timeout: Duration::from_secs(60),
            selectors: UiSelectors::default(),
        }
    }
}

/// One step of a generated browser script
#[derive(Debug, Clone, PartialEq)]
enum UiStep {
    Navigate { path: String },
    Click { selector: String },
    Fill { selector: String, value: String },
    Select { selector: String, value: String },
    WaitFor { selector: String },
    /// Click `trigger` and await the matching network response.
    /// Recorded submissions fill the observed result; unrecorded ones must succeed.
    Submit {
        trigger: String,
        method: String,
        url_fragment: String,
        record: bool,
    },
    ReadLinks,
}

impl UiStep {
    fn name(&self) -> String {
        match self {
            UiStep::Navigate { path } => format!("navigate:{}", path),
            UiStep::Click { selector } => format!("click:{}", selector),
            UiStep::Fill { selector, .. } => format!("fill:{}", selector),
            UiStep::Select { selector, .. } => format!("select:{}", selector),
            UiStep::WaitFor { selector } => format!("wait:{}", selector),
            UiStep::Submit { method, url_fragment, .. } => {
                format!("submit:{} {}", method, url_fragment)
            }
            UiStep::ReadLinks => "read-links".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScriptFailure {
    stage: String,
    #[serde(default)]
    timeout: bool,
    message: String,
}

/// Factory for isolated Playwright browsing contexts
pub struct UiDriver {
    config: Arc<UiConfig>,
    installed: OnceCell<bool>,
}

impl UiDriver {
    pub fn new(config: UiConfig) -> Self {
        Self {
            config: Arc::new(config),
            installed: OnceCell::new(),
        }
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed(&self) -> bool {
        let status = TokioCommand::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&self.config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        matches!(status, Ok(s) if s.success())
    }
}

#[async_trait]
impl DriverFactory for UiDriver {
    fn surface(&self) -> Surface {
        Surface::Ui
    }

    async fn open(&self, scenario: &str) -> HarnessResult<Box<dyn DriverContext>> {
        let installed = *self
            .installed
            .get_or_init(|| self.check_playwright_installed())
            .await;
        if !installed {
            return Err(HarnessError::PlaywrightNotFound);
        }

        let workdir = tempfile::Builder::new().prefix("bookshelf-ui-").tempdir()?;

        Ok(Box::new(UiContext {
            config: Arc::clone(&self.config),
            scenario: scenario.to_string(),
            setup: Vec::new(),
            workdir: Some(workdir),
        }))
    }
}

struct UiContext {
    config: Arc<UiConfig>,
    scenario: String,
    setup: Vec<UiStep>,
    workdir: Option<TempDir>,
}

#[async_trait]
impl DriverContext for UiContext {
    async fn prepare(&mut self, setup: &[SetupStep], plan: &ActionPlan) -> HarnessResult<()> {
        self.setup.clear();
        for step in setup {
            match step {
                SetupStep::Login => {
                    let steps = login_steps(&self.config.selectors, plan, false)?;
                    self.setup.extend(steps);
                }
            }
        }
        Ok(())
    }

    async fn perform(&mut self, plan: &ActionPlan) -> HarnessResult<Observed> {
        let logged_in = !self.setup.is_empty();
        let steps = action_steps(&self.config.selectors, plan, logged_in)?;
        let screenshot = self
            .config
            .screenshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", sanitize(&self.scenario))));
        if let Some(dir) = &self.config.screenshot_dir {
            std::fs::create_dir_all(dir)?;
        }

        let script = build_script(&self.config, plan.operation, &self.setup, &steps, screenshot);
        let observed = self.run_script(plan.operation, &script).await?;

        if observed.operation != plan.operation {
            return Err(HarnessError::Correlation {
                expected: plan.operation.to_string(),
                actual: observed.operation.to_string(),
            });
        }
        Ok(observed)
    }

    async fn release(mut self: Box<Self>) -> HarnessResult<()> {
        if let Some(dir) = self.workdir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

impl UiContext {
    /// Execute the script via node and decode its tagged output
    async fn run_script(&self, operation: Operation, script: &str) -> HarnessResult<Observed> {
        let workdir = self
            .workdir
            .as_ref()
            .ok_or_else(|| HarnessError::Setup("browser context already released".into()))?;
        let script_path = workdir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let node_modules = self.config.project_dir.join("node_modules");
        let child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&self.config.project_dir)
            .env("NODE_PATH", &node_modules)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let waited = tokio::time::timeout(self.config.script_timeout, child.wait_with_output());
        let output = match waited.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(HarnessError::ActionTimeout {
                    operation: operation.to_string(),
                    waited_ms: self.config.script_timeout.as_millis() as u64,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match parse_output(&stdout) {
            Some(ScriptLine::Observed(observed)) => Ok(observed),
            Some(ScriptLine::Failure(failure)) => {
                warn!("Playwright {} failed: {}", failure.stage, failure.message);
                if failure.timeout {
                    Err(HarnessError::ActionTimeout {
                        operation: operation.to_string(),
                        waited_ms: self.config.action_timeout.as_millis() as u64,
                    })
                } else if failure.stage == "setup" {
                    Err(HarnessError::Setup(failure.message))
                } else {
                    Err(HarnessError::Playwright(failure.message))
                }
            }
            None => Err(HarnessError::Playwright(format!(
                "Script produced no result (exit {}):\nstdout: {}\nstderr: {}",
                output.status, stdout, stderr
            ))),
        }
    }
}

enum ScriptLine {
    Observed(Observed),
    Failure(ScriptFailure),
}

fn output_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^@@(observed|failure) (.+)$").expect("static pattern is valid")
    })
}

/// Find the last tagged line in the script output
fn parse_output(stdout: &str) -> Option<ScriptLine> {
    output_pattern()
        .captures_iter(stdout)
        .filter_map(|caps| {
            let payload = caps.get(2)?.as_str();
            match caps.get(1)?.as_str() {
                "observed" => serde_json::from_str(payload).ok().map(ScriptLine::Observed),
                _ => serde_json::from_str(payload).ok().map(ScriptLine::Failure),
            }
        })
        .last()
}

/// Quote a value as a JavaScript string literal
fn js(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

fn submit_for(
    operation: Operation,
    trigger: &str,
    book_id: Option<&str>,
    record: bool,
) -> HarnessResult<UiStep> {
    let method = operation
        .method()
        .ok_or_else(|| HarnessError::Setup(format!("{} triggers no request", operation)))?;
    let url_fragment = operation
        .path(book_id)
        .ok_or(HarnessError::MissingFixture(FixtureKey::BookId))?;
    Ok(UiStep::Submit {
        trigger: trigger.to_string(),
        method: method.to_string(),
        url_fragment,
        record,
    })
}

/// Log in through the login form
fn login_steps(
    selectors: &UiSelectors,
    plan: &ActionPlan,
    record: bool,
) -> HarnessResult<Vec<UiStep>> {
    let creds = plan
        .credentials
        .as_ref()
        .ok_or(HarnessError::MissingFixture(FixtureKey::Email))?;
    Ok(vec![
        UiStep::Navigate { path: "/".into() },
        UiStep::Click { selector: UiSelectors::nav_link("/login") },
        UiStep::WaitFor { selector: selectors.form.clone() },
        UiStep::Fill { selector: selectors.email.clone(), value: creds.email.clone() },
        UiStep::Fill {
            selector: selectors.password.clone(),
            value: creds.password.clone(),
        },
        submit_for(Operation::Login, &selectors.submit, None, record)?,
    ])
}

/// Steps of the primary action for one operation
fn action_steps(
    selectors: &UiSelectors,
    plan: &ActionPlan,
    logged_in: bool,
) -> HarnessResult<Vec<UiStep>> {
    let book_id = plan.book_id.as_deref().filter(|id| !id.is_empty());

    let steps = match plan.operation {
        Operation::Register => {
            let creds = plan
                .credentials
                .as_ref()
                .ok_or(HarnessError::MissingFixture(FixtureKey::Email))?;
            vec![
                UiStep::Navigate { path: "/".into() },
                UiStep::Click { selector: UiSelectors::nav_link("/register") },
                UiStep::WaitFor { selector: selectors.form.clone() },
                UiStep::Fill { selector: selectors.email.clone(), value: creds.email.clone() },
                UiStep::Fill {
                    selector: selectors.password.clone(),
                    value: creds.password.clone(),
                },
                UiStep::Fill {
                    selector: selectors.repeat_password.clone(),
                    value: creds.password_confirmation.clone(),
                },
                submit_for(Operation::Register, &selectors.submit, None, true)?,
            ]
        }
        Operation::Login => login_steps(selectors, plan, true)?,
        Operation::Logout => vec![
            submit_for(Operation::Logout, &UiSelectors::nav_link("/logout"), None, true)?,
            UiStep::WaitFor { selector: UiSelectors::nav_link("/login") },
        ],
        Operation::CreateBook => {
            let book = plan
                .book
                .as_ref()
                .ok_or(HarnessError::MissingFixture(FixtureKey::BookTitle))?;
            vec![
                UiStep::Click { selector: UiSelectors::nav_link("/create") },
                UiStep::WaitFor { selector: selectors.form.clone() },
                UiStep::Fill { selector: selectors.title.clone(), value: book.title.clone() },
                UiStep::Fill {
                    selector: selectors.description.clone(),
                    value: book.description.clone(),
                },
                UiStep::Fill { selector: selectors.image.clone(), value: book.image_url.clone() },
                UiStep::Select {
                    selector: selectors.book_type.clone(),
                    value: book.book_type.clone(),
                },
                submit_for(Operation::CreateBook, &selectors.submit, None, true)?,
            ]
        }
        Operation::EditBook => {
            let book = plan
                .book
                .as_ref()
                .ok_or(HarnessError::MissingFixture(FixtureKey::BookTitle))?;
            vec![
                UiStep::Click { selector: UiSelectors::nav_link("/mybooks") },
                UiStep::Click { selector: selectors.details.clone() },
                UiStep::Click { selector: selectors.edit.clone() },
                UiStep::WaitFor { selector: selectors.form.clone() },
                UiStep::Fill { selector: selectors.title.clone(), value: book.title.clone() },
                submit_for(Operation::EditBook, &selectors.submit, book_id, true)?,
            ]
        }
        Operation::DeleteBook => vec![
            UiStep::Click { selector: UiSelectors::nav_link("/mybooks") },
            UiStep::Click { selector: selectors.details.clone() },
            submit_for(Operation::DeleteBook, &selectors.delete, book_id, true)?,
        ],
        Operation::Navigation => {
            let anchor = if logged_in { "/logout" } else { "/login" };
            vec![
                UiStep::Navigate { path: "/".into() },
                UiStep::WaitFor { selector: UiSelectors::nav_link(anchor) },
                UiStep::ReadLinks,
            ]
        }
        Operation::FetchBook => {
            return Err(HarnessError::Setup("fetch_book has no UI flow".into()));
        }
    };

    Ok(steps)
}

/// Build the complete Playwright script for one scenario
fn build_script(
    config: &UiConfig,
    operation: Operation,
    setup: &[UiStep],
    steps: &[UiStep],
    screenshot: Option<PathBuf>,
) -> String {
    let mut script = String::new();

    // Header
    script.push_str(&format!(
        r#"
const {{ chromium, firefox, webkit }} = require('playwright');

async function readBody(response) {{
  const text = await response.text().catch(() => '');
  if (!text) return null;
  try {{ return JSON.parse(text); }} catch (_) {{ return text; }}
}}

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout});
  page.on('dialog', dialog => dialog.accept());
  const appUrl = {app_url};
  const observed = {{ operation: {operation}, status: 0, ok: false, body: null, location: null }};
  let stage = 'setup';

  try {{
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        timeout = config.action_timeout.as_millis(),
        app_url = js(config.app_url.trim_end_matches('/')),
        operation = js(operation.as_str()),
    ));

    for (i, step) in setup.iter().enumerate() {
        script.push_str(&format!("\n    // Setup {}: {}\n", i + 1, step.name()));
        script.push_str(&step_to_js(step, i));
    }

    script.push_str("\n    stage = 'action';\n");

    for (i, step) in steps.iter().enumerate() {
        let index = setup.len() + i;
        script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step.name()));
        script.push_str(&step_to_js(step, index));
    }

    let capture = screenshot
        .map(|path| {
            format!(
                "    await page.screenshot({{ path: {} }}).catch(() => {{}});\n",
                js(&path.to_string_lossy())
            )
        })
        .unwrap_or_default();

    // Footer
    script.push_str(&format!(
        r#"
    observed.location = new URL(page.url()).pathname;
    console.log('@@observed ' + JSON.stringify(observed));
  }} catch (error) {{
{capture}    const timeout = error.name === 'TimeoutError';
    console.log('@@failure ' + JSON.stringify({{ stage, timeout, message: error.message }}));
    process.exitCode = 1;
  }} finally {{
    await context.close();
    await browser.close();
  }}
}})();
"#,
        capture = capture,
    ));

    script
}

/// Convert a step to JavaScript code
fn step_to_js(step: &UiStep, index: usize) -> String {
    match step {
        UiStep::Navigate { path } => format!(
            r#"    const nav_{i} = await page.goto(appUrl + {path});
    if (nav_{i}) {{ observed.status = nav_{i}.status(); observed.ok = nav_{i}.ok(); }}
"#,
            i = index,
            path = js(path),
        ),
        UiStep::Click { selector } => {
            format!("    await page.locator({}).click();\n", js(selector))
        }
        UiStep::Fill { selector, value } => format!(
            "    await page.locator({}).fill({});\n",
            js(selector),
            js(value)
        ),
        UiStep::Select { selector, value } => format!(
            "    await page.locator({}).selectOption({});\n",
            js(selector),
            js(value)
        ),
        UiStep::WaitFor { selector } => {
            format!("    await page.waitForSelector({});\n", js(selector))
        }
        UiStep::Submit { trigger, method, url_fragment, record } => {
            let handle = if *record {
                format!(
                    r#"    observed.status = response_{i}.status();
    observed.ok = response_{i}.ok();
    observed.body = await readBody(response_{i});
"#,
                    i = index
                )
            } else {
                format!(
                    r#"    if (!response_{i}.ok()) {{
      throw new Error('setup request ' + {method} + ' ' + {fragment} + ' returned ' + response_{i}.status());
    }}
"#,
                    i = index,
                    method = js(method),
                    fragment = js(url_fragment),
                )
            };
            format!(
                r#"    const [response_{i}] = await Promise.all([
      page.waitForResponse(r => r.url().includes({fragment}) && r.request().method() === {method}),
      page.locator({trigger}).click(),
    ]);
{handle}"#,
                i = index,
                fragment = js(url_fragment),
                method = js(method),
                trigger = js(trigger),
                handle = handle,
            )
        }
        UiStep::ReadLinks => {
            let links = NAV_LINKS
                .iter()
                .map(|(name, path)| format!("[{}, {}]", js(name), js(&UiSelectors::nav_link(path))))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                r#"    observed.body = {{ links: {{}} }};
    for (const [name, selector] of [{links}]) {{
      observed.body.links[name] = await page.locator(selector).first().isVisible();
    }}
"#,
                links = links
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BookDraft, Credentials};

    fn plan(operation: Operation) -> ActionPlan {
        let mut plan = ActionPlan::new(operation);
        plan.credentials = Some(Credentials {
            email: "email-t0@email.com".into(),
            password: "123456".into(),
            password_confirmation: "123456".into(),
        });
        plan.book = Some(BookDraft {
            title: "Test title-t1".into(),
            description: "desc".into(),
            image_url: "/random-image".into(),
            book_type: "Classic".into(),
        });
        plan
    }

    #[test]
    fn test_register_script_correlates_by_method_and_path() {
        let config = UiConfig::default();
        let steps = action_steps(&config.selectors, &plan(Operation::Register), false).unwrap();
        let script = build_script(&config, Operation::Register, &[], &steps, None);

        assert!(script.contains(r#"page.locator("a[href='/register']").click()"#));
        assert!(script.contains(r##"page.locator("#repeat-pass").fill("123456")"##));
        assert!(script.contains(
            r#"r.url().includes("/users/register") && r.request().method() === "POST""#
        ));
        assert!(script.contains(r#"operation: "register""#));
        assert!(script.contains("await context.close();"));
    }

    #[test]
    fn test_edit_correlates_on_entity_id() {
        let config = UiConfig::default();
        let mut plan = plan(Operation::EditBook);
        plan.book_id = Some("abc123".into());
        let steps = action_steps(&config.selectors, &plan, true).unwrap();
        assert!(steps.contains(&UiStep::Submit {
            trigger: ".button.submit".into(),
            method: "PUT".into(),
            url_fragment: "/data/books/abc123".into(),
            record: true,
        }));
    }

    #[test]
    fn test_delete_without_id_is_missing_fixture() {
        let config = UiConfig::default();
        let err = action_steps(&config.selectors, &plan(Operation::DeleteBook), true).unwrap_err();
        assert!(matches!(err, HarnessError::MissingFixture(FixtureKey::BookId)));
    }

    #[test]
    fn test_setup_login_is_not_recorded() {
        let config = UiConfig::default();
        let setup = login_steps(&config.selectors, &plan(Operation::CreateBook), false).unwrap();
        let steps = action_steps(&config.selectors, &plan(Operation::CreateBook), true).unwrap();
        let script = build_script(&config, Operation::CreateBook, &setup, &steps, None);

        let setup_at = script.find("setup request").unwrap();
        let action_at = script.find("stage = 'action'").unwrap();
        assert!(setup_at < action_at);
        assert!(script.contains(r#"selectOption("Classic")"#));
    }

    #[tokio::test]
    async fn test_navigation_expects_links_for_session_state() {
        let config = Arc::new(UiConfig::default());
        let plan = plan(Operation::Navigation);
        let mut context = UiContext {
            config: Arc::clone(&config),
            scenario: "navbar".into(),
            setup: Vec::new(),
            workdir: None,
        };

        context.prepare(&[], &plan).await.unwrap();
        let guest = action_steps(&config.selectors, &plan, !context.setup.is_empty()).unwrap();
        assert!(guest.contains(&UiStep::WaitFor { selector: UiSelectors::nav_link("/login") }));

        context.prepare(&[SetupStep::Login], &plan).await.unwrap();
        let member = action_steps(&config.selectors, &plan, !context.setup.is_empty()).unwrap();
        assert!(member.contains(&UiStep::WaitFor { selector: UiSelectors::nav_link("/logout") }));
    }

    #[test]
    fn test_values_are_escaped() {
        let config = UiConfig::default();
        let mut plan = plan(Operation::CreateBook);
        if let Some(book) = plan.book.as_mut() {
            book.title = "it's \"quoted\"".into();
        }
        let steps = action_steps(&config.selectors, &plan, true).unwrap();
        let script = build_script(&config, Operation::CreateBook, &[], &steps, None);
        assert!(script.contains(r#"fill("it's \"quoted\"")"#));
    }

    #[test]
    fn test_parse_output_takes_tagged_line() {
        let stdout = "noise\n@@observed {\"operation\":\"logout\",\"status\":204,\
                      \"ok\":true,\"body\":null,\"location\":\"/\"}\n";
        match parse_output(stdout) {
            Some(ScriptLine::Observed(o)) => {
                assert_eq!(o.operation, Operation::Logout);
                assert_eq!(o.status, 204);
                assert_eq!(o.location.as_deref(), Some("/"));
            }
            _ => panic!("expected observed line"),
        }

        let stdout = "@@failure {\"stage\":\"action\",\"timeout\":true,\
                      \"message\":\"Timeout 10000ms exceeded\"}\n";
        match parse_output(stdout) {
            Some(ScriptLine::Failure(f)) => assert!(f.timeout),
            _ => panic!("expected failure line"),
        }

        assert!(parse_output("nothing here").is_none());
    }
}
