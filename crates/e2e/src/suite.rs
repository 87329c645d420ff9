//! Declarative YAML module definitions
//!
//! A module is an ordered list of scenarios sharing one fixture store. Each
//! scenario declares the fixture keys it reads and writes, and
//! [`ModuleSpec::validate`] rejects a module in which a scenario reads a key
//! that neither the seed nor a strictly earlier scenario provides.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assertion::{Capture, Expectation};
use crate::driver::{AuthMode, Operation, SetupStep, Surface};
use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{BookTemplate, CredentialTemplate};
use crate::state::FixtureKey;

/// Modules shipped with the harness
const BUILTIN: [(&str, &str); 5] = [
    ("api-users.yaml", include_str!("../suites/api-users.yaml")),
    ("api-books.yaml", include_str!("../suites/api-books.yaml")),
    ("ui-authentication.yaml", include_str!("../suites/ui-authentication.yaml")),
    ("ui-navbar.yaml", include_str!("../suites/ui-navbar.yaml")),
    ("ui-crud.yaml", include_str!("../suites/ui-crud.yaml")),
];

/// An ordered group of scenarios parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Unique name for this module
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    pub surface: Surface,

    /// Tags for filtering modules
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub credentials: CredentialTemplate,

    #[serde(default)]
    pub book: BookTemplate,

    /// Scenarios in execution order
    pub scenarios: Vec<ScenarioSpec>,
}

/// One end-to-end case within a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Fixture keys this scenario consumes
    #[serde(default)]
    pub reads: Vec<FixtureKey>,

    /// Fixture keys this scenario produces
    #[serde(default)]
    pub writes: Vec<FixtureKey>,

    /// Preconditions re-established in the fresh context
    #[serde(default)]
    pub setup: Vec<SetupStep>,

    pub action: Operation,

    #[serde(default)]
    pub auth: AuthMode,

    /// Appended to the stored title before an edit
    #[serde(default)]
    pub edit_suffix: Option<String>,

    #[serde(default)]
    pub expect: Expectation,

    #[serde(default)]
    pub capture: Vec<Capture>,
}

impl ScenarioSpec {
    /// Authorization actually used: only protected calls carry a token
    pub fn effective_auth(&self, surface: Surface) -> AuthMode {
        let protected = matches!(
            self.action,
            Operation::Logout | Operation::CreateBook | Operation::EditBook | Operation::DeleteBook
        );
        if surface == Surface::Api && protected {
            self.auth
        } else {
            AuthMode::None
        }
    }

    /// Keys the action, setup, auth and expectations need from the store
    pub fn required_keys(&self, surface: Surface) -> BTreeSet<FixtureKey> {
        let mut keys = BTreeSet::new();

        if self.action.sends_credentials() || self.setup.contains(&SetupStep::Login) {
            keys.insert(FixtureKey::Email);
            keys.insert(FixtureKey::Password);
        }
        if self.action == Operation::Register && surface == Surface::Ui {
            keys.insert(FixtureKey::PasswordConfirmation);
        }
        if self.effective_auth(surface) == AuthMode::Session {
            keys.insert(FixtureKey::AccessToken);
        }
        if self.action.sends_book() {
            keys.extend([
                FixtureKey::BookTitle,
                FixtureKey::BookDescription,
                FixtureKey::BookImageUrl,
                FixtureKey::BookType,
            ]);
        }
        if self.action.needs_book_id() {
            keys.insert(FixtureKey::BookId);
        }
        keys.extend(self.expect.fixture_refs());

        keys
    }
}

impl ModuleSpec {
    /// Parse and validate a module from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let module: Self = serde_yaml::from_str(yaml)?;
        module.validate()?;
        Ok(module)
    }

    /// Parse a module from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            HarnessError::Yaml(inner) => {
                HarnessError::SuiteParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all modules from a directory
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut modules = Vec::new();

        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        for path in paths {
            modules.push(Self::from_file(&path)?);
        }

        Self::ensure_unique_names(&modules)?;
        Ok(modules)
    }

    /// The modules shipped with the harness
    pub fn builtin() -> HarnessResult<Vec<Self>> {
        BUILTIN
            .iter()
            .map(|(file, yaml)| {
                Self::from_yaml(yaml)
                    .map_err(|e| HarnessError::SuiteParse(format!("{}: {}", file, e)))
            })
            .collect()
    }

    /// Filter modules by tag
    pub fn filter_by_tag<'a>(modules: &'a [Self], tag: &str) -> Vec<&'a Self> {
        modules.iter().filter(|m| m.tags.iter().any(|t| t == tag)).collect()
    }

    fn ensure_unique_names(modules: &[Self]) -> HarnessResult<()> {
        let mut seen = HashSet::new();
        for module in modules {
            if !seen.insert(module.name.as_str()) {
                return Err(HarnessError::SuiteParse(format!(
                    "duplicate module name '{}'",
                    module.name
                )));
            }
        }
        Ok(())
    }

    /// Scenarios that declare `key` among their writes
    pub fn producers(&self, key: FixtureKey) -> Vec<&str> {
        self.scenarios
            .iter()
            .filter(|s| s.writes.contains(&key))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Check ordering and declaration consistency
    pub fn validate(&self) -> HarnessResult<()> {
        let invalid = |scenario: &str, reason: String| {
            HarnessError::SuiteParse(format!(
                "module '{}', scenario '{}': {}",
                self.name, scenario, reason
            ))
        };

        if self.scenarios.is_empty() {
            return Err(HarnessError::SuiteParse(format!(
                "module '{}' has no scenarios",
                self.name
            )));
        }

        let mut available: BTreeSet<FixtureKey> = FixtureKey::SEEDED.into_iter().collect();
        let mut names = HashSet::new();

        for scenario in &self.scenarios {
            if !names.insert(scenario.name.as_str()) {
                return Err(invalid(&scenario.name, "duplicate scenario name".into()));
            }

            if !scenario.action.supported_on(self.surface) {
                return Err(invalid(
                    &scenario.name,
                    format!("{} is not available on the {} surface", scenario.action, self.surface),
                ));
            }

            if scenario.action == Operation::EditBook && scenario.edit_suffix.is_none() {
                return Err(invalid(&scenario.name, "edit_book needs an edit_suffix".into()));
            }

            for key in scenario.required_keys(self.surface) {
                if !scenario.reads.contains(&key) {
                    return Err(invalid(
                        &scenario.name,
                        format!("uses fixture '{}' without declaring it in reads", key),
                    ));
                }
            }

            for capture in &scenario.capture {
                if !scenario.writes.contains(&capture.key) {
                    return Err(invalid(
                        &scenario.name,
                        format!("captures '{}' without declaring it in writes", capture.key),
                    ));
                }
            }

            for key in &scenario.reads {
                if !available.contains(key) {
                    return Err(HarnessError::Dependency {
                        module: self.name.clone(),
                        scenario: scenario.name.clone(),
                        key: *key,
                    });
                }
            }

            available.extend(scenario.writes.iter().copied());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_module() {
        let yaml = r#"
name: users
surface: api
tags: [smoke]
scenarios:
  - name: register
    action: register
    reads: [email, password]
    writes: [access_token, user_id]
    expect:
      fields:
        - path: email
          equals_fixture: email
    capture:
      - key: access_token
        from: accessToken
      - key: user_id
        from: _id
"#;
        let module = ModuleSpec::from_yaml(yaml).unwrap();
        assert_eq!(module.name, "users");
        assert_eq!(module.surface, Surface::Api);
        assert_eq!(module.scenarios.len(), 1);
        assert_eq!(module.credentials.password, "123456");
        assert_eq!(module.producers(FixtureKey::UserId), vec!["register"]);
    }

    #[test]
    fn test_read_before_write_is_rejected() {
        let yaml = r#"
name: books
surface: api
scenarios:
  - name: create a book
    action: create_book
    reads: [access_token, book_title, book_description, book_image_url, book_type]
    writes: [book_id]
  - name: register
    action: register
    reads: [email, password]
    writes: [access_token]
"#;
        let err = ModuleSpec::from_yaml(yaml).unwrap_err();
        match err {
            HarnessError::Dependency { scenario, key, .. } => {
                assert_eq!(scenario, "create a book");
                assert_eq!(key, FixtureKey::AccessToken);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_undeclared_read_is_rejected() {
        let yaml = r#"
name: books
surface: api
scenarios:
  - name: delete
    action: delete_book
    reads: [access_token]
"#;
        let err = ModuleSpec::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("book_id"), "{err}");
    }

    #[test]
    fn test_unauthenticated_call_needs_no_token() {
        let yaml = r#"
name: gating
surface: api
scenarios:
  - name: create without token
    action: create_book
    auth: none
    reads: [book_title, book_description, book_image_url, book_type]
    expect:
      status: rejected
"#;
        let module = ModuleSpec::from_yaml(yaml).unwrap();
        let scenario = &module.scenarios[0];
        assert_eq!(scenario.effective_auth(Surface::Api), AuthMode::None);
        assert!(!scenario.required_keys(Surface::Api).contains(&FixtureKey::AccessToken));
    }

    #[test]
    fn test_ui_only_operation_rejected_on_api() {
        let yaml = r#"
name: nav
surface: api
scenarios:
  - name: navbar
    action: navigation
"#;
        assert!(ModuleSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_builtin_modules_are_valid() {
        let modules = ModuleSpec::builtin().unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["api-users", "api-books", "ui-authentication", "ui-navbar", "ui-crud"]
        );
        assert_eq!(ModuleSpec::filter_by_tag(&modules, "api").len(), 2);
        assert_eq!(ModuleSpec::filter_by_tag(&modules, "ui").len(), 3);
    }

    #[test]
    fn test_load_all_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "name: dup\nsurface: api\nscenarios:\n  - name: r\n    action: register\n    \
                    reads: [email, password]\n";
        std::fs::write(dir.path().join("a.yaml"), yaml).unwrap();
        std::fs::write(dir.path().join("b.yml"), yaml).unwrap();
        assert!(ModuleSpec::load_all(dir.path()).is_err());

        std::fs::remove_file(dir.path().join("b.yml")).unwrap();
        assert_eq!(ModuleSpec::load_all(dir.path()).unwrap().len(), 1);
    }
}
