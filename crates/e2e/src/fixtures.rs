//! Collision-resistant test data
//!
//! Every value produced by a [`UniqueGenerator`] embeds a per-process run tag
//! and a monotonically increasing counter. Within one run the counter makes
//! values pairwise distinct. Across runs two values can only collide when the
//! 32-bit run tags are equal, which happens with probability 2^-32 for any
//! pair of runs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Source of unique suffixes for one harness run
#[derive(Debug)]
pub struct UniqueGenerator {
    run_tag: String,
    counter: AtomicU64,
}

impl UniqueGenerator {
    /// Create a generator with a random run tag
    pub fn new() -> Self {
        Self::with_tag(format!("{:08x}", rand::random::<u32>()))
    }

    /// Create a generator with a fixed run tag
    pub fn with_tag(run_tag: impl Into<String>) -> Self {
        Self {
            run_tag: run_tag.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn run_tag(&self) -> &str {
        &self.run_tag
    }

    /// Next unique suffix for this run
    pub fn next_suffix(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.run_tag, n)
    }

    pub fn email(&self) -> String {
        format!("email-{}@email.com", self.next_suffix())
    }

    pub fn title(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_suffix())
    }

    pub fn description(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_suffix())
    }
}

impl Default for UniqueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Account used by one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Credentials {
    /// Fresh credentials with a generated email
    pub fn generate(generator: &UniqueGenerator, template: &CredentialTemplate) -> Self {
        Self {
            email: generator.email(),
            password: template.password.clone(),
            password_confirmation: template
                .password_confirmation
                .clone()
                .unwrap_or_else(|| template.password.clone()),
        }
    }
}

/// Static part of the credentials declared by a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialTemplate {
    #[serde(default = "default_password")]
    pub password: String,

    /// Defaults to `password`
    #[serde(default)]
    pub password_confirmation: Option<String>,
}

fn default_password() -> String {
    "123456".to_string()
}

impl Default for CredentialTemplate {
    fn default() -> Self {
        Self {
            password: default_password(),
            password_confirmation: None,
        }
    }
}

/// Book entity as sent to the service before it has an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub book_type: String,
}

impl BookDraft {
    pub fn generate(generator: &UniqueGenerator, template: &BookTemplate) -> Self {
        Self {
            title: generator.title(&template.title_prefix),
            description: generator.description(&template.description_prefix),
            image_url: template.image_url.clone(),
            book_type: template.book_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookTemplate {
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,

    #[serde(default = "default_description_prefix")]
    pub description_prefix: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_book_type", rename = "type")]
    pub book_type: String,
}

fn default_title_prefix() -> String {
    "Random-Title".to_string()
}

fn default_description_prefix() -> String {
    "Random-Description".to_string()
}

fn default_image_url() -> String {
    "/images/2.png".to_string()
}

fn default_book_type() -> String {
    "Other".to_string()
}

impl Default for BookTemplate {
    fn default() -> Self {
        Self {
            title_prefix: default_title_prefix(),
            description_prefix: default_description_prefix(),
            image_url: default_image_url(),
            book_type: default_book_type(),
        }
    }
}
