//! Prompt Library for AI follow-ups
//!
//! Built-in prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/loglens/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Every prompt carries exactly one `{result_content}` placeholder, replaced
//! verbatim with the insight's formatted content.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::ai::{PromptType, RESULT_PLACEHOLDER};
use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const EXPLAIN: &str = include_str!("../../../prompts/explain.md");
    pub const RECOMMEND: &str = include_str!("../../../prompts/recommend.md");
}

/// Built-in prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    Explain,
    Recommend,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Recommend => "recommend",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::Explain, Self::Recommend]
    }

    /// Look up a built-in prompt by its id string
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == name)
    }

    /// File name an override for this prompt must use
    pub fn override_file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }

    /// Built-in template for a prompt type; custom prompts have none
    pub fn for_prompt_type(prompt_type: PromptType) -> Option<Self> {
        match prompt_type {
            PromptType::Explain => Some(Self::Explain),
            PromptType::Recommend => Some(Self::Recommend),
            PromptType::Custom => None,
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::Explain => defaults::EXPLAIN,
            Self::Recommend => defaults::RECOMMEND,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Substitute the result content into the template
    pub fn render(&self, result_content: &str) -> String {
        render_template(&self.content, result_content)
    }
}

/// Replace the single placeholder with `result_content`, verbatim
///
/// The substitution is a single pass, so placeholder text inside the
/// content itself is left alone.
pub fn render_template(template: &str, result_content: &str) -> String {
    template.replacen(RESULT_PLACEHOLDER, result_content, 1)
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    /// Load a prompt (checking override first, then default)
    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let override_path = self.override_path(id);
                let version = self.get(id).map(|p| p.metadata.version).unwrap_or(0);
                PromptInfo {
                    id: id.as_str().to_string(),
                    version,
                    has_override: override_path.is_some(),
                    override_path,
                }
            })
            .collect()
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(id.override_file_name()))
            .filter(|p| p.exists())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("loglens").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    if body.matches(RESULT_PLACEHOLDER).count() != 1 {
        return Err(Error::InvalidData(format!(
            "Prompt {} must contain exactly one {} placeholder",
            metadata.id, RESULT_PLACEHOLDER
        )));
    }

    Ok((metadata, body.to_string()))
}
