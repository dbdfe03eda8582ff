//! Entries accumulated by the review context.

use crate::review::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default importance for code elements that do not report one.
pub const DEFAULT_IMPORTANCE: u8 = 5;

/// Highest importance on the 0-10 scale.
pub const MAX_IMPORTANCE: u8 = 10;

/// Kind of code element tracked across passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeElementKind {
    Function,
    Class,
    Interface,
    Variable,
    Import,
    Export,
    Component,
    #[serde(alias = "entrypoint", alias = "entry-point")]
    EntryPoint,
}

impl CodeElementKind {
    /// Parse the free-text kind a model reports. Unrecognised kinds yield `None`.
    pub fn parse_lenient(kind: &str) -> Option<Self> {
        let normalized = kind.trim().to_lowercase().replace(['-', ' '], "_");
        let parsed = match normalized.as_str() {
            "function" | "fn" | "method" | "func" | "hook" => Self::Function,
            "class" | "struct" | "enum" | "type" | "type_alias" => Self::Class,
            "interface" | "trait" | "protocol" => Self::Interface,
            "variable" | "const" | "constant" | "static" | "field" => Self::Variable,
            "import" | "use" | "require" => Self::Import,
            "export" | "reexport" => Self::Export,
            "component" | "widget" => Self::Component,
            "entry_point" | "entrypoint" | "main" => Self::EntryPoint,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for CodeElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Variable => "variable",
            Self::Import => "import",
            Self::Export => "export",
            Self::Component => "component",
            Self::EntryPoint => "entry point",
        };
        f.write_str(s)
    }
}

/// A named element of the codebase worth remembering between passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeElement {
    pub kind: CodeElementKind,
    pub name: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// 0-10; clamped on insert.
    pub importance: u8,
}

impl CodeElement {
    pub fn new(kind: CodeElementKind, name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            file: file.into(),
            signature: None,
            importance: DEFAULT_IMPORTANCE,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.min(MAX_IMPORTANCE);
        self
    }
}

/// A finding from an earlier pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFinding {
    /// Category, e.g. `issue` or `security`.
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub severity: Severity,
    /// Pass that produced the finding.
    pub pass: u32,
}

/// What an earlier pass learned about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub file_type: String,
    pub description: String,
    #[serde(default)]
    pub key_elements: Vec<String>,
    pub pass: u32,
}

/// Free-form observation carried forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNote {
    pub text: String,
    pub pass: u32,
}
