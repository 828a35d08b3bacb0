//! Localized text values.
//!
//! # Responsibility
//! - `MultiText`: one alternative per writing system, order-insignificant.
//! - `FormattedText`: one formatted value made of styled runs.
//!
//! # Invariants
//! - `FormattedText` always holds at least one run; its writing system is the
//!   writing system of the first run.
//! - The alternatives copy operation exists only on `MultiText`. Single values
//!   are copied through `extract` + `make`.

use crate::model::writing_system::WritingSystem;
use std::collections::BTreeMap;

/// Set of text alternatives keyed by writing system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiText {
    alternatives: BTreeMap<WritingSystem, String>,
}

impl MultiText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`MultiText::set`].
    pub fn with(mut self, ws: WritingSystem, text: impl Into<String>) -> Self {
        self.set(ws, text);
        self
    }

    /// Sets one alternative, replacing any previous text for `ws`.
    pub fn set(&mut self, ws: WritingSystem, text: impl Into<String>) {
        self.alternatives.insert(ws, text.into());
    }

    pub fn get(&self, ws: &WritingSystem) -> Option<&str> {
        self.alternatives.get(ws).map(String::as_str)
    }

    pub fn remove(&mut self, ws: &WritingSystem) -> Option<String> {
        self.alternatives.remove(ws)
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Iterates alternatives in writing system order.
    pub fn iter(&self) -> impl Iterator<Item = (&WritingSystem, &str)> {
        self.alternatives
            .iter()
            .map(|(ws, text)| (ws, text.as_str()))
    }

    /// Replaces every alternative with the alternatives of `other`, verbatim.
    pub fn copy_alternatives_from(&mut self, other: &MultiText) {
        self.alternatives.clone_from(&other.alternatives);
    }
}

/// One styled run of a formatted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub ws: WritingSystem,
    /// Named character style, if any.
    pub style: Option<String>,
}

/// Single formatted text value (one or more runs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedText {
    runs: Vec<TextRun>,
}

impl FormattedText {
    /// Synthesizes an unstyled single-run value from a text and writing system.
    pub fn make(text: impl Into<String>, ws: WritingSystem) -> Self {
        Self {
            runs: vec![TextRun {
                text: text.into(),
                ws,
                style: None,
            }],
        }
    }

    /// Appends one run.
    pub fn push_run(&mut self, text: impl Into<String>, ws: WritingSystem, style: Option<String>) {
        self.runs.push(TextRun {
            text: text.into(),
            ws,
            style,
        });
    }

    /// Builder-style variant of [`FormattedText::push_run`].
    pub fn with_run(
        mut self,
        text: impl Into<String>,
        ws: WritingSystem,
        style: Option<String>,
    ) -> Self {
        self.push_run(text, ws, style);
        self
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Writing system of the value (first run).
    pub fn writing_system(&self) -> &WritingSystem {
        &self.runs[0].ws
    }

    /// Extracts the `(text, writing system)` pair used to rebuild this value.
    pub fn extract(&self) -> (String, WritingSystem) {
        (self.text(), self.writing_system().clone())
    }
}
