//! Line classification
//!
//! The classifier is the pluggable collaborator of the log pipeline: it
//! receives each raw line exactly once, in order, together with a
//! [`LookaheadSource`] for peeking at not-yet-consumed lines, and returns
//! the formatted text plus a coarse category. [`DiagnosticClassifier`] is
//! the built-in implementation for compiler-style build logs.

use crate::format::buffer::LookaheadSource;
use regex::Regex;

/// Coarse category assigned to every classified line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Info,
    Warning,
    Error,
    Summary,
}

/// One classified line: formatted text plus its category
///
/// An empty `text` marks a line that was absorbed into an earlier
/// formatted block (e.g. a source snippet merged into its diagnostic);
/// the pipeline emits nothing for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub text: String,
    pub category: Category,
}

impl Classified {
    pub fn new(text: impl Into<String>, category: Category) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }

    fn absorbed() -> Self {
        Self::new(String::new(), Category::Info)
    }
}

/// Stateful line-by-line log classifier
///
/// `classify` is called exactly once per buffered line, in buffer order.
/// The lookahead source yields lines after the current one without
/// consuming them; implementations must never request more lookahead than
/// the buffer backing the source was sized for.
pub trait LineClassifier: Send {
    fn classify(&mut self, line: &str, lookahead: &mut dyn LookaheadSource) -> Classified;

    /// Called exactly once after the last line has been classified
    ///
    /// A returned line is emitted like any classified line (typically a
    /// run summary).
    fn finish(&mut self) -> Option<Classified> {
        None
    }
}

/// Maximum lookahead depth requested by [`DiagnosticClassifier`]
///
/// Must stay below the lookahead buffer capacity; the default capacity of
/// [`DEFAULT_LOOKAHEAD_CAPACITY`](crate::format::buffer::DEFAULT_LOOKAHEAD_CAPACITY)
/// leaves ample headroom.
pub const MAX_DIAGNOSTIC_LOOKAHEAD: usize = 2;

/// Regex-based classifier for compiler-style build output
///
/// Recognizes `path:line:col: <kind>:` diagnostics, bare `warning:` /
/// `error:` prefixes and build result markers. A file-located diagnostic
/// pulls its source snippet and caret line forward into one formatted
/// block, which requires the tool to actually print those two lines after
/// each such diagnostic (as compilers do); a log truncated mid-diagnostic
/// violates the lookahead contract.
pub struct DiagnosticClassifier {
    located_regex: Regex,
    bare_regex: Regex,
    caret_regex: Regex,
    result_regex: Regex,

    /// Upcoming lines already rendered as part of an earlier block
    absorb: usize,
    warnings: usize,
    errors: usize,
}

impl DiagnosticClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // /path/File.swift:10:5: warning: unused variable 'x'
            located_regex: Regex::new(r":\d+:\d+:\s+(warning|error|fatal error|note):")?,

            // error: no such module 'Foo'
            bare_regex: Regex::new(r"^\s*(warning|error|fatal error):")?,

            //         ^~~~
            caret_regex: Regex::new(r"^\s*[\^~][\^~\s]*$")?,

            // ** BUILD SUCCEEDED ** / Build complete!
            result_regex: Regex::new(r"^\*\* [A-Z ]+ (SUCCEEDED|FAILED|INTERRUPTED) \*\*|^Build complete!")?,

            absorb: 0,
            warnings: 0,
            errors: 0,
        })
    }

    fn kind_category(kind: &str) -> Category {
        match kind {
            "warning" => Category::Warning,
            "note" => Category::Info,
            _ => Category::Error,
        }
    }

    fn count(&mut self, category: Category) {
        match category {
            Category::Warning => self.warnings += 1,
            Category::Error => self.errors += 1,
            _ => {}
        }
    }

    /// Merge the diagnostic's source snippet and caret line into one block
    ///
    /// Peeks one line for the snippet and a second for the caret; anything
    /// that itself looks like a diagnostic ends the block early.
    fn format_located(&mut self, line: &str, lookahead: &mut dyn LookaheadSource) -> String {
        let Some(snippet) = lookahead.next_line() else {
            return line.to_string();
        };
        if self.located_regex.is_match(&snippet) || self.bare_regex.is_match(&snippet) {
            return line.to_string();
        }

        let Some(caret) = lookahead.next_line() else {
            return line.to_string();
        };
        if !self.caret_regex.is_match(&caret) {
            return line.to_string();
        }

        self.absorb = MAX_DIAGNOSTIC_LOOKAHEAD;
        format!("{line}\n{snippet}\n{caret}")
    }
}

impl Default for DiagnosticClassifier {
    fn default() -> Self {
        Self::new().expect("failed to compile diagnostic patterns")
    }
}

impl LineClassifier for DiagnosticClassifier {
    fn classify(&mut self, line: &str, lookahead: &mut dyn LookaheadSource) -> Classified {
        if self.absorb > 0 {
            self.absorb -= 1;
            return Classified::absorbed();
        }

        if self.result_regex.is_match(line) {
            return Classified::new(line, Category::Summary);
        }

        if let Some(captures) = self.located_regex.captures(line) {
            let category = Self::kind_category(&captures[1]);
            self.count(category);
            let text = self.format_located(line, lookahead);
            return Classified { text, category };
        }

        if let Some(captures) = self.bare_regex.captures(line) {
            let category = Self::kind_category(&captures[1]);
            self.count(category);
            return Classified::new(line, category);
        }

        Classified::new(line, Category::Info)
    }

    fn finish(&mut self) -> Option<Classified> {
        Some(Classified::new(
            format!(
                "log processed: {} error(s), {} warning(s)",
                self.errors, self.warnings
            ),
            Category::Summary,
        ))
    }
}
