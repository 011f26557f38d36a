use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserError {
    #[error("Invalid class name '{0}'")]
    InvalidClassName(String),
    #[error("Case {case} references undefined class '{class}'")]
    UndefinedClass { case: String, class: String },
    #[error("Case {case} does not compile: {source}")]
    InvalidPattern {
        case: String,
        #[source]
        source: regex::Error,
    },
    #[error("Parser has cases that were never built")]
    NotBuilt,
}

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_class_name, r"^[A-Za-z0-9_]+$");
re!(re_reference, r"\{([A-Za-z0-9_]+)(?::([A-Za-z0-9_]+))?\}");

/// Result of a successful parse: the winning case label and every named
/// group that took part in the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText<L> {
    pub label: L,
    pub captures: BTreeMap<String, String>,
}

impl<L> ParsedText<L> {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }
}

struct Case<L> {
    label: L,
    template: String,
    compiled: Option<Regex>,
}

/// Ordered, first-match-wins set of labelled templates.
///
/// A template is a regex in which `{class}` or `{binding:class}` stands for a
/// named group `(?P<binding>fragment)` built from a class defined with
/// [`define_class`](Self::define_class). Purely numeric references such as
/// the `{15}` in `\d{15}` and references preceded by a backslash are left as
/// they are. Each case is matched from the start of the input, not against
/// the whole string.
pub struct TemplateParser<L> {
    classes: BTreeMap<String, String>,
    cases: Vec<Case<L>>,
    case_insensitive: bool,
}

impl<L> Default for TemplateParser<L> {
    fn default() -> Self {
        TemplateParser {
            classes: BTreeMap::new(),
            cases: Vec::new(),
            case_insensitive: false,
        }
    }
}

impl<L: fmt::Debug> fmt::Debug for TemplateParser<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateParser")
            .field("classes", &self.classes)
            .field(
                "cases",
                &self.cases.iter().map(|c| (&c.label, &c.template)).collect::<Vec<_>>(),
            )
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl<L: Clone + fmt::Debug> TemplateParser<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        if self.case_insensitive != yes {
            self.case_insensitive = yes;
            self.invalidate();
        }
        self
    }

    pub fn define_class(&mut self, name: &str, fragment: &str) -> Result<&mut Self, ParserError> {
        if !re_class_name().is_match(name) || is_quantifier(name) {
            return Err(ParserError::InvalidClassName(name.to_string()));
        }
        self.classes.insert(name.to_string(), fragment.to_string());
        self.invalidate();
        Ok(self)
    }

    pub fn add_case(&mut self, label: L, template: impl Into<String>) -> &mut Self {
        self.cases.push(Case {
            label,
            template: template.into(),
            compiled: None,
        });
        self
    }

    /// Compiles every case not compiled yet. Calling it again is a no-op.
    pub fn build(&mut self) -> Result<(), ParserError> {
        let mut compiled = 0;
        for idx in 0..self.cases.len() {
            if self.cases[idx].compiled.is_some() {
                continue;
            }
            let case = &self.cases[idx];
            let pattern = self.expand(&case.label, &case.template)?;
            let regex = RegexBuilder::new(&format!(r"\A(?:{pattern})"))
                .case_insensitive(self.case_insensitive)
                .build()
                .map_err(|source| ParserError::InvalidPattern {
                    case: format!("{:?}", case.label),
                    source,
                })?;
            self.cases[idx].compiled = Some(regex);
            compiled += 1;
        }
        if compiled > 0 {
            tracing::debug!(compiled, total = self.cases.len(), "parser cases built");
        }
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.cases.iter().all(|c| c.compiled.is_some())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// The regex each case compiled to, in case order.
    pub fn patterns(&self) -> Vec<Option<&str>> {
        self.cases
            .iter()
            .map(|c| c.compiled.as_ref().map(Regex::as_str))
            .collect()
    }

    /// Tries the cases in insertion order and returns the first match.
    pub fn parse(&self, text: &str) -> Result<Option<ParsedText<L>>, ParserError> {
        for case in &self.cases {
            let regex = case.compiled.as_ref().ok_or(ParserError::NotBuilt)?;
            if let Some(caps) = regex.captures(text) {
                let captures = regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
                    .collect();
                return Ok(Some(ParsedText {
                    label: case.label.clone(),
                    captures,
                }));
            }
        }
        Ok(None)
    }

    fn invalidate(&mut self) {
        for case in &mut self.cases {
            case.compiled = None;
        }
    }

    fn expand(&self, label: &L, template: &str) -> Result<String, ParserError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in re_reference().captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            let ident = &caps[1];
            let escaped = template[..whole.start()].ends_with('\\');
            if escaped || (caps.get(2).is_none() && is_quantifier(ident)) {
                continue;
            }
            let class = caps.get(2).map_or(ident, |m| m.as_str());
            let fragment = self
                .classes
                .get(class)
                .ok_or_else(|| ParserError::UndefinedClass {
                    case: format!("{label:?}"),
                    class: class.to_string(),
                })?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(&format!("(?P<{ident}>{fragment})"));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

fn is_quantifier(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_digit())
}
