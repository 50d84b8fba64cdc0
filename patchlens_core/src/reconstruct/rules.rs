//! Ordered instruction rules.
//!
//! Each rule is a `(name, pattern, resolver)` triple. The first rule whose
//! pattern matches and whose resolver accepts the captures classifies the
//! instruction as an [`Operand`]. Candidates (from added instructions) and
//! anchors (from removed or probed instructions) are both derived from it.

use patchlens_api::simple_type_name;
use regex::{Captures, Regex};

use crate::Result;

const LABEL: &str = r"^\s*(?:IL_[0-9A-Fa-f]+:\s*)?";
const TYPE: &str = r"(?P<ty>[A-Za-z_][\w.`+/]*(?:<[^>]*>)?)";

/// Source-relevant meaning of one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    Getter { ty: String, name: String },
    Setter { ty: String, name: String },
    Call { ty: String, name: String },
    Constructor { ty: String },
    Field { ty: String, name: String },
    Text(String),
    Number(String),
}

/// Source expression derived from an added instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) expr: String,
    /// Rendered with an argument list.
    pub(crate) invocation: bool,
    pub(crate) literal: bool,
}

impl Candidate {
    /// Text that replaces a match, reusing the original arguments of a call.
    pub(crate) fn render(&self, args: Option<&str>) -> String {
        if self.invocation {
            format!("{}({})", self.expr, args.unwrap_or_default())
        } else {
            self.expr.clone()
        }
    }
}

/// How an anchor token is located in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum AnchorClass {
    /// Property or field access, `a.b.Name` not followed by `(`.
    Member,
    /// Invocation `a.b.Name(...)`.
    Call,
    /// Exact string or numeric literal.
    Literal,
}

/// Token searched for in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub(crate) token: String,
    pub(crate) class: AnchorClass,
}

impl Operand {
    pub(crate) fn candidate(&self) -> Candidate {
        let member = |ty: &str, name: &str| format!("{}.{name}", simple_type_name(ty));
        match self {
            Self::Getter { ty, name } | Self::Setter { ty, name } | Self::Field { ty, name } => {
                Candidate {
                    expr: member(ty, name),
                    invocation: false,
                    literal: false,
                }
            }
            Self::Call { ty, name } => Candidate {
                expr: member(ty, name),
                invocation: true,
                literal: false,
            },
            Self::Constructor { ty } => Candidate {
                expr: format!("new {}", simple_type_name(ty)),
                invocation: true,
                literal: false,
            },
            Self::Text(value) | Self::Number(value) => Candidate {
                expr: value.clone(),
                invocation: false,
                literal: true,
            },
        }
    }

    pub(crate) fn anchor(&self) -> Option<Anchor> {
        let (token, class) = match self {
            Self::Getter { name, .. } | Self::Setter { name, .. } | Self::Field { name, .. } => {
                (name.clone(), AnchorClass::Member)
            }
            Self::Call { name, .. } => (name.clone(), AnchorClass::Call),
            Self::Constructor { .. } => return None,
            Self::Text(value) | Self::Number(value) => (value.clone(), AnchorClass::Literal),
        };
        Some(Anchor { token, class })
    }
}

type Resolver = fn(&Captures<'_>) -> Option<Operand>;

struct Rule {
    name: &'static str,
    pattern: Regex,
    resolve: Resolver,
}

/// Ordered rule pipeline.
pub(crate) struct RuleSet {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name))
            .finish()
    }
}

impl RuleSet {
    /// Compile the built-in rules.
    pub(crate) fn builtin() -> Result<Self> {
        let call = r"(?:call|callvirt)\b.*?";
        let specs: [(&'static str, String, Resolver); 7] = [
            (
                "property-getter",
                format!(r"{LABEL}{call}{TYPE}::get_(?P<name>[A-Za-z_]\w*)"),
                |caps| {
                    Some(Operand::Getter {
                        ty: capture(caps, "ty")?,
                        name: capture(caps, "name")?,
                    })
                },
            ),
            (
                "property-setter",
                format!(r"{LABEL}{call}{TYPE}::set_(?P<name>[A-Za-z_]\w*)"),
                |caps| {
                    Some(Operand::Setter {
                        ty: capture(caps, "ty")?,
                        name: capture(caps, "name")?,
                    })
                },
            ),
            (
                "method-call",
                format!(r"{LABEL}{call}{TYPE}::(?P<name>[A-Za-z_]\w*)"),
                |caps| {
                    Some(Operand::Call {
                        ty: capture(caps, "ty")?,
                        name: capture(caps, "name")?,
                    })
                },
            ),
            (
                "constructor",
                format!(r"{LABEL}newobj\b.*?{TYPE}::\.ctor"),
                |caps| {
                    Some(Operand::Constructor {
                        ty: capture(caps, "ty")?,
                    })
                },
            ),
            (
                "field-access",
                format!(r"{LABEL}(?:ld|st)s?flda?\b.*?{TYPE}::(?P<name>[A-Za-z_]\w*)"),
                |caps| {
                    Some(Operand::Field {
                        ty: capture(caps, "ty")?,
                        name: capture(caps, "name")?,
                    })
                },
            ),
            (
                "string-literal",
                format!(r#"{LABEL}ldstr\s+(?P<value>"(?:[^"\\]|\\.)*")"#),
                |caps| Some(Operand::Text(capture(caps, "value")?)),
            ),
            (
                "numeric-literal",
                format!(
                    r"{LABEL}ldc\.(?:i4|i8|r4|r8)(?:\.s)?\s+(?P<value>-?[0-9][0-9.eE+\-]*)|{LABEL}ldc\.i4\.(?P<short>m1|M1|[0-8])\b"
                ),
                |caps| {
                    if let Some(value) = caps.name("value") {
                        return Some(Operand::Number(value.as_str().to_owned()));
                    }
                    let short = caps.name("short")?.as_str();
                    let value = if short.eq_ignore_ascii_case("m1") { "-1" } else { short };
                    Some(Operand::Number(value.to_owned()))
                },
            ),
        ];

        let rules = specs
            .into_iter()
            .map(|(name, pattern, resolve)| {
                Ok(Rule {
                    name,
                    pattern: Regex::new(&pattern)?,
                    resolve,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Classify one instruction; `None` when no rule applies.
    pub(crate) fn classify(&self, instruction: &str) -> Option<Operand> {
        self.rules.iter().find_map(|rule| {
            rule.pattern
                .captures(instruction)
                .and_then(|caps| (rule.resolve)(&caps))
        })
    }

    /// Name of the first rule accepting `instruction`.
    #[cfg(test)]
    fn rule_for(&self, instruction: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| {
                rule.pattern
                    .captures(instruction)
                    .and_then(|caps| (rule.resolve)(&caps))
                    .is_some()
            })
            .map(|rule| rule.name)
    }
}

fn capture(caps: &Captures<'_>, group: &str) -> Option<String> {
    caps.name(group).map(|found| found.as_str().to_owned())
}
