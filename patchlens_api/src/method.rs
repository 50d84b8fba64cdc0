use std::fmt;

use serde::{Deserialize, Serialize};

/// Parsed method identity.
///
/// Accepts the usual shapes produced by instrumentation and decompilers:
/// `Verse.Pawn::Tick`, `System.Void Verse.Pawn::Tick()`, `Verse.Pawn:Tick`
/// and `Verse.Pawn.Tick`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully qualified declaring type, possibly empty.
    pub declaring_type: String,
    /// Member name without arguments.
    pub name: String,
}

impl MethodRef {
    /// Parse a method identity string. Returns `None` for blank input.
    #[must_use]
    pub fn parse(identity: &str) -> Option<Self> {
        let head = identity.split('(').next().unwrap_or(identity).trim();
        let head = head.split_whitespace().last()?;

        let (declaring_type, name) = if let Some((ty, name)) = head.rsplit_once("::") {
            (ty, name)
        } else if let Some((ty, name)) = head.rsplit_once(':') {
            (ty, name)
        } else if let Some((ty, name)) = head.rsplit_once('.') {
            (ty, name)
        } else {
            ("", head)
        };

        if name.is_empty() {
            return None;
        }

        Some(Self {
            declaring_type: declaring_type.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Declaring type without namespace, nesting or generic arity.
    #[must_use]
    pub fn simple_type_name(&self) -> &str {
        simple_type_name(&self.declaring_type)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declaring_type.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}::{}", self.declaring_type, self.name)
        }
    }
}

/// Strip namespace, nesting separators and generic arity from a type name.
///
/// `System.Collections.Generic.List`1` becomes `List`, `Outer/Inner` becomes
/// `Inner`.
#[must_use]
pub fn simple_type_name(qualified: &str) -> &str {
    let without_args = qualified.split('<').next().unwrap_or(qualified);
    let last = without_args
        .rsplit(['.', '/', '+'])
        .next()
        .unwrap_or(without_args);
    last.split('`').next().unwrap_or(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_double_colon_form() {
        let method = MethodRef::parse("Verse.Pawn::Tick").expect("parse");
        assert_eq!(method.declaring_type, "Verse.Pawn");
        assert_eq!(method.name, "Tick");
        assert_eq!(method.simple_type_name(), "Pawn");
        assert_eq!(method.to_string(), "Verse.Pawn::Tick");
    }

    #[test]
    fn tolerates_return_type_and_arguments() {
        let method =
            MethodRef::parse("System.Void Verse.Pawn::TakeDamage(Verse.DamageInfo dinfo)")
                .expect("parse");
        assert_eq!(method.declaring_type, "Verse.Pawn");
        assert_eq!(method.name, "TakeDamage");
    }

    #[test]
    fn falls_back_to_single_colon_and_dot() {
        let colon = MethodRef::parse("Verse.Pawn:Tick").expect("parse colon");
        assert_eq!(colon.name, "Tick");
        assert_eq!(colon.declaring_type, "Verse.Pawn");

        let dotted = MethodRef::parse("Pawn.Tick").expect("parse dot");
        assert_eq!(dotted.declaring_type, "Pawn");
        assert_eq!(dotted.name, "Tick");

        let bare = MethodRef::parse("Tick").expect("parse bare");
        assert!(bare.declaring_type.is_empty());
        assert_eq!(bare.to_string(), "Tick");
    }

    #[test]
    fn rejects_blank_identity() {
        assert!(MethodRef::parse("   ").is_none());
        assert!(MethodRef::parse("Foo::").is_none());
    }

    #[test]
    fn simple_type_name_strips_decoration() {
        assert_eq!(simple_type_name("System.Collections.Generic.List`1"), "List");
        assert_eq!(simple_type_name("Outer/Inner"), "Inner");
        assert_eq!(simple_type_name("Foo<int>"), "Foo");
        assert_eq!(simple_type_name("Bar"), "Bar");
    }
}
