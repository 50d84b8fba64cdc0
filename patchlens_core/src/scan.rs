//! Lightweight lexical scan of decompiled C#-like source.
//!
//! Classifies every byte as code, comment or string/char literal, and finds
//! the body of a named method by signature search and brace matching. The
//! scanner never fails: unterminated comments or literals simply run to the
//! end of the text.

use std::ops::Range;

use patchlens_api::MethodRef;

/// Lexical class of a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Code,
    Comment,
    Literal,
}

/// Per-byte lexical classification of a text.
#[derive(Debug)]
pub(crate) struct Lexed<'a> {
    text: &'a str,
    classes: Vec<Class>,
}

impl<'a> Lexed<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        let mut classes = vec![Class::Code; bytes.len()];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    let end = find_byte(bytes, i, b'\n');
                    classes[i..end].fill(Class::Comment);
                    i = end;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = find_pair(bytes, i + 2, b'*', b'/').map_or(bytes.len(), |at| at + 2);
                    classes[i..end].fill(Class::Comment);
                    i = end;
                }
                b'@' if bytes.get(i + 1) == Some(&b'"') => {
                    let end = verbatim_end(bytes, i + 2);
                    classes[i..end].fill(Class::Literal);
                    i = end;
                }
                b'$' if bytes.get(i + 1) == Some(&b'"') => {
                    i = interpolated_end(bytes, &mut classes, i);
                }
                b'"' => {
                    let end = quoted_end(bytes, i + 1, b'"');
                    classes[i..end].fill(Class::Literal);
                    i = end;
                }
                b'\'' => {
                    let end = quoted_end(bytes, i + 1, b'\'');
                    classes[i..end].fill(Class::Literal);
                    i = end;
                }
                _ => i += 1,
            }
        }
        Self { text, classes }
    }

    pub(crate) const fn text(&self) -> &'a str {
        self.text
    }

    pub(crate) fn class_at(&self, offset: usize) -> Class {
        self.classes.get(offset).copied().unwrap_or(Class::Code)
    }

    pub(crate) fn is_code(&self, offset: usize) -> bool {
        self.class_at(offset) == Class::Code
    }

    /// Offset of the first code byte at or after `from` that is not whitespace.
    fn next_code(&self, from: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        (from..bytes.len()).find(|&at| self.is_code(at) && !bytes[at].is_ascii_whitespace())
    }

    /// Offset of the last code byte before `before` that is not whitespace.
    fn prev_code(&self, before: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        (0..before)
            .rev()
            .find(|&at| self.is_code(at) && !bytes[at].is_ascii_whitespace())
    }

    /// Index just past the bracket closing the one at `open`, counting only code bytes.
    pub(crate) fn matching_close(&self, open: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let (left, right) = match bytes.get(open)? {
            b'(' => (b'(', b')'),
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => return None,
        };
        let mut depth = 0_usize;
        for at in open..bytes.len() {
            if !self.is_code(at) {
                continue;
            }
            if bytes[at] == left {
                depth += 1;
            } else if bytes[at] == right {
                depth -= 1;
                if depth == 0 {
                    return Some(at + 1);
                }
            }
        }
        None
    }

    /// Byte span of the body of `method`.
    ///
    /// `get_X` / `set_X` resolve to the accessor inside property `X`,
    /// `.ctor` / `.cctor` to the instance or static constructor of the
    /// declaring type. Anything else is looked up as an ordinary method.
    pub(crate) fn body_of(&self, method: &MethodRef) -> Option<Range<usize>> {
        let name = method.name.split(['<', '`']).next().unwrap_or(&method.name);
        match name {
            ".ctor" => self.constructor_body(method.simple_type_name(), false),
            ".cctor" => self.constructor_body(method.simple_type_name(), true),
            _ => {
                let accessor = name
                    .strip_prefix("get_")
                    .map(|property| (property, "get"))
                    .or_else(|| name.strip_prefix("set_").map(|property| (property, "set")));
                accessor
                    .and_then(|(property, keyword)| self.accessor_body(property, keyword))
                    .or_else(|| self.method_body(name))
            }
        }
    }

    /// Byte span of the body of the method called `name`.
    ///
    /// Looks for `name(` or `name<...>(` in code that is not a member access,
    /// skips the parameter list, and accepts a `{ ... }` block (optionally
    /// after a `where` or constructor-initializer clause) or an `=> ...;`
    /// expression body. Call sites are skipped. Returns the span between the
    /// braces, or the expression after `=>`.
    pub(crate) fn method_body(&self, name: &str) -> Option<Range<usize>> {
        self.declarations(name).find_map(|(_, end)| {
            let bytes = self.text.as_bytes();
            let mut open = self.next_code(end)?;
            if bytes[open] == b'<' {
                open = self.next_code(self.type_arguments_end(open)?)?;
            }
            if bytes[open] != b'(' {
                return None;
            }
            self.body_after(self.matching_close(open)?)
        })
    }

    fn constructor_body(&self, type_name: &str, is_static: bool) -> Option<Range<usize>> {
        let bytes = self.text.as_bytes();
        self.declarations(type_name).find_map(|(start, end)| {
            let open = self.next_code(end).filter(|&at| bytes[at] == b'(')?;
            let modifiers = self.modifiers_before(start);
            let constructed = modifiers.last().is_some_and(|word| *word == "new");
            if constructed || modifiers.iter().any(|word| *word == "static") != is_static {
                return None;
            }
            self.body_after(self.matching_close(open)?)
        })
    }

    /// `get` / `set` accessor body of property `property`. Expression-bodied
    /// properties only have a getter; auto-accessors have no body.
    fn accessor_body(&self, property: &str, keyword: &str) -> Option<Range<usize>> {
        let bytes = self.text.as_bytes();
        self.declarations(property).find_map(|(start, end)| {
            let typed = self
                .prev_code(start)
                .is_some_and(|at| {
                    is_ident_byte(bytes[at]) || matches!(bytes[at], b'>' | b']' | b'?')
                });
            let declaring = self
                .modifiers_before(start)
                .last()
                .is_some_and(|word| TYPE_KEYWORDS.contains(word));
            if !typed || declaring {
                return None;
            }
            let open = self.next_code(end)?;
            match bytes[open] {
                b'=' if bytes.get(open + 1) == Some(&b'>') && keyword == "get" => {
                    Some(self.expression_body(open + 2))
                }
                b'{' => {
                    let close = self.matching_close(open)?;
                    self.accessor_in(open + 1..close - 1, keyword)
                }
                _ => None,
            }
        })
    }

    fn accessor_in(&self, block: Range<usize>, keyword: &str) -> Option<Range<usize>> {
        let bytes = self.text.as_bytes();
        let mut at = block.start;
        while at < block.end {
            if !self.is_code(at) {
                at += 1;
                continue;
            }
            match bytes[at] {
                b'{' => at = self.matching_close(at)?,
                _ if self.text[at..block.end].starts_with(keyword)
                    && is_word_boundary(bytes, at, at + keyword.len()) =>
                {
                    let next = self.next_code(at + keyword.len())?;
                    return match bytes[next] {
                        b'{' => {
                            let end = self.matching_close(next)?;
                            Some(next + 1..end - 1)
                        }
                        b'=' if bytes.get(next + 1) == Some(&b'>') => {
                            Some(self.expression_body(next + 2))
                        }
                        _ => None,
                    };
                }
                _ => at += 1,
            }
        }
        None
    }

    /// Code occurrences of the identifier `name` that are not member accesses,
    /// as `(start, end)` byte offsets.
    fn declarations<'s>(&'s self, name: &'s str) -> impl Iterator<Item = (usize, usize)> + 's {
        let bytes = self.text.as_bytes();
        self.text
            .match_indices(name)
            .filter(move |_| !name.is_empty())
            .map(move |(start, _)| (start, start + name.len()))
            .filter(move |&(start, end)| {
                self.is_code(start)
                    && is_word_boundary(bytes, start, end)
                    && !self.prev_code(start).is_some_and(|at| bytes[at] == b'.')
            })
    }

    /// Index just past the `>` closing a type-argument list opened at `open`.
    fn type_arguments_end(&self, open: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 0_usize;
        for at in open..bytes.len() {
            match bytes[at] {
                b'<' => depth += 1,
                b'>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(at + 1);
                    }
                }
                b',' | b'.' | b'[' | b']' | b'?' => {}
                byte if is_ident_byte(byte) || byte.is_ascii_whitespace() => {}
                _ => return None,
            }
        }
        None
    }

    /// Identifier words directly before `start`, nearest last.
    fn modifiers_before(&self, start: usize) -> Vec<&'a str> {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut words = Vec::new();
        let mut cursor = start;
        while let Some(end) = self.prev_code(cursor).filter(|&at| is_ident_byte(bytes[at])) {
            let begin = (0..=end)
                .rev()
                .take_while(|&at| is_ident_byte(bytes[at]))
                .last()
                .unwrap_or(end);
            words.push(&text[begin..=end]);
            cursor = begin;
        }
        words.reverse();
        words
    }

    fn expression_body(&self, start: usize) -> Range<usize> {
        let bytes = self.text.as_bytes();
        let end = (start..bytes.len())
            .find(|&pos| self.is_code(pos) && bytes[pos] == b';')
            .unwrap_or(bytes.len());
        start..end
    }

    fn body_after(&self, close: usize) -> Option<Range<usize>> {
        let bytes = self.text.as_bytes();
        let mut clause = false;
        let mut at = close;
        while at < bytes.len() {
            if !self.is_code(at) || bytes[at].is_ascii_whitespace() {
                at += 1;
                continue;
            }
            match bytes[at] {
                b'{' => {
                    let end = self.matching_close(at)?;
                    return Some(at + 1..end - 1);
                }
                b'=' if bytes.get(at + 1) == Some(&b'>') => return Some(self.expression_body(at + 2)),
                b':' if !clause => {
                    clause = true;
                    at += 1;
                }
                b'w' if !clause
                    && self.text[at..].starts_with("where")
                    && is_word_boundary(bytes, at, at + "where".len()) =>
                {
                    clause = true;
                    at += "where".len();
                }
                b'(' if clause => at = self.matching_close(at)?,
                b';' | b')' | b'}' => return None,
                _ if clause => at += 1,
                _ => return None,
            }
        }
        None
    }
}

/// Words that introduce a type rather than a member.
const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record", "namespace", "new"];

/// Zero-based line index of a byte offset.
pub(crate) fn line_of(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count()
}

pub(crate) fn is_word_boundary(bytes: &[u8], start: usize, end: usize) -> bool {
    let before = start.checked_sub(1).map(|at| bytes[at]);
    let after = bytes.get(end).copied();
    !before.is_some_and(is_ident_byte) && !after.is_some_and(is_ident_byte)
}

pub(crate) const fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == needle)
        .map_or(bytes.len(), |at| from + at)
}

fn find_pair(bytes: &[u8], from: usize, first: u8, second: u8) -> Option<usize> {
    (from..bytes.len().saturating_sub(1)).find(|&at| bytes[at] == first && bytes[at + 1] == second)
}

fn quoted_end(bytes: &[u8], mut at: usize, quote: u8) -> usize {
    while at < bytes.len() {
        match bytes[at] {
            b'\\' => at += 2,
            b'\n' => return at,
            b if b == quote => return at + 1,
            _ => at += 1,
        }
    }
    bytes.len()
}

/// Classify `$"..."` starting at `start`: text is a literal, `{...}` holes
/// are code. Returns the index past the string.
fn interpolated_end(bytes: &[u8], classes: &mut [Class], start: usize) -> usize {
    let mut at = start + 2;
    classes[start..at].fill(Class::Literal);
    while at < bytes.len() {
        match bytes[at] {
            b'\n' => return at,
            b'"' => {
                classes[at] = Class::Literal;
                return at + 1;
            }
            b'\\' => {
                let end = (at + 2).min(bytes.len());
                classes[at..end].fill(Class::Literal);
                at = end;
            }
            // `{{` and `}}` are escaped braces
            b'{' | b'}' if bytes.get(at + 1) == Some(&bytes[at]) => {
                classes[at..at + 2].fill(Class::Literal);
                at += 2;
            }
            b'{' => {
                classes[at] = Class::Literal;
                at = hole_end(bytes, classes, at + 1);
            }
            _ => {
                classes[at] = Class::Literal;
                at += 1;
            }
        }
    }
    bytes.len()
}

/// Skip an interpolation hole, leaving it code apart from nested literals.
/// Returns the index past the closing `}`.
fn hole_end(bytes: &[u8], classes: &mut [Class], mut at: usize) -> usize {
    let mut depth = 0_usize;
    while at < bytes.len() {
        match bytes[at] {
            quote @ (b'"' | b'\'') => {
                let end = quoted_end(bytes, at + 1, quote);
                classes[at..end].fill(Class::Literal);
                at = end;
            }
            b'{' => {
                depth += 1;
                at += 1;
            }
            b'}' if depth == 0 => {
                classes[at] = Class::Literal;
                return at + 1;
            }
            b'}' => {
                depth -= 1;
                at += 1;
            }
            b'\n' => return at,
            _ => at += 1,
        }
    }
    bytes.len()
}

fn verbatim_end(bytes: &[u8], mut at: usize) -> usize {
    while at < bytes.len() {
        if bytes[at] == b'"' {
            if bytes.get(at + 1) == Some(&b'"') {
                at += 2;
                continue;
            }
            return at + 1;
        }
        at += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"public class Pawn
{
    // Tick(); is mentioned here
    public int Count() => items.Length;

    public void Tick()
    {
        var label = "Tick() { }";
        if (ready) { Count(); }
    }

    public void Other() { Tick(); }
}
"#;

    #[test]
    fn classifies_comments_and_literals() {
        let lexed = Lexed::new(SAMPLE);
        let comment = SAMPLE.find("// Tick").expect("comment");
        assert_eq!(lexed.class_at(comment + 4), Class::Comment);
        let literal = SAMPLE.find("\"Tick()").expect("literal");
        assert_eq!(lexed.class_at(literal + 1), Class::Literal);
        assert!(lexed.is_code(SAMPLE.find("public").expect("code")));
    }

    #[test]
    fn finds_block_body_and_skips_call_sites() {
        let lexed = Lexed::new(SAMPLE);
        let body = lexed.method_body("Tick").expect("body");
        let text = &SAMPLE[body];
        assert!(text.contains("var label"));
        assert!(text.contains("Count();"));
        assert!(!text.contains("Other"));
    }

    #[test]
    fn finds_expression_body() {
        let lexed = Lexed::new(SAMPLE);
        let body = lexed.method_body("Count").expect("body");
        assert_eq!(SAMPLE[body].trim(), "items.Length");
    }

    fn method(identity: &str) -> MethodRef {
        MethodRef::parse(identity).expect("identity")
    }

    const SHAPES: &str = r#"public class Cache<TKey>
{
    static Cache() { Shared = Build(); }
    public Cache(int size) : base(size, new Options()) { capacity = size; }
    public T Lookup<T>(TKey key) where T : class, new() { return Find<T>(key); }
    public int Capacity
    {
        get { return capacity; }
        private set { capacity = value; }
    }
    public int Size => entries.Count;
    public bool Enabled { get; set; }
    void Reset() { var copy = new Cache(4) { Capacity = 2 }; }
}
"#;

    #[test]
    fn finds_generic_method_body() {
        let lexed = Lexed::new(SHAPES);
        let body = lexed.body_of(&method("Demo.Cache`1::Lookup")).expect("body");
        assert_eq!(SHAPES[body].trim(), "return Find<T>(key);");
        let body = lexed.body_of(&method("Demo.Cache::Lookup<T>")).expect("body");
        assert!(SHAPES[body].contains("Find<T>"));
    }

    #[test]
    fn finds_property_accessors() {
        let lexed = Lexed::new(SHAPES);
        let getter = lexed.body_of(&method("Demo.Cache::get_Capacity")).expect("getter");
        assert_eq!(SHAPES[getter].trim(), "return capacity;");
        let setter = lexed.body_of(&method("Demo.Cache::set_Capacity")).expect("setter");
        assert_eq!(SHAPES[setter].trim(), "capacity = value;");
        let expression = lexed.body_of(&method("Demo.Cache::get_Size")).expect("expression");
        assert_eq!(SHAPES[expression].trim(), "entries.Count");
        assert!(lexed.body_of(&method("Demo.Cache::set_Size")).is_none());
        assert!(lexed.body_of(&method("Demo.Cache::get_Enabled")).is_none());
    }

    #[test]
    fn finds_constructors_by_type_name() {
        let lexed = Lexed::new(SHAPES);
        let instance = lexed.body_of(&method("Demo.Cache`1::.ctor")).expect("ctor");
        assert_eq!(SHAPES[instance].trim(), "capacity = size;");
        let shared = lexed.body_of(&method("Demo.Cache`1::.cctor")).expect("cctor");
        assert_eq!(SHAPES[shared].trim(), "Shared = Build();");
        assert!(lexed.body_of(&method("Other::.ctor")).is_none());
    }

    #[test]
    fn missing_method_has_no_body() {
        assert!(Lexed::new(SAMPLE).method_body("Missing").is_none());
        assert!(Lexed::new("").method_body("Tick").is_none());
    }

    #[test]
    fn interpolation_holes_are_code() {
        let text = r#"Log($"hp {obj.Health} of {{max}} \"{Name("x")}\"");"#;
        let lexed = Lexed::new(text);
        let at = |needle: &str| text.find(needle).expect(needle);
        assert_eq!(lexed.class_at(at("hp")), Class::Literal);
        assert_eq!(lexed.class_at(at("obj")), Class::Code);
        assert_eq!(lexed.class_at(at("{{max")), Class::Literal);
        assert_eq!(lexed.class_at(at("max")), Class::Literal);
        assert_eq!(lexed.class_at(at("Name")), Class::Code);
        assert_eq!(lexed.class_at(at("\"x\"") + 1), Class::Literal);
        assert_eq!(lexed.class_at(text.len() - 2), Class::Code);
    }

    #[test]
    fn unterminated_block_comment_runs_to_end() {
        let lexed = Lexed::new("a /* b");
        assert_eq!(lexed.class_at(5), Class::Comment);
    }

    #[test]
    fn line_index_counts_newlines() {
        assert_eq!(line_of("a\nb\nc", 4), 2);
        assert_eq!(line_of("abc", 10), 0);
    }
}
