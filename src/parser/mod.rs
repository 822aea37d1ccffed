use crate::errors::ParseError;
use crate::graph::DocumentId;
use regex::{Captures, Regex};

/// Element name of an include directive.
pub const INCLUDE_TAG: &str = "include";
/// Attribute holding the included layout reference.
pub const LAYOUT_ATTR: &str = "layout";
/// Namespace of framework resources; references into it are never local layouts.
pub const DEFAULT_PLATFORM_NAMESPACE: &str = "android";

const INCLUDE_MARKER: &str = "<include";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub line: usize,
}

impl Element {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// Flat, document-ordered view of the elements of a layout file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDocument {
    pub elements: Vec<Element>,
}

impl LayoutDocument {
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.iter().filter(move |e| e.name == name)
    }
}

/// Turns raw layout text into a [`LayoutDocument`].
///
/// Hosts with their own XML model can implement this to skip re-parsing.
pub trait DocumentParser {
    /// # Errors
    /// Returns `ParseError::Malformed` when the content is not well formed.
    fn parse_document(&self, content: &str) -> Result<LayoutDocument, ParseError>;
}

#[derive(Debug)]
pub struct RegexPatterns {
    pub markup: Regex,
    pub attribute: Regex,
}

impl RegexPatterns {
    pub fn compile() -> Self {
        // XML names: any letter may start one, not just ASCII
        const NAME: &str = r"[\p{L}_:][\p{L}\p{M}\p{N}_:.\-\x{B7}]*";
        // Comments, PIs, CDATA and declarations are matched only so they can be skipped
        let markup = Regex::new(&format!(
            r#"(?s)<!--.*?-->|<\?.*?\?>|<!\[CDATA\[.*?\]\]>|<![A-Za-z][^>]*>|</(?P<close>{NAME})\s*>|<(?P<open>{NAME})(?P<attrs>(?:\s+{NAME}\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(?P<empty>/)?>"#
        ))
        .expect("markup pattern is valid");
        let attribute = Regex::new(&format!(
            r#"(?P<name>{NAME})\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#
        ))
        .expect("attribute pattern is valid");
        Self { markup, attribute }
    }
}

impl Default for RegexPatterns {
    fn default() -> Self {
        Self::compile()
    }
}

/// Regex-driven layout scanner and include extractor.
#[derive(Debug)]
pub struct LayoutParser {
    patterns: RegexPatterns,
    platform_namespace: String,
}

impl Default for LayoutParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutParser {
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform_namespace(DEFAULT_PLATFORM_NAMESPACE)
    }

    #[must_use]
    pub fn with_platform_namespace(namespace: &str) -> Self {
        Self { patterns: RegexPatterns::compile(), platform_namespace: namespace.to_string() }
    }

    #[must_use]
    pub fn platform_namespace(&self) -> &str {
        &self.platform_namespace
    }

    /// Include targets of an already parsed document, in document order.
    #[must_use]
    pub fn extract_includes(&self, document: &LayoutDocument) -> Vec<DocumentId> {
        extract_includes(document, &self.platform_namespace)
    }

    /// Include targets of raw layout text. Unparseable content has no includes.
    #[must_use]
    pub fn find_includes(&self, content: &str) -> Vec<DocumentId> {
        find_includes_with(self, content, &self.platform_namespace)
    }

    fn parse_attributes(&self, attrs: &str, line: usize) -> Result<Vec<(String, String)>, ParseError> {
        let mut out: Vec<(String, String)> = Vec::new();
        for cap in self.patterns.attribute.captures_iter(attrs) {
            let name = cap.name("name").map_or("", |m| m.as_str());
            if out.iter().any(|(n, _)| n == name) {
                return Err(ParseError::Malformed {
                    line,
                    reason: format!("duplicate attribute '{name}'"),
                });
            }
            let raw = cap.name("dq").or_else(|| cap.name("sq")).map_or("", |m| m.as_str());
            out.push((name.to_string(), decode_entities(raw)));
        }
        Ok(out)
    }
}

impl DocumentParser for LayoutParser {
    fn parse_document(&self, content: &str) -> Result<LayoutDocument, ParseError> {
        let mut elements = Vec::new();
        let mut open: Vec<String> = Vec::new();
        let mut saw_root = false;
        let mut last = 0;
        // Running line count, so each tag only scans the text since the previous one
        let mut line = 1;
        let mut counted = 0;

        for cap in self.patterns.markup.captures_iter(content) {
            let Some(m0) = cap.get(0) else { continue };
            check_text(content, last, m0.start())?;
            last = m0.end();
            line += count_newlines(&content[counted..m0.start()]);
            counted = m0.start();

            if let Some(close) = cap.name("close") {
                match open.pop() {
                    Some(top) if top == close.as_str() => {}
                    Some(top) => {
                        return Err(ParseError::Malformed {
                            line,
                            reason: format!("expected </{top}>, found </{}>", close.as_str()),
                        })
                    }
                    None => {
                        return Err(ParseError::Malformed {
                            line,
                            reason: format!("unexpected </{}>", close.as_str()),
                        })
                    }
                }
            } else if let Some(name) = cap.name("open") {
                if open.is_empty() && saw_root {
                    return Err(ParseError::Malformed {
                        line,
                        reason: "more than one root element".to_string(),
                    });
                }
                saw_root = true;
                let attributes = self.parse_attributes(attr_text(&cap), line)?;
                elements.push(Element { name: name.as_str().to_string(), attributes, line });
                if cap.name("empty").is_none() {
                    open.push(name.as_str().to_string());
                }
            }
        }
        check_text(content, last, content.len())?;

        if let Some(top) = open.last() {
            return Err(ParseError::Malformed {
                line: line_number_for(content, content.len()),
                reason: format!("unclosed element <{top}>"),
            });
        }
        if !saw_root {
            return Err(ParseError::Malformed { line: 1, reason: "no root element".to_string() });
        }
        Ok(LayoutDocument { elements })
    }
}

/// Cheap pre-check: can `content` possibly contain an include directive?
///
/// False positives are fine (the document is parsed); false negatives never happen.
#[must_use]
pub fn has_any_include_marker(content: &str) -> bool {
    content.contains(INCLUDE_MARKER)
}

/// Include targets of `document` that resolve to local layouts.
#[must_use]
pub fn extract_includes(document: &LayoutDocument, platform_namespace: &str) -> Vec<DocumentId> {
    document
        .elements_named(INCLUDE_TAG)
        .filter_map(|e| e.attribute(LAYOUT_ATTR))
        .filter(|v| !v.is_empty())
        .filter_map(|v| resolve_reference_with(v, platform_namespace))
        .collect()
}

/// Fast-path aware extraction over raw text with any [`DocumentParser`].
///
/// The parser is not invoked when the text has no include marker. Parse errors
/// are logged and treated as "no includes".
pub fn find_includes_with<P>(parser: &P, content: &str, platform_namespace: &str) -> Vec<DocumentId>
where
    P: DocumentParser + ?Sized,
{
    try_find_includes(parser, content, platform_namespace).unwrap_or_else(|e| {
        tracing::debug!("ignoring unparseable layout: {e}");
        Vec::new()
    })
}

/// Like [`find_includes_with`], but hands parse errors back to the caller.
///
/// # Errors
/// Returns the parser's error when text with an include marker isn't well formed.
pub fn try_find_includes<P>(
    parser: &P,
    content: &str,
    platform_namespace: &str,
) -> Result<Vec<DocumentId>, ParseError>
where
    P: DocumentParser + ?Sized,
{
    if !has_any_include_marker(content) {
        return Ok(Vec::new());
    }
    let document = parser.parse_document(content)?;
    Ok(extract_includes(&document, platform_namespace))
}

/// Resolve a layout reference such as `@layout/foo` to a local document id,
/// treating `android` as the platform namespace.
#[must_use]
pub fn resolve_reference(reference: &str) -> Option<DocumentId> {
    resolve_reference_with(reference, DEFAULT_PLATFORM_NAMESPACE)
}

/// Resolve `@[namespace:]type/name` to `name`.
///
/// Returns `None` for non-references, references without a `/`, and references
/// into `platform_namespace`. The type segment is not checked.
#[must_use]
pub fn resolve_reference_with(reference: &str, platform_namespace: &str) -> Option<DocumentId> {
    let rest = reference.strip_prefix('@')?;
    let slash = rest.find('/')?;
    let qualifier = &rest[..slash];
    if let Some(colon) = qualifier.rfind(':') {
        if &qualifier[..colon] == platform_namespace {
            return None;
        }
    }
    Some(DocumentId(rest[slash + 1..].to_string()))
}

fn attr_text<'t>(cap: &Captures<'t>) -> &'t str {
    cap.name("attrs").map_or("", |m| m.as_str())
}

// Text between markup must not contain '<': that is a broken or unterminated tag
fn check_text(content: &str, from: usize, to: usize) -> Result<(), ParseError> {
    match content[from..to].find('<') {
        Some(off) => Err(ParseError::Malformed {
            line: line_number_for(content, from + off),
            reason: "unterminated or invalid markup".to_string(),
        }),
        None => Ok(()),
    }
}

// Predefined and numeric character references; anything unrecognised stays literal
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|semi| decode_reference(&tail[1..semi]).map(|c| (c, semi))) {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

fn line_number_for(content: &str, byte_idx: usize) -> usize {
    // 1-based line number
    count_newlines(&content[..byte_idx]) + 1
}
