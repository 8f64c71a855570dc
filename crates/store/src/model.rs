//! Node kinds, qualified names and the positional table contract.

use core::fmt;

/// Discriminant tag of a table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Attribute,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Text => "text",
            NodeKind::Attribute => "attribute",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: None,
        }
    }

    pub fn with_uri(local: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: Some(uri.into()),
        }
    }

    pub fn prefixed(
        prefix: impl Into<String>,
        local: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
            ns_uri: Some(uri.into()),
        }
    }

    /// Split a lexical name (`p:l` or `l`) into prefix and local part.
    pub fn parse(lexical: &str) -> Self {
        match lexical.split_once(':') {
            Some((p, l)) => Self {
                prefix: Some(p.to_string()),
                local: l.to_string(),
                ns_uri: None,
            },
            None => Self::new(lexical),
        }
    }

    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }

    /// XML Query name equality: namespace URI plus local part, prefix ignored.
    pub fn eq_name(&self, other: &QName) -> bool {
        self.ns_uri == other.ns_uri && self.local == other.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

/// Flat pre-order representation of one document.
///
/// A position ("pre" value) addresses one node; every tree relation is
/// recovered arithmetically from the per-position subtree size and attribute
/// section size. The trait only exposes the read operations the navigation
/// layer needs; the physical layout behind it is not part of this crate.
///
/// Size conventions, mirrored by every implementation:
/// - `size(pos)` counts the node itself, its attributes and all descendants.
/// - `attr_size(pos)` is 1 plus the number of attribute rows for elements,
///   and exactly 1 for every other kind, so stepping by `attr_size` skips
///   attribute rows and nothing else.
pub trait Table: fmt::Debug + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self, pos: usize) -> NodeKind;

    /// Element tag name.
    fn tag(&self, pos: usize) -> &str;

    fn attr_name(&self, pos: usize) -> &str;

    fn attr_value(&self, pos: usize) -> &str;

    /// Content of text, comment and processing-instruction positions.
    fn text(&self, pos: usize) -> &str;

    fn parent(&self, pos: usize, kind: NodeKind) -> Option<usize>;

    fn size(&self, pos: usize, kind: NodeKind) -> usize;

    fn attr_size(&self, pos: usize, kind: NodeKind) -> usize;

    /// Atomized string value: concatenated descendant text for elements and
    /// documents, the stored value for everything else.
    fn atom(&self, pos: usize) -> String;

    /// Resolve the prefix of a lexical name against the bindings in scope at
    /// `pos`. Returns `None` for unbound prefixes and for the reserved `xml`
    /// prefix, which is never re-declared.
    fn namespace_uri(&self, name: &str, pos: usize) -> Option<&str>;

    /// Maximum tree height; used to size the serializer's close-stack.
    fn height(&self) -> usize;

    /// Document locator, if the table was loaded from one.
    fn source(&self) -> Option<&str>;
}
