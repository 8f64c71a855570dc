//! In-memory positional table.
//!
//! Focus:
//! - Ergonomic builder for quick tree creation (`doc`, `elem`, `text`, ...)
//! - Row layout mirroring the on-disk contract: kind, name, value, parent,
//!   subtree size, attribute-section size
//! - Fragment construction from a merged node sequence, plus the two row
//!   mutators the commit phase needs (`rename`, `insert`)
//!
//! Example:
//! ```
//! use xylem_store::mem::{doc, elem, text};
//! use xylem_store::model::Table;
//!
//! // <root id="r"><child>Hello</child></root>
//! let table = doc()
//!     .child(
//!         elem("root")
//!             .attr("id", "r")
//!             .child(elem("child").child(text("Hello"))),
//!     )
//!     .build();
//!
//! assert_eq!(table.len(), 5); // document, root, attribute, child, text
//! assert_eq!(table.atom(1), "Hello");
//! ```

use tracing::debug;

use crate::model::{NodeKind, QName, Table};
use crate::node::TableNode;
use crate::runtime::{Error, ErrorCode};

#[derive(Debug, Clone)]
struct Row {
    kind: NodeKind,
    name: Option<String>,
    value: Option<String>,
    parent: Option<usize>,
    size: usize,
    attr_size: usize,
}

/// Growable in-memory [`Table`] implementation, also used for the standalone
/// fragments built ahead of an update commit.
#[derive(Debug, Clone, Default)]
pub struct MemTable {
    rows: Vec<Row>,
    /// Prefix → URI bindings; one flat scope per table.
    ns: Vec<(String, String)>,
    source: Option<String>,
    height: usize,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a document locator.
    pub fn located(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// One-row table holding a single text node; the backing store for text
    /// nodes synthesized by adjacent-text merging.
    pub fn text_table(value: impl Into<String>) -> Self {
        Self {
            rows: vec![Row {
                kind: NodeKind::Text,
                name: None,
                value: Some(value.into()),
                parent: None,
                size: 1,
                attr_size: 1,
            }],
            ns: Vec::new(),
            source: None,
            height: 1,
        }
    }

    /// Build an isolated table from a merged node sequence, carrying over the
    /// namespace bindings its names resolve through so the fragment splices
    /// consistently into the target table.
    pub fn fragment(nodes: &[TableNode], base: &dyn Table) -> Result<MemTable, Error> {
        let mut t = MemTable::new();
        for node in nodes {
            t.append_subtree(node)?;
        }
        t.height = t.height.max(base.height());
        Ok(t)
    }

    /// Copy one subtree to the end of this table. The subtree root lands at
    /// depth zero with no recorded parent; a document root is skipped and its
    /// children become roots instead.
    fn append_subtree(&mut self, node: &TableNode) -> Result<(), Error> {
        let src = node.table();
        let p0 = node.pos();
        let k0 = node.kind();
        let n = src.size(p0, k0);
        let start = usize::from(k0 == NodeKind::Document);
        let base = self.rows.len();

        for i in start..n {
            let p = p0 + i;
            let k = src.kind(p);
            let parent = match src.parent(p, k) {
                Some(pp) if pp >= p0 + start => Some(pp - p0 - start + base),
                _ => None,
            };
            let (name, value) = match k {
                NodeKind::Element => (Some(src.tag(p).to_string()), None),
                NodeKind::Attribute => (
                    Some(src.attr_name(p).to_string()),
                    Some(src.attr_value(p).to_string()),
                ),
                NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction => {
                    (None, Some(src.text(p).to_string()))
                }
                NodeKind::Document => (None, None),
            };
            if let Some(name) = &name
                && let Some(uri) = src.namespace_uri(name, p)
            {
                let prefix = name.split_once(':').map_or("", |(pre, _)| pre);
                self.bind(prefix, uri)?;
            }
            self.rows.push(Row {
                kind: k,
                name,
                value,
                parent,
                size: src.size(p, k),
                attr_size: src.attr_size(p, k),
            });
        }
        Ok(())
    }

    fn bind(&mut self, prefix: &str, uri: &str) -> Result<(), Error> {
        match self.ns.iter().find(|(p, _)| p.as_str() == prefix) {
            Some((_, u)) if u == uri => Ok(()),
            Some(_) => Err(Error::from_code(
                ErrorCode::XUDY0024,
                format!("conflicting namespace binding for prefix '{prefix}'"),
            )),
            None => {
                self.ns.push((prefix.to_string(), uri.to_string()));
                Ok(())
            }
        }
    }

    /// Replace the name of the element, attribute or processing instruction
    /// at `pos`. New prefix bindings are added; conflicts are rejected ahead
    /// of commit, not here.
    pub fn rename(&mut self, pos: usize, name: &QName) {
        debug!(pos, name = %name.lexical(), "renaming node");
        let lexical = name.lexical();
        let row = &mut self.rows[pos];
        match row.kind {
            NodeKind::ProcessingInstruction => {
                // The target is the leading token of the stored content
                let data = row
                    .value
                    .as_deref()
                    .and_then(|v| v.split_once(' '))
                    .map(|(_, d)| d.to_string());
                row.value = Some(match data {
                    Some(d) => format!("{} {}", name.local, d),
                    None => name.local.clone(),
                });
            }
            _ => row.name = Some(lexical),
        }
        if let (Some(p), Some(u)) = (&name.prefix, &name.ns_uri)
            && !self.ns.iter().any(|(q, _)| q == p)
        {
            self.ns.push((p.clone(), u.clone()));
        }
    }

    /// Splice a fragment's rows in at `at`, below parent `par`. Shifts the
    /// parent pointers of rows behind the split, grows the subtree sizes on
    /// the ancestor chain (and the attribute section of `par` when `attrs` is
    /// set), and merges the fragment's namespace bindings.
    pub fn insert(&mut self, at: usize, par: usize, attrs: bool, fragment: &MemTable) {
        let n = fragment.rows.len();
        if n == 0 {
            return;
        }
        debug!(at, par, rows = n, "splicing fragment");

        for row in &mut self.rows {
            if let Some(p) = row.parent
                && p >= at
            {
                row.parent = Some(p + n);
            }
        }

        let mut ancestor = Some(par);
        while let Some(i) = ancestor {
            self.rows[i].size += n;
            if attrs && i == par {
                self.rows[i].attr_size += n;
            }
            ancestor = self.rows[i].parent;
        }

        let tail = self.rows.split_off(at);
        self.rows.extend(fragment.rows.iter().map(|row| {
            let mut row = row.clone();
            row.parent = match row.parent {
                Some(p) => Some(p + at),
                None => Some(par),
            };
            row
        }));
        self.rows.extend(tail);

        for (p, u) in &fragment.ns {
            if !self.ns.iter().any(|(q, _)| q == p) {
                self.ns.push((p.clone(), u.clone()));
            }
        }
        // Upper bound is enough: the height only sizes the close-stack
        self.height += fragment.height;
    }
}

impl Table for MemTable {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn kind(&self, pos: usize) -> NodeKind {
        self.rows[pos].kind
    }

    fn tag(&self, pos: usize) -> &str {
        self.rows[pos].name.as_deref().unwrap_or_default()
    }

    fn attr_name(&self, pos: usize) -> &str {
        self.rows[pos].name.as_deref().unwrap_or_default()
    }

    fn attr_value(&self, pos: usize) -> &str {
        self.rows[pos].value.as_deref().unwrap_or_default()
    }

    fn text(&self, pos: usize) -> &str {
        self.rows[pos].value.as_deref().unwrap_or_default()
    }

    fn parent(&self, pos: usize, _kind: NodeKind) -> Option<usize> {
        self.rows[pos].parent
    }

    fn size(&self, pos: usize, _kind: NodeKind) -> usize {
        self.rows[pos].size
    }

    fn attr_size(&self, pos: usize, _kind: NodeKind) -> usize {
        self.rows[pos].attr_size
    }

    fn atom(&self, pos: usize) -> String {
        let row = &self.rows[pos];
        match row.kind {
            NodeKind::Document | NodeKind::Element => self.rows
                [pos..pos + row.size]
                .iter()
                .filter(|r| r.kind == NodeKind::Text)
                .filter_map(|r| r.value.as_deref())
                .collect(),
            _ => row.value.clone().unwrap_or_default(),
        }
    }

    fn namespace_uri(&self, name: &str, _pos: usize) -> Option<&str> {
        let prefix = name.split_once(':').map_or("", |(p, _)| p);
        if prefix == "xml" {
            return None;
        }
        self.ns
            .iter()
            .find(|(p, _)| p.as_str() == prefix)
            .map(|(_, u)| u.as_str())
    }

    fn height(&self) -> usize {
        self.height
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Tree spec consumed by [`MemTable`]'s builder; flattened into pre-order
/// rows by `build`.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    kind: NodeKind,
    name: Option<String>,
    value: Option<String>,
    attrs: Vec<(String, String)>,
    ns_decls: Vec<(String, String)>,
    children: Vec<NodeSpec>,
}

impl NodeSpec {
    fn new(kind: NodeKind, name: Option<String>, value: Option<String>) -> Self {
        Self {
            kind,
            name,
            value,
            attrs: Vec::new(),
            ns_decls: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        debug_assert!(self.kind == NodeKind::Element);
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn ns(mut self, prefix: &str, uri: &str) -> Self {
        self.ns_decls.push((prefix.to_string(), uri.to_string()));
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        debug_assert!(matches!(
            self.kind,
            NodeKind::Element | NodeKind::Document
        ));
        self.children.push(child);
        self
    }

    pub fn build(self) -> MemTable {
        let mut table = MemTable::new();
        let mut ns = Vec::new();
        Self::emit(self, None, 1, &mut table.rows, &mut ns, &mut table.height);
        table.ns = ns;
        table
    }

    fn emit(
        spec: NodeSpec,
        parent: Option<usize>,
        depth: usize,
        rows: &mut Vec<Row>,
        ns: &mut Vec<(String, String)>,
        height: &mut usize,
    ) {
        *height = (*height).max(depth);
        let NodeSpec {
            kind,
            name,
            value,
            attrs,
            ns_decls,
            children,
        } = spec;
        for (p, u) in ns_decls {
            if !ns.iter().any(|(q, _)| *q == p) {
                ns.push((p, u));
            }
        }
        let idx = rows.len();
        rows.push(Row {
            kind,
            name,
            value,
            parent,
            size: 0, // patched below
            attr_size: 1 + attrs.len(),
        });
        for (an, av) in attrs {
            rows.push(Row {
                kind: NodeKind::Attribute,
                name: Some(an),
                value: Some(av),
                parent: Some(idx),
                size: 1,
                attr_size: 1,
            });
        }
        for child in children {
            Self::emit(child, Some(idx), depth + 1, rows, ns, height);
        }
        rows[idx].size = rows.len() - idx;
    }
}

// Convenience helper functions for concise tree construction
pub fn doc() -> NodeSpec {
    NodeSpec::new(NodeKind::Document, None, None)
}

pub fn elem(name: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Element, Some(name.to_string()), None)
}

pub fn text(value: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Text, None, Some(value.to_string()))
}

pub fn comment(value: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Comment, None, Some(value.to_string()))
}

pub fn pi(target: &str, data: &str) -> NodeSpec {
    let value = if data.is_empty() {
        target.to_string()
    } else {
        format!("{target} {data}")
    };
    NodeSpec::new(NodeKind::ProcessingInstruction, None, Some(value))
}
