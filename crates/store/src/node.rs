//! Flat-table node navigation.
//!
//! A [`TableNode`] is a view bound to a table reference and a pre-order
//! position; every axis is computed arithmetically from per-position subtree
//! and attribute-section sizes instead of object links.
//!
//! Reuse discipline: each axis call owns one mutable cursor node and re-aims
//! it in place on every step. The reference handed out by `next` borrows the
//! axis, so retaining a node past the next step requires an explicit
//! [`TableNode::snapshot`]. Two consumers must not share one axis instance.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::consts::XMLNS;
use crate::model::{NodeKind, QName, Table};
use crate::runtime::{Error, QueryContext};
use crate::serialize::Serializer;
use crate::xdm::Item;
use crate::iter::ItemIter;

/// A node of one positional table. Identity is the pair (table, position).
#[derive(Clone)]
pub struct TableNode {
    table: Arc<dyn Table>,
    pos: usize,
    kind: NodeKind,
    /// Explicit parent; cleared whenever the cursor is re-aimed.
    par: Option<Arc<TableNode>>,
    /// Constructor root for detached fragments; survives cursor steps.
    root: Option<Arc<TableNode>>,
}

impl TableNode {
    pub fn new(table: Arc<dyn Table>, pos: usize) -> Self {
        let kind = table.kind(pos);
        Self {
            table,
            pos,
            kind,
            par: None,
            root: None,
        }
    }

    pub fn with_kind(table: Arc<dyn Table>, pos: usize, kind: NodeKind) -> Self {
        Self {
            table,
            pos,
            kind,
            par: None,
            root: None,
        }
    }

    pub fn table(&self) -> &Arc<dyn Table> {
        &self.table
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Stable copy of the current cursor state. Required before retaining a
    /// node handed out by an axis past its next step.
    pub fn snapshot(&self) -> TableNode {
        self.clone()
    }

    /// Re-aim this node at another position. The explicit parent is dropped;
    /// the constructor root is kept so fragment anchoring survives traversal.
    pub(crate) fn set(&mut self, pos: usize, kind: NodeKind) {
        self.pos = pos;
        self.kind = kind;
        self.par = None;
    }

    /// Anchor this node under an explicit parent, detaching it from any
    /// parent recorded in the table.
    pub fn set_parent(&mut self, parent: TableNode) {
        let parent = Arc::new(parent);
        self.par = Some(Arc::clone(&parent));
        self.root = Some(parent);
    }

    /// Node identity: same table and same position.
    pub fn is(&self, other: &TableNode) -> bool {
        Arc::ptr_eq(&self.table, &other.table) && self.pos == other.pos
    }

    /// Document order within one table is position order; across tables the
    /// tie is broken by table identity.
    pub fn node_cmp(&self, other: &TableNode) -> Ordering {
        if Arc::ptr_eq(&self.table, &other.table) {
            self.pos.cmp(&other.pos)
        } else {
            let a = Arc::as_ptr(&self.table) as *const u8 as usize;
            let b = Arc::as_ptr(&other.table) as *const u8 as usize;
            a.cmp(&b)
        }
    }

    /// Node name: tag for elements, attribute name for attributes, target for
    /// processing instructions.
    pub fn name(&self) -> Option<String> {
        match self.kind {
            NodeKind::Element => Some(self.table.tag(self.pos).to_string()),
            NodeKind::Attribute => Some(self.table.attr_name(self.pos).to_string()),
            NodeKind::ProcessingInstruction => {
                let content = self.table.text(self.pos);
                let target = content.split_once(' ').map_or(content, |(t, _)| t);
                Some(target.to_string())
            }
            _ => None,
        }
    }

    /// Qualified name with the namespace URI resolved against the table and,
    /// as a fallback, the context bindings.
    pub fn qname(&self, ctx: &QueryContext) -> Option<QName> {
        let name = self.name()?;
        let mut q = QName::parse(&name);
        q.ns_uri = self
            .table
            .namespace_uri(&name, self.pos)
            .map(str::to_string)
            .or_else(|| {
                let prefix = q.prefix.as_deref().unwrap_or("");
                ctx.namespace_uri(prefix).map(str::to_string)
            });
        Some(q)
    }

    pub fn string_value(&self) -> String {
        self.table.atom(self.pos)
    }

    pub fn base_uri(&self) -> Option<String> {
        match self.kind {
            NodeKind::Document => self.table.source().map(str::to_string),
            _ => None,
        }
    }

    /// Parent node. The explicit parent wins; a recorded parent of position 0
    /// is substituted by the constructor root when one is set; a node with no
    /// recorded parent and no root override has no parent at all.
    pub fn parent(&self) -> Option<TableNode> {
        if let Some(p) = &self.par {
            return Some((**p).clone());
        }
        match self.table.parent(self.pos, self.kind) {
            Some(0) if self.root.is_some() => self.root.as_deref().cloned(),
            Some(p) => {
                let mut node = self.snapshot();
                node.set(p, self.table.kind(p));
                Some(node)
            }
            None => self.root.as_deref().cloned(),
        }
    }

    pub fn attributes(&self) -> AttributeAxis {
        AttributeAxis {
            p: self.pos + 1,
            end: self.pos + self.table.attr_size(self.pos, self.kind),
            cursor: self.snapshot(),
        }
    }

    pub fn children(&self) -> ChildAxis {
        ChildAxis {
            p: self.pos + self.table.attr_size(self.pos, self.kind),
            end: self.pos + self.table.size(self.pos, self.kind),
            cursor: self.snapshot(),
        }
    }

    pub fn descendants(&self) -> DescendantAxis {
        DescendantAxis {
            p: self.pos + self.table.attr_size(self.pos, self.kind),
            end: self.pos + self.table.size(self.pos, self.kind),
            cursor: self.snapshot(),
        }
    }

    pub fn descendants_or_self(&self) -> DescendantAxis {
        DescendantAxis {
            p: self.pos,
            end: self.pos + self.table.size(self.pos, self.kind),
            cursor: self.snapshot(),
        }
    }

    /// Render this node to the serializer. Elements and documents run the
    /// subtree pass; the remaining kinds emit a single event.
    pub fn serialize(&self, ctx: &QueryContext, ser: &mut dyn Serializer) -> Result<(), Error> {
        match self.kind {
            NodeKind::Document | NodeKind::Element => self.serialize_subtree(ctx, ser),
            NodeKind::Attribute => ser.attribute(
                self.table.attr_name(self.pos),
                self.table.attr_value(self.pos),
            ),
            NodeKind::Text => ser.text(self.table.text(self.pos)),
            NodeKind::Comment => ser.comment(self.table.text(self.pos)),
            NodeKind::ProcessingInstruction => ser.pi(self.table.text(self.pos)),
        }
    }

    /// Single forward pass over the subtree rows with an explicit close-stack
    /// instead of recursion: O(subtree size) time, O(tree height) space.
    fn serialize_subtree(
        &self,
        ctx: &QueryContext,
        ser: &mut dyn Serializer,
    ) -> Result<(), Error> {
        let t = &self.table;
        // Attribute lists, reused per outermost element
        let mut names: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        // Stack of (recorded parent, open tag name)
        let mut stack: SmallVec<[(isize, String); 16]> = SmallVec::with_capacity(t.height());

        let mut p = self.pos;
        let end = p + t.size(p, self.kind);
        while p < end {
            ctx.check_abort()?;
            let k = t.kind(p);
            let pa = t.parent(p, k).map_or(-1, |v| v as isize);

            // Close opened tags in LIFO order, matching document nesting
            while stack.last().is_some_and(|(open_pa, _)| *open_pa >= pa) {
                if let Some((_, name)) = stack.pop() {
                    ser.close_element(&name)?;
                }
            }

            match k {
                NodeKind::Document => {
                    p += 1;
                }
                NodeKind::Text => {
                    ser.text(t.text(p))?;
                    p += 1;
                }
                NodeKind::Comment => {
                    ser.comment(t.text(p))?;
                    p += 1;
                }
                NodeKind::ProcessingInstruction => {
                    ser.pi(t.text(p))?;
                    p += 1;
                }
                NodeKind::Attribute => {
                    // Attribute rows are consumed by their element below
                    unreachable!("attribute row outside an attribute section")
                }
                NodeKind::Element => {
                    let name = t.tag(p);
                    ser.start_element(name)?;

                    let ps = p + t.size(p, k);
                    let attrs_end = p + t.attr_size(p, k);

                    if stack.is_empty() {
                        // Outermost element: re-derive namespace declarations
                        // for its own name and each attribute name,
                        // de-duplicated against collected attributes.
                        names.clear();
                        values.clear();
                        let mut q = p + 1;
                        while q < attrs_end {
                            let at = t.attr_name(q);
                            names.push(at.to_string());
                            values.push(t.attr_value(q).to_string());
                            if let Some((prefix, _)) = at.split_once(':')
                                && let Some(uri) = t.namespace_uri(at, attrs_end)
                            {
                                let decl = format!("{XMLNS}:{prefix}");
                                if !names.contains(&decl) {
                                    names.push(decl);
                                    values.push(uri.to_string());
                                }
                            }
                            q += 1;
                        }
                        if let Some(uri) = t.namespace_uri(name, p) {
                            let decl = match name.split_once(':') {
                                Some((prefix, _)) => format!("{XMLNS}:{prefix}"),
                                None => XMLNS.to_string(),
                            };
                            if !names.contains(&decl) {
                                names.push(decl);
                                values.push(uri.to_string());
                            }
                        }
                        for (n, v) in names.iter().zip(&values) {
                            ser.attribute(n, v)?;
                        }
                    } else {
                        let mut q = p + 1;
                        while q < attrs_end {
                            ser.attribute(t.attr_name(q), t.attr_value(q))?;
                            q += 1;
                        }
                    }

                    if attrs_end == ps {
                        ser.empty_element()?;
                    } else {
                        ser.finish_element()?;
                        stack.push((pa, name.to_string()));
                    }
                    p = attrs_end;
                }
            }
        }
        // Close tags that remain open
        while let Some((_, name)) = stack.pop() {
            ser.close_element(&name)?;
        }
        Ok(())
    }
}

impl PartialEq for TableNode {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl Eq for TableNode {}

impl fmt::Debug for TableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Attribute => write!(
                f,
                "attribute({}=\"{}\")",
                self.table.attr_name(self.pos),
                self.table.attr_value(self.pos)
            ),
            NodeKind::Document => {
                write!(f, "document({})", self.table.source().unwrap_or("<mem>"))
            }
            NodeKind::Element => {
                write!(f, "element({}/{})", self.table.tag(self.pos), self.pos)
            }
            _ => {
                let mut s = self.string_value();
                if s.len() > 20 {
                    s.truncate(20);
                    s.push_str("...");
                }
                write!(f, "{}({})", self.kind, s)
            }
        }
    }
}

/// One axis step machine. Implementations own a reusable cursor node and
/// re-aim it on every call; the returned reference is only valid until the
/// next step.
pub trait Axis {
    fn next(&mut self) -> Option<&TableNode>;
}

/// Positions `pos+1 .. pos+attr_size`, all of attribute kind.
pub struct AttributeAxis {
    cursor: TableNode,
    p: usize,
    end: usize,
}

impl Axis for AttributeAxis {
    fn next(&mut self) -> Option<&TableNode> {
        if self.p >= self.end {
            return None;
        }
        self.cursor.set(self.p, NodeKind::Attribute);
        self.p += 1;
        Some(&self.cursor)
    }
}

/// Child positions, stepping by each child's own subtree size so attribute
/// rows are skipped; attributes are not children.
pub struct ChildAxis {
    cursor: TableNode,
    p: usize,
    end: usize,
}

impl Axis for ChildAxis {
    fn next(&mut self) -> Option<&TableNode> {
        if self.p >= self.end {
            return None;
        }
        let p = self.p;
        let k = self.cursor.table.kind(p);
        self.p = p + self.cursor.table.size(p, k);
        self.cursor.set(p, k);
        Some(&self.cursor)
    }
}

/// Every non-attribute descendant in document order: the step width is each
/// node's attribute-section size, which excludes attribute rows and nothing
/// else.
pub struct DescendantAxis {
    cursor: TableNode,
    p: usize,
    end: usize,
}

impl Axis for DescendantAxis {
    fn next(&mut self) -> Option<&TableNode> {
        if self.p >= self.end {
            return None;
        }
        let p = self.p;
        let k = self.cursor.table.kind(p);
        self.p = p + self.cursor.table.attr_size(p, k);
        self.cursor.set(p, k);
        Some(&self.cursor)
    }
}

/// Adapts an axis into an [`ItemIter`] of stable node snapshots.
pub struct AxisIter<A> {
    axis: A,
}

impl<A> AxisIter<A> {
    pub fn new(axis: A) -> Self {
        Self { axis }
    }
}

impl<A: Axis> ItemIter for AxisIter<A> {
    fn next(&mut self) -> Result<Option<Item>, Error> {
        Ok(self.axis.next().map(|n| Item::Node(n.snapshot())))
    }
}
