//! Update primitives staged during one query evaluation.
//!
//! Updating expressions never mutate the live table in place. They record
//! primitives — a rename-style value change or an insertion of copied node
//! sequences — into a pending list that is drained once evaluation finishes.
//! `prepare` builds every insertion fragment up front; `apply` then commits
//! against the table in descending target-position order, so no application
//! shifts the address of a primitive still pending.

use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::mem::MemTable;
use crate::model::{NodeKind, QName, Table};
use crate::node::TableNode;
use crate::runtime::{Error, ErrorCode};

/// Drop empty text nodes and merge adjacent text runs into single nodes.
/// Two adjacent input sequences may meet in two text nodes; the materialized
/// fragment must never contain two adjacent text rows.
pub fn merge_text(nodes: Vec<TableNode>) -> Vec<TableNode> {
    nodes
        .into_iter()
        .filter(|n| !(n.kind() == NodeKind::Text && n.string_value().is_empty()))
        .coalesce(|a, b| {
            if a.kind() == NodeKind::Text && b.kind() == NodeKind::Text {
                let merged = a.string_value() + &b.string_value();
                Ok(TableNode::new(Arc::new(MemTable::text_table(merged)), 0))
            } else {
                Err((a, b))
            }
        })
        .collect()
}

/// Ordered, appendable list of node sequences queued for one insertion
/// target.
#[derive(Debug, Clone, Default)]
pub struct InsertionList {
    seqs: Vec<Vec<TableNode>>,
}

impl InsertionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, seq: Vec<TableNode>) {
        if !seq.is_empty() {
            self.seqs.push(seq);
        }
    }

    pub fn append(&mut self, mut other: InsertionList) {
        self.seqs.append(&mut other.seqs);
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Concatenation of all queued sequences, in queue order.
    pub fn concat(&self) -> Vec<TableNode> {
        self.seqs
            .iter()
            .flatten()
            .map(TableNode::snapshot)
            .collect()
    }
}

/// Where an insertion lands relative to its target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertKind {
    Into,
    Before,
    After,
    Attribute,
}

/// Fragment-inserting primitive: copies queued node sequences into one
/// standalone fragment at `prepare`, splices it at commit.
#[derive(Debug, Clone)]
pub struct Insert {
    target: TableNode,
    kind: InsertKind,
    list: InsertionList,
    fragment: Option<MemTable>,
}

impl Insert {
    pub fn new(kind: InsertKind, target: TableNode, nodes: Vec<TableNode>) -> Self {
        let mut list = InsertionList::new();
        list.push(nodes);
        Self {
            target,
            kind,
            list,
            fragment: None,
        }
    }

    pub fn queue(&mut self, nodes: Vec<TableNode>) {
        self.list.push(nodes);
    }

    /// Merge the queued sequences and build the standalone fragment. An empty
    /// queue is a no-op. The live table is never touched here.
    pub fn prepare(&mut self) -> Result<(), Error> {
        if self.list.is_empty() {
            return Ok(());
        }
        match self.kind {
            InsertKind::Into => {
                if !matches!(
                    self.target.kind(),
                    NodeKind::Element | NodeKind::Document
                ) {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0005,
                        "insert-into target must be an element or document",
                    ));
                }
            }
            InsertKind::Attribute => {
                if self.target.kind() != NodeKind::Element {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0005,
                        "attribute insertion requires an element target",
                    ));
                }
            }
            InsertKind::Before | InsertKind::After => {
                if self.target.parent().is_none() {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0006,
                        "insert before/after target has no parent",
                    ));
                }
            }
        }
        let merged = merge_text(self.list.concat());
        match self.kind {
            InsertKind::Attribute => {
                if merged.iter().any(|n| n.kind() != NodeKind::Attribute) {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0004,
                        "attribute insertion sequence holds a non-attribute node",
                    ));
                }
            }
            _ => {
                if merged.iter().any(|n| n.kind() == NodeKind::Attribute) {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0004,
                        "attribute node in a content insertion sequence",
                    ));
                }
            }
        }
        debug!(count = merged.len(), kind = ?self.kind, "building insertion fragment");
        self.fragment = Some(MemTable::fragment(&merged, self.target.table().as_ref())?);
        Ok(())
    }

    /// Splice the prepared fragment at the kind-specific position.
    pub fn apply(&self, table: &mut MemTable) -> Result<(), Error> {
        let Some(fragment) = &self.fragment else {
            return Ok(());
        };
        let pos = self.target.pos();
        let kind = self.target.kind();
        let (at, par, attrs) = match self.kind {
            InsertKind::Into => (pos + table.size(pos, kind), pos, false),
            InsertKind::Before => (pos, self.parent_pos(table, pos, kind)?, false),
            InsertKind::After => (
                pos + table.size(pos, kind),
                self.parent_pos(table, pos, kind)?,
                false,
            ),
            InsertKind::Attribute => (pos + table.attr_size(pos, kind), pos, true),
        };
        trace!(at, par, "applying insert");
        table.insert(at, par, attrs, fragment);
        Ok(())
    }

    fn parent_pos(&self, table: &MemTable, pos: usize, kind: NodeKind) -> Result<usize, Error> {
        table.parent(pos, kind).ok_or_else(|| {
            Error::from_code(
                ErrorCode::XUTY0006,
                "insert before/after target has no parent",
            )
        })
    }
}

/// Value-changing primitive: replaces the qualified name of the target.
#[derive(Debug, Clone)]
pub struct Rename {
    target: TableNode,
    name: QName,
}

impl Rename {
    pub fn new(target: TableNode, name: QName) -> Self {
        Self { target, name }
    }

    pub fn prepare(&self) -> Result<(), Error> {
        match self.target.kind() {
            NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => {}
            k => {
                return Err(Error::from_code(
                    ErrorCode::XUTY0012,
                    format!("cannot rename a {k} node"),
                ));
            }
        }
        if let (Some(_), Some(uri)) = (&self.name.prefix, &self.name.ns_uri)
            && let Some(existing) = self
                .target
                .table()
                .namespace_uri(&self.name.lexical(), self.target.pos())
            && existing != uri.as_str()
        {
            return Err(Error::from_code(
                ErrorCode::XUDY0024,
                format!("conflicting namespace binding for '{}'", self.name.lexical()),
            ));
        }
        Ok(())
    }

    pub fn apply(&self, table: &mut MemTable) -> Result<(), Error> {
        table.rename(self.target.pos(), &self.name);
        Ok(())
    }
}

/// One staged mutation of one target node.
#[derive(Debug, Clone)]
pub enum UpdatePrimitive {
    Rename(Rename),
    Insert(Insert),
}

impl UpdatePrimitive {
    pub fn target(&self) -> &TableNode {
        match self {
            UpdatePrimitive::Rename(r) => &r.target,
            UpdatePrimitive::Insert(i) => &i.target,
        }
    }

    pub fn prepare(&mut self) -> Result<(), Error> {
        match self {
            UpdatePrimitive::Rename(r) => r.prepare(),
            UpdatePrimitive::Insert(i) => i.prepare(),
        }
    }

    pub fn apply(&self, table: &mut MemTable) -> Result<(), Error> {
        match self {
            UpdatePrimitive::Rename(r) => r.apply(table),
            UpdatePrimitive::Insert(i) => i.apply(table),
        }
    }

    /// Fold another primitive aimed at the same slot into this one.
    fn merge(&mut self, other: UpdatePrimitive) -> Result<(), Error> {
        match (self, other) {
            (UpdatePrimitive::Insert(a), UpdatePrimitive::Insert(b)) => {
                a.list.append(b.list);
                Ok(())
            }
            (UpdatePrimitive::Rename(r), UpdatePrimitive::Rename(_)) => Err(Error::from_code(
                ErrorCode::XUDY0015,
                format!("node renamed more than once: {:?}", r.target),
            )),
            _ => unreachable!("merge called on mismatched primitives"),
        }
    }
}

fn same_slot(a: &UpdatePrimitive, b: &UpdatePrimitive) -> bool {
    match (a, b) {
        (UpdatePrimitive::Rename(x), UpdatePrimitive::Rename(y)) => x.target.is(&y.target),
        (UpdatePrimitive::Insert(x), UpdatePrimitive::Insert(y)) => {
            x.kind == y.kind && x.target.is(&y.target)
        }
        _ => false,
    }
}

/// Pending-update list scoped to one query execution. Primitives accumulate
/// during evaluation and commit as one batch; a prepare failure aborts the
/// whole batch before anything touches the table.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    prims: Vec<UpdatePrimitive>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Stage a primitive, folding it into an existing one aimed at the same
    /// target where the primitive kind allows it.
    pub fn add(&mut self, prim: UpdatePrimitive) -> Result<(), Error> {
        if let Some(existing) = self.prims.iter_mut().find(|q| same_slot(q, &prim)) {
            existing.merge(prim)
        } else {
            self.prims.push(prim);
            Ok(())
        }
    }

    /// Prepare every primitive, then apply from the highest target position
    /// down so that no application invalidates a pending target address.
    /// Requires exclusive access to the table for the whole commit.
    pub fn commit(&mut self, table: &mut MemTable) -> Result<(), Error> {
        for prim in &mut self.prims {
            prim.prepare()?;
        }
        self.prims
            .sort_by(|a, b| b.target().pos().cmp(&a.target().pos()));
        debug!(primitives = self.prims.len(), "committing pending updates");
        for prim in &self.prims {
            prim.apply(table)?;
        }
        self.prims.clear();
        Ok(())
    }
}
