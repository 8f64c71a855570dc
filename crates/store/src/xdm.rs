//! Item and sequence value model.
//!
//! Every queryable thing is an [`Item`]: an atomic value or a tree node. All
//! items share one comparison protocol with type-driven coercion; the untyped
//! atomic variant defers comparison semantics to its typed partner, so each
//! concrete type implements comparison against typed peers only once.

use core::cmp::Ordering;
use core::fmt;

use crate::model::QName;
use crate::node::TableNode;
use crate::runtime::{Error, ErrorCode, QueryContext};
use crate::serialize::Serializer;

/// Atomic value universe: one tag per type, fixed for the value's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    String(String),
    /// Value with no statically known type; comparison defers to the partner.
    Untyped(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    QName(QName),
}

impl AtomicValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AtomicValue::String(_) => "xs:string",
            AtomicValue::Untyped(_) => "xs:untypedAtomic",
            AtomicValue::Integer(_) => "xs:integer",
            AtomicValue::Double(_) => "xs:double",
            AtomicValue::Boolean(_) => "xs:boolean",
            AtomicValue::QName(_) => "xs:QName",
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            AtomicValue::String(s) | AtomicValue::Untyped(s) => s.clone(),
            AtomicValue::Integer(i) => i.to_string(),
            AtomicValue::Double(d) => double_string(*d),
            AtomicValue::Boolean(b) => b.to_string(),
            AtomicValue::QName(q) => q.lexical(),
        }
    }

    /// Type-aware equality. Untyped operands follow the deferral rule: the
    /// typed side decides, untyped vs untyped compares the literal strings.
    pub fn eq(&self, other: &AtomicValue) -> Result<bool, Error> {
        use AtomicValue as V;
        match (self, other) {
            (V::Untyped(a), V::Untyped(b)) => Ok(a == b),
            (V::Untyped(_), _) => other.eq(self),
            (V::String(a), V::String(b)) => Ok(a == b),
            (V::String(a), V::Untyped(b)) => Ok(a == b),
            (V::Integer(a), V::Integer(b)) => Ok(a == b),
            (V::Integer(a), V::Double(b)) => num_cmp(*a as f64, *b).map(Ordering::is_eq),
            (V::Double(a), V::Integer(b)) => num_cmp(*a, *b as f64).map(Ordering::is_eq),
            (V::Double(a), V::Double(b)) => num_cmp(*a, *b).map(Ordering::is_eq),
            (V::Integer(a), V::Untyped(s)) => {
                num_cmp(*a as f64, parse_double(s)?).map(Ordering::is_eq)
            }
            (V::Double(a), V::Untyped(s)) => num_cmp(*a, parse_double(s)?).map(Ordering::is_eq),
            (V::Boolean(a), V::Boolean(b)) => Ok(a == b),
            (V::Boolean(a), V::Untyped(s)) => Ok(*a == parse_boolean(s)?),
            (V::QName(a), V::QName(b)) => Ok(a.eq_name(b)),
            _ => Err(incomparable(self, other)),
        }
    }

    /// Type-aware three-way ordering. The untyped-vs-typed case delegates to
    /// the typed operand and reverses the result, preserving antisymmetry.
    pub fn diff(&self, other: &AtomicValue) -> Result<Ordering, Error> {
        use AtomicValue as V;
        match (self, other) {
            (V::Untyped(a), V::Untyped(b)) => Ok(a.cmp(b)),
            (V::Untyped(_), _) => Ok(other.diff(self)?.reverse()),
            (V::String(a), V::String(b)) => Ok(a.cmp(b)),
            (V::String(a), V::Untyped(b)) => Ok(a.as_str().cmp(b.as_str())),
            (V::Integer(a), V::Integer(b)) => Ok(a.cmp(b)),
            (V::Integer(a), V::Double(b)) => num_cmp(*a as f64, *b),
            (V::Double(a), V::Integer(b)) => num_cmp(*a, *b as f64),
            (V::Double(a), V::Double(b)) => num_cmp(*a, *b),
            (V::Integer(a), V::Untyped(s)) => num_cmp(*a as f64, parse_double(s)?),
            (V::Double(a), V::Untyped(s)) => num_cmp(*a, parse_double(s)?),
            (V::Boolean(a), V::Boolean(b)) => Ok(a.cmp(b)),
            (V::Boolean(a), V::Untyped(s)) => Ok(a.cmp(&parse_boolean(s)?)),
            (V::QName(_), V::QName(_)) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                "xs:QName values have no order",
            )),
            _ => Err(incomparable(self, other)),
        }
    }
}

fn incomparable(a: &AtomicValue, b: &AtomicValue) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("{} and {} are not comparable", a.type_name(), b.type_name()),
    )
}

fn num_cmp(a: f64, b: f64) -> Result<Ordering, Error> {
    a.partial_cmp(&b)
        .ok_or_else(|| Error::from_code(ErrorCode::XPTY0004, "NaN is not comparable"))
}

pub(crate) fn parse_double(s: &str) -> Result<f64, Error> {
    let t = s.trim();
    match t {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => t.parse::<f64>().map_err(|_| {
            Error::from_code(
                ErrorCode::FORG0001,
                format!("invalid numeric literal: {t}"),
            )
        }),
    }
}

pub(crate) fn parse_boolean(s: &str) -> Result<bool, Error> {
    match s.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        t => Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("invalid boolean literal: {t}"),
        )),
    }
}

pub(crate) fn double_string(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "INF".to_string()
    } else if d == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{d}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Atomic(AtomicValue),
    Node(TableNode),
}

impl Item {
    /// Atomize: nodes become untyped atomics over their string value.
    pub fn atomize(&self) -> AtomicValue {
        match self {
            Item::Atomic(a) => a.clone(),
            Item::Node(n) => AtomicValue::Untyped(n.string_value()),
        }
    }

    pub fn eq(&self, other: &Item) -> Result<bool, Error> {
        self.atomize().eq(&other.atomize())
    }

    pub fn diff(&self, other: &Item) -> Result<Ordering, Error> {
        self.atomize().diff(&other.atomize())
    }

    pub fn string_value(&self) -> String {
        match self {
            Item::Atomic(a) => a.string_value(),
            Item::Node(n) => n.string_value(),
        }
    }

    /// True when both items carry the identical type tag (same atomic variant
    /// or same node kind). Used by structural sequence comparison.
    pub fn same_type(&self, other: &Item) -> bool {
        match (self, other) {
            (Item::Atomic(a), Item::Atomic(b)) => {
                core::mem::discriminant(a) == core::mem::discriminant(b)
            }
            (Item::Node(a), Item::Node(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }

    pub fn serialize(&self, ctx: &QueryContext, ser: &mut dyn Serializer) -> Result<(), Error> {
        match self {
            Item::Atomic(a) => ser.text(&a.string_value()),
            Item::Node(n) => n.serialize(ctx, ser),
        }
    }
}

impl From<AtomicValue> for Item {
    fn from(a: AtomicValue) -> Self {
        Item::Atomic(a)
    }
}

impl From<TableNode> for Item {
    fn from(n: TableNode) -> Self {
        Item::Node(n)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Atomic(a) => f.write_str(&a.string_value()),
            Item::Node(n) => write!(f, "{n:?}"),
        }
    }
}

/// Immutable, finalized sequence. A length-one sequence is represented as the
/// bare item so the two are indistinguishable in external behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum Sequence {
    Empty,
    One(Item),
    Many(Vec<Item>),
}

impl Sequence {
    pub fn from_items(mut items: Vec<Item>) -> Sequence {
        match items.len() {
            0 => Sequence::Empty,
            1 => Sequence::One(items.remove(0)),
            _ => Sequence::Many(items),
        }
    }

    pub fn as_slice(&self) -> &[Item] {
        match self {
            Sequence::Empty => &[],
            Sequence::One(it) => core::slice::from_ref(it),
            Sequence::Many(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Sequence::Empty)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Item> {
        self.as_slice().iter()
    }
}

impl From<Item> for Sequence {
    fn from(it: Item) -> Self {
        Sequence::One(it)
    }
}
