pub mod consts;
pub mod iter;
pub mod mem;
pub mod model;
pub mod node;
pub mod runtime;
pub mod serialize;
pub mod update;
pub mod xdm;

pub use iter::{ItemBuffer, ItemIter};
pub use mem::MemTable;
pub use model::{NodeKind, QName, Table};
pub use node::{Axis, AxisIter, TableNode};
pub use runtime::{Error, ErrorCode, QueryContext, QueryContextBuilder};
pub use serialize::{Serializer, XmlWriter};
pub use update::{InsertKind, PendingUpdates, UpdatePrimitive};
pub use xdm::{AtomicValue, Item, Sequence};
