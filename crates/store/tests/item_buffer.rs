use rstest::rstest;
use xylem_store::iter::{ItemBuffer, ItemIter};
use xylem_store::runtime::Error;
use xylem_store::xdm::{AtomicValue, Item, Sequence};

fn int(i: i64) -> Item {
    Item::Atomic(AtomicValue::Integer(i))
}

fn string(s: &str) -> Item {
    Item::Atomic(AtomicValue::String(s.to_string()))
}

/// Lazy, non-restartable source used to exercise the admission point.
struct Counter {
    n: i64,
    limit: i64,
}

impl ItemIter for Counter {
    fn next(&mut self) -> Result<Option<Item>, Error> {
        if self.n < self.limit {
            self.n += 1;
            Ok(Some(int(self.n)))
        } else {
            Ok(None)
        }
    }
}

#[rstest]
fn growth_from_capacity_one_loses_nothing() {
    let mut buf = ItemBuffer::with_capacity(1);
    for i in 0..100 {
        buf.add(int(i));
    }
    assert_eq!(buf.len(), 100);
    for i in 0..100 {
        assert_eq!(buf.get(i as usize), Some(&int(i)));
    }
    assert!(buf.get(100).is_none());
}

#[rstest]
fn readback_after_reset_preserves_order() {
    let mut buf = ItemBuffer::new();
    for i in 0..5 {
        buf.add(int(i));
    }
    let mut first_pass = 0;
    while buf.next().unwrap().is_some() {
        first_pass += 1;
    }
    assert_eq!(first_pass, 5);
    assert!(buf.next().unwrap().is_none());

    assert!(buf.reset());
    let mut seen = Vec::new();
    while let Some(item) = buf.next().unwrap() {
        seen.push(item);
    }
    assert_eq!(seen, (0..5).map(int).collect::<Vec<_>>());
}

#[rstest]
fn same_requires_equal_length_types_and_values() {
    let a = ItemBuffer::from_items(vec![int(1), string("x")]);
    let b = ItemBuffer::from_items(vec![int(1), string("x")]);
    assert!(a.same(&b));

    let other_value = ItemBuffer::from_items(vec![int(1), string("y")]);
    assert!(!a.same(&other_value));

    // Same textual value, different type tag
    let other_type =
        ItemBuffer::from_items(vec![int(1), Item::Atomic(AtomicValue::Untyped("x".into()))]);
    assert!(!a.same(&other_type));

    let shorter = ItemBuffer::from_items(vec![int(1)]);
    assert!(!a.same(&shorter));
}

#[rstest]
fn comparison_failure_downgrades_to_not_equal() {
    // NaN never compares; same() must swallow the error, not propagate it
    let a = ItemBuffer::from_items(vec![Item::Atomic(AtomicValue::Double(f64::NAN))]);
    let b = a.clone();
    assert!(!a.same(&b));
}

#[rstest]
fn finish_folds_cardinality() {
    assert_eq!(ItemBuffer::new().finish(), Sequence::Empty);
    assert_eq!(
        ItemBuffer::from_items(vec![int(1)]).finish(),
        Sequence::One(int(1))
    );
    let many = ItemBuffer::from_items(vec![int(1), int(2)]).finish();
    assert_eq!(many, Sequence::Many(vec![int(1), int(2)]));
    assert_eq!(many.len(), 2);
    assert_eq!(many.iter().count(), 2);
    assert!(Sequence::Empty.is_empty());
}

#[rstest]
fn lazy_source_materializes_through_into_buffer() {
    let mut counter = Counter { n: 0, limit: 4 };
    assert!(!counter.reset());
    assert!(counter.size_hint().is_none());

    let buf = Box::new(counter).into_buffer().unwrap();
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.get(0), Some(&int(1)));
    assert_eq!(buf.get(3), Some(&int(4)));
}

#[rstest]
fn buffer_admission_returns_itself() {
    let buf = ItemBuffer::from_items(vec![int(1), int(2)]);
    assert_eq!(buf.size_hint(), Some(2));
    let again = Box::new(buf).into_buffer().unwrap();
    assert_eq!(again.len(), 2);
}

#[rstest]
fn add_iter_drains_a_source() {
    let mut buf = ItemBuffer::new();
    let mut counter = Counter { n: 0, limit: 3 };
    buf.add_iter(&mut counter).unwrap();
    assert_eq!(buf.len(), 3);
}
