use std::sync::Arc;

use rstest::rstest;
use xylem_store::mem::{MemTable, doc, elem, text};
use xylem_store::model::{NodeKind, QName, Table};
use xylem_store::node::{Axis, TableNode};
use xylem_store::runtime::{ErrorCode, QueryContext};
use xylem_store::serialize::XmlWriter;
use xylem_store::update::{
    Insert, InsertKind, PendingUpdates, Rename, UpdatePrimitive, merge_text,
};

fn shared(table: &MemTable) -> Arc<dyn Table> {
    Arc::new(table.clone())
}

fn render(table: &MemTable) -> String {
    let root = TableNode::new(shared(table), 0);
    let mut w = XmlWriter::new();
    root.serialize(&QueryContext::default(), &mut w).unwrap();
    w.into_string()
}

fn text_node(value: &str) -> TableNode {
    TableNode::new(Arc::new(MemTable::text_table(value)), 0)
}

fn elem_node(tag: &str) -> TableNode {
    TableNode::new(Arc::new(elem(tag).build()), 0)
}

fn attr_node(name: &str, value: &str) -> TableNode {
    // Attribute row of a one-element donor table
    TableNode::with_kind(
        Arc::new(elem("d").attr(name, value).build()),
        1,
        NodeKind::Attribute,
    )
}

#[rstest]
fn adjacent_text_runs_merge_into_one_node() {
    let merged = merge_text(vec![text_node("foo"), text_node("bar")]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].kind(), NodeKind::Text);
    assert_eq!(merged[0].string_value(), "foobar");
}

#[rstest]
fn empty_text_nodes_are_dropped() {
    assert!(merge_text(vec![text_node("")]).is_empty());
}

#[rstest]
fn element_boundaries_stop_text_merging() {
    let merged = merge_text(vec![text_node("a"), elem_node("e"), text_node("b")]);
    assert_eq!(merged.len(), 3);
}

#[rstest]
fn insert_into_builds_a_single_merged_text_row() {
    let mut table = doc().child(elem("e")).build();
    let target = TableNode::new(shared(&table), 1);

    let mut insert = Insert::new(InsertKind::Into, target, vec![text_node("foo")]);
    insert.queue(vec![text_node("bar")]);
    insert.prepare().unwrap();
    insert.apply(&mut table).unwrap();

    assert_eq!(render(&table), "<e>foobar</e>");
    // One text row, not two adjacent ones
    assert_eq!(table.len(), 3);
}

#[rstest]
fn insert_before_and_after_a_sibling() {
    let before = {
        let mut table = doc().child(elem("r").child(elem("x"))).build();
        let target = TableNode::new(shared(&table), 2);
        let mut insert = Insert::new(InsertKind::Before, target, vec![elem_node("a")]);
        insert.prepare().unwrap();
        insert.apply(&mut table).unwrap();
        render(&table)
    };
    assert_eq!(before, "<r><a/><x/></r>");

    let after = {
        let mut table = doc().child(elem("r").child(elem("x"))).build();
        let target = TableNode::new(shared(&table), 2);
        let mut insert = Insert::new(InsertKind::After, target, vec![elem_node("a")]);
        insert.prepare().unwrap();
        insert.apply(&mut table).unwrap();
        render(&table)
    };
    assert_eq!(after, "<r><x/><a/></r>");
}

#[rstest]
fn insert_attribute_extends_the_attribute_section() {
    let mut table = doc().child(elem("e").attr("a", "1")).build();
    let target = TableNode::new(shared(&table), 1);

    let mut insert = Insert::new(InsertKind::Attribute, target, vec![attr_node("n", "v")]);
    insert.prepare().unwrap();
    insert.apply(&mut table).unwrap();

    assert_eq!(render(&table), r#"<e a="1" n="v"/>"#);
    // The new attribute is reachable through the attribute axis
    let e = TableNode::new(shared(&table), 1);
    let mut axis = e.attributes();
    let mut names = Vec::new();
    while let Some(a) = axis.next() {
        names.push(a.name().unwrap_or_default());
    }
    assert_eq!(names, vec!["a", "n"]);
}

#[rstest]
fn rename_element_and_attribute_in_one_batch() {
    let mut table = doc().child(elem("old").attr("oa", "1")).build();
    let s = shared(&table);

    let mut pending = PendingUpdates::new();
    pending
        .add(UpdatePrimitive::Rename(Rename::new(
            TableNode::new(Arc::clone(&s), 1),
            QName::new("new"),
        )))
        .unwrap();
    pending
        .add(UpdatePrimitive::Rename(Rename::new(
            TableNode::new(Arc::clone(&s), 2),
            QName::new("na"),
        )))
        .unwrap();
    pending.commit(&mut table).unwrap();

    assert_eq!(render(&table), r#"<new na="1"/>"#);
    assert!(pending.is_empty());
}

#[rstest]
fn second_rename_of_one_target_conflicts() {
    let table = doc().child(elem("e")).build();
    let s = shared(&table);

    let mut pending = PendingUpdates::new();
    pending
        .add(UpdatePrimitive::Rename(Rename::new(
            TableNode::new(Arc::clone(&s), 1),
            QName::new("x"),
        )))
        .unwrap();
    let err = pending
        .add(UpdatePrimitive::Rename(Rename::new(
            TableNode::new(Arc::clone(&s), 1),
            QName::new("y"),
        )))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUDY0015);
}

#[rstest]
fn commit_applies_highest_positions_first() {
    let mut table = doc()
        .child(elem("r").child(elem("x")).child(elem("y")))
        .build();
    let s = shared(&table);

    let mut pending = PendingUpdates::new();
    pending
        .add(UpdatePrimitive::Insert(Insert::new(
            InsertKind::Into,
            TableNode::new(Arc::clone(&s), 2),
            vec![text_node("1")],
        )))
        .unwrap();
    pending
        .add(UpdatePrimitive::Insert(Insert::new(
            InsertKind::Into,
            TableNode::new(Arc::clone(&s), 3),
            vec![text_node("2")],
        )))
        .unwrap();
    pending.commit(&mut table).unwrap();

    assert_eq!(render(&table), "<r><x>1</x><y>2</y></r>");
}

#[rstest]
fn queued_sequences_for_one_target_fold_together() {
    let mut table = doc().child(elem("e")).build();
    let s = shared(&table);

    let mut pending = PendingUpdates::new();
    for part in ["a", "b"] {
        pending
            .add(UpdatePrimitive::Insert(Insert::new(
                InsertKind::Into,
                TableNode::new(Arc::clone(&s), 1),
                vec![text_node(part)],
            )))
            .unwrap();
    }
    assert_eq!(pending.len(), 1);
    pending.commit(&mut table).unwrap();
    assert_eq!(render(&table), "<e>ab</e>");
}

#[rstest]
fn attribute_node_in_content_sequence_is_rejected() {
    let table = doc().child(elem("e")).build();
    let target = TableNode::new(shared(&table), 1);
    let mut insert = Insert::new(InsertKind::Into, target, vec![attr_node("n", "v")]);
    let err = insert.prepare().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0004);
}

#[rstest]
fn non_attribute_in_attribute_sequence_is_rejected() {
    let table = doc().child(elem("e")).build();
    let target = TableNode::new(shared(&table), 1);
    let mut insert = Insert::new(InsertKind::Attribute, target, vec![text_node("t")]);
    let err = insert.prepare().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0004);
}

#[rstest]
fn insert_before_the_document_root_is_rejected() {
    let table = doc().child(elem("e")).build();
    let target = TableNode::new(shared(&table), 0);
    let mut insert = Insert::new(InsertKind::Before, target, vec![elem_node("a")]);
    let err = insert.prepare().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0006);
}

#[rstest]
fn renaming_a_text_node_is_rejected() {
    let table = doc().child(elem("e").child(text("t"))).build();
    let rename = Rename::new(TableNode::new(shared(&table), 2), QName::new("n"));
    let err = rename.prepare().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XUTY0012);
}

#[rstest]
fn failed_prepare_aborts_the_whole_batch() {
    let mut table = doc().child(elem("e")).build();
    let pristine = render(&table);
    let s = shared(&table);

    let mut pending = PendingUpdates::new();
    pending
        .add(UpdatePrimitive::Rename(Rename::new(
            TableNode::new(Arc::clone(&s), 1),
            QName::new("renamed"),
        )))
        .unwrap();
    pending
        .add(UpdatePrimitive::Insert(Insert::new(
            InsertKind::Into,
            TableNode::new(Arc::clone(&s), 1),
            vec![attr_node("n", "v")],
        )))
        .unwrap();

    assert!(pending.commit(&mut table).is_err());
    // No partial commit: the table is untouched
    assert_eq!(render(&table), pristine);
}

#[rstest]
fn empty_insertion_queue_is_a_no_op() {
    let mut table = doc().child(elem("e")).build();
    let target = TableNode::new(shared(&table), 1);
    let mut insert = Insert::new(InsertKind::Into, target, Vec::new());
    insert.prepare().unwrap();
    insert.apply(&mut table).unwrap();
    assert_eq!(render(&table), "<e/>");
    assert_eq!(table.len(), 2);
}
