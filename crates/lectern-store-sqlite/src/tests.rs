//! Integration tests for `SqliteStore` against an in-memory database.

use lectern_core::{
  Error, Gateway, PermissionSet, PrincipalId, ResourceType,
  content::{ContentKind, FormData},
  course::{Course, CourseDraft, Module},
  gateway::CourseQuery,
  outline::ModuleForm,
  record::{self, Filter, Query, Table},
  registry, sequence,
  store::Storage,
};
use serde_json::json;

use crate::SqliteStore;

const P1: PrincipalId = PrincipalId(1);
const P2: PrincipalId = PrincipalId(2);

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn gateway() -> Gateway<SqliteStore, PermissionSet> {
  let mut perms = PermissionSet::new();
  for who in [P1, P2] {
    for resource in [
      ResourceType::Course,
      ResourceType::Text,
      ResourceType::Video,
      ResourceType::Image,
      ResourceType::File,
    ] {
      perms.grant_all(who, resource);
    }
  }
  Gateway::new(store().await, perms)
}

fn form(value: serde_json::Value) -> FormData {
  value.as_object().cloned().expect("object")
}

async fn count(store: &SqliteStore, table: Table) -> usize {
  store
    .transaction(move |tx| tx.find(table, &["id"], &Query::default()))
    .await
    .unwrap()
    .len()
}

async fn course(gw: &Gateway<SqliteStore, PermissionSet>, title: &str) -> Course {
  gw.create::<Course>(P1, CourseDraft::new(title, "overview"))
    .await
    .unwrap()
}

// ─── Sequencer ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sequential_inserts_number_each_group_from_zero() {
  let gw = gateway().await;
  let a = course(&gw, "A").await;
  let b = course(&gw, "B").await;

  let orders = gw
    .storage()
    .transaction(move |tx| {
      let mut out = Vec::new();
      for (course_id, title) in [(a.id, "a1"), (b.id, "b1"), (a.id, "a2"), (a.id, "a3"), (b.id, "b2")] {
        let mut module = Module::new(course_id, title, "");
        sequence::insert_sequenced(tx, &mut module, None)?;
        out.push((module.title, module.order));
      }
      Ok(out)
    })
    .await
    .unwrap();

  assert_eq!(
    orders,
    vec![
      ("a1".to_owned(), 0),
      ("b1".to_owned(), 0),
      ("a2".to_owned(), 1),
      ("a3".to_owned(), 2),
      ("b2".to_owned(), 1),
    ]
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_through_two_connections_get_distinct_orders() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("lectern.db");
  let mut perms = PermissionSet::new();
  perms.grant_all(P1, ResourceType::Course).grant_all(P1, ResourceType::Text);

  let first = Gateway::new(SqliteStore::open(&path).await.unwrap(), perms.clone());
  let second = Gateway::new(SqliteStore::open(&path).await.unwrap(), perms);
  let c = course(&first, "C").await;
  let module = first
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("M", "")])
    .await
    .unwrap()
    .remove(0);

  let mut tasks = Vec::new();
  for i in 0..20 {
    for gw in [&first, &second] {
      let gw = gw.clone();
      let module_id = module.id;
      tasks.push(tokio::spawn(async move {
        gw.add_content(P1, module_id, "text", form(json!({ "title": format!("t{i}"), "content": "x" })))
          .await
          .map(|content| content.order)
      }));
    }
  }

  let mut orders = Vec::new();
  for task in tasks {
    orders.push(task.await.unwrap().unwrap());
  }
  orders.sort_unstable();
  assert_eq!(orders, (0..40).collect::<Vec<u32>>());
}

#[tokio::test]
async fn explicit_order_leaves_siblings_alone() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;

  let modules = gw
    .storage()
    .transaction(move |tx| {
      for title in ["first", "second"] {
        sequence::insert_sequenced(tx, &mut Module::new(c.id, title, ""), None)?;
      }
      sequence::insert_sequenced(tx, &mut Module::new(c.id, "pinned", ""), Some(0))?;
      record::find::<Module>(tx, Filter::new().eq("course_id", c.id))
    })
    .await
    .unwrap();

  let summary: Vec<(&str, u32)> = modules.iter().map(|m| (m.title.as_str(), m.order)).collect();
  assert_eq!(summary, vec![("first", 0), ("pinned", 0), ("second", 1)]);
}

#[tokio::test]
async fn deleted_rows_leave_gaps() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let modules = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("one", ""), ModuleForm::new("two", "")])
    .await
    .unwrap();
  gw.save_module_form_set(P1, c.id, vec![ModuleForm::remove(modules[0].id)])
    .await
    .unwrap();

  let after = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("three", "")])
    .await
    .unwrap();
  let orders: Vec<u32> = after.iter().map(|m| m.order).collect();
  assert_eq!(orders, vec![1, 2]);
}

// ─── Content registry ────────────────────────────────────────────────────────

#[test]
fn descriptors_resolve_against_the_allow_list() {
  assert_eq!(registry::resolve_kind("text").unwrap(), ContentKind::Text);
  assert_eq!(registry::resolve_kind("video").unwrap(), ContentKind::Video);
  assert!(matches!(
    registry::resolve_kind("sql"),
    Err(Error::UnsupportedContentKind(_))
  ));
}

#[tokio::test]
async fn failing_payload_writes_no_rows() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let intro = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("Intro", "")])
    .await
    .unwrap()[0]
    .id;

  let err = gw
    .add_content(P1, intro, "video", form(json!({ "title": "Clip", "url": "not a url" })))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ValidationFailed(ref e) if e.contains("url")));
  assert_eq!(count(gw.storage(), Table::Videos).await, 0);
  assert_eq!(count(gw.storage(), Table::Contents).await, 0);
}

#[tokio::test]
async fn failed_variant_delete_keeps_content_row() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let intro = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("Intro", "")])
    .await
    .unwrap()[0]
    .id;
  let content = gw
    .add_content(P1, intro, "image", form(json!({ "title": "Diagram", "file": "images/d.png" })))
    .await
    .unwrap();

  gw.storage()
    .execute_batch(
      "CREATE TRIGGER images_no_delete BEFORE DELETE ON images
       BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
    )
    .await
    .unwrap();

  let err = gw.delete_content(P1, content.id).await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)));
  assert!(!err.is_recoverable());

  let view = gw.module_contents(P1, intro).await.unwrap();
  assert_eq!(view.contents.len(), 1);
  assert_eq!(view.contents[0].content, content);
}

#[tokio::test]
async fn delete_content_removes_both_rows() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let intro = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("Intro", "")])
    .await
    .unwrap()[0]
    .id;
  let content = gw
    .add_content(P1, intro, "file", form(json!({ "title": "Slides", "file": "files/s.pdf" })))
    .await
    .unwrap();

  assert!(matches!(
    gw.delete_content(P2, content.id).await,
    Err(Error::NotFoundOrUnauthorized)
  ));
  gw.delete_content(P1, content.id).await.unwrap();
  assert_eq!(count(gw.storage(), Table::Files).await, 0);
  assert_eq!(count(gw.storage(), Table::Contents).await, 0);
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn foreign_id_matches_missing_id() {
  let gw = gateway().await;
  let theirs = gw
    .create::<Course>(P2, CourseDraft::new("Theirs", "x"))
    .await
    .unwrap();

  let foreign = gw
    .update::<Course>(P1, theirs.id, CourseDraft::new("Mine now", "x"))
    .await
    .unwrap_err();
  let missing = gw
    .update::<Course>(P1, theirs.id + 100, CourseDraft::new("Mine now", "x"))
    .await
    .unwrap_err();
  assert!(matches!(foreign, Error::NotFoundOrUnauthorized));
  assert!(matches!(missing, Error::NotFoundOrUnauthorized));
  assert_eq!(foreign.to_string(), missing.to_string());

  let unchanged = gw.get_owned::<Course>(P2, theirs.id).await.unwrap();
  assert_eq!(unchanged.title, "Theirs");
}

#[tokio::test]
async fn courses_list_newest_first() {
  let gw = gateway().await;
  for title in ["First", "Second", "Third"] {
    course(&gw, title).await;
  }
  let titles: Vec<String> = gw
    .list_owned::<Course>(P1)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.title)
    .collect();
  assert_eq!(titles, vec!["Third", "Second", "First"]);
}

#[tokio::test]
async fn course_delete_cascades_children_first() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let modules = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("one", ""), ModuleForm::new("two", "")])
    .await
    .unwrap();
  for m in &modules {
    gw.add_content(P1, m.id, "text", form(json!({ "title": "t", "content": "c" })))
      .await
      .unwrap();
  }

  gw.delete::<Course>(P1, c.id).await.unwrap();
  for table in [Table::Courses, Table::Modules, Table::Contents, Table::Texts] {
    assert_eq!(count(gw.storage(), table).await, 0, "{table} not emptied");
  }
}

#[tokio::test]
async fn out_of_order_delete_is_rejected_by_foreign_keys() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  gw.save_module_form_set(P1, c.id, vec![ModuleForm::new("one", "")])
    .await
    .unwrap();

  let err = gw
    .storage()
    .transaction(move |tx| tx.delete(Table::Courses, c.id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Storage(_)));
  assert_eq!(count(gw.storage(), Table::Courses).await, 1);
}

#[tokio::test]
async fn search_matches_title_or_overview_case_insensitively() {
  let mut perms = PermissionSet::new();
  perms.grant_all(P1, ResourceType::Course);
  let gw = Gateway::new(store().await, perms);

  gw.create::<Course>(P1, CourseDraft::new("Rust Basics", "Ownership"))
    .await
    .unwrap();
  gw.create::<Course>(P1, CourseDraft::new("Go", "Goroutines and 100% channels"))
    .await
    .unwrap();

  let hits = gw
    .search_courses(P1, CourseQuery { text: Some("rust".into()), owner: None })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].slug, "rust-basics");

  let hits = gw
    .search_courses(P1, CourseQuery { text: Some("100%".into()), owner: Some(P1) })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].title, "Go");

  gw.create::<Course>(P1, CourseDraft::new("Курс Python", "Основы ЯЗЫКА"))
    .await
    .unwrap();
  for needle in ["Курс", "курс", "КУРС", "язык"] {
    let hits = gw
      .search_courses(P1, CourseQuery { text: Some(needle.into()), owner: None })
      .await
      .unwrap();
    assert_eq!(hits.len(), 1, "{needle}");
    assert_eq!(hits[0].slug, "python");
  }

  assert!(matches!(
    gw.search_courses(P2, CourseQuery::default()).await,
    Err(Error::PermissionDenied(_))
  ));
}

// ─── Module set ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn module_set_applies_every_change() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let before = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("M1", ""), ModuleForm::new("M2", "")])
    .await
    .unwrap();
  let (m1, m2) = (&before[0], &before[1]);

  let after = gw
    .save_module_form_set(
      P1,
      c.id,
      vec![
        ModuleForm::edit(m1.id, "M1'", "edited"),
        ModuleForm::remove(m2.id),
        ModuleForm::new("M3", ""),
      ],
    )
    .await
    .unwrap();

  let summary: Vec<(i64, &str, u32)> =
    after.iter().map(|m| (m.id, m.title.as_str(), m.order)).collect();
  assert_eq!(summary[0], (m1.id, "M1'", 0));
  assert_eq!(summary[1].1, "M3");
  assert_eq!(summary.len(), 2);
}

#[tokio::test]
async fn module_set_is_all_or_nothing() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let before = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("M1", ""), ModuleForm::new("M2", "")])
    .await
    .unwrap();

  let err = gw
    .save_module_form_set(
      P1,
      c.id,
      vec![
        ModuleForm::edit(before[0].id, "M1'", ""),
        ModuleForm::remove(before[1].id),
        ModuleForm::new("", "description but no title"),
      ],
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ValidationFailed(ref e) if e.contains("modules[2].title")));

  let outline = gw.course_outline(P1, c.id).await.unwrap();
  assert_eq!(outline.modules, before);
}

#[tokio::test]
async fn bound_module_set_reports_errors_without_writing() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let unbound = gw.module_form_set(P1, c.id, None).await.unwrap();
  assert_eq!(unbound.forms.len(), 2);

  let bound = gw
    .module_form_set(P1, c.id, Some(vec![ModuleForm::edit(4242, "x", "")]))
    .await
    .unwrap();
  assert!(bound.errors.contains("modules[0].id"));
  assert_eq!(count(gw.storage(), Table::Modules).await, 0);

  assert!(matches!(
    gw.module_form_set(P2, c.id, None).await,
    Err(Error::NotFoundOrUnauthorized)
  ));
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn owner_builds_a_module_and_others_see_nothing() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let intro = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("Intro", "")])
    .await
    .unwrap()
    .remove(0);
  assert_eq!(intro.order, 0);
  assert_eq!(intro.to_string(), "0. Intro");

  let video = gw
    .add_content(P1, intro.id, "video", form(json!({ "title": "Clip", "url": "https://x/1" })))
    .await
    .unwrap();
  let text = gw
    .add_content(P1, intro.id, "text", form(json!({ "title": "Notes", "content": "..." })))
    .await
    .unwrap();
  assert_eq!((video.order, text.order), (0, 1));

  let view = gw.module_contents(P1, intro.id).await.unwrap();
  let labels: Vec<&str> = view.contents.iter().map(|c| c.label()).collect();
  assert_eq!(labels, vec!["video", "text"]);

  assert!(gw.list_owned::<Course>(P2).await.unwrap().is_empty());
  assert!(matches!(
    gw.update::<Course>(P2, c.id, CourseDraft::new("Hijack", "x")).await,
    Err(Error::NotFoundOrUnauthorized)
  ));
  assert!(matches!(
    gw.course_outline(P2, c.id).await,
    Err(Error::NotFoundOrUnauthorized)
  ));
}

#[tokio::test]
async fn edit_keeps_the_content_position() {
  let gw = gateway().await;
  let c = course(&gw, "C").await;
  let intro = gw
    .save_module_form_set(P1, c.id, vec![ModuleForm::new("Intro", "")])
    .await
    .unwrap()[0]
    .id;
  gw.add_content(P1, intro, "text", form(json!({ "title": "a", "content": "a" })))
    .await
    .unwrap();
  let second = gw
    .add_content(P1, intro, "text", form(json!({ "title": "b", "content": "b" })))
    .await
    .unwrap();

  let item = gw
    .edit_content(P1, intro, "text", second.item_id, form(json!({ "title": "b2", "content": "b2" })))
    .await
    .unwrap();
  assert!(item.meta().updated_at >= item.meta().created_at);

  let prefill = gw
    .content_item(P1, intro, "text", second.item_id)
    .await
    .unwrap();
  assert_eq!(prefill.title(), "b2");

  let view = gw.module_contents(P1, intro).await.unwrap();
  let titles: Vec<(u32, &str)> = view
    .contents
    .iter()
    .map(|c| (c.content.order, c.title()))
    .collect();
  assert_eq!(titles, vec![(0, "a"), (1, "b2")]);
}
