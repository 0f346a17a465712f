//! Catalogue administration over a lectern store.
//!
//! The binary in `main.rs` parses a [`Command`], opens the configured store
//! and hands both to [`run`]. Everything here is written against the core
//! [`Gateway`] so it can be exercised with an in-memory store.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Subcommand;
use lectern_core::{
  CourseQuery, Gateway, PrincipalId, Superuser, course::Course, store::Storage,
  subject::SubjectDraft,
};
use serde::Deserialize;

/// Principal recorded for operator actions.
pub const OPERATOR: PrincipalId = PrincipalId(0);

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
  pub store_path: PathBuf,
}

impl AdminConfig {
  /// Layer `LECTERN_*` environment variables over an optional TOML file.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("LECTERN"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise AdminConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Create the store and its schema if they do not exist yet.
  Init,

  /// Manage the subject catalogue.
  #[command(subcommand)]
  Subject(SubjectCommand),

  /// Inspect courses across all owners.
  #[command(subcommand)]
  Course(CourseCommand),
}

#[derive(Debug, Subcommand)]
pub enum SubjectCommand {
  /// List subjects by title.
  List,

  /// Add a subject. The slug is derived from the title unless given.
  Add {
    title: String,
    #[arg(long)]
    slug:  Option<String>,
  },

  /// Retitle a subject.
  Edit {
    id:    i64,
    title: String,
    #[arg(long)]
    slug:  Option<String>,
  },

  Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum CourseCommand {
  /// List courses, newest first.
  List {
    /// Only courses owned by this principal id.
    #[arg(long)]
    owner:  Option<i64>,
    /// Case-insensitive match against title and overview.
    #[arg(long)]
    search: Option<String>,
  },
}

/// Execute `command` and return the lines to print.
pub async fn run<S: Storage>(
  gateway: &Gateway<S, Superuser>,
  command: Command,
) -> anyhow::Result<Vec<String>> {
  match command {
    Command::Init => Ok(vec!["store ready".to_owned()]),

    Command::Subject(SubjectCommand::List) => Ok(
      gateway
        .list_subjects()
        .await?
        .into_iter()
        .map(|s| format!("{}\t{}\t{}", s.id, s.slug, s.title))
        .collect(),
    ),

    Command::Subject(SubjectCommand::Add { title, slug }) => {
      let subject = gateway
        .create_subject(OPERATOR, SubjectDraft { title, slug })
        .await
        .context("failed to add subject")?;
      tracing::info!(id = subject.id, slug = %subject.slug, "added subject");
      Ok(vec![format!("{}\t{}", subject.id, subject.slug)])
    }

    Command::Subject(SubjectCommand::Edit { id, title, slug }) => {
      let subject = gateway
        .update_subject(OPERATOR, id, SubjectDraft { title, slug })
        .await
        .with_context(|| format!("failed to edit subject {id}"))?;
      Ok(vec![format!("{}\t{}\t{}", subject.id, subject.slug, subject.title)])
    }

    Command::Subject(SubjectCommand::Delete { id }) => {
      gateway
        .delete_subject(OPERATOR, id)
        .await
        .with_context(|| format!("failed to delete subject {id}"))?;
      tracing::info!(id, "deleted subject");
      Ok(Vec::new())
    }

    Command::Course(CourseCommand::List { owner, search }) => {
      let query = CourseQuery { text: search, owner: owner.map(PrincipalId) };
      let courses: Vec<Course> = gateway.search_courses(OPERATOR, query).await?;
      Ok(
        courses
          .into_iter()
          .map(|c| format!("{}\t{}\t{}\t{}", c.id, c.owner, c.slug, c.title))
          .collect(),
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use lectern_core::{PermissionSet, ResourceType, course::CourseDraft};
  use lectern_store_sqlite::SqliteStore;

  use super::*;

  async fn gateway() -> Gateway<SqliteStore, Superuser> {
    let store = SqliteStore::open_in_memory()
      .await
      .expect("in-memory store");
    Gateway::new(store, Superuser)
  }

  fn add(title: &str) -> Command {
    Command::Subject(SubjectCommand::Add { title: title.into(), slug: None })
  }

  #[tokio::test]
  async fn subjects_round_trip_through_commands() {
    let gw = gateway().await;
    assert_eq!(run(&gw, add("Physics")).await.unwrap(), vec!["1\tphysics"]);
    run(&gw, add("Mathematics")).await.unwrap();

    let listed = run(&gw, Command::Subject(SubjectCommand::List)).await.unwrap();
    assert_eq!(listed, vec!["2\tmathematics\tMathematics", "1\tphysics\tPhysics"]);

    let edited = run(
      &gw,
      Command::Subject(SubjectCommand::Edit {
        id:    1,
        title: "Applied Physics".into(),
        slug:  Some("applied-physics".into()),
      }),
    )
    .await
    .unwrap();
    assert_eq!(edited, vec!["1\tapplied-physics\tApplied Physics"]);

    run(&gw, Command::Subject(SubjectCommand::Delete { id: 2 })).await.unwrap();
    let listed = run(&gw, Command::Subject(SubjectCommand::List)).await.unwrap();
    assert_eq!(listed.len(), 1);
  }

  #[tokio::test]
  async fn duplicate_subject_reports_the_slug() {
    let gw = gateway().await;
    run(&gw, add("Physics")).await.unwrap();
    let err = run(&gw, add("Physics")).await.unwrap_err();
    assert!(format!("{err:#}").contains("slug"));
  }

  #[tokio::test]
  async fn course_list_filters_by_owner_and_text() {
    let mut perms = PermissionSet::new();
    perms.grant_all(PrincipalId(7), ResourceType::Course);
    let store = SqliteStore::open_in_memory().await.unwrap();
    let authoring = Gateway::new(store, perms);
    authoring
      .create::<Course>(PrincipalId(7), CourseDraft::new("Rust", "Ownership"))
      .await
      .unwrap();
    authoring
      .create::<Course>(PrincipalId(7), CourseDraft::new("Go", "Channels"))
      .await
      .unwrap();

    let admin = Gateway::new(authoring.storage().clone(), Superuser);
    let lines = run(
      &admin,
      Command::Course(CourseCommand::List { owner: Some(7), search: Some("OWNER".into()) }),
    )
    .await
    .unwrap();
    assert_eq!(lines, vec!["1\t7\trust\tRust"]);

    let none = run(
      &admin,
      Command::Course(CourseCommand::List { owner: Some(8), search: None }),
    )
    .await
    .unwrap();
    assert!(none.is_empty());
  }

  #[test]
  fn expand_tilde_leaves_other_paths_alone() {
    assert_eq!(expand_tilde(Path::new("/var/lib/lectern.db")), PathBuf::from("/var/lib/lectern.db"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/lectern.db")), PathBuf::from(home).join("lectern.db"));
    }
  }
}
