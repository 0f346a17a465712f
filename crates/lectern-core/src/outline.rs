//! Composite read views over a course, and the editable module set.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  content::{Content, ContentItem, ContentKind},
  course::{Course, Module, ModuleDraft},
  gateway::{self, Gateway},
  principal::{Action, PermissionChecker, PrincipalId, ResourceType},
  record::{self, Filter},
  registry, sequence,
  store::{Storage, Tx},
  validate::ValidationErrors,
};

/// Blank forms appended to an unbound module set.
pub const EXTRA_FORMS: usize = 2;

// ─── Read views ──────────────────────────────────────────────────────────────

/// A course with its modules in order.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
  pub course:  Course,
  pub modules: Vec<Module>,
}

/// One content entry with its item resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedContent {
  pub content: Content,
  pub item:    ContentItem,
}

impl ResolvedContent {
  pub fn title(&self) -> &str { self.item.title() }

  pub fn kind(&self) -> ContentKind { self.content.kind }

  pub fn label(&self) -> &'static str { renderable_kind(&self.item) }
}

/// A module with its content list in order, every reference resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleContents {
  pub module:   Module,
  pub contents: Vec<ResolvedContent>,
}

/// Display label for a resolved item.
pub fn renderable_kind(item: &ContentItem) -> &'static str { item.kind().label() }

pub fn course_outline(tx: &mut dyn Tx, principal: PrincipalId, course_id: i64) -> Result<CourseOutline> {
  let course = gateway::fetch_owned::<Course>(tx, principal, course_id)?;
  let modules = record::find::<Module>(tx, Filter::new().eq("course_id", course.id))?;
  Ok(CourseOutline { course, modules })
}

pub fn module_contents(tx: &mut dyn Tx, principal: PrincipalId, module_id: i64) -> Result<ModuleContents> {
  let module = gateway::owned_module(tx, principal, module_id)?;
  let rows = record::find::<Content>(tx, Filter::new().eq("module_id", module.id))?;
  let mut contents = Vec::with_capacity(rows.len());
  for content in rows {
    let item = registry::resolve(tx, &content)?;
    contents.push(ResolvedContent { content, item });
  }
  Ok(ModuleContents { module, contents })
}

// ─── Module set ──────────────────────────────────────────────────────────────

/// One entry of a submitted module set. Entries with an `id` edit or delete an
/// existing module; entries without one add a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleForm {
  #[serde(default)]
  pub id:          Option<i64>,
  #[serde(default)]
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub delete:      bool,
}

impl ModuleForm {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { title: title.into(), description: description.into(), ..Self::default() }
  }

  pub fn edit(id: i64, title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { id: Some(id), ..Self::new(title, description) }
  }

  pub fn remove(id: i64) -> Self { Self { id: Some(id), delete: true, ..Self::default() } }

  fn draft(&self) -> ModuleDraft { ModuleDraft::new(&self.title, &self.description) }
}

impl From<&Module> for ModuleForm {
  fn from(m: &Module) -> Self { Self::edit(m.id, &m.title, &m.description) }
}

/// The changes a valid module set resolves to.
#[derive(Debug, Default)]
struct Plan {
  deletes: Vec<Module>,
  updates: Vec<Module>,
  inserts: Vec<(String, String)>,
}

/// All of a course's modules as one editable unit.
#[derive(Debug, Clone, Serialize)]
pub struct EditableModuleSet {
  pub course: Course,
  pub forms:  Vec<ModuleForm>,
  /// Errors keyed `modules[i].field`. Empty for an unbound set.
  pub errors: ValidationErrors,
  #[serde(skip)]
  existing:   Vec<Module>,
}

impl EditableModuleSet {
  /// The current modules plus [`EXTRA_FORMS`] blank forms.
  pub fn unbound(course: Course, existing: Vec<Module>) -> Self {
    let forms = existing
      .iter()
      .map(ModuleForm::from)
      .chain(std::iter::repeat_n(ModuleForm::default(), EXTRA_FORMS))
      .collect();
    Self { course, forms, errors: ValidationErrors::new(), existing }
  }

  /// A submitted set, validated against the current modules.
  pub fn bound(course: Course, existing: Vec<Module>, forms: Vec<ModuleForm>) -> Self {
    let mut set = Self { course, forms, errors: ValidationErrors::new(), existing };
    if let Err(errors) = set.plan() {
      set.errors = errors;
    }
    set
  }

  pub fn is_valid(&self) -> bool { self.errors.is_empty() }

  fn plan(&self) -> Result<Plan, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut plan = Plan::default();
    let mut seen = Vec::new();

    for (i, form) in self.forms.iter().enumerate() {
      let prefix = format!("modules[{i}]");
      match form.id {
        Some(id) => {
          let Some(current) = self.existing.iter().find(|m| m.id == id) else {
            errors.nest(&prefix, ValidationErrors::single("id", "select a valid module"));
            continue;
          };
          if seen.contains(&id) {
            errors.nest(&prefix, ValidationErrors::single("id", "module appears more than once"));
            continue;
          }
          seen.push(id);

          if form.delete {
            plan.deletes.push(current.clone());
            continue;
          }
          match form.draft().clean() {
            Ok((title, description)) => {
              if title != current.title || description != current.description {
                plan.updates.push(Module { title, description, ..current.clone() });
              }
            }
            Err(e) => errors.nest(&prefix, e),
          }
        }
        None => {
          let draft = form.draft();
          if form.delete || draft.is_blank() {
            continue;
          }
          match draft.clean() {
            Ok(fields) => plan.inserts.push(fields),
            Err(e) => errors.nest(&prefix, e),
          }
        }
      }
    }
    errors.finish(plan)
  }

  /// Apply the set. Nothing is written unless every form is valid.
  pub fn save(&self, tx: &mut dyn Tx) -> Result<Vec<Module>> {
    let plan = self.plan()?;
    for module in &plan.deletes {
      gateway::delete_module(tx, module)?;
    }
    for module in &plan.updates {
      record::save(tx, module)?;
    }
    for (title, description) in plan.inserts {
      let mut module = Module::new(self.course.id, title, description);
      sequence::insert_sequenced(tx, &mut module, None)?;
    }
    tracing::debug!(
      course_id = self.course.id,
      deleted = plan.deletes.len(),
      updated = plan.updates.len(),
      "saved module set",
    );
    record::find::<Module>(tx, Filter::new().eq("course_id", self.course.id))
  }
}

fn load_module_set(
  tx: &mut dyn Tx,
  principal: PrincipalId,
  course_id: i64,
  submitted: Option<Vec<ModuleForm>>,
) -> Result<EditableModuleSet> {
  let course = gateway::fetch_owned::<Course>(tx, principal, course_id)?;
  let existing = record::find::<Module>(tx, Filter::new().eq("course_id", course.id))?;
  Ok(match submitted {
    Some(forms) => EditableModuleSet::bound(course, existing, forms),
    None => EditableModuleSet::unbound(course, existing),
  })
}

// ─── Gateway views ───────────────────────────────────────────────────────────

impl<S, P> Gateway<S, P>
where
  S: Storage,
  P: PermissionChecker + 'static,
{
  /// A course owned by `principal` with its modules.
  pub async fn course_outline(&self, principal: PrincipalId, course_id: i64) -> Result<CourseOutline> {
    self
      .storage()
      .transaction(move |tx| course_outline(tx, principal, course_id))
      .await
  }

  /// A module of a course owned by `principal`, with resolved contents.
  pub async fn module_contents(&self, principal: PrincipalId, module_id: i64) -> Result<ModuleContents> {
    self
      .storage()
      .transaction(move |tx| module_contents(tx, principal, module_id))
      .await
  }

  /// The course's modules as an editable set; bound and validated when
  /// `submitted` is given. Nothing is written.
  pub async fn module_form_set(
    &self,
    principal: PrincipalId,
    course_id: i64,
    submitted: Option<Vec<ModuleForm>>,
  ) -> Result<EditableModuleSet> {
    self
      .storage()
      .transaction(move |tx| load_module_set(tx, principal, course_id, submitted))
      .await
  }

  /// Validate and apply a submitted module set atomically. Requires
  /// `change_course`. Returns the course's modules afterwards.
  pub async fn save_module_form_set(
    &self,
    principal: PrincipalId,
    course_id: i64,
    submitted: Vec<ModuleForm>,
  ) -> Result<Vec<Module>> {
    self.require(principal, Action::Change, ResourceType::Course)?;
    self
      .storage()
      .transaction(move |tx| {
        load_module_set(tx, principal, course_id, Some(submitted))?.save(tx)
      })
      .await
  }
}
