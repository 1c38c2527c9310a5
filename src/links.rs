//! Link and task store.
//!
//! Links and their tasks live in one registry file (`links.json`). Every
//! mutation reads, changes and rewrites the registry while holding the
//! registry lock, so quota and slug checks see a consistent view.
//! Reads go straight to the file; writes replace it atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TaskKind;
use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::model::{Link, Task};
use crate::slug;
use crate::storage::Storage;
use crate::validate;

const REGISTRY_SCHEMA_VERSION: &str = "linksy.links.v1";

fn default_schema_version() -> String {
    REGISTRY_SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRegistry {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            links: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

impl LinkRegistry {
    pub fn find_link(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id == id)
    }

    fn find_link_mut(&mut self, id: &str) -> Option<&mut Link> {
        self.links.iter_mut().find(|link| link.id == id)
    }

    /// Any link, deleted or not, holding this slug.
    pub fn slug_taken(&self, slug: &str) -> bool {
        self.links.iter().any(|link| link.slug == slug)
    }

    pub fn active_count(&self, user_id: &str) -> usize {
        self.links
            .iter()
            .filter(|link| link.user_id == user_id && !link.is_deleted)
            .count()
    }

    /// Tasks of a link, oldest first.
    pub fn tasks_for(&self, link_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.link_id == link_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    /// Owner's non-deleted link; anything else reads as missing.
    fn owned(&self, user_id: &str, link_id: &str) -> Result<&Link> {
        self.find_link(link_id)
            .filter(|link| link.user_id == user_id && !link.is_deleted)
            .ok_or_else(|| Error::NotFound(format!("link {link_id}")))
    }

    fn owned_mut(&mut self, user_id: &str, link_id: &str) -> Result<&mut Link> {
        self.find_link_mut(link_id)
            .filter(|link| link.user_id == user_id && !link.is_deleted)
            .ok_or_else(|| Error::NotFound(format!("link {link_id}")))
    }

    fn validate(&self) -> Result<()> {
        let mut slugs = std::collections::HashSet::new();
        for link in &self.links {
            if !slugs.insert(link.slug.as_str()) {
                return Err(Error::OperationFailed(format!(
                    "registry holds duplicate slug '{}'",
                    link.slug
                )));
            }
        }
        Ok(())
    }
}

/// Fields accepted when creating a link. Keys are snake_case like every
/// response body; camelCase spellings are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLink {
    pub slug: String,
    pub destination: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "brandColor")]
    pub brand_color: Option<String>,
    #[serde(default, alias = "logoUrl")]
    pub logo_url: Option<String>,
}

/// Partial update. `Some("")` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default, alias = "brandColor")]
    pub brand_color: Option<String>,
    #[serde(default, alias = "logoUrl")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

/// A link together with its tasks, as shown to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct LinkDetails {
    #[serde(flatten)]
    pub link: Link,
    pub tasks: Vec<Task>,
}

/// What an anonymous visitor may see of a link.
#[derive(Debug, Clone, Serialize)]
pub struct PublicLink {
    pub id: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

/// Store for links and tasks
#[derive(Debug, Clone)]
pub struct LinkStore {
    storage: Storage,
    quota: usize,
}

impl LinkStore {
    pub fn new(storage: Storage, quota: usize) -> Self {
        Self { storage, quota }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Snapshot of the registry without taking the lock.
    pub fn registry(&self) -> Result<LinkRegistry> {
        Ok(self
            .storage
            .read_json(&self.storage.links_file())?
            .unwrap_or_default())
    }

    fn update_registry<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LinkRegistry) -> Result<T>,
    {
        let path = self.storage.links_file();
        let _lock = FileLock::for_file(&path)?;

        let mut registry: LinkRegistry = self.storage.read_json(&path)?.unwrap_or_default();
        let result = f(&mut registry)?;
        registry.validate()?;
        self.storage.write_json(&path, &registry)?;

        Ok(result)
    }

    // =========================================================================
    // Links
    // =========================================================================

    pub fn create(&self, user_id: &str, input: NewLink) -> Result<Link> {
        let slug = input.slug.trim().to_string();
        slug::validate_slug(&slug)?;
        let destination = validate::parse_web_url("destination", &input.destination)?;
        let title = clean_optional(input.title);
        let brand_color = clean_optional(input.brand_color);
        if let Some(color) = &brand_color {
            validate::validate_brand_color(color)?;
        }
        let logo_url = clean_optional(input.logo_url);
        if let Some(logo) = &logo_url {
            validate::parse_web_url("logo", logo)?;
        }

        let quota = self.quota;
        let link = self.update_registry(|registry| {
            let owned = registry.active_count(user_id);
            if owned >= quota {
                return Err(Error::QuotaExceeded { owned, quota });
            }
            if registry.slug_taken(&slug) {
                return Err(Error::SlugTaken(slug.clone()));
            }

            let now = Utc::now();
            let link = Link {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                slug: slug.clone(),
                destination: destination.to_string(),
                title,
                brand_color,
                logo_url,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };
            registry.links.push(link.clone());
            Ok(link)
        })?;

        tracing::info!(link_id = %link.id, slug = %link.slug, user_id, "link created");
        Ok(link)
    }

    /// Owner's non-deleted links, newest first.
    pub fn list(&self, user_id: &str) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self
            .registry()?
            .links
            .into_iter()
            .filter(|link| link.user_id == user_id && !link.is_deleted)
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    pub fn get(&self, user_id: &str, link_id: &str) -> Result<LinkDetails> {
        let registry = self.registry()?;
        let link = registry.owned(user_id, link_id)?.clone();
        let tasks = registry.tasks_for(link_id);
        Ok(LinkDetails { link, tasks })
    }

    pub fn update(&self, user_id: &str, link_id: &str, changes: LinkUpdate) -> Result<Link> {
        let destination = changes
            .destination
            .as_deref()
            .map(|raw| validate::parse_web_url("destination", raw))
            .transpose()?;
        if let Some(color) = changes.brand_color.as_deref().filter(|c| !c.trim().is_empty()) {
            validate::validate_brand_color(color.trim())?;
        }
        if let Some(logo) = changes.logo_url.as_deref().filter(|l| !l.trim().is_empty()) {
            validate::parse_web_url("logo", logo)?;
        }

        self.update_registry(|registry| {
            let link = registry.owned_mut(user_id, link_id)?;
            if let Some(destination) = destination {
                link.destination = destination.to_string();
            }
            if let Some(title) = changes.title {
                link.title = clean_optional(Some(title));
            }
            if let Some(color) = changes.brand_color {
                link.brand_color = clean_optional(Some(color));
            }
            if let Some(logo) = changes.logo_url {
                link.logo_url = clean_optional(Some(logo));
            }
            link.updated_at = Utc::now();
            Ok(link.clone())
        })
    }

    /// Soft delete. The slug stays reserved.
    pub fn delete(&self, user_id: &str, link_id: &str) -> Result<()> {
        self.update_registry(|registry| {
            let link = registry.owned_mut(user_id, link_id)?;
            link.is_deleted = true;
            link.updated_at = Utc::now();
            Ok(())
        })?;
        tracing::info!(link_id, user_id, "link deleted");
        Ok(())
    }

    /// Non-deleted link by id, regardless of owner.
    pub fn active_link(&self, link_id: &str) -> Result<Link> {
        self.registry()?
            .find_link(link_id)
            .filter(|link| !link.is_deleted)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("link {link_id}")))
    }

    /// Owner's non-deleted link without its tasks.
    pub fn owned_link(&self, user_id: &str, link_id: &str) -> Result<Link> {
        Ok(self.registry()?.owned(user_id, link_id)?.clone())
    }

    pub fn public_by_slug(&self, slug: &str) -> Result<PublicLink> {
        let registry = self.registry()?;
        let link = registry
            .links
            .iter()
            .find(|link| link.slug == slug && !link.is_deleted)
            .ok_or_else(|| Error::NotFound(format!("link '{slug}'")))?;
        Ok(PublicLink {
            id: link.id.clone(),
            slug: link.slug.clone(),
            title: link.title.clone(),
            destination: link.destination.clone(),
            brand_color: link.brand_color.clone(),
            logo_url: link.logo_url.clone(),
            created_at: link.created_at,
            tasks: registry.tasks_for(&link.id),
        })
    }

    pub fn slug_available(&self, slug: &str) -> Result<bool> {
        Ok(!self.registry()?.slug_taken(slug))
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn add_task(&self, user_id: &str, link_id: &str, input: NewTask) -> Result<Task> {
        let kind: TaskKind = input.kind.parse()?;
        let label = validate::require_text("label", &input.label)?;
        let target = clean_optional(input.target);

        self.update_registry(|registry| {
            registry.owned(user_id, link_id)?;
            let task = Task {
                id: Uuid::new_v4().to_string(),
                link_id: link_id.to_string(),
                kind,
                target,
                label,
                required: input.required.unwrap_or(true),
                created_at: Utc::now(),
            };
            registry.tasks.push(task.clone());
            Ok(task)
        })
    }

    pub fn update_task(
        &self,
        user_id: &str,
        link_id: &str,
        task_id: &str,
        changes: TaskUpdate,
    ) -> Result<Task> {
        let kind = changes
            .kind
            .as_deref()
            .map(str::parse::<TaskKind>)
            .transpose()?;
        let label = changes
            .label
            .as_deref()
            .map(|label| validate::require_text("label", label))
            .transpose()?;

        self.update_registry(|registry| {
            registry.owned(user_id, link_id)?;
            let task = registry
                .tasks
                .iter_mut()
                .find(|task| task.id == task_id && task.link_id == link_id)
                .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;
            if let Some(kind) = kind {
                task.kind = kind;
            }
            if let Some(label) = label {
                task.label = label;
            }
            if let Some(target) = changes.target {
                task.target = clean_optional(Some(target));
            }
            if let Some(required) = changes.required {
                task.required = required;
            }
            Ok(task.clone())
        })
    }

    pub fn remove_task(&self, user_id: &str, link_id: &str, task_id: &str) -> Result<()> {
        self.update_registry(|registry| {
            registry.owned(user_id, link_id)?;
            let before = registry.tasks.len();
            registry
                .tasks
                .retain(|task| !(task.id == task_id && task.link_id == link_id));
            if registry.tasks.len() == before {
                return Err(Error::NotFound(format!("task {task_id}")));
            }
            Ok(())
        })
    }

    /// Task by id with its link; tasks of deleted links are unknown.
    pub fn find_task(&self, task_id: &str) -> Result<Option<(Task, Link)>> {
        let registry = self.registry()?;
        Ok(registry.tasks.iter().find(|task| task.id == task_id).and_then(|task| {
            registry
                .find_link(&task.link_id)
                .filter(|link| !link.is_deleted)
                .map(|link| (task.clone(), link.clone()))
        }))
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(quota: usize) -> (TempDir, LinkStore) {
        let dir = TempDir::new().unwrap();
        let store = LinkStore::new(Storage::new(dir.path()), quota);
        (dir, store)
    }

    fn new_link(slug: &str) -> NewLink {
        NewLink {
            slug: slug.to_string(),
            destination: "https://example.com/landing".to_string(),
            ..NewLink::default()
        }
    }

    fn new_task(kind: &str, required: Option<bool>) -> NewTask {
        NewTask {
            kind: kind.to_string(),
            label: "Do the thing".to_string(),
            target: Some("https://t.me/example".to_string()),
            required,
        }
    }

    #[test]
    fn create_and_list_newest_first() {
        let (_dir, store) = store(10);
        let first = store.create("alice", new_link("first-link")).unwrap();
        let second = store.create("alice", new_link("second-link")).unwrap();
        store.create("bob", new_link("bobs-link")).unwrap();

        let links = store.list("alice").unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].created_at >= links[1].created_at);
        let ids: Vec<_> = links.iter().map(|l| l.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }

    #[test]
    fn slug_validation_on_create() {
        let (_dir, store) = store(10);
        assert!(matches!(
            store.create("alice", new_link("ab")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            store.create("alice", new_link("hello--world")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(store.create("alice", new_link("hello-world")).is_ok());
    }

    #[test]
    fn destination_must_be_absolute() {
        let (_dir, store) = store(10);
        let mut input = new_link("relative");
        input.destination = "/just/a/path".to_string();
        assert!(matches!(
            store.create("alice", input),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn eleventh_link_hits_quota() {
        let (_dir, store) = store(10);
        for i in 0..10 {
            store.create("alice", new_link(&format!("link-{i}"))).unwrap();
        }
        let err = store.create("alice", new_link("link-10")).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { owned: 10, quota: 10 }));
        assert_eq!(err.kind(), "quota_exceeded");

        // Other owners are unaffected.
        assert!(store.create("bob", new_link("link-10")).is_ok());
    }

    #[test]
    fn deleting_frees_quota_but_not_slug() {
        let (_dir, store) = store(1);
        let link = store.create("alice", new_link("only-one")).unwrap();
        store.delete("alice", &link.id).unwrap();

        assert!(matches!(
            store.create("alice", new_link("only-one")),
            Err(Error::SlugTaken(_))
        ));
        assert!(store.create("alice", new_link("another-one")).is_ok());
    }

    #[test]
    fn duplicate_slug_across_owners_rejected() {
        let (_dir, store) = store(10);
        store.create("alice", new_link("shared")).unwrap();
        assert!(matches!(
            store.create("bob", new_link("shared")),
            Err(Error::SlugTaken(slug)) if slug == "shared"
        ));
    }

    #[test]
    fn non_owner_and_deleted_read_as_not_found() {
        let (_dir, store) = store(10);
        let link = store.create("alice", new_link("private")).unwrap();
        assert!(matches!(store.get("bob", &link.id), Err(Error::NotFound(_))));
        assert!(matches!(
            store.update("bob", &link.id, LinkUpdate::default()),
            Err(Error::NotFound(_))
        ));

        store.delete("alice", &link.id).unwrap();
        assert!(matches!(store.get("alice", &link.id), Err(Error::NotFound(_))));
        assert!(matches!(store.public_by_slug("private"), Err(Error::NotFound(_))));
        assert!(matches!(store.active_link(&link.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn update_changes_fields_and_keeps_slug() {
        let (_dir, store) = store(10);
        let link = store.create("alice", new_link("brand")).unwrap();
        let updated = store
            .update(
                "alice",
                &link.id,
                LinkUpdate {
                    title: Some("My Brand".to_string()),
                    destination: Some("https://example.org/new".to_string()),
                    brand_color: Some("#ff8800".to_string()),
                    logo_url: None,
                },
            )
            .unwrap();
        assert_eq!(updated.slug, "brand");
        assert_eq!(updated.title.as_deref(), Some("My Brand"));
        assert_eq!(updated.destination, "https://example.org/new");
        assert_eq!(updated.brand_color.as_deref(), Some("#ff8800"));

        let cleared = store
            .update(
                "alice",
                &link.id,
                LinkUpdate {
                    title: Some(String::new()),
                    ..LinkUpdate::default()
                },
            )
            .unwrap();
        assert!(cleared.title.is_none());
        assert_eq!(cleared.brand_color.as_deref(), Some("#ff8800"));
    }

    #[test]
    fn task_lifecycle() {
        let (_dir, store) = store(10);
        let link = store.create("alice", new_link("tasks")).unwrap();

        let task = store
            .add_task("alice", &link.id, new_task("join_telegram", None))
            .unwrap();
        assert!(task.required);
        assert_eq!(task.kind, TaskKind::JoinTelegram);

        let optional = store
            .add_task("alice", &link.id, new_task("follow_us_somewhere", Some(false)))
            .unwrap();
        assert!(optional.kind.is_custom());

        let edited = store
            .update_task(
                "alice",
                &link.id,
                &optional.id,
                TaskUpdate {
                    required: Some(true),
                    label: Some("Follow on Mastodon".to_string()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert!(edited.required);
        assert_eq!(edited.label, "Follow on Mastodon");

        let details = store.get("alice", &link.id).unwrap();
        assert_eq!(details.tasks.len(), 2);

        store.remove_task("alice", &link.id, &task.id).unwrap();
        assert!(matches!(
            store.remove_task("alice", &link.id, &task.id),
            Err(Error::NotFound(_))
        ));
        let public = store.public_by_slug("tasks").unwrap();
        assert_eq!(public.tasks.len(), 1);
        assert_eq!(public.tasks[0].id, optional.id);
    }

    #[test]
    fn task_inputs_validated() {
        let (_dir, store) = store(10);
        let link = store.create("alice", new_link("checks")).unwrap();

        let mut bad_kind = new_task("Not A Tag", None);
        bad_kind.kind = "Not A Tag".to_string();
        assert!(matches!(
            store.add_task("alice", &link.id, bad_kind),
            Err(Error::InvalidArgument(_))
        ));

        let mut blank = new_task("manual", None);
        blank.label = "   ".to_string();
        assert!(matches!(
            store.add_task("alice", &link.id, blank),
            Err(Error::InvalidArgument(_))
        ));

        assert!(matches!(
            store.add_task("bob", &link.id, new_task("manual", None)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn find_task_returns_owning_link() {
        let (_dir, store) = store(10);
        let link = store.create("alice", new_link("finder")).unwrap();
        let task = store.add_task("alice", &link.id, new_task("youtube", None)).unwrap();

        let (found, owner) = store.find_task(&task.id).unwrap().unwrap();
        assert_eq!(found.id, task.id);
        assert_eq!(owner.id, link.id);
        assert!(store.find_task("missing").unwrap().is_none());
        assert!(!store.slug_available("finder").unwrap());
        assert!(store.slug_available("free-slug").unwrap());

        store.delete("alice", &link.id).unwrap();
        assert!(store.find_task(&task.id).unwrap().is_none());
    }
}
