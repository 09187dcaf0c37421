//! Application façade.
//!
//! `App` owns one task store and one story store over the same data
//! directory and wires the cross-entity rule: after every task mutation the
//! story aggregation runs synchronously, before the command returns. The
//! task store never imports the story store; it only calls the recompute
//! hook injected here.
//!
//! The CLI (and any other host) talks to this façade exclusively.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::data::{ExportSnapshot, ImportPayload};
use crate::error::{Error, Result};
use crate::graph::{self, DependencyGraph, GraphLayout, GraphSpacing};
use crate::storage::Storage;
use crate::story::{Story, StoryStore, UpdateStory};
use crate::task::{NewTask, Task, TaskStore, UpdateTask};
use crate::{data, task};

/// Result of an import, for reporting
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportSummary {
    pub format: ImportFormat,
    pub tasks: usize,
    pub stories: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    Unified,
    TasksOnly,
    StoriesOnly,
}

/// A dependency graph together with its computed layout
#[derive(Debug, Clone, Serialize)]
pub struct TaskGraph {
    pub graph: DependencyGraph,
    pub layout: GraphLayout,
}

pub struct App {
    tasks: TaskStore,
    stories: Rc<RefCell<StoryStore>>,
    spacing: GraphSpacing,
}

impl App {
    /// Open both repositories over `data_dir` and wire the story-recompute
    /// hook into the task store
    pub fn open(data_dir: PathBuf, spacing: GraphSpacing) -> Result<Self> {
        let storage = Storage::new(data_dir);
        let mut tasks = TaskStore::open(storage.clone())?;
        let stories = Rc::new(RefCell::new(StoryStore::open(storage)?));

        let hook_target = Rc::clone(&stories);
        tasks.set_change_hook(Box::new(move |all_tasks: &[Task]| {
            hook_target.borrow_mut().recompute_all(all_tasks)?;
            Ok(())
        }));

        // Heal any story state that went stale while the app was closed.
        stories.borrow_mut().recompute_all(tasks.tasks())?;

        Ok(Self {
            tasks,
            stories,
            spacing,
        })
    }

    // =========================================================================
    // Task commands
    // =========================================================================

    pub fn create_task(&mut self, input: NewTask) -> Result<Task> {
        self.tasks.create(input)
    }

    pub fn list_tasks(&mut self) -> Result<Vec<Task>> {
        self.tasks.list()
    }

    pub fn get_task(&mut self, id: Uuid) -> Result<Task> {
        self.tasks.get(id)
    }

    pub fn update_task(&mut self, id: Uuid, patch: UpdateTask) -> Result<Task> {
        self.tasks.update(id, patch)
    }

    /// Always fails; see `TaskStore::delete`
    pub fn delete_task(&mut self, id: Uuid) -> Result<()> {
        self.tasks.delete(id)
    }

    pub fn add_schedule_entry(
        &mut self,
        id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Task> {
        self.tasks.add_schedule_entry(id, start, end)
    }

    pub fn update_schedule_entry(
        &mut self,
        id: Uuid,
        entry_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Task> {
        self.tasks.update_schedule_entry(id, entry_id, start, end)
    }

    pub fn remove_schedule_entry(&mut self, id: Uuid, entry_id: &str) -> Result<Task> {
        self.tasks.remove_schedule_entry(id, entry_id)
    }

    pub fn add_comment(&mut self, id: Uuid, text: &str) -> Result<Task> {
        self.tasks.add_comment(id, text)
    }

    pub fn add_relationship(
        &mut self,
        id: Uuid,
        kind: task::RelationKind,
        related: Uuid,
    ) -> Result<Task> {
        self.tasks.add_relationship(id, kind, related)
    }

    pub fn remove_relationship(&mut self, id: Uuid, relationship_id: &str) -> Result<Task> {
        self.tasks.remove_relationship(id, relationship_id)
    }

    /// Dependency graph reachable from a task, with layout
    pub fn task_graph(&mut self, id: Uuid) -> Result<TaskGraph> {
        let graph = self.tasks.dependency_graph(id)?;
        let layout = graph::layout(&graph, self.spacing)?;
        Ok(TaskGraph { graph, layout })
    }

    // =========================================================================
    // Story commands
    // =========================================================================

    pub fn create_story(&mut self, title: &str, description: &str) -> Result<Story> {
        self.stories.borrow_mut().create(title, description)
    }

    pub fn list_stories(&mut self) -> Result<Vec<Story>> {
        let tasks = self.tasks.list()?;
        self.stories.borrow_mut().list(&tasks)
    }

    pub fn get_story(&mut self, id: Uuid) -> Result<Story> {
        let tasks = self.tasks.list()?;
        self.stories.borrow_mut().get(id, &tasks)
    }

    pub fn update_story(&mut self, id: Uuid, patch: UpdateStory) -> Result<Story> {
        self.stories.borrow_mut().update(id, patch)
    }

    /// Delete a story, detaching its member tasks (the tasks survive)
    pub fn delete_story(&mut self, id: Uuid) -> Result<Story> {
        if !self.stories.borrow().contains(id) {
            return Err(Error::StoryNotFound(id));
        }
        self.tasks.detach_all_from_story(id)?;
        self.stories.borrow_mut().delete(id)
    }

    /// Associate a task with a story. The task side owns the association.
    pub fn attach_task(&mut self, story_id: Uuid, task_id: Uuid) -> Result<Story> {
        if !self.stories.borrow().contains(story_id) {
            return Err(Error::StoryNotFound(story_id));
        }
        self.tasks.attach_story(task_id, story_id)?;
        self.get_story(story_id)
    }

    pub fn detach_task(&mut self, story_id: Uuid, task_id: Uuid) -> Result<Story> {
        if !self.stories.borrow().contains(story_id) {
            return Err(Error::StoryNotFound(story_id));
        }
        self.tasks.detach_story(task_id, story_id)?;
        self.get_story(story_id)
    }

    /// Member tasks of a story, normalized
    pub fn story_tasks(&mut self, story_id: Uuid) -> Result<Vec<Task>> {
        if !self.stories.borrow().contains(story_id) {
            return Err(Error::StoryNotFound(story_id));
        }
        let tasks = self.tasks.list()?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.story_ids.contains(&story_id))
            .collect())
    }

    // =========================================================================
    // Data management
    // =========================================================================

    /// Snapshot both collections, normalized
    pub fn export_snapshot(&mut self) -> Result<ExportSnapshot> {
        let tasks = self.tasks.list()?;
        let stories = self.stories.borrow_mut().list(&tasks)?;
        Ok(ExportSnapshot::new(tasks, stories))
    }

    /// Import a snapshot, replacing the affected collections.
    ///
    /// The payload is fully parsed before any state changes; stories are
    /// swapped first so the task swap's recompute pass leaves the final,
    /// consistent aggregation on disk.
    pub fn import_snapshot(&mut self, json: &str) -> Result<ImportSummary> {
        let payload = data::parse_snapshot(json)?;
        match payload {
            ImportPayload::Unified { tasks, stories } => {
                let summary = ImportSummary {
                    format: ImportFormat::Unified,
                    tasks: tasks.len(),
                    stories: stories.len(),
                };
                self.stories
                    .borrow_mut()
                    .replace_all(stories, self.tasks.tasks())?;
                self.tasks.replace_all(tasks)?;
                Ok(summary)
            }
            ImportPayload::TasksOnly(tasks) => {
                let summary = ImportSummary {
                    format: ImportFormat::TasksOnly,
                    tasks: tasks.len(),
                    stories: 0,
                };
                self.tasks.replace_all(tasks)?;
                Ok(summary)
            }
            ImportPayload::StoriesOnly(stories) => {
                let summary = ImportSummary {
                    format: ImportFormat::StoriesOnly,
                    tasks: 0,
                    stories: stories.len(),
                };
                self.stories
                    .borrow_mut()
                    .replace_all(stories, self.tasks.tasks())?;
                Ok(summary)
            }
        }
    }

    /// Clear both collections. The only way tasks ever leave the system.
    pub fn wipe(&mut self) -> Result<()> {
        self.stories.borrow_mut().replace_all(Vec::new(), &[])?;
        self.tasks.replace_all(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn app(temp: &TempDir) -> App {
        App::open(temp.path().to_path_buf(), GraphSpacing::default()).unwrap()
    }

    fn quick_task(app: &mut App, title: &str, minutes: u32) -> Task {
        app.create_task(NewTask {
            title: title.to_string(),
            description: String::new(),
            estimated_time: Some(minutes),
            due_date_time: None,
        })
        .unwrap()
    }

    #[test]
    fn story_updates_synchronously_with_task_changes() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);

        let story = app.create_story("release", "").unwrap();
        let task = quick_task(&mut app, "ship it", 60);
        app.attach_task(story.id, task.id).unwrap();

        // Finishing the task flips the story before the command returns.
        app.update_task(
            task.id,
            UpdateTask {
                state: Some(TaskState::Finished),
                ..Default::default()
            },
        )
        .unwrap();

        let story = app.get_story(story.id).unwrap();
        assert_eq!(story.state, crate::story::StoryState::Finished);
        assert_eq!(story.progress, 100);
        assert!(story.finished_at.is_some());
    }

    #[test]
    fn deleting_story_detaches_but_keeps_tasks() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);

        let story = app.create_story("doomed", "").unwrap();
        let task = quick_task(&mut app, "survivor", 20);
        app.attach_task(story.id, task.id).unwrap();

        app.delete_story(story.id).unwrap();
        assert!(matches!(
            app.get_story(story.id),
            Err(Error::StoryNotFound(_))
        ));

        let task = app.get_task(task.id).unwrap();
        assert!(task.story_ids.is_empty());
    }

    #[test]
    fn export_import_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);

        let story = app.create_story("cycle", "").unwrap();
        let task = quick_task(&mut app, "persisted", 100);
        app.attach_task(story.id, task.id).unwrap();

        let snapshot = app.export_snapshot().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();

        app.wipe().unwrap();
        assert!(app.list_tasks().unwrap().is_empty());
        assert!(app.list_stories().unwrap().is_empty());

        let summary = app.import_snapshot(&json).unwrap();
        assert_eq!(summary.tasks, 1);
        assert_eq!(summary.stories, 1);

        let restored = app.get_story(story.id).unwrap();
        assert_eq!(restored.task_ids, vec![task.id]);
        assert_eq!(restored.total_points, 5);
    }

    #[test]
    fn import_heals_overdue_tasks() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);

        let mut task = Task::for_test("stale import", Some(20), None);
        task.due_date_time = Some(Utc::now() - Duration::days(2));
        let json = serde_json::to_string(&crate::task::TasksSnapshot::from_tasks(vec![
            task.clone()
        ]))
        .unwrap();

        app.import_snapshot(&json).unwrap();
        let imported = app.get_task(task.id).unwrap();
        assert_eq!(imported.state, TaskState::Failed);
    }

    #[test]
    fn graph_layout_through_facade() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);

        let a = quick_task(&mut app, "a", 20);
        let b = quick_task(&mut app, "b", 20);
        app.add_relationship(b.id, task::RelationKind::Predecessor, a.id)
            .unwrap();

        let graph = app.task_graph(a.id).unwrap();
        assert_eq!(graph.graph.tasks.len(), 2);
        assert_eq!(graph.layout.nodes.len(), 2);
        assert_eq!(graph.layout.edges.len(), 1);
    }
}
