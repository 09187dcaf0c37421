//! Task entities and the task repository.
//!
//! Tasks are the source of truth for everything derived in planbook: their
//! schedule entries and due dates drive the lifecycle state (see `rules`),
//! their points and story memberships drive story aggregation. The store
//! applies the rules engine on every load, read, and mutation, so persisted
//! state is never more than a cache of what the rules would compute.
//!
//! Tasks are never deleted. `delete` fails unconditionally; the collection
//! is an audit trail that only a full data wipe clears.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, GraphEdge};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::rules;
use crate::storage::Storage;

/// Schema version tag written into the tasks snapshot
pub const TASKS_SCHEMA_VERSION: &str = "planbook.tasks.v1";

/// Lifecycle state of a task.
///
/// `Filed`, `Scheduled` and `Doing` are system-managed; the other four are
/// final states a user asserts once, after which the state never changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Filed,
    Scheduled,
    Doing,
    Finished,
    Failed,
    Deferred,
    Removed,
}

impl TaskState {
    /// Whether this state is one of the four write-once final states
    pub fn is_final(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Deferred | TaskState::Removed
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Filed => "Filed",
            TaskState::Scheduled => "Scheduled",
            TaskState::Doing => "Doing",
            TaskState::Finished => "Finished",
            TaskState::Failed => "Failed",
            TaskState::Deferred => "Deferred",
            TaskState::Removed => "Removed",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filed" => Ok(TaskState::Filed),
            "scheduled" => Ok(TaskState::Scheduled),
            "doing" => Ok(TaskState::Doing),
            "finished" => Ok(TaskState::Finished),
            "failed" => Ok(TaskState::Failed),
            "deferred" => Ok(TaskState::Deferred),
            "removed" => Ok(TaskState::Removed),
            other => Err(Error::InvalidArgument(format!(
                "unknown task state: {other}"
            ))),
        }
    }
}

/// Direction of a task-to-task dependency
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Predecessor,
    Successor,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Predecessor => f.write_str("predecessor"),
            RelationKind::Successor => f.write_str("successor"),
        }
    }
}

impl FromStr for RelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "predecessor" | "pred" => Ok(RelationKind::Predecessor),
            "successor" | "succ" => Ok(RelationKind::Successor),
            other => Err(Error::InvalidArgument(format!(
                "unknown relation kind: {other} (expected predecessor or successor)"
            ))),
        }
    }
}

/// A scheduled work block, owned exclusively by its task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes between start and end, rounded down
    pub duration: u32,
    pub created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self> {
        if end_time <= start_time {
            return Err(Error::InvalidArgument(
                "schedule entry must end after it starts".to_string(),
            ));
        }
        Ok(Self {
            id: Ulid::new().to_string(),
            start_time,
            end_time,
            duration: minutes_between(start_time, end_time),
            created_at: Utc::now(),
        })
    }

    /// Replace both times, recomputing the duration
    pub fn set_times(&mut self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<()> {
        if end_time <= start_time {
            return Err(Error::InvalidArgument(
                "schedule entry must end after it starts".to_string(),
            ));
        }
        self.start_time = start_time;
        self.end_time = end_time;
        self.duration = minutes_between(start_time, end_time);
        Ok(())
    }

    /// Cut the entry short at `now`, discarding its future portion
    pub fn truncate_at(&mut self, now: DateTime<Utc>) {
        self.end_time = now;
        self.duration = minutes_between(self.start_time, now);
    }
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    (end - start).num_minutes().max(0) as u32
}

/// An append-only task comment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskComment {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A directed dependency between two tasks, stored on one side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRelationship {
    pub id: String,
    pub kind: RelationKind,
    pub related_task_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub filing_date_time: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_time: Option<DateTime<Utc>>,
    /// Minutes, set once at creation, immutable thereafter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub schedule_history: Vec<ScheduleEntry>,
    /// Derived: minutes of schedule time already in the past
    #[serde(default)]
    pub elapsed_time: u32,
    /// Derived once from the estimate at creation
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
    #[serde(default)]
    pub relationships: Vec<TaskRelationship>,
    /// Stories this task belongs to; the owning side of the association
    #[serde(default)]
    pub story_ids: Vec<Uuid>,
}

impl Task {
    fn new(input: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filing_date_time: now,
            title: input.title,
            description: input.description,
            state: TaskState::Filed,
            due_date_time: input.due_date_time,
            estimated_time: input.estimated_time,
            schedule_history: Vec::new(),
            elapsed_time: 0,
            points: rules::fibonacci_points(input.estimated_time),
            comments: Vec::new(),
            relationships: Vec::new(),
            story_ids: Vec::new(),
        }
    }

    /// Recompute elapsed time as the sum of durations of entries that have
    /// already ended. Returns whether the value changed.
    pub fn recompute_elapsed_at(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed: u32 = self
            .schedule_history
            .iter()
            .filter(|entry| entry.end_time <= now)
            .map(|entry| entry.duration)
            .sum();
        if elapsed != self.elapsed_time {
            self.elapsed_time = elapsed;
            true
        } else {
            false
        }
    }

    /// Schedule entries sorted by start time (insertion order is not
    /// meaningful)
    pub fn sorted_schedule(&self) -> Vec<&ScheduleEntry> {
        let mut entries: Vec<&ScheduleEntry> = self.schedule_history.iter().collect();
        entries.sort_by_key(|entry| entry.start_time);
        entries
    }

    #[cfg(test)]
    pub fn for_test(
        title: &str,
        estimated_time: Option<u32>,
        due_date_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(
            NewTask {
                title: title.to_string(),
                description: String::new(),
                estimated_time,
                due_date_time,
            },
            Utc::now(),
        )
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub estimated_time: Option<u32>,
    pub due_date_time: Option<DateTime<Utc>>,
}

/// Whitelisted field changes for `TaskStore::update`
///
/// Everything not named here (estimate, points, schedule, comments,
/// relationships) is immutable or mutated through its own operation.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<TaskState>,
    pub due_date_time: Option<DateTime<Utc>>,
    pub clear_due: bool,
}

/// On-disk shape of the task collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TasksSnapshot {
    pub fn empty() -> Self {
        Self::from_tasks(Vec::new())
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks,
        }
    }
}

/// Callback invoked after any task mutation, before the operation returns.
///
/// Wired to the story side so derived story state is recomputed
/// synchronously; the task store never imports the story store directly.
pub type ChangeHook = Box<dyn Fn(&[Task]) -> Result<()>>;

/// Repository owning the task collection
pub struct TaskStore {
    storage: Storage,
    tasks: Vec<Task>,
    on_change: Option<ChangeHook>,
}

impl TaskStore {
    /// Load the task collection, normalizing any stale derived state found
    /// on disk
    pub fn open(storage: Storage) -> Result<Self> {
        storage.init()?;
        let snapshot: TasksSnapshot =
            storage.read_json_or(&storage.tasks_file(), TasksSnapshot::empty)?;

        let mut store = Self {
            storage,
            tasks: snapshot.tasks,
            on_change: None,
        };

        let now = Utc::now();
        let mut healed = false;
        for task in &mut store.tasks {
            healed |= task.recompute_elapsed_at(now);
            healed |= rules::apply_rules_at(task, now);
        }
        if healed {
            tracing::debug!("task snapshot healed on load");
            store.persist()?;
        }

        Ok(store)
    }

    /// Register the story-recompute hook
    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.on_change = Some(hook);
    }

    /// Read-only view of the current collection
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn create(&mut self, input: NewTask) -> Result<Task> {
        let now = Utc::now();
        let mut task = Task::new(input, now);
        rules::apply_rules_at(&mut task, now);
        let created = task.clone();
        self.tasks.push(task);
        self.commit()?;
        Ok(created)
    }

    /// All tasks, normalized. Reads are not side-effect-free: any state
    /// correction is persisted before returning.
    pub fn list(&mut self) -> Result<Vec<Task>> {
        self.normalize_all()?;
        Ok(self.tasks.clone())
    }

    pub fn get(&mut self, id: Uuid) -> Result<Task> {
        let now = Utc::now();
        let idx = self.index_of(id)?;
        let task = &mut self.tasks[idx];
        let mut changed = task.recompute_elapsed_at(now);
        changed |= rules::apply_rules_at(task, now);
        let task = task.clone();
        if changed {
            self.commit()?;
        }
        Ok(task)
    }

    pub fn update(&mut self, id: Uuid, patch: UpdateTask) -> Result<Task> {
        let now = Utc::now();
        let idx = self.index_of(id)?;

        if let Some(requested) = patch.state {
            let current = self.tasks[idx].state;
            if requested != current && !rules::can_user_set_state(current, requested) {
                return Err(Error::InvalidStateTransition {
                    from: current.to_string(),
                    to: requested.to_string(),
                });
            }
        }

        let was_final = self.tasks[idx].state.is_final();
        let task = &mut self.tasks[idx];

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if patch.clear_due {
            task.due_date_time = None;
        } else if let Some(due) = patch.due_date_time {
            task.due_date_time = Some(due);
        }
        if let Some(requested) = patch.state {
            task.state = requested;
        }

        // Finalizing stops time tracking on the spot: work blocks that have
        // not started are dropped, an in-progress block keeps only its past
        // portion.
        if task.state.is_final() && !was_final {
            task.schedule_history
                .retain(|entry| entry.start_time <= now);
            for entry in &mut task.schedule_history {
                if entry.end_time > now {
                    entry.truncate_at(now);
                }
            }
        }

        task.recompute_elapsed_at(now);
        rules::apply_rules_at(task, now);

        let updated = task.clone();
        self.commit()?;
        Ok(updated)
    }

    /// Always fails. Tasks are an immutable audit trail once created; only
    /// a full data wipe removes them.
    pub fn delete(&mut self, _id: Uuid) -> Result<()> {
        Err(Error::TaskDeletionDisabled)
    }

    pub fn add_schedule_entry(
        &mut self,
        id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Task> {
        let entry = ScheduleEntry::new(start_time, end_time)?;
        let idx = self.index_of(id)?;
        self.tasks[idx].schedule_history.push(entry);
        self.after_schedule_change(idx)
    }

    pub fn update_schedule_entry(
        &mut self,
        id: Uuid,
        entry_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Task> {
        let idx = self.index_of(id)?;
        let task = &mut self.tasks[idx];
        let entry = task
            .schedule_history
            .iter_mut()
            .find(|entry| entry.id == entry_id)
            .ok_or_else(|| Error::ScheduleEntryNotFound {
                task_id: id,
                entry_id: entry_id.to_string(),
            })?;
        entry.set_times(start_time, end_time)?;
        self.after_schedule_change(idx)
    }

    pub fn remove_schedule_entry(&mut self, id: Uuid, entry_id: &str) -> Result<Task> {
        let idx = self.index_of(id)?;
        let task = &mut self.tasks[idx];
        let before = task.schedule_history.len();
        task.schedule_history.retain(|entry| entry.id != entry_id);
        if task.schedule_history.len() == before {
            return Err(Error::ScheduleEntryNotFound {
                task_id: id,
                entry_id: entry_id.to_string(),
            });
        }
        self.after_schedule_change(idx)
    }

    /// Append a comment. Comments never affect state or elapsed time and are
    /// never edited or removed.
    pub fn add_comment(&mut self, id: Uuid, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidArgument(
                "comment text cannot be empty".to_string(),
            ));
        }
        let idx = self.index_of(id)?;
        self.tasks[idx].comments.push(TaskComment {
            id: Ulid::new().to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        });
        let task = self.tasks[idx].clone();
        self.commit()?;
        Ok(task)
    }

    pub fn add_relationship(
        &mut self,
        id: Uuid,
        kind: RelationKind,
        related_task_id: Uuid,
    ) -> Result<Task> {
        if related_task_id == id {
            return Err(Error::InvalidArgument(
                "a task cannot depend on itself".to_string(),
            ));
        }
        // Both endpoints must exist.
        self.index_of(related_task_id)?;
        let idx = self.index_of(id)?;

        let task = &mut self.tasks[idx];
        let duplicate = task
            .relationships
            .iter()
            .any(|rel| rel.kind == kind && rel.related_task_id == related_task_id);
        if duplicate {
            return Err(Error::InvalidArgument(format!(
                "relationship already exists: {kind} {related_task_id}"
            )));
        }

        task.relationships.push(TaskRelationship {
            id: Ulid::new().to_string(),
            kind,
            related_task_id,
            created_at: Utc::now(),
        });
        let task = task.clone();
        self.commit()?;
        Ok(task)
    }

    pub fn remove_relationship(&mut self, id: Uuid, relationship_id: &str) -> Result<Task> {
        let idx = self.index_of(id)?;
        let task = &mut self.tasks[idx];
        let before = task.relationships.len();
        task.relationships.retain(|rel| rel.id != relationship_id);
        if task.relationships.len() == before {
            return Err(Error::RelationshipNotFound {
                task_id: id,
                relationship_id: relationship_id.to_string(),
            });
        }
        let task = task.clone();
        self.commit()?;
        Ok(task)
    }

    /// Add this task to a story. The task side owns the association; story
    /// `task_ids` are a projection rebuilt by aggregation.
    pub fn attach_story(&mut self, task_id: Uuid, story_id: Uuid) -> Result<Task> {
        let idx = self.index_of(task_id)?;
        let task = &mut self.tasks[idx];
        if !task.story_ids.contains(&story_id) {
            task.story_ids.push(story_id);
        }
        let task = task.clone();
        self.commit()?;
        Ok(task)
    }

    pub fn detach_story(&mut self, task_id: Uuid, story_id: Uuid) -> Result<Task> {
        let idx = self.index_of(task_id)?;
        let task = &mut self.tasks[idx];
        task.story_ids.retain(|id| *id != story_id);
        let task = task.clone();
        self.commit()?;
        Ok(task)
    }

    /// Detach every member task of a story (used when the story is deleted;
    /// the tasks themselves survive). Returns how many tasks were detached.
    pub fn detach_all_from_story(&mut self, story_id: Uuid) -> Result<usize> {
        let mut detached = 0;
        for task in &mut self.tasks {
            let before = task.story_ids.len();
            task.story_ids.retain(|id| *id != story_id);
            if task.story_ids.len() != before {
                detached += 1;
            }
        }
        if detached > 0 {
            self.commit()?;
        }
        Ok(detached)
    }

    /// Collect the transitive set of tasks and directed predecessor →
    /// successor edges reachable from `id` over the relationship graph.
    ///
    /// Relationships pointing at tasks that no longer exist are skipped.
    pub fn dependency_graph(&mut self, id: Uuid) -> Result<DependencyGraph> {
        self.normalize_all()?;
        self.index_of(id)?;

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut order: Vec<Uuid> = Vec::new();
        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut seen_edges: HashSet<(Uuid, Uuid)> = HashSet::new();
        let mut queue: VecDeque<Uuid> = VecDeque::new();

        visited.insert(id);
        order.push(id);
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            let Some(task) = self.tasks.iter().find(|task| task.id == current) else {
                continue;
            };
            for rel in &task.relationships {
                let related = rel.related_task_id;
                if !self.tasks.iter().any(|task| task.id == related) {
                    continue;
                }
                let (from, to) = match rel.kind {
                    RelationKind::Predecessor => (related, current),
                    RelationKind::Successor => (current, related),
                };
                if seen_edges.insert((from, to)) {
                    edges.push(GraphEdge { from, to });
                }
                if visited.insert(related) {
                    order.push(related);
                    queue.push_back(related);
                }
            }
        }

        let tasks = order
            .iter()
            .filter_map(|id| self.tasks.iter().find(|task| task.id == *id).cloned())
            .collect();

        Ok(DependencyGraph {
            root: id,
            tasks,
            edges,
        })
    }

    /// Swap in a whole new collection (import/wipe). Imported derived state
    /// is normalized before anything is persisted.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> Result<()> {
        let now = Utc::now();
        self.tasks = tasks;
        for task in &mut self.tasks {
            task.recompute_elapsed_at(now);
            rules::apply_rules_at(task, now);
        }
        self.commit()
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(Error::TaskNotFound(id))
    }

    fn after_schedule_change(&mut self, idx: usize) -> Result<Task> {
        let now = Utc::now();
        let task = &mut self.tasks[idx];
        task.recompute_elapsed_at(now);
        rules::apply_rules_at(task, now);
        let task = task.clone();
        self.commit()?;
        Ok(task)
    }

    fn normalize_all(&mut self) -> Result<()> {
        let now = Utc::now();
        let mut changed = false;
        for task in &mut self.tasks {
            changed |= task.recompute_elapsed_at(now);
            changed |= rules::apply_rules_at(task, now);
        }
        if changed {
            self.commit()?;
        }
        Ok(())
    }

    /// Persist the collection, then notify the story side. The notification
    /// runs synchronously so a caller re-reading a story immediately after a
    /// task mutation sees consistent derived data.
    fn commit(&self) -> Result<()> {
        self.persist()?;
        if let Some(hook) = &self.on_change {
            hook(&self.tasks)?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let _lock = FileLock::acquire(self.storage.lock_file(), DEFAULT_LOCK_TIMEOUT_MS)?;
        self.storage.write_json(
            &self.storage.tasks_file(),
            &TasksSnapshot::from_tasks(self.tasks.clone()),
        )
    }
}
