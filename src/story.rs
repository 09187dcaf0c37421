//! Story entities, the aggregation engine, and the story repository.
//!
//! A story's state is entirely derived: nothing a user does sets it
//! directly. `apply_story_rules` rebuilds the membership projection, the
//! point totals, the progress percentage and the Filed/Running/Finished
//! state from the current task facts, and runs on every story read and after
//! every task mutation (through the hook the task store carries).
//!
//! `started_at`/`finished_at` capture the wall clock at the moment
//! aggregation first observes the transition, not the exact instant the
//! deciding task changed. Existing data relies on that approximation, so it
//! is kept rather than fixed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;
use crate::task::{Task, TaskState};

/// Schema version tag written into the stories snapshot
pub const STORIES_SCHEMA_VERSION: &str = "planbook.stories.v1";

/// Derived story lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoryState {
    Filed,
    Running,
    Finished,
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoryState::Filed => "Filed",
            StoryState::Running => "Running",
            StoryState::Finished => "Finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub filing_date_time: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Derived; see `apply_story_rules`
    pub state: StoryState,
    /// Cached projection of the task-side association, rebuilt on every
    /// aggregation pass
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub completed_points: u32,
    /// 0–100
    #[serde(default)]
    pub progress: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Story {
    fn new(title: String, description: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filing_date_time: now,
            title,
            description,
            state: StoryState::Filed,
            task_ids: Vec::new(),
            total_points: 0,
            completed_points: 0,
            progress: 0,
            started_at: None,
            finished_at: None,
        }
    }

    #[cfg(test)]
    pub fn for_test(title: &str) -> Self {
        Self::new(title.to_string(), String::new(), Utc::now())
    }
}

/// Recompute all derived story fields from the current task facts.
/// Returns whether anything changed.
///
/// The membership projection is self-healing: `task_ids` is overwritten with
/// exactly the tasks whose `story_ids` name this story, never trusted as
/// stored.
pub fn apply_story_rules(story: &mut Story, all_tasks: &[Task], now: DateTime<Utc>) -> bool {
    let members: Vec<&Task> = all_tasks
        .iter()
        .filter(|task| task.story_ids.contains(&story.id))
        .collect();

    let task_ids: Vec<Uuid> = members.iter().map(|task| task.id).collect();
    let total_points: u32 = members.iter().map(|task| task.points).sum();
    let completed_points: u32 = members
        .iter()
        .filter(|task| task.state == TaskState::Finished)
        .map(|task| task.points)
        .sum();
    let progress = if total_points > 0 {
        (100.0 * f64::from(completed_points) / f64::from(total_points)).round() as u32
    } else {
        0
    };

    let all_finished =
        !members.is_empty() && members.iter().all(|task| task.state == TaskState::Finished);
    let any_left_filed = members.iter().any(|task| task.state != TaskState::Filed);

    let before = (
        story.state,
        story.task_ids.clone(),
        story.total_points,
        story.completed_points,
        story.progress,
        story.started_at,
        story.finished_at,
    );

    story.task_ids = task_ids;
    story.total_points = total_points;
    story.completed_points = completed_points;
    story.progress = progress;

    if members.is_empty() {
        story.state = StoryState::Filed;
        story.started_at = None;
        story.finished_at = None;
    } else if all_finished {
        story.state = StoryState::Finished;
        // First transition captures the timestamp; never overwritten.
        if story.finished_at.is_none() {
            story.finished_at = Some(now);
        }
    } else if any_left_filed {
        story.state = StoryState::Running;
        if story.started_at.is_none() {
            story.started_at = Some(now);
        }
    } else {
        story.state = StoryState::Filed;
        story.started_at = None;
        story.finished_at = None;
    }

    before
        != (
            story.state,
            story.task_ids.clone(),
            story.total_points,
            story.completed_points,
            story.progress,
            story.started_at,
            story.finished_at,
        )
}

/// Input for updating a story's user-editable fields
#[derive(Debug, Clone, Default)]
pub struct UpdateStory {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// On-disk shape of the story collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoriesSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub stories: Vec<Story>,
}

impl StoriesSnapshot {
    pub fn empty() -> Self {
        Self::from_stories(Vec::new())
    }

    pub fn from_stories(stories: Vec<Story>) -> Self {
        Self {
            schema_version: STORIES_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            stories,
        }
    }
}

/// Repository owning the story collection
///
/// Depends on tasks only through the read-only slices passed into its
/// methods; it never mutates a task.
#[derive(Debug)]
pub struct StoryStore {
    storage: Storage,
    stories: Vec<Story>,
}

impl StoryStore {
    pub fn open(storage: Storage) -> Result<Self> {
        storage.init()?;
        let snapshot: StoriesSnapshot =
            storage.read_json_or(&storage.stories_file(), StoriesSnapshot::empty)?;
        Ok(Self {
            storage,
            stories: snapshot.stories,
        })
    }

    pub fn create(&mut self, title: &str, description: &str) -> Result<Story> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument(
                "story title cannot be empty".to_string(),
            ));
        }
        let story = Story::new(title.to_string(), description.to_string(), Utc::now());
        let created = story.clone();
        self.stories.push(story);
        self.persist()?;
        Ok(created)
    }

    /// All stories, re-aggregated against the given tasks before returning
    pub fn list(&mut self, all_tasks: &[Task]) -> Result<Vec<Story>> {
        self.recompute_all(all_tasks)?;
        Ok(self.stories.clone())
    }

    pub fn get(&mut self, id: Uuid, all_tasks: &[Task]) -> Result<Story> {
        self.recompute_all(all_tasks)?;
        self.stories
            .iter()
            .find(|story| story.id == id)
            .cloned()
            .ok_or(Error::StoryNotFound(id))
    }

    /// Update user-editable fields only; derived fields stay derived
    pub fn update(&mut self, id: Uuid, patch: UpdateStory) -> Result<Story> {
        let story = self
            .stories
            .iter_mut()
            .find(|story| story.id == id)
            .ok_or(Error::StoryNotFound(id))?;
        if let Some(title) = patch.title {
            story.title = title;
        }
        if let Some(description) = patch.description {
            story.description = description;
        }
        let updated = story.clone();
        self.persist()?;
        Ok(updated)
    }

    /// Remove a story. Member tasks are detached by the caller, never
    /// deleted.
    pub fn delete(&mut self, id: Uuid) -> Result<Story> {
        let idx = self
            .stories
            .iter()
            .position(|story| story.id == id)
            .ok_or(Error::StoryNotFound(id))?;
        let removed = self.stories.remove(idx);
        self.persist()?;
        Ok(removed)
    }

    /// Re-run aggregation across every story, persisting when anything
    /// changed. This is the hook target the task store notifies after each
    /// mutation.
    pub fn recompute_all(&mut self, all_tasks: &[Task]) -> Result<bool> {
        let now = Utc::now();
        let mut changed = false;
        for story in &mut self.stories {
            changed |= apply_story_rules(story, all_tasks, now);
        }
        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Swap in a whole new collection (import/wipe), re-aggregated against
    /// the given tasks before persisting
    pub fn replace_all(&mut self, stories: Vec<Story>, all_tasks: &[Task]) -> Result<()> {
        let now = Utc::now();
        self.stories = stories;
        for story in &mut self.stories {
            apply_story_rules(story, all_tasks, now);
        }
        self.persist()
    }

    /// Whether a story with this id exists
    pub fn contains(&self, id: Uuid) -> bool {
        self.stories.iter().any(|story| story.id == id)
    }

    fn persist(&self) -> Result<()> {
        let _lock = FileLock::acquire(self.storage.lock_file(), DEFAULT_LOCK_TIMEOUT_MS)?;
        self.storage.write_json(
            &self.storage.stories_file(),
            &StoriesSnapshot::from_stories(self.stories.clone()),
        )
    }
}
