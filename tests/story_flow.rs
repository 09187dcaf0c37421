//! Story aggregation integration tests: state, progress and points are
//! always derived from member tasks, never stored authoritatively.

mod support;

use chrono::{Duration, Utc};
use planbook::error::Error;
use planbook::story::StoryState;
use planbook::task::{TaskState, UpdateTask};
use support::{file_task, TestEnv};
use uuid::Uuid;

#[test]
fn story_walks_filed_running_finished() {
    let env = TestEnv::new();
    let mut app = env.app();

    let story = app.create_story("checkout revamp", "").unwrap();
    assert_eq!(story.state, StoryState::Filed);
    assert!(story.started_at.is_none());

    let task = file_task(&mut app, "wire up payments", Some(60));
    let story = app.attach_task(story.id, task.id).unwrap();
    assert_eq!(story.state, StoryState::Filed);
    assert_eq!(story.total_points, 3);
    assert_eq!(story.progress, 0);

    // Any member leaving Filed starts the story.
    let start = Utc::now() + Duration::days(2);
    app.add_schedule_entry(task.id, start, start + Duration::minutes(60))
        .unwrap();
    let story = app.get_story(story.id).unwrap();
    assert_eq!(story.state, StoryState::Running);
    let started_at = story.started_at.expect("running story has started_at");

    // All members finished finishes the story; started_at does not move.
    app.update_task(
        task.id,
        UpdateTask {
            state: Some(TaskState::Finished),
            ..Default::default()
        },
    )
    .unwrap();
    let story = app.get_story(story.id).unwrap();
    assert_eq!(story.state, StoryState::Finished);
    assert_eq!(story.progress, 100);
    assert_eq!(story.started_at, Some(started_at));
    assert!(story.finished_at.is_some());
}

#[test]
fn progress_is_rounded_point_ratio() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("points", "").unwrap();

    // 20, 40 and 60 minutes map to 1, 2 and 3 points.
    let t1 = file_task(&mut app, "small", Some(20));
    let t2 = file_task(&mut app, "medium", Some(40));
    let t3 = file_task(&mut app, "large", Some(60));
    for task_id in [t1.id, t2.id, t3.id] {
        app.attach_task(story.id, task_id).unwrap();
    }

    for task_id in [t1.id, t2.id] {
        app.update_task(
            task_id,
            UpdateTask {
                state: Some(TaskState::Finished),
                ..Default::default()
            },
        )
        .unwrap();
    }

    let story = app.get_story(story.id).unwrap();
    assert_eq!(story.total_points, 6);
    assert_eq!(story.completed_points, 3);
    assert_eq!(story.progress, 50);
    assert_eq!(story.state, StoryState::Running);
}

#[test]
fn failed_members_keep_the_story_running() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("mixed outcome", "").unwrap();

    let good = file_task(&mut app, "good", Some(20));
    let bad = file_task(&mut app, "bad", Some(20));
    app.attach_task(story.id, good.id).unwrap();
    app.attach_task(story.id, bad.id).unwrap();

    app.update_task(
        good.id,
        UpdateTask {
            state: Some(TaskState::Finished),
            ..Default::default()
        },
    )
    .unwrap();
    app.update_task(
        bad.id,
        UpdateTask {
            state: Some(TaskState::Failed),
            ..Default::default()
        },
    )
    .unwrap();

    // Failed is not Finished, so the story never completes.
    let story = app.get_story(story.id).unwrap();
    assert_eq!(story.state, StoryState::Running);
    assert_eq!(story.progress, 50);
    assert!(story.finished_at.is_none());
}

#[test]
fn detaching_the_last_task_resets_the_story() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("emptied", "").unwrap();
    let task = file_task(&mut app, "only member", Some(20));

    app.attach_task(story.id, task.id).unwrap();
    app.update_task(
        task.id,
        UpdateTask {
            state: Some(TaskState::Finished),
            ..Default::default()
        },
    )
    .unwrap();

    let story = app.detach_task(story.id, task.id).unwrap();
    assert_eq!(story.state, StoryState::Filed);
    assert_eq!(story.progress, 0);
    assert!(story.task_ids.is_empty());
    assert!(story.started_at.is_none());
    assert!(story.finished_at.is_none());
}

#[test]
fn attach_is_idempotent() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("dedup", "").unwrap();
    let task = file_task(&mut app, "member", None);

    app.attach_task(story.id, task.id).unwrap();
    let story = app.attach_task(story.id, task.id).unwrap();
    assert_eq!(story.task_ids, vec![task.id]);

    let task = app.get_task(task.id).unwrap();
    assert_eq!(task.story_ids, vec![story.id]);
}

#[test]
fn attach_validates_both_endpoints() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("strict", "").unwrap();
    let task = file_task(&mut app, "member", None);

    let err = app.attach_task(Uuid::new_v4(), task.id).unwrap_err();
    assert!(matches!(err, Error::StoryNotFound(_)));

    let err = app.attach_task(story.id, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}

#[test]
fn story_tasks_lists_members_only() {
    let env = TestEnv::new();
    let mut app = env.app();
    let story = app.create_story("membership", "").unwrap();

    let inside = file_task(&mut app, "inside", None);
    let _outside = file_task(&mut app, "outside", None);
    app.attach_task(story.id, inside.id).unwrap();

    let members = app.story_tasks(story.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, inside.id);
}

#[test]
fn stories_survive_reopening_the_data_dir() {
    let env = TestEnv::new();
    let (story_id, task_id) = {
        let mut app = env.app();
        let story = app.create_story("durable story", "").unwrap();
        let task = file_task(&mut app, "durable member", Some(20));
        app.attach_task(story.id, task.id).unwrap();
        (story.id, task.id)
    };

    let mut app = env.app();
    let story = app.get_story(story_id).unwrap();
    assert_eq!(story.task_ids, vec![task_id]);
    assert_eq!(story.total_points, 1);
}
