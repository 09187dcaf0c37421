//! planbook story command implementations.

use crate::app::App;
use crate::cli::{parse_id, StoryCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::story::{Story, UpdateStory};

pub fn run(app: &mut App, cmd: StoryCommands, out: OutputOptions) -> Result<()> {
    match cmd {
        StoryCommands::New { title, description } => {
            let story = app.create_story(&title, &description)?;
            let human = story_human("Story created", &story);
            emit_success(out, "story new", &story, Some(&human))
        }

        StoryCommands::List => {
            let stories = app.list_stories()?;
            let mut human = HumanOutput::new(format!("{} story(ies)", stories.len()));
            for story in &stories {
                human.push_detail(format!(
                    "{}  [{}] {} ({}%, {} task(s))",
                    story.id,
                    story.state,
                    story.title,
                    story.progress,
                    story.task_ids.len()
                ));
            }
            emit_success(out, "story list", &stories, Some(&human))
        }

        StoryCommands::Show { id } => {
            let story = app.get_story(parse_id(&id)?)?;
            let human = story_human("Story", &story);
            emit_success(out, "story show", &story, Some(&human))
        }

        StoryCommands::Update {
            id,
            title,
            description,
        } => {
            let story = app.update_story(parse_id(&id)?, UpdateStory { title, description })?;
            let human = story_human("Story updated", &story);
            emit_success(out, "story update", &story, Some(&human))
        }

        StoryCommands::Delete { id } => {
            let story = app.delete_story(parse_id(&id)?)?;
            let mut human = HumanOutput::new("Story deleted");
            human.push_summary("id", story.id.to_string());
            human.push_summary("title", story.title.clone());
            if !story.task_ids.is_empty() {
                human.push_detail(format!(
                    "{} task(s) detached (tasks are never deleted)",
                    story.task_ids.len()
                ));
            }
            emit_success(out, "story delete", &story, Some(&human))
        }

        StoryCommands::Attach { story, task } => {
            let story = app.attach_task(parse_id(&story)?, parse_id(&task)?)?;
            let human = story_human("Task attached", &story);
            emit_success(out, "story attach", &story, Some(&human))
        }

        StoryCommands::Detach { story, task } => {
            let story = app.detach_task(parse_id(&story)?, parse_id(&task)?)?;
            let human = story_human("Task detached", &story);
            emit_success(out, "story detach", &story, Some(&human))
        }

        StoryCommands::Tasks { story } => {
            let tasks = app.story_tasks(parse_id(&story)?)?;
            let mut human = HumanOutput::new(format!("{} member task(s)", tasks.len()));
            for task in &tasks {
                human.push_detail(format!(
                    "{}  [{}] {} ({} pts)",
                    task.id, task.state, task.title, task.points
                ));
            }
            emit_success(out, "story tasks", &tasks, Some(&human))
        }
    }
}

fn story_human(header: &str, story: &Story) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("id", story.id.to_string());
    human.push_summary("title", story.title.clone());
    human.push_summary("state", story.state.to_string());
    human.push_summary(
        "progress",
        format!(
            "{}% ({}/{} pts, {} task(s))",
            story.progress,
            story.completed_points,
            story.total_points,
            story.task_ids.len()
        ),
    );
    if let Some(started) = story.started_at {
        human.push_summary("started", started.to_rfc3339());
    }
    if let Some(finished) = story.finished_at {
        human.push_summary("finished", finished.to_rfc3339());
    }
    human
}
