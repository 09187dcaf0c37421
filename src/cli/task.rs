//! planbook task command implementations.

use std::str::FromStr;

use crate::app::App;
use crate::cli::{parse_datetime, parse_id, DepCommands, ScheduleCommands, TaskCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::rules;
use crate::task::{NewTask, RelationKind, Task, TaskState, UpdateTask};

pub fn run(app: &mut App, cmd: TaskCommands, out: OutputOptions) -> Result<()> {
    match cmd {
        TaskCommands::New {
            title,
            description,
            estimate,
            due,
        } => {
            let due_date_time = due.as_deref().map(parse_datetime).transpose()?;
            let task = app.create_task(NewTask {
                title,
                description,
                estimated_time: estimate,
                due_date_time,
            })?;
            let human = task_human("Task filed", &task);
            emit_success(out, "task new", &task, Some(&human))
        }

        TaskCommands::List { state } => {
            let filter = state.as_deref().map(TaskState::from_str).transpose()?;
            let mut tasks = app.list_tasks()?;
            if let Some(state) = filter {
                tasks.retain(|task| task.state == state);
            }

            let mut human = HumanOutput::new(format!("{} task(s)", tasks.len()));
            for task in &tasks {
                human.push_detail(format!(
                    "{}  [{}] {} ({} pts)",
                    task.id, task.state, task.title, task.points
                ));
            }
            emit_success(out, "task list", &tasks, Some(&human))
        }

        TaskCommands::Show { id } => {
            let task = app.get_task(parse_id(&id)?)?;
            let human = task_human("Task", &task);
            emit_success(out, "task show", &task, Some(&human))
        }

        TaskCommands::Update {
            id,
            title,
            description,
            state,
            due,
            clear_due,
        } => {
            let state = state.as_deref().map(TaskState::from_str).transpose()?;
            let due_date_time = due.as_deref().map(parse_datetime).transpose()?;
            let task = app.update_task(
                parse_id(&id)?,
                UpdateTask {
                    title,
                    description,
                    state,
                    due_date_time,
                    clear_due,
                },
            )?;
            let human = task_human("Task updated", &task);
            emit_success(out, "task update", &task, Some(&human))
        }

        TaskCommands::Delete { id } => {
            // Always refused; the id is parsed only for a consistent error
            // surface.
            let id = parse_id(&id)?;
            app.delete_task(id)
        }

        TaskCommands::Comment { id, text } => {
            let task = app.add_comment(parse_id(&id)?, &text)?;
            let mut human = task_human("Comment added", &task);
            human.push_summary("comments", task.comments.len().to_string());
            emit_success(out, "task comment", &task, Some(&human))
        }

        TaskCommands::States { id } => {
            let task = app.get_task(parse_id(&id)?)?;
            let states = rules::available_user_states(&task);
            let mut human = HumanOutput::new(format!("Task is {}", task.state));
            if states.is_empty() {
                human.push_detail("no transitions available (task is final)".to_string());
            } else {
                for state in &states {
                    human.push_detail(state.to_string());
                }
            }
            emit_success(out, "task states", &states, Some(&human))
        }

        TaskCommands::Schedule(cmd) => run_schedule(app, cmd, out),
        TaskCommands::Dep(cmd) => run_dep(app, cmd, out),

        TaskCommands::Graph { id } => {
            let graph = app.task_graph(parse_id(&id)?)?;
            let mut human = HumanOutput::new("Dependency graph");
            human.push_summary("tasks", graph.graph.tasks.len().to_string());
            human.push_summary("edges", graph.graph.edges.len().to_string());
            for node in &graph.layout.nodes {
                let title = graph
                    .graph
                    .tasks
                    .iter()
                    .find(|task| task.id == node.task_id)
                    .map(|task| task.title.as_str())
                    .unwrap_or("?");
                human.push_detail(format!(
                    "level {} ({:>6.0},{:>6.0})  {}",
                    node.level, node.x, node.y, title
                ));
            }
            emit_success(out, "task graph", &graph, Some(&human))
        }
    }
}

fn run_schedule(app: &mut App, cmd: ScheduleCommands, out: OutputOptions) -> Result<()> {
    match cmd {
        ScheduleCommands::Add { id, start, end } => {
            let task = app.add_schedule_entry(
                parse_id(&id)?,
                parse_datetime(&start)?,
                parse_datetime(&end)?,
            )?;
            let human = schedule_human("Work block added", &task);
            emit_success(out, "task schedule", &task, Some(&human))
        }
        ScheduleCommands::Update {
            id,
            entry,
            start,
            end,
        } => {
            let task = app.update_schedule_entry(
                parse_id(&id)?,
                &entry,
                parse_datetime(&start)?,
                parse_datetime(&end)?,
            )?;
            let human = schedule_human("Work block updated", &task);
            emit_success(out, "task schedule", &task, Some(&human))
        }
        ScheduleCommands::Rm { id, entry } => {
            let task = app.remove_schedule_entry(parse_id(&id)?, &entry)?;
            let human = schedule_human("Work block removed", &task);
            emit_success(out, "task schedule", &task, Some(&human))
        }
    }
}

fn run_dep(app: &mut App, cmd: DepCommands, out: OutputOptions) -> Result<()> {
    match cmd {
        DepCommands::Add { id, kind, related } => {
            let kind: RelationKind = kind.parse()?;
            let task = app.add_relationship(parse_id(&id)?, kind, parse_id(&related)?)?;
            let mut human = task_human("Dependency added", &task);
            human.push_summary("relationships", task.relationships.len().to_string());
            emit_success(out, "task dep", &task, Some(&human))
        }
        DepCommands::Rm { id, relationship } => {
            let task = app.remove_relationship(parse_id(&id)?, &relationship)?;
            let human = task_human("Dependency removed", &task);
            emit_success(out, "task dep", &task, Some(&human))
        }
    }
}

fn task_human(header: &str, task: &Task) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    human.push_summary("id", task.id.to_string());
    human.push_summary("title", task.title.clone());
    human.push_summary("state", task.state.to_string());
    human.push_summary("points", task.points.to_string());
    human.push_summary("elapsed", format!("{} min", task.elapsed_time));
    if let Some(due) = task.due_date_time {
        human.push_summary("due", due.to_rfc3339());
    }
    human
}

fn schedule_human(header: &str, task: &Task) -> HumanOutput {
    let mut human = task_human(header, task);
    for entry in task.sorted_schedule() {
        human.push_detail(format!(
            "{}  {} -> {} ({} min)",
            entry.id,
            entry.start_time.to_rfc3339(),
            entry.end_time.to_rfc3339(),
            entry.duration
        ));
    }
    human
}
