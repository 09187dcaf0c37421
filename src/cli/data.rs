//! planbook data command implementations.

use std::fs;
use std::path::PathBuf;

use crate::app::App;
use crate::cli::DataCommands;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};

#[derive(serde::Serialize)]
struct ExportReport {
    tasks: usize,
    stories: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
}

pub fn run(app: &mut App, cmd: DataCommands, out: OutputOptions) -> Result<()> {
    match cmd {
        DataCommands::Export { out: file } => {
            let snapshot = app.export_snapshot()?;
            let json = serde_json::to_string_pretty(&snapshot)?;

            match file {
                Some(path) => {
                    fs::write(&path, json)?;
                    let report = ExportReport {
                        tasks: snapshot.tasks.len(),
                        stories: snapshot.stories.len(),
                        file: Some(path.clone()),
                    };
                    let mut human = HumanOutput::new("Snapshot exported");
                    human.push_summary("file", path.display().to_string());
                    human.push_summary("tasks", report.tasks.to_string());
                    human.push_summary("stories", report.stories.to_string());
                    emit_success(out, "data export", &report, Some(&human))
                }
                None => {
                    // The snapshot itself is the output; envelopes would
                    // corrupt piping to a file.
                    println!("{json}");
                    Ok(())
                }
            }
        }

        DataCommands::Import { file } => {
            let json = fs::read_to_string(&file)?;
            let summary = app.import_snapshot(&json)?;

            let mut human = HumanOutput::new("Snapshot imported");
            human.push_summary("file", file.display().to_string());
            human.push_summary("format", format!("{:?}", summary.format));
            human.push_summary("tasks", summary.tasks.to_string());
            human.push_summary("stories", summary.stories.to_string());
            emit_success(out, "data import", &summary, Some(&human))
        }

        DataCommands::Wipe { force } => {
            if !force {
                return Err(Error::InvalidArgument(
                    "wiping deletes all tasks and stories; pass --force to confirm".to_string(),
                ));
            }
            app.wipe()?;
            let human = HumanOutput::new("All data wiped");
            emit_success(out, "data wipe", &serde_json::json!({ "wiped": true }), Some(&human))
        }
    }
}
