use planbook::app::App;
use planbook::graph::GraphSpacing;
use planbook::task::{NewTask, Task};
use tempfile::TempDir;

pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn app(&self) -> App {
        App::open(self.dir.path().to_path_buf(), GraphSpacing::default())
            .expect("failed to open app")
    }
}

pub fn file_task(app: &mut App, title: &str, estimate: Option<u32>) -> Task {
    app.create_task(NewTask {
        title: title.to_string(),
        description: String::new(),
        estimated_time: estimate,
        due_date_time: None,
    })
    .expect("failed to create task")
}
