use anyhow::Result;
use std::path::PathBuf;

use crate::config::PyshipConfig;
use crate::tasks::{self, context::TaskContext, Task};

pub async fn run(
    config: PyshipConfig,
    target_name: &str,
    task: &Task,
    parallel: bool,
    project_root: PathBuf,
) -> Result<()> {
    let target = config.target(target_name)?.clone();
    let parallel = parallel || config.deploy.parallel;

    let ctx = TaskContext::new(config, target_name.to_string(), target, project_root);

    tasks::run(&ctx, task, parallel, &tasks::SshConnector).await
}
