//! Concurrent status collection across the repository set.

use std::sync::Arc;

use crate::config::RepoConfig;
use crate::model::RepoInfo;
use crate::pool::{Completion, WorkerPool};
use crate::probe::ProbeOptions;
use crate::shell_exec::CommandRunner;

/// Runs one probe per repository on a bounded pool.
pub struct Scheduler {
    pool: WorkerPool,
    options: ProbeOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Scheduler {
    pub fn new(jobs: usize, options: ProbeOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            pool: WorkerPool::new("probe", jobs),
            options,
            runner,
        }
    }

    /// Probe every repository. The handle yields exactly one [`RepoInfo`] per
    /// repository, errored ones included, in completion order.
    ///
    /// Fetching happens only for repositories whose config allows it.
    pub fn run(&self, repos: Vec<RepoConfig>) -> Completion<RepoInfo> {
        log::debug!(
            "probing {} repositories, {} at a time",
            repos.len(),
            self.pool.jobs()
        );
        let options = self.options;
        let runner = Arc::clone(&self.runner);
        self.pool.run(repos, move |config: RepoConfig| {
            let options = ProbeOptions {
                fetch: options.fetch && config.fetch,
                ..options
            };
            RepoInfo::probe(config, options, runner.as_ref())
        })
    }
}
