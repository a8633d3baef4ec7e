//! Batch execution helpers

use cloudops_core::domain::artifact::InvocationResult;
use cloudops_core::domain::task::AutomationTask;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::GeneratorInvoker;

/// Runs every task concurrently and returns results in input order
///
/// Individual failures never abort the rest of the batch.
pub async fn execute_parallel<I>(
    invoker: &I,
    tasks: &[AutomationTask],
    cancel: &CancellationToken,
) -> Vec<InvocationResult>
where
    I: GeneratorInvoker + ?Sized,
{
    info!(task_count = tasks.len(), "Executing parallel generator tasks");
    join_all(tasks.iter().map(|task| invoker.invoke(task, cancel))).await
}

/// Runs tasks one at a time in order
///
/// A failed critical task stops the batch; the returned results stop at it.
pub async fn execute_sequential<I>(
    invoker: &I,
    tasks: &[AutomationTask],
    cancel: &CancellationToken,
) -> Vec<InvocationResult>
where
    I: GeneratorInvoker + ?Sized,
{
    info!(task_count = tasks.len(), "Executing sequential generator tasks");
    let mut results = Vec::with_capacity(tasks.len());

    for task in tasks {
        let result = invoker.invoke(task, cancel).await;
        let stop = !result.success && task.is_critical();
        results.push(result);

        if stop {
            error!(task_id = %task.id, "Critical task failed, stopping execution");
            break;
        }
    }

    results
}
