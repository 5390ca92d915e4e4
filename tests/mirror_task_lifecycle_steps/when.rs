//! When steps for mirror task lifecycle BDD scenarios.

use super::world::{MirrorTaskWorld, run_async};
use eyre::WrapErr;
use mirror_tasks::mirror_task::{
    domain::{MirrorId, MirrorPriority, MirrorTaskEvent, MirrorTaskStatus, SyncReport},
    services::EnqueueMirrorTaskRequest,
};
use rstest_bdd_macros::when;

#[when(r#"a worker claims a task from "{status}""#)]
fn worker_claims(world: &mut MirrorTaskWorld, status: String) -> Result<(), eyre::Report> {
    let from = MirrorTaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))?;
    let claimed = run_async(world.scheduler().claim_next(&[from])).wrap_err("claim mirror task")?;
    world.current_task = Some(claimed.clone());
    world.claimed_task = Some(claimed);
    Ok(())
}

#[when(r#"the worker reports "{event_name}""#)]
fn worker_reports(world: &mut MirrorTaskWorld, event_name: String) -> Result<(), eyre::Report> {
    let event = MirrorTaskEvent::try_from(event_name.as_str())
        .map_err(|err| eyre::eyre!("invalid event in scenario: {err}"))?;
    let task_id = world.current()?.id();
    let result = run_async(
        world
            .scheduler()
            .apply_event(task_id, event, SyncReport::new()),
    );
    if let Ok(ref updated) = result {
        world.current_task = Some(updated.clone());
    }
    world.last_event_result = Some(result);
    Ok(())
}

#[when(r#"the worker fails with "{message}""#)]
fn worker_fails(world: &mut MirrorTaskWorld, message: String) -> Result<(), eyre::Report> {
    let task_id = world.current()?.id();
    let failed = run_async(world.scheduler().record_failure(task_id, message))
        .wrap_err("record mirror task failure")?;
    world.current_task = Some(failed);
    Ok(())
}

#[when("the failed task is requeued")]
fn failed_task_requeued(world: &mut MirrorTaskWorld) -> Result<(), eyre::Report> {
    let task_id = world.current()?.id();
    let retry = run_async(world.scheduler().requeue(task_id)).wrap_err("requeue mirror task")?;
    world.current_task = Some(retry);
    Ok(())
}

#[when(r#"a replacement "{level}" task is queued for mirror {mirror_id:i64}"#)]
fn replacement_queued(
    world: &mut MirrorTaskWorld,
    level: String,
    mirror_id: i64,
) -> Result<(), eyre::Report> {
    let priority = MirrorPriority::try_from(level.as_str())
        .map_err(|err| eyre::eyre!("invalid priority in scenario: {err}"))?;
    let replacement = run_async(
        world
            .scheduler()
            .enqueue_replacing(EnqueueMirrorTaskRequest::new(MirrorId::new(mirror_id), priority)),
    )
    .wrap_err("enqueue replacement task")?;
    world.replacement_task = Some(replacement);
    Ok(())
}
