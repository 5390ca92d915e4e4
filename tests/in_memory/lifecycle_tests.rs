//! End-to-end task lifecycles against the in-memory repository.

use super::helpers::{repository, repository_for, scheduler_for};
use eyre::{ensure, eyre};
use mirror_tasks::mirror_task::{
    adapters::memory::InMemoryMirrorTaskRepository,
    domain::{
        MirrorId, MirrorPriority, MirrorTaskEvent, MirrorTaskStatus, RepositorySyncStatus,
        SyncReport,
    },
    services::{EnqueueMirrorTaskRequest, RetryPolicy},
};
use rstest::rstest;

const MIRROR: MirrorId = MirrorId::new(1);

fn sync_status_of(
    repository: &InMemoryMirrorTaskRepository,
) -> eyre::Result<RepositorySyncStatus> {
    repository
        .repository(repository_for(MIRROR))?
        .map(|found| found.sync_status)
        .ok_or_else(|| eyre!("repository projection missing"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mirror_syncs_repository_then_lfs(
    repository: InMemoryMirrorTaskRepository,
) -> eyre::Result<()> {
    let scheduler = scheduler_for(&repository);
    let queued = scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::High))
        .await?;
    ensure!(sync_status_of(&repository)? == RepositorySyncStatus::Pending);

    let repo_step = scheduler.claim_next(&[MirrorTaskStatus::Queued]).await?;
    ensure!(repo_step.id() == queued.id());
    scheduler
        .record_progress(repo_step.id(), SyncReport::new().with_progress(30))
        .await?;
    let synced = scheduler
        .apply_event(
            repo_step.id(),
            MirrorTaskEvent::Success,
            SyncReport::new()
                .with_progress(50)
                .with_before_last_commit_id("1111111")
                .with_after_last_commit_id("2222222"),
        )
        .await?;
    ensure!(synced.status() == MirrorTaskStatus::RepoSyncFinished);
    ensure!(sync_status_of(&repository)? == RepositorySyncStatus::InProgress);

    let lfs_step = scheduler
        .claim_next(&[MirrorTaskStatus::RepoSyncFinished])
        .await?;
    ensure!(lfs_step.status() == MirrorTaskStatus::LfsSyncStart);
    let finished = scheduler
        .apply_event(
            lfs_step.id(),
            MirrorTaskEvent::Success,
            SyncReport::new().with_progress(100),
        )
        .await?;

    ensure!(finished.status() == MirrorTaskStatus::LfsSyncFinished);
    ensure!(finished.progress() == 100);
    ensure!(finished.before_last_commit_id() == Some("1111111"));
    ensure!(finished.after_last_commit_id() == Some("2222222"));
    ensure!(finished.started_at() == repo_step.started_at());
    ensure!(finished.finished_at().is_some());
    ensure!(sync_status_of(&repository)? == RepositorySyncStatus::Completed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn replacing_cancels_every_outstanding_task_of_the_mirror(
    repository: InMemoryMirrorTaskRepository,
) -> eyre::Result<()> {
    let scheduler = scheduler_for(&repository);
    let waiting = scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Low))
        .await?;
    scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Low))
        .await?;
    let running = scheduler.claim_next(&[]).await?;
    let other_mirror = scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MirrorId::new(2), MirrorPriority::Low))
        .await?;

    let replacement = scheduler
        .enqueue_replacing(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Asap))
        .await?;

    for id in [waiting.id(), running.id()] {
        let status = scheduler.find(id).await?.map(|details| details.task.status());
        ensure!(status == Some(MirrorTaskStatus::Canceled), "task {id} is canceled");
    }
    let untouched = scheduler
        .find(other_mirror.id())
        .await?
        .map(|details| details.task.status());
    ensure!(untouched == Some(MirrorTaskStatus::Queued));
    let mirror = repository.mirror(MIRROR)?;
    ensure!(mirror.and_then(|found| found.current_task_id) == Some(replacement.id()));

    let next = scheduler.claim_next(&[]).await?;
    ensure!(next.id() == replacement.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failures_escalate_to_fatal_once_retries_run_out(
    repository: InMemoryMirrorTaskRepository,
) -> eyre::Result<()> {
    let scheduler = scheduler_for(&repository).with_retry_policy(RetryPolicy::new(2));
    let mut current = scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Medium))
        .await?;

    for attempt in 1..=2_u32 {
        let claimed = scheduler.claim_next(&[]).await?;
        ensure!(claimed.id() == current.id());
        let failed = scheduler
            .record_failure(claimed.id(), format!("attempt {attempt} failed"))
            .await?;
        ensure!(failed.status() == MirrorTaskStatus::RepoSyncFailed);
        ensure!(failed.retry_count() == attempt);
        current = scheduler.requeue(failed.id()).await?;
    }

    let last = scheduler.claim_next(&[]).await?;
    let fatal = scheduler.record_failure(last.id(), "attempt 3 failed").await?;

    ensure!(fatal.status() == MirrorTaskStatus::RepoSyncFatal);
    ensure!(fatal.retry_count() == 3);
    ensure!(scheduler.requeue(fatal.id()).await.is_err());
    ensure!(sync_status_of(&repository)? == RepositorySyncStatus::Failed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lfs_failure_is_reported_from_lfs_step(
    repository: InMemoryMirrorTaskRepository,
) -> eyre::Result<()> {
    let scheduler = scheduler_for(&repository);
    scheduler
        .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Medium))
        .await?;
    let claimed = scheduler.claim_next(&[]).await?;
    scheduler
        .apply_event(claimed.id(), MirrorTaskEvent::Success, SyncReport::new())
        .await?;
    let lfs = scheduler
        .claim_next(&[MirrorTaskStatus::RepoSyncFinished])
        .await?;

    let failed = scheduler.record_failure(lfs.id(), "lfs batch API 502").await?;

    ensure!(failed.status() == MirrorTaskStatus::LfsSyncFailed);
    ensure!(failed.error_message() == Some("lfs batch API 502"));
    ensure!(sync_status_of(&repository)? == RepositorySyncStatus::Failed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reset_returns_crashed_tasks_to_the_queue(
    repository: InMemoryMirrorTaskRepository,
) -> eyre::Result<()> {
    let scheduler = scheduler_for(&repository);
    for raw in 1..=3 {
        scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MirrorId::new(raw), MirrorPriority::Low))
            .await?;
    }
    let crashed = scheduler.claim_next(&[]).await?;
    scheduler.claim_next(&[]).await?;

    let changed = scheduler
        .reset_running(MirrorTaskStatus::RepoSyncStart, MirrorTaskStatus::Queued)
        .await?;
    let nothing_left = scheduler
        .reset_running(MirrorTaskStatus::RepoSyncStart, MirrorTaskStatus::Queued)
        .await?;

    ensure!(changed == 2);
    ensure!(nothing_left == 0);
    let restored = scheduler
        .find(crashed.id())
        .await?
        .map(|details| details.task.status());
    ensure!(restored == Some(MirrorTaskStatus::Queued));
    Ok(())
}
