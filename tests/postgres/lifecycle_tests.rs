//! `PostgreSQL` task lifecycles, replacement and listings.

use super::cluster::ROLLBACK_PROJECTIONS_SQL;
use super::helpers::{PreparedRepo, prepared_repo, repository_for};
use diesel::connection::SimpleConnection;
use eyre::{OptionExt, ensure};
use mirror_tasks::mirror_task::{
    domain::{
        MirrorId, MirrorPriority, MirrorTaskEvent, MirrorTaskStatus, PageRequest,
        RepositorySyncStatus, SyncReport,
    },
    ports::{MirrorTaskRepository, MirrorTaskRepositoryError},
    services::{EnqueueMirrorTaskRequest, MirrorSchedulerError},
};
use mockable::DefaultClock;
use rstest::rstest;

const MIRROR: MirrorId = MirrorId::new(1);

async fn sync_status(ctx: &PreparedRepo) -> eyre::Result<Option<RepositorySyncStatus>> {
    Ok(ctx
        .repo
        .repository(repository_for(MIRROR))
        .await?
        .map(|found| found.sync_status))
}

#[rstest]
fn postgres_full_sync_updates_task_and_repository(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.block_on(async {
        let scheduler = &ctx.scheduler;
        scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::High).with_payload("{}"))
            .await?;

        let repo_step = scheduler.claim_next(&[]).await?;
        scheduler
            .apply_event(
                repo_step.id(),
                MirrorTaskEvent::Success,
                SyncReport::new()
                    .with_progress(50)
                    .with_after_last_commit_id("deadbeef"),
            )
            .await?;
        ensure!(sync_status(&ctx).await? == Some(RepositorySyncStatus::InProgress));

        let lfs_step = scheduler
            .claim_next(&[MirrorTaskStatus::RepoSyncFinished])
            .await?;
        ensure!(lfs_step.status() == MirrorTaskStatus::LfsSyncStart);
        scheduler
            .apply_event(
                lfs_step.id(),
                MirrorTaskEvent::Success,
                SyncReport::new().with_progress(100),
            )
            .await?;

        let stored = scheduler
            .find(repo_step.id())
            .await?
            .map(|details| details.task)
            .ok_or_eyre("task should still exist")?;
        ensure!(stored.status() == MirrorTaskStatus::LfsSyncFinished);
        ensure!(stored.progress() == 100);
        ensure!(stored.after_last_commit_id() == Some("deadbeef"));
        ensure!(stored.payload() == Some("{}"));
        ensure!(stored.finished_at().is_some());
        ensure!(sync_status(&ctx).await? == Some(RepositorySyncStatus::Completed));
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn postgres_replacement_cancels_outstanding_tasks(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.block_on(async {
        let scheduler = &ctx.scheduler;
        let first = scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Low))
            .await?;
        let running = scheduler.claim_next(&[]).await?;
        ensure!(running.id() == first.id());

        let replacement = scheduler
            .enqueue_replacing(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Asap))
            .await?;

        ensure!(!scheduler.is_active(first.id()).await?);
        let stale_report = scheduler
            .apply_event(first.id(), MirrorTaskEvent::Success, SyncReport::new())
            .await;
        ensure!(matches!(stale_report, Err(MirrorSchedulerError::Domain(_))));
        let mirror = ctx.repo.mirror(MIRROR).await?;
        ensure!(mirror.and_then(|found| found.current_task_id) == Some(replacement.id()));
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn postgres_failure_requeue_and_reset(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.block_on(async {
        let scheduler = &ctx.scheduler;
        scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Medium))
            .await?;
        let claimed = scheduler.claim_next(&[]).await?;

        let failed = scheduler.record_failure(claimed.id(), "early EOF").await?;
        ensure!(failed.status() == MirrorTaskStatus::RepoSyncFailed);
        ensure!(sync_status(&ctx).await? == Some(RepositorySyncStatus::Failed));

        let retry = scheduler.requeue(failed.id()).await?;
        ensure!(retry.retry_count() == 1);
        let reclaimed = scheduler.claim_next(&[]).await?;
        let started_at = reclaimed.started_at();

        let changed = scheduler
            .reset_running(MirrorTaskStatus::RepoSyncStart, MirrorTaskStatus::Queued)
            .await?;
        ensure!(changed == 1);
        let queued = scheduler
            .list(&[MirrorTaskStatus::Queued], PageRequest::new(10, 1)?)
            .await?;
        ensure!(queued.len() == 1);
        let listed = queued.first().ok_or_eyre("listing should contain the retry")?;
        ensure!(listed.task.id() == retry.id());
        ensure!(listed.task.started_at() == started_at);
        ensure!(listed.task.finished_at().is_none());
        ensure!(
            listed.repository.as_ref().map(|repo| repo.path.as_str()) == Some("group/project-1")
        );

        let unchanged = scheduler
            .reset_running(MirrorTaskStatus::RepoSyncStart, MirrorTaskStatus::Queued)
            .await?;
        ensure!(unchanged == 0);
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn postgres_stale_status_write_is_rejected(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.block_on(async {
        let scheduler = &ctx.scheduler;
        scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::High))
            .await?;
        let claimed = scheduler.claim_next(&[]).await?;
        let mut finished = claimed.clone();
        finished.apply(MirrorTaskEvent::Success, &DefaultClock)?;
        scheduler.record_failure(claimed.id(), "remote hung up").await?;

        let result = ctx
            .repo
            .update_status_and_repo_sync_status(
                &finished,
                MirrorTaskStatus::RepoSyncStart,
                RepositorySyncStatus::InProgress,
            )
            .await;

        ensure!(
            matches!(
                result,
                Err(MirrorTaskRepositoryError::StatusConflict {
                    expected: MirrorTaskStatus::RepoSyncStart,
                    actual: MirrorTaskStatus::RepoSyncFailed,
                    ..
                })
            ),
            "expected a status conflict, got {result:?}"
        );
        let stored = scheduler
            .find(claimed.id())
            .await?
            .map(|details| details.task)
            .ok_or_eyre("task should still exist")?;
        ensure!(stored.status() == MirrorTaskStatus::RepoSyncFailed);
        ensure!(stored.error_message() == Some("remote hung up"));
        ensure!(sync_status(&ctx).await? == Some(RepositorySyncStatus::Failed));
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn postgres_projection_rollback_keeps_platform_rows(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.temp_db.connect()?.batch_execute(ROLLBACK_PROJECTIONS_SQL)?;

    ctx.block_on(async {
        let mirror = ctx.repo.mirror(MIRROR).await?.ok_or_eyre("mirror should survive")?;
        ensure!(mirror.repository_id == repository_for(MIRROR));
        ensure!(sync_status(&ctx).await?.is_some());
        let task = ctx
            .scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Low))
            .await?;
        ensure!(ctx.scheduler.find(task.id()).await?.is_some());
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn postgres_delete_and_lookup_missing(
    prepared_repo: eyre::Result<PreparedRepo>,
) -> eyre::Result<()> {
    let ctx = prepared_repo?;
    ctx.block_on(async {
        let scheduler = &ctx.scheduler;
        let task = scheduler
            .enqueue(EnqueueMirrorTaskRequest::new(MIRROR, MirrorPriority::Low))
            .await?;

        scheduler.delete(task.id()).await?;
        let again = scheduler.delete(task.id()).await;

        ensure!(matches!(
            again,
            Err(MirrorSchedulerError::Repository(MirrorTaskRepositoryError::NotFound(_)))
        ));
        ensure!(scheduler.find(task.id()).await?.is_none());
        ensure!(scheduler.find_latest_for_mirror(MIRROR).await?.is_none());
        Ok::<(), eyre::Report>(())
    })
}
