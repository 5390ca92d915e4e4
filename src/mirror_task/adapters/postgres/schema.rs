//! Diesel schema for mirror task persistence.

diesel::table! {
    /// One row per mirror sync attempt.
    mirror_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning mirror.
        mirror_id -> Int8,
        /// Lifecycle status.
        #[max_length = 32]
        status -> Varchar,
        /// Dispatch priority.
        priority -> Int4,
        /// Failed attempts recorded so far.
        retry_count -> Int4,
        /// Last failure description.
        error_message -> Nullable<Text>,
        /// Caller-owned payload.
        payload -> Nullable<Text>,
        /// Commit watermark before the sync.
        #[max_length = 255]
        before_last_commit_id -> Nullable<Varchar>,
        /// Commit watermark after the sync.
        #[max_length = 255]
        after_last_commit_id -> Nullable<Varchar>,
        /// Worker-reported progress.
        progress -> Int4,
        /// First claim timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Terminal status timestamp.
        finished_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Projection of the platform's mirror records.
    mirrors (id) {
        /// Mirror identifier.
        id -> Int8,
        /// Hosted repository receiving the mirrored content.
        repository_id -> Int8,
        /// Upstream clone URL.
        source_url -> Text,
        /// Path of the hosted repository.
        local_repo_path -> Text,
        /// Task most recently claimed or created for this mirror.
        current_task_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    /// Projection of the platform's hosted repository records.
    repositories (id) {
        /// Repository identifier.
        id -> Int8,
        /// `namespace/name` path.
        path -> Text,
        /// Sync status shown on the repository page.
        #[max_length = 32]
        sync_status -> Varchar,
    }
}

diesel::joinable!(mirror_tasks -> mirrors (mirror_id));
diesel::joinable!(mirrors -> repositories (repository_id));
diesel::allow_tables_to_appear_in_same_query!(mirror_tasks, mirrors, repositories);
