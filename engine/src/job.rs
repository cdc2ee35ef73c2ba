//! Job orchestration module.
//!
//! This module provides the run lifecycle:
//! - Creating a job for a source and destination volume
//! - Planning a job (scan, select, index, plan)
//! - Running a job (create the session folder, copy, summarize)
//! - `execute_transfer`, which does all of the above and folds every ending
//!   into a `TransferOutcome`
//!
//! Files are copied one at a time, oldest first. The first copy fault ends the
//! run; nothing after it is attempted.

use chrono::Local;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::classify::MediaClassifier;
use crate::config::TransferSettings;
use crate::error::EngineError;
use crate::fs_ops;
use crate::index::DestinationIndex;
use crate::journal::{LogSink, RunLog};
use crate::model::{
    CategoryCounts, MediaCategory, NoWorkReason, RunState, TransferJob, TransferOutcome,
    TransferPlan, TransferSummary, Volume, VolumePair, SESSION_STAMP_FORMAT,
};
use crate::planner;
use crate::progress::{
    format_bytes, format_duration, ProgressCallback, ProgressTracker, TransferProgress,
    TICK_INTERVAL,
};
use crate::selection::SelectionPolicy;

/// Create a new transfer job in the `Idle` state.
///
/// # Errors
/// Returns `InvalidPath` if either root is empty or both volumes share a root.
pub fn create_job(
    source: Volume,
    destination: Volume,
    policy: SelectionPolicy,
    classifier: MediaClassifier,
) -> Result<TransferJob, EngineError> {
    for volume in [&source, &destination] {
        if volume.root.as_os_str().is_empty() {
            return Err(EngineError::InvalidPath {
                path: volume.root.clone(),
                reason: format!("Volume '{}' has an empty root path", volume.label),
            });
        }
    }
    if source.root == destination.root {
        return Err(EngineError::InvalidPath {
            path: source.root.clone(),
            reason: "Source and destination are the same volume".to_string(),
        });
    }

    Ok(TransferJob {
        id: Uuid::new_v4(),
        source,
        destination,
        policy,
        classifier,
        state: RunState::Idle,
        plan: None,
        progress: Arc::new(TransferProgress::new()),
        session_folder: None,
        summary: None,
        created_at: Local::now(),
    })
}

/// Plan a job: scan the source, select this session's files, index the
/// destination and build the work list.
///
/// Scan and index faults are logged and treated as empty results. On success
/// the job is left in `Planning` with `job.plan` set; if there is nothing to
/// copy it moves to `NoWork` and the reason is returned.
///
/// # Errors
/// Returns `InvalidState` unless the job is `Idle`.
pub fn plan_job(
    job: &mut TransferJob,
    log: &dyn LogSink,
    callback: Option<&dyn ProgressCallback>,
) -> Result<Option<NoWorkReason>, EngineError> {
    expect_state(job, RunState::Idle)?;
    let log = RunLog::new(log);

    if job.classifier.enabled.is_empty() {
        return Ok(Some(no_work(job, NoWorkReason::NothingEnabled, &log, callback)));
    }

    set_state(job, RunState::Scanning, callback);
    let candidates = match fs_ops::scan_media(&job.source.root, &job.classifier) {
        Ok(files) => files,
        Err(e) => {
            log.warn(format!("Could not scan {}: {}", job.source, describe(&e)));
            Vec::new()
        }
    };
    log.info(format!(
        "Found {} media files on {}",
        candidates.len(),
        job.source
    ));

    set_state(job, RunState::Selecting, callback);
    let selection = job.policy.select(&candidates, &job.classifier);
    log.info(format!(
        "Selected {} files ({} videos, {} photos) by {}",
        selection.files.len(),
        selection.counts.videos,
        selection.counts.photos,
        job.policy
    ));
    if selection.is_empty() {
        return Ok(Some(no_work(job, NoWorkReason::NoMediaFound, &log, callback)));
    }

    set_state(job, RunState::Indexing, callback);
    let index = match DestinationIndex::build(&job.destination.root) {
        Ok(index) => index,
        Err(e) => {
            log.warn(format!(
                "Could not index {}: {}",
                job.archive_root().display(),
                describe(&e)
            ));
            DestinationIndex::default()
        }
    };
    log.info(format!(
        "{} already holds {} transferred files",
        job.destination,
        index.len()
    ));

    set_state(job, RunState::Planning, callback);
    let plan = planner::plan(&selection, &index, &job.classifier);
    for name in &plan.skipped {
        log.info(format!("Skipping {}: already transferred", name));
    }
    if plan.is_empty() {
        return Ok(Some(no_work(job, NoWorkReason::AllAlreadyTransferred, &log, callback)));
    }
    log.info(format!(
        "Planned {} files ({} videos, {} photos, {}), skipping {}",
        plan.to_copy.len(),
        plan.copy_counts.videos,
        plan.copy_counts.photos,
        format_bytes(plan.total_bytes),
        plan.skipped.len()
    ));
    job.plan = Some(plan);

    Ok(None)
}

/// Run a planned job: create the session folder and copy every planned file.
///
/// Progress is published on `job.progress` throughout; when a callback is
/// given, a reporter thread polls it every [`TICK_INTERVAL`] until copying ends.
/// On success the job returns to `Idle` with `job.summary` set.
///
/// # Errors
/// Returns `InvalidState` unless the job is `Planning` with a plan, or the
/// first filesystem error hit while copying; the job is then `Failed`.
pub fn run_job(
    job: &mut TransferJob,
    log: &dyn LogSink,
    callback: Option<&dyn ProgressCallback>,
) -> Result<TransferSummary, EngineError> {
    expect_state(job, RunState::Planning)?;
    let plan = match job.plan.take() {
        Some(plan) => plan,
        None => {
            return Err(EngineError::InvalidState {
                expected: RunState::Planning,
                actual: job.state,
            })
        }
    };
    let log = RunLog::new(log);

    set_state(job, RunState::Copying, callback);
    let started = Instant::now();
    let stamp = Local::now().format(SESSION_STAMP_FORMAT).to_string();
    let session = new_session_folder(&job.archive_root(), &stamp);
    job.session_folder = Some(session.clone());

    let copied = copy_planned(&plan, &session, &job.progress, &log, callback);
    if let Err(e) = copied {
        job.plan = Some(plan);
        set_state(job, RunState::Failed, callback);
        tracing::error!(os_error = ?e.raw_os_error(), "Copy fault in job {}", job.id);
        log.error(format!("Transfer failed: {}", describe(&e)));
        return Err(e);
    }

    set_state(job, RunState::Summarizing, callback);
    let summary = TransferSummary {
        copied: plan.copy_counts,
        skipped: plan.skip_counts,
        oldest: plan.to_copy.iter().map(|p| p.file.modified).min(),
        newest: plan.to_copy.iter().map(|p| p.file.modified).max(),
        total_bytes: job.progress.completed_bytes(),
        elapsed: started.elapsed(),
        destination_folder: session,
    };
    for line in summary.to_string().lines() {
        log.info(line);
    }

    job.plan = Some(plan);
    job.summary = Some(summary.clone());
    set_state(job, RunState::Idle, callback);
    Ok(summary)
}

/// Create the session layout and copy the plan file by file.
fn copy_planned(
    plan: &TransferPlan,
    session: &Path,
    progress: &TransferProgress,
    log: &RunLog<'_>,
    callback: Option<&dyn ProgressCallback>,
) -> Result<(), EngineError> {
    fs_ops::ensure_dir(session)?;
    for category in [MediaCategory::Video, MediaCategory::Photo] {
        if count_of(&plan.copy_counts, category) > 0 {
            if let Some(folder) = category.folder_name() {
                fs_ops::ensure_dir(&session.join(folder))?;
            }
        }
    }
    log.info(format!("Copying into {}", session.display()));

    progress.begin_run(plan.to_copy.len(), plan.total_bytes);
    let total = plan.to_copy.len();
    let copy_all = || -> Result<(), EngineError> {
        for (index, planned) in plan.to_copy.iter().enumerate() {
            let folder = planned.category.folder_name().unwrap_or_default();
            let destination = session.join(folder).join(&planned.target);
            if let Some(parent) = destination.parent() {
                fs_ops::ensure_dir(parent)?;
            }

            progress.begin_file(index, &planned.file.name, planned.file.len);
            log.info(format!(
                "Copying {} of {}: {} ({})",
                index + 1,
                total,
                planned.file.name,
                format_bytes(planned.file.len)
            ));

            let stats = fs_ops::copy_file_streaming(
                &planned.file.path,
                &destination,
                planned.file.len,
                progress,
            )?;
            progress.finish_file();

            log.info(format!(
                "Finished {} in {}",
                planned.target.display(),
                format_duration(stats.elapsed)
            ));
        }
        Ok(())
    };

    match callback {
        Some(callback) => ProgressTracker::run_while(progress, callback, TICK_INTERVAL, copy_all),
        None => copy_all(),
    }
}

/// Pair the candidate volumes, plan and run, folding every ending into an outcome.
///
/// Invalid numeric settings are coerced and written back into `settings`.
/// The callback's `on_finished` is invoked exactly once.
pub fn execute_transfer(
    candidates: &[Volume],
    settings: &mut TransferSettings,
    log: &dyn LogSink,
    callback: Option<&dyn ProgressCallback>,
) -> TransferOutcome {
    let outcome = execute(candidates, settings, log, callback);
    if let Some(callback) = callback {
        callback.on_finished(&outcome);
    }
    outcome
}

fn execute(
    candidates: &[Volume],
    settings: &mut TransferSettings,
    sink: &dyn LogSink,
    callback: Option<&dyn ProgressCallback>,
) -> TransferOutcome {
    let log = RunLog::new(sink);

    let pair = match VolumePair::from_candidates(candidates) {
        Ok(pair) => pair,
        Err(reason) => {
            log.info(format!("Nothing to transfer: {}", reason));
            return TransferOutcome::NoWork(reason);
        }
    };
    for extra in candidates.iter().skip(2) {
        log.info(format!("Ignoring extra volume {}", extra));
    }
    log.info(format!(
        "Transferring from {} to {}",
        pair.source, pair.destination
    ));

    let resolved = settings.resolve_policy();
    if resolved.coerced {
        log.info(format!("Invalid selection setting replaced; using {}", resolved.policy));
    }

    let mut job = match create_job(
        pair.source,
        pair.destination,
        resolved.policy,
        settings.classifier(),
    ) {
        Ok(job) => job,
        Err(e) => {
            log.error(describe(&e));
            return TransferOutcome::Failed(describe(&e));
        }
    };
    log.info(format!(
        "Run {} created at {}",
        job.id,
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    ));

    match plan_job(&mut job, sink, callback) {
        Ok(Some(reason)) => return TransferOutcome::NoWork(reason),
        Ok(None) => {}
        Err(e) => return TransferOutcome::Failed(describe(&e)),
    }

    match run_job(&mut job, sink, callback) {
        Ok(summary) => TransferOutcome::Completed(summary),
        Err(e) => TransferOutcome::Failed(describe(&e)),
    }
}

/// Error message followed by its chain of causes.
fn describe(error: &EngineError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn count_of(counts: &CategoryCounts, category: MediaCategory) -> usize {
    match category {
        MediaCategory::Video => counts.videos,
        MediaCategory::Photo => counts.photos,
        MediaCategory::None => 0,
    }
}

fn expect_state(job: &TransferJob, expected: RunState) -> Result<(), EngineError> {
    if job.state == expected {
        Ok(())
    } else {
        Err(EngineError::InvalidState {
            expected,
            actual: job.state,
        })
    }
}

fn set_state(job: &mut TransferJob, state: RunState, callback: Option<&dyn ProgressCallback>) {
    tracing::debug!("Job {} -> {}", job.id, state);
    job.state = state;
    if let Some(callback) = callback {
        callback.on_state_changed(state);
    }
}

fn no_work(
    job: &mut TransferJob,
    reason: NoWorkReason,
    log: &RunLog<'_>,
    callback: Option<&dyn ProgressCallback>,
) -> NoWorkReason {
    log.info(format!("Nothing to transfer: {}", reason));
    set_state(job, RunState::NoWork, callback);
    reason
}

/// `<archive>/<stamp>`, or `<stamp>_N` if an earlier run in the same second
/// already took that folder.
fn new_session_folder(archive: &Path, stamp: &str) -> PathBuf {
    let mut folder = archive.join(stamp);
    let mut n = 1;
    while folder.exists() {
        folder = archive.join(format!("{}_{}", stamp, n));
        n += 1;
    }
    folder
}
