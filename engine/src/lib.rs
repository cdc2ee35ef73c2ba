//! # Offload Engine - Media Offload Library
//!
//! A headless engine that moves the media of the latest shooting session from a
//! camera card to a backup volume. Designed as the foundation for any front end
//! (CLI, GUI, a volume-mount hook).
//!
//! ## Overview
//!
//! One run goes through these stages:
//! - Scan the source volume for video and photo files
//! - Select the files of the latest session (time window or fixed count)
//! - Index what the destination archive already holds
//! - Skip files already transferred, matched by name and size
//! - Copy the rest, oldest first, into a new timestamped session folder
//! - Report progress on a fixed tick and finish with a summary
//!
//! ## Basic Usage
//!
//! ```no_run
//! use offload_engine::{execute_transfer, MemoryLog, TransferOutcome, TransferSettings, Volume};
//!
//! let volumes = vec![
//!     Volume::new("/media/CARD", "CARD"),
//!     Volume::new("/media/BACKUP", "BACKUP"),
//! ];
//! let mut settings = TransferSettings::default();
//! let log = MemoryLog::new();
//!
//! match execute_transfer(&volumes, &mut settings, &log, None) {
//!     TransferOutcome::Completed(summary) => println!("{}", summary),
//!     TransferOutcome::NoWork(reason) => println!("{}", reason),
//!     TransferOutcome::Failed(message) => eprintln!("{}", message),
//! }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (MediaFile, TransferJob, TransferPlan, outcomes)
//! - **error**: Error types and handling
//! - **classify**: Extension sets and media categories
//! - **selection**: Session selection policies
//! - **index**: Index of files already on the destination
//! - **planner**: Deduplication and target naming
//! - **fs_ops**: Low-level filesystem operations
//! - **progress**: Progress counters, snapshots and the reporter thread
//! - **journal**: Run log sinks
//! - **config**: User settings
//! - **job**: Job orchestration (create, plan, run)

pub mod model;
pub mod error;
pub mod classify;
pub mod selection;
pub mod index;
pub mod planner;
pub mod fs_ops;
pub mod progress;
pub mod journal;
pub mod config;
pub mod job;

// Re-export main types and functions
pub use model::{
    CategoryCounts, EnabledCategories, IdentityKey, MediaCategory, MediaFile, NoWorkReason,
    RunState, TransferJob, TransferOutcome, TransferPlan, TransferSummary, Volume, VolumePair,
};
pub use error::EngineError;
pub use classify::{ExtensionSet, MediaClassifier};
pub use selection::SelectionPolicy;
pub use index::DestinationIndex;
pub use config::{SelectionMode, TransferSettings};
pub use job::{create_job, execute_transfer, plan_job, run_job};
pub use journal::{LogSink, MemoryLog, NullLog};
pub use progress::{ProgressCallback, ProgressSnapshot, TransferProgress};
