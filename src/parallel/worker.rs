//! Worker thread for parallel processing
//!
//! Contains the loop that turns queued jobs into file outcomes.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

use crate::ingest::ingest_file;
use crate::logging::Logger;

use super::types::{FileOutcome, Job};

/// Worker thread: processes files until the job queue is closed and empty
pub(crate) fn worker_thread(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    outcome_sender: Sender<FileOutcome>,
    logger: Arc<dyn Logger>,
) {
    let mut handled = 0usize;

    for job in job_receiver.iter() {
        logger.debug(format_args!(
            "[{}] worker {} picked up {}",
            job.index,
            worker_id,
            job.path.display()
        ));

        let outcome = ingest_file(&job, logger.as_ref());
        handled += 1;

        if outcome_sender.send(outcome).is_err() {
            // Collector is gone; nobody will read further outcomes
            break;
        }
    }

    logger.debug(format_args!(
        "worker {} exiting after {} files",
        worker_id, handled
    ));
}
