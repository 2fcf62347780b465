use crate::gps::FixMailbox;

/// Latest GPS fix, written by the GPS task and read by the uplink job.
///
/// This is the only state shared between tasks. Counters and scheduler state
/// are owned by the tracker task.
pub static FIX: FixMailbox = FixMailbox::new();
