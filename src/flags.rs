//! Persistent-flag synchronization
//!
//! Flag entities normally commit to the shared table only when their
//! container is torn down, and read it only once at startup. Capture and
//! restore both need the two sides to agree at a moment of their choosing.

use crate::host::World;

/// Make every live flag entity commit its value to the table now.
///
/// Returns the number of entities committed.
pub fn force_sync(world: &dyn World) -> usize {
    let flags = world.flag_entities();
    for flag in &flags {
        flag.commit();
    }
    tracing::debug!(count = flags.len(), "Forced persistent flag commit");
    flags.len()
}

/// Make every live flag entity re-read its value from the table.
///
/// Needed after the table was overwritten, since each entity already read
/// the table once when its container started. Returns the number of
/// entities refreshed.
pub fn apply_from_table(world: &dyn World) -> usize {
    let flags = world.flag_entities();
    for flag in &flags {
        flag.refresh();
    }
    tracing::debug!(count = flags.len(), "Refreshed persistent flags from table");
    flags.len()
}
