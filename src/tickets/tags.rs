use log::{debug, info};
use std::collections::BTreeSet;

use super::error::HelpdeskResult;
use super::models::{TagId, Ticket};
use super::store::TicketStore;

/// Tags a ticket may carry: its category's tags plus the free tags it is
/// already linked to.
pub fn valid_tag_ids<S: TicketStore>(store: &mut S, ticket: &Ticket) -> HelpdeskResult<BTreeSet<TagId>> {
    let mut valid: BTreeSet<TagId> = store
        .category_tags(ticket.category_id)?
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    valid.extend(store.free_tag_ids(ticket.id)?);
    Ok(valid)
}

/// Replaces the ticket's tag links with the valid subset of `requested` and
/// purges orphaned tags. Returns the applied set.
pub fn reconcile<S: TicketStore>(
    store: &mut S,
    ticket: &Ticket,
    requested: &[TagId],
) -> HelpdeskResult<BTreeSet<TagId>> {
    let valid = valid_tag_ids(store, ticket)?;
    let applied: BTreeSet<TagId> = requested
        .iter()
        .copied()
        .filter(|id| valid.contains(id))
        .collect();

    if applied.len() < requested.len() {
        debug!(
            "Ticket {}: dropped tags {:?} outside {:?}",
            ticket.id,
            requested
                .iter()
                .filter(|id| !applied.contains(id))
                .collect::<Vec<_>>(),
            valid
        );
    }

    store.replace_ticket_tags(ticket.id, &applied)?;
    purge(store)?;
    Ok(applied)
}

pub fn purge<S: TicketStore>(store: &mut S) -> HelpdeskResult<usize> {
    let purged = store.purge_orphan_tags()?;
    if purged > 0 {
        info!("Purged {} orphan tag(s)", purged);
    }
    Ok(purged)
}
