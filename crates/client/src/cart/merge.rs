//! Local/remote cart reconciliation.

use bramble_market_core::CartLineItem;

/// Merge a local (anonymous) cart with the server-side cart, remote-wins.
///
/// The merged set is every remote line unchanged, followed by the local
/// lines whose product does not already appear remotely. A local line that
/// collides with a remote line is discarded wholesale - quantities are never
/// summed across the two sources. This avoids double-counting items the user
/// already committed while logged in elsewhere, at the cost of dropping
/// anonymous-session additions for already-owned products.
#[must_use]
pub fn merge_remote_wins(local: &[CartLineItem], remote: &[CartLineItem]) -> Vec<CartLineItem> {
    let mut merged: Vec<CartLineItem> = remote.to_vec();
    merged.extend(
        local
            .iter()
            .filter(|line| !remote.iter().any(|r| r.product_id == line.product_id))
            .cloned(),
    );
    merged
}
