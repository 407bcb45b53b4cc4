//! Cart synchronization engine and observable state.
//!
//! [`CartService`] owns the one canonical in-memory cart for the session.
//! Mutations update that state synchronously, publish to subscribers, and
//! schedule persistence in the background; callers never wait on the network
//! and mutation methods never fail.
//!
//! # Persistence
//!
//! Each persist cycle routes by authentication status: anonymous carts are
//! serialized to the local store under `cart_v1`, authenticated carts replace
//! the server-side cart wholesale (existence check first - the wire contract
//! has no upsert). Writes run on a single background writer draining a
//! coalescing channel, so at most one persist is in flight and rapid
//! successive edits collapse into the latest snapshot.
//!
//! # Merge on login
//!
//! [`CartService::sync_with_server`] runs exactly once per login transition:
//! it joins the local snapshot with the fetched remote cart, merges
//! remote-wins by product id, persists the result, and adopts it as the new
//! state. Failures are logged and swallowed - login never blocks on cart
//! sync.

pub mod merge;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};
use tracing::{debug, instrument, warn};

use bramble_market_core::{CartLineItem, ProductId, UserId, cart_item_count, cart_subtotal};

use crate::auth::AuthSession;
use crate::gateway::{CartGateway, GatewayError, RemoteCart};
use crate::store::{LocalStore, keys};

pub use merge::merge_remote_wins;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// The cart synchronization engine.
///
/// Cheaply cloneable handle; all clones share one canonical state. State is
/// only ever mutated through these methods - consumers read it through the
/// snapshot getters or the subscriptions.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// background persistence writer.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    auth: AuthSession,
    gateway: CartGateway,
    store: LocalStore,
    items: Mutex<Vec<CartLineItem>>,
    items_tx: watch::Sender<Vec<CartLineItem>>,
    total_tx: watch::Sender<Decimal>,
    changes_tx: broadcast::Sender<()>,
    // Serialized write queue: mutations bump `pending`, the writer persists
    // the latest snapshot and advances `completed`. Later snapshots
    // supersede earlier ones.
    pending_tx: watch::Sender<u64>,
    completed_tx: watch::Sender<u64>,
}

impl CartService {
    /// Create the engine over its collaborators and start the writer task.
    #[must_use]
    pub fn new(auth: AuthSession, gateway: CartGateway, store: LocalStore) -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let inner = Arc::new(CartServiceInner {
            auth,
            gateway,
            store,
            items: Mutex::new(Vec::new()),
            items_tx: watch::Sender::new(Vec::new()),
            total_tx: watch::Sender::new(Decimal::ZERO),
            changes_tx,
            pending_tx: watch::Sender::new(0),
            completed_tx: watch::Sender::new(0),
        });
        spawn_writer(&inner);
        Self { inner }
    }

    /// Rehydrate state on application start: fetch-and-merge for a logged-in
    /// user, local storage for an anonymous one.
    pub async fn init(&self) {
        if self.inner.auth.has_valid_token() {
            self.sync_with_server().await;
        } else {
            self.load_local();
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product to the cart.
    ///
    /// An existing line for the product accumulates quantity; otherwise a
    /// new line is appended at the caller-supplied price (the catalog source
    /// is the trust boundary - no validation here).
    pub fn add_item(&self, product_id: ProductId, price: Decimal, quantity: u32) {
        // A zero-quantity add would violate the quantity >= 1 invariant.
        if quantity == 0 {
            return;
        }
        let updated = {
            let items = self.lock_items();
            let mut updated = items.clone();
            match updated.iter_mut().find(|l| l.product_id == product_id) {
                Some(line) => line.quantity += quantity,
                None => updated.push(CartLineItem::new(product_id, quantity, price)),
            }
            updated
        };
        self.commit(updated);
    }

    /// Replace a line's quantity.
    ///
    /// A quantity of zero delegates to removal. Unknown products are
    /// silently ignored.
    pub fn update_quantity(&self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove_item(product_id);
            return;
        }
        let updated = {
            let items = self.lock_items();
            if !items.iter().any(|l| l.product_id == product_id) {
                return;
            }
            let mut updated = items.clone();
            for line in &mut updated {
                if line.product_id == product_id {
                    line.quantity = quantity;
                }
            }
            updated
        };
        self.commit(updated);
    }

    /// Remove a product's line. Removing an absent product is a no-op.
    pub fn remove_item(&self, product_id: ProductId) {
        let updated = {
            let items = self.lock_items();
            if !items.iter().any(|l| l.product_id == product_id) {
                return;
            }
            items
                .iter()
                .filter(|l| l.product_id != product_id)
                .cloned()
                .collect()
        };
        self.commit(updated);
    }

    /// Empty the cart and drop the local persisted copy.
    ///
    /// The remote cart converges through the normal persist cycle when a
    /// session is active; no dedicated remote delete is issued.
    pub fn clear(&self) {
        self.commit(Vec::new());
        self.inner.store.remove(keys::CART);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the current line items.
    #[must_use]
    pub fn current_items(&self) -> Vec<CartLineItem> {
        self.lock_items().clone()
    }

    /// Current derived total: `round(Σ(priceAtPurchase × quantity), 2)`.
    #[must_use]
    pub fn current_total(&self) -> Decimal {
        cart_subtotal(&self.lock_items())
    }

    /// Total unit count across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        cart_item_count(&self.lock_items())
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn get_item(&self, product_id: ProductId) -> Option<CartLineItem> {
        self.lock_items()
            .iter()
            .find(|l| l.product_id == product_id)
            .cloned()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Observable line items. Replays the latest value to new subscribers.
    #[must_use]
    pub fn subscribe_items(&self) -> watch::Receiver<Vec<CartLineItem>> {
        self.inner.items_tx.subscribe()
    }

    /// Observable derived total. Replays the latest value to new subscribers.
    #[must_use]
    pub fn subscribe_total(&self) -> watch::Receiver<Decimal> {
        self.inner.total_tx.subscribe()
    }

    /// Fire-and-forget change events, no payload and no replay; subscribers
    /// re-read current state on receipt.
    #[must_use]
    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.inner.changes_tx.subscribe()
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Reconcile the in-memory cart with the server after login.
    ///
    /// Remote-wins merge by product id; any failure is logged and swallowed
    /// so login completion is never blocked.
    #[instrument(skip(self))]
    pub async fn sync_with_server(&self) {
        if !self.inner.auth.has_valid_token() {
            return;
        }
        let (Ok(user_id), Some(token)) = (self.inner.auth.user_id(), self.inner.auth.token())
        else {
            return;
        };

        // Local snapshot is taken before the remote fetch resolves; both
        // sides are in hand before the merge step runs.
        let local = self.current_items();
        let remote = match self
            .inner
            .gateway
            .fetch_cart(user_id, token.expose_secret())
            .await
        {
            Ok(Some(cart)) => cart.into_items(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Cart fetch during sync failed; assuming empty server cart");
                Vec::new()
            }
        };

        let merged = merge_remote_wins(&local, &remote);
        match CartServiceInner::save_remote(&self.inner, user_id, &token, &merged).await {
            Ok(saved) => {
                // The merged state was just persisted; publish without
                // scheduling another write.
                self.adopt_synced(saved.into_items());
            }
            Err(e) => {
                warn!(error = %e, "Cart sync failed");
                if matches!(e, GatewayError::Unauthorized) {
                    self.inner.auth.logout();
                }
            }
        }
    }

    /// Wait until every scheduled persist cycle has completed.
    ///
    /// Mutations stay fire-and-forget; this exists for one-shot callers
    /// (the CLI) and tests that need quiescence before exiting.
    pub async fn flush(&self) {
        let target = *self.inner.pending_tx.borrow();
        let mut completed = self.inner.completed_tx.subscribe();
        let _ = completed.wait_for(|done| *done >= target).await;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock_items(&self) -> MutexGuard<'_, Vec<CartLineItem>> {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the replay-latest signals in their guaranteed order:
    /// line items first, derived total second.
    fn publish(&self, items: &[CartLineItem]) {
        self.inner.items_tx.send_replace(items.to_vec());
        self.inner.total_tx.send_replace(cart_subtotal(items));
    }

    /// Apply a mutation: state, items, total, change event, persist.
    fn commit(&self, items: Vec<CartLineItem>) {
        *self.lock_items() = items.clone();
        self.publish(&items);
        let _ = self.inner.changes_tx.send(());
        self.inner.pending_tx.send_modify(|generation| *generation += 1);
    }

    /// Adopt already-persisted state: publish and notify, no write cycle.
    fn adopt_synced(&self, items: Vec<CartLineItem>) {
        *self.lock_items() = items.clone();
        self.publish(&items);
        let _ = self.inner.changes_tx.send(());
    }

    /// Rehydrate from the local store without firing a change event or a
    /// persist cycle.
    fn load_local(&self) {
        if let Some(items) = self.inner.store.get_json::<Vec<CartLineItem>>(keys::CART) {
            *self.lock_items() = items.clone();
            self.publish(&items);
        }
    }
}

impl CartServiceInner {
    /// One persist cycle for the given snapshot, routed by auth status.
    /// Failures degrade: the in-memory view stays authoritative.
    async fn persist(inner: &Arc<Self>, items: Vec<CartLineItem>) {
        if inner.auth.has_valid_token() {
            let (Ok(user_id), Some(token)) = (inner.auth.user_id(), inner.auth.token()) else {
                return;
            };
            match Self::save_remote(inner, user_id, &token, &items).await {
                Ok(_) => debug!(lines = items.len(), "Cart persisted to server"),
                Err(e) => {
                    warn!(error = %e, "Cart persist to server failed");
                    // A rejected credential ends the session.
                    if matches!(e, GatewayError::Unauthorized) {
                        inner.auth.logout();
                    }
                }
            }
        } else if items.is_empty() {
            // An empty anonymous cart keeps no stored copy.
            inner.store.remove(keys::CART);
        } else if let Err(e) = inner.store.set_json(keys::CART, &items) {
            warn!(error = %e, "Failed to write local cart");
        }
    }

    /// Persist to the server: existence check, then create or full replace.
    ///
    /// A failed check is treated as "no cart yet" and routed to create,
    /// matching the empty-cart degradation used everywhere else.
    async fn save_remote(
        inner: &Arc<Self>,
        user_id: UserId,
        token: &SecretString,
        items: &[CartLineItem],
    ) -> Result<RemoteCart, GatewayError> {
        let token = token.expose_secret();
        let existing = match inner.gateway.fetch_cart(user_id, token).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "Pre-persist cart fetch failed; treating as no cart yet");
                None
            }
        };

        if existing.is_some() {
            inner.gateway.replace_cart(user_id, items, token).await
        } else {
            inner.gateway.create_cart(user_id, items, token).await
        }
    }
}

/// Start the background writer: one in-flight persist at a time, draining a
/// coalescing channel so later snapshots supersede earlier ones.
fn spawn_writer(inner: &Arc<CartServiceInner>) {
    let weak = Arc::downgrade(inner);
    let mut pending = inner.pending_tx.subscribe();
    tokio::spawn(async move {
        while pending.changed().await.is_ok() {
            let generation = *pending.borrow_and_update();
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let snapshot = inner
                .items
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            CartServiceInner::persist(&inner, snapshot).await;
            inner.completed_tx.send_replace(generation);
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn anonymous_service() -> (tempfile::TempDir, CartService, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let http = reqwest::Client::new();
        // Unroutable gateway: anonymous flows must never reach it.
        let base: url::Url = "http://127.0.0.1:9/api".parse().unwrap();
        let auth = AuthSession::new(http.clone(), base.clone(), store.clone());
        let gateway = CartGateway::new(http, base);
        let service = CartService::new(auth, gateway, store.clone());
        (dir, service, store)
    }

    fn price(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_accumulates_by_product() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("19.99"), 1);
        cart.add_item(ProductId::new(1), price("19.99"), 2);
        cart.add_item(ProductId::new(2), price("5.00"), 1);

        let items = cart.current_items();
        assert_eq!(items.len(), 2);
        assert_eq!(cart.get_item(ProductId::new(1)).unwrap().quantity, 3);
        assert_eq!(cart.item_count(), 4);
    }

    #[tokio::test]
    async fn test_add_keeps_first_price_on_merge() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("19.99"), 1);
        // A later add at a different catalog price only bumps quantity;
        // the locked price is untouched until re-sync.
        cart.add_item(ProductId::new(1), price("24.99"), 1);

        let line = cart.get_item(ProductId::new(1)).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price_at_purchase, price("19.99"));
    }

    #[tokio::test]
    async fn test_total_recomputed_after_every_mutation() {
        let (_dir, cart, _store) = anonymous_service();
        let total = cart.subscribe_total();

        cart.add_item(ProductId::new(1), price("19.99"), 2);
        assert_eq!(*total.borrow(), price("39.98"));

        cart.update_quantity(ProductId::new(1), 1);
        assert_eq!(*total.borrow(), price("19.99"));

        cart.remove_item(ProductId::new(1));
        assert_eq!(*total.borrow(), Decimal::ZERO);
        assert_eq!(cart.current_total(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_routes_to_removal() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("10"), 3);
        cart.update_quantity(ProductId::new(1), 0);

        assert!(cart.get_item(ProductId::new(1)).is_none());
        assert!(cart.current_items().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_product_is_silent_noop() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("10"), 1);
        let mut changes = cart.subscribe_changes();
        cart.update_quantity(ProductId::new(99), 5);

        assert_eq!(cart.item_count(), 1);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_absent_is_idempotent() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("10"), 1);
        let before = cart.current_items();
        let mut changes = cart.subscribe_changes();

        cart.remove_item(ProductId::new(42));
        assert_eq!(cart.current_items(), before);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mutation_emits_items_total_and_change() {
        let (_dir, cart, _store) = anonymous_service();
        let mut items = cart.subscribe_items();
        let mut total = cart.subscribe_total();
        let mut changes = cart.subscribe_changes();

        cart.add_item(ProductId::new(1), price("19.99"), 1);

        assert!(items.has_changed().unwrap());
        assert!(total.has_changed().unwrap());
        assert_eq!(items.borrow_and_update().len(), 1);
        assert_eq!(*total.borrow_and_update(), price("19.99"));
        assert!(changes.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_replay_latest_to_new_subscribers() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("19.99"), 2);

        // Subscribed after the mutation, still sees the current value.
        let items = cart.subscribe_items();
        let total = cart.subscribe_total();
        assert_eq!(items.borrow().len(), 1);
        assert_eq!(*total.borrow(), price("39.98"));
    }

    #[tokio::test]
    async fn test_anonymous_mutations_persist_locally() {
        let (_dir, cart, store) = anonymous_service();
        cart.add_item(ProductId::new(101), price("19.99"), 1);
        cart.flush().await;

        let persisted: Vec<CartLineItem> = store.get_json(keys::CART).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].product_id, ProductId::new(101));
    }

    #[tokio::test]
    async fn test_rapid_mutations_coalesce_to_latest() {
        let (_dir, cart, store) = anonymous_service();
        for quantity in 1..=20 {
            cart.update_quantity(ProductId::new(1), quantity);
            if quantity == 1 {
                cart.add_item(ProductId::new(1), price("2.50"), 1);
            }
        }
        cart.flush().await;

        let persisted: Vec<CartLineItem> = store.get_json(keys::CART).unwrap();
        assert_eq!(persisted[0].quantity, cart.get_item(ProductId::new(1)).unwrap().quantity);
    }

    #[tokio::test]
    async fn test_clear_removes_local_copy() {
        let (_dir, cart, store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("10"), 1);
        cart.flush().await;
        assert!(store.contains(keys::CART));

        cart.clear();
        cart.flush().await;
        assert!(cart.current_items().is_empty());
        assert!(!store.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_init_rehydrates_local_cart() {
        let (_dir, cart, store) = anonymous_service();
        cart.add_item(ProductId::new(7), price("3.25"), 4);
        cart.flush().await;

        // A fresh session over the same store sees the persisted cart.
        let http = reqwest::Client::new();
        let base: url::Url = "http://127.0.0.1:9/api".parse().unwrap();
        let auth = AuthSession::new(http.clone(), base.clone(), store.clone());
        let fresh = CartService::new(auth, CartGateway::new(http, base), store);
        let mut changes = fresh.subscribe_changes();
        fresh.init().await;

        assert_eq!(fresh.item_count(), 4);
        assert_eq!(fresh.current_total(), price("13.00"));
        // Rehydration is not a mutation: no change event fires.
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_init_discards_corrupt_local_cart() {
        let (_dir, cart, store) = anonymous_service();
        store.set_raw(keys::CART, "{definitely not json").unwrap();
        cart.init().await;

        assert!(cart.current_items().is_empty());
        assert!(!store.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_zero_quantity_add_is_rejected() {
        let (_dir, cart, _store) = anonymous_service();
        cart.add_item(ProductId::new(1), price("10"), 0);
        assert!(cart.current_items().is_empty());
    }
}
