//! Order lifecycle service.
//!
//! Wraps the pure transition rules with the authoritative machinery: atomic
//! occupancy re-check at creation, per-order serialization of transitions,
//! payment-event idempotency, expiry, and state-change notifications.
//!
//! Concurrency model: all transitions on one order run under that order's
//! async mutex, taken from a registry keyed by order id; distinct orders
//! proceed fully in parallel. `create` does not need an order lock (the order
//! does not exist yet); its race is on tickets, which the inventory resolves
//! atomically.

use crate::error::{CoreError, Result};
use crate::inventory::TicketInventory;
use crate::notify::{OrderNotifier, StateChange};
use crate::order::lifecycle::state_for_payment;
use crate::payment::PaymentNotice;
use crate::selection::{self, Selection};
use crate::store::{OrderRepository, PaymentEventRepository, RaffleCatalog};
use crate::types::{
    BuyerInfo, IngestOutcome, Order, OrderId, OrderState, PaymentEventRecord, PaymentProvider,
    Raffle, RaffleStatus, TicketNumber,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-order mutual exclusion registry.
///
/// Locks are created on first use and kept for the process lifetime; an
/// entry is two pointers, cheap enough to never evict.
#[derive(Default)]
struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    async fn for_order(&self, order_id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(order_id).or_default())
    }
}

/// Checkout request: a finalized selection plus buyer and provider choice.
#[derive(Clone, Debug)]
pub struct CreateOrder {
    /// Raffle being purchased from
    pub raffle_id: crate::types::RaffleId,
    /// Chosen ticket numbers
    pub tickets: Vec<TicketNumber>,
    /// Buyer contact info
    pub buyer: BuyerInfo,
    /// Payment provider the buyer will pay through
    pub provider: PaymentProvider,
    /// Optional promo code
    pub promo_code: Option<String>,
}

/// The authoritative order lifecycle engine.
pub struct OrderService {
    catalog: Arc<dyn RaffleCatalog>,
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn PaymentEventRepository>,
    inventory: Arc<dyn TicketInventory>,
    notifier: Arc<dyn OrderNotifier>,
    expiry_window: Duration,
    locks: OrderLocks,
}

impl OrderService {
    /// Wires the service to its ports. `expiry_window` is how long an order
    /// may sit unpaid before it expires (48 h in production).
    pub fn new(
        catalog: Arc<dyn RaffleCatalog>,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn PaymentEventRepository>,
        inventory: Arc<dyn TicketInventory>,
        notifier: Arc<dyn OrderNotifier>,
        expiry_window: Duration,
    ) -> Self {
        Self {
            catalog,
            orders,
            events,
            inventory,
            notifier,
            expiry_window,
            locks: OrderLocks::default(),
        }
    }

    /// Creates an order from a finalized selection.
    ///
    /// Validates the selection, buyer, and promo; re-checks occupancy and
    /// reserves the tickets atomically against concurrent creates; freezes
    /// the ticket list and price; and enters `pending_payment`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] for violated purchase rules,
    /// [`CoreError::InventoryConflict`] when a ticket was taken since
    /// selection, [`CoreError::NotFound`] for an unknown raffle.
    pub async fn create(&self, request: CreateOrder) -> Result<Order> {
        let raffle = self.require_raffle(request.raffle_id).await?;
        if raffle.status != RaffleStatus::Active {
            return Err(CoreError::Validation(format!(
                "raffle {} is not open for sales",
                raffle.id
            )));
        }

        let selection = Selection::from_tickets(request.tickets)?;
        selection::validate_for_checkout(&selection, &raffle)?;
        request.buyer.validate()?;

        let now = Utc::now();
        let promo = match &request.promo_code {
            Some(code) => Some(
                self.catalog
                    .promo(raffle.id, code)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Validation(format!("promo code {code:?} is not recognized"))
                    })?,
            ),
            None => None,
        };
        let quote = selection::price_for(
            selection.len() as u32,
            raffle.unit_price,
            &raffle.discount_tiers,
            promo.as_ref(),
            now,
        )?;

        let tickets = selection.into_tickets();
        // The occupancy re-check: selection-time availability is advisory
        // only. Reserve claims every number or none.
        self.inventory.reserve(raffle.id, &tickets).await?;

        let id = OrderId::new();
        let order = Order {
            id,
            raffle_id: raffle.id,
            buyer: request.buyer,
            tickets: tickets.clone(),
            subtotal: quote.subtotal,
            discount_percent: quote.discount_percent,
            discount_amount: quote.discount_amount,
            total: quote.total,
            currency: raffle.currency.clone(),
            provider: request.provider,
            state: OrderState::PendingPayment,
            reference: Order::reference_for(id),
            proof_reference: None,
            created_at: now,
            expires_at: now + self.expiry_window,
        };

        if let Err(storage) = self.orders.insert(order.clone()).await {
            // Roll the reservation back so a storage hiccup cannot strand
            // tickets.
            let _ = self.inventory.release(raffle.id, &tickets).await;
            return Err(storage);
        }

        tracing::info!(
            order_id = %order.id,
            raffle_id = %order.raffle_id,
            tickets = order.tickets.len(),
            total = %order.total,
            provider = %order.provider,
            "order created"
        );
        self.notify(&order).await;
        Ok(order)
    }

    /// Attaches a payment proof reference, moving `pending_payment` to
    /// `pending_verification`. Duplicate submissions (any state past
    /// `pending_payment`) are a tolerated no-op returning the current order.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for an unknown order.
    pub async fn attach_proof(&self, order_id: OrderId, proof: String) -> Result<Order> {
        let lock = self.locks.for_order(order_id).await;
        let _guard = lock.lock().await;

        let mut order = self.require_order(order_id).await?;
        if order.state != OrderState::PendingPayment {
            return Ok(order);
        }
        order.state = OrderState::PendingVerification;
        order.proof_reference = Some(proof);
        self.orders.update(order.clone()).await?;
        tracing::info!(order_id = %order.id, "payment proof attached");
        self.notify(&order).await;
        Ok(order)
    }

    /// Applies a canonical payment event to its order: the sole entry point
    /// by which the webhook ingestor advances orders.
    ///
    /// Idempotent on (`provider`, `provider_event_id`): a replay is a no-op
    /// returning the current state and firing no notification. A fresh event
    /// for a terminal order is recorded (`ignored_terminal`) without
    /// transitioning.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] when the claimed order does not exist.
    pub async fn apply_payment_event(
        &self,
        notice: &PaymentNotice,
        payload_hash: String,
    ) -> Result<Order> {
        let lock = self.locks.for_order(notice.order_id).await;
        let _guard = lock.lock().await;

        if let Some(seen) = self
            .events
            .find(notice.provider, &notice.provider_event_id)
            .await?
        {
            tracing::info!(
                order_id = %notice.order_id,
                provider = %notice.provider,
                provider_event_id = %notice.provider_event_id,
                first_seen = %seen.received_at,
                "duplicate payment event acknowledged"
            );
            return self.require_order(notice.order_id).await;
        }

        let mut order = self.require_order(notice.order_id).await?;

        if notice.amount != order.total || notice.currency != order.currency {
            tracing::warn!(
                order_id = %order.id,
                claimed = %notice.amount,
                expected = %order.total,
                "payment event amount differs from order total"
            );
        }

        if order.state.is_terminal() {
            self.record_event(notice, payload_hash, IngestOutcome::IgnoredTerminal)
                .await?;
            tracing::warn!(
                order_id = %order.id,
                state = %order.state,
                status = %notice.status,
                "payment event for terminal order ignored"
            );
            return Ok(order);
        }

        let next = state_for_payment(order.state, notice.status);
        if let Some(next) = next {
            match next {
                OrderState::Completed => {
                    self.inventory
                        .mark_occupied(order.raffle_id, &order.tickets)
                        .await?;
                }
                OrderState::Cancelled => {
                    self.inventory
                        .release(order.raffle_id, &order.tickets)
                        .await?;
                }
                _ => {}
            }
            order.state = next;
            self.orders.update(order.clone()).await?;
        }
        // Record after the transition so a mid-flight failure leaves the
        // event unrecorded and the provider's retry re-applies cleanly.
        self.record_event(notice, payload_hash, IngestOutcome::Applied)
            .await?;

        tracing::info!(
            order_id = %order.id,
            provider = %notice.provider,
            status = %notice.status,
            state = %order.state,
            "payment event applied"
        );
        if next.is_some() {
            self.notify(&order).await;
        }
        Ok(order)
    }

    /// Cancels an open order (buyer- or operator-driven) and releases its
    /// tickets.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] when the order is already terminal,
    /// [`CoreError::NotFound`] for an unknown order.
    pub async fn cancel(&self, order_id: OrderId, reason: &str) -> Result<Order> {
        let lock = self.locks.for_order(order_id).await;
        let _guard = lock.lock().await;

        let mut order = self.require_order(order_id).await?;
        if order.state.is_terminal() {
            return Err(CoreError::Validation(format!(
                "order {order_id} is already {} and cannot be cancelled",
                order.state
            )));
        }
        self.inventory
            .release(order.raffle_id, &order.tickets)
            .await?;
        order.state = OrderState::Cancelled;
        self.orders.update(order.clone()).await?;
        tracing::info!(order_id = %order.id, reason, "order cancelled");
        self.notify(&order).await;
        Ok(order)
    }

    /// Expires an order whose window has elapsed, releasing its tickets.
    /// Returns the order unchanged when it is terminal or not yet due.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for an unknown order.
    pub async fn expire(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<Order> {
        let lock = self.locks.for_order(order_id).await;
        let _guard = lock.lock().await;

        let mut order = self.require_order(order_id).await?;
        if order.state.is_terminal() || now <= order.expires_at {
            return Ok(order);
        }
        self.inventory
            .release(order.raffle_id, &order.tickets)
            .await?;
        order.state = OrderState::Expired;
        self.orders.update(order.clone()).await?;
        tracing::info!(order_id = %order.id, expired_at = %order.expires_at, "order expired");
        self.notify(&order).await;
        Ok(order)
    }

    /// Expires every due order. Returns how many orders transitioned.
    /// Driven by a periodic sweep; timing is "eventually after `expires_at`".
    ///
    /// # Errors
    ///
    /// [`CoreError::Transient`] when the order store cannot be listed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let candidates = self.orders.expired_candidates(now).await?;
        let mut expired = 0;
        for order_id in candidates {
            match self.expire(order_id, now).await {
                Ok(order) if order.state == OrderState::Expired => expired += 1,
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%order_id, %error, "expiry sweep failed for order");
                }
            }
        }
        Ok(expired)
    }

    /// Fetches an order snapshot.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for an unknown order.
    pub async fn get(&self, order_id: OrderId) -> Result<Order> {
        self.require_order(order_id).await
    }

    /// The most recent payment events recorded for an order, newest first.
    ///
    /// # Errors
    ///
    /// [`CoreError::Transient`] on storage failure.
    pub async fn events_for(
        &self,
        order_id: OrderId,
        provider: Option<PaymentProvider>,
        limit: usize,
    ) -> Result<Vec<PaymentEventRecord>> {
        self.events.for_order(order_id, provider, limit).await
    }

    async fn require_raffle(&self, raffle_id: crate::types::RaffleId) -> Result<Raffle> {
        self.catalog
            .raffle(raffle_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: "raffle",
                id: raffle_id.to_string(),
            })
    }

    async fn require_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .find(order_id)
            .await?
            .ok_or_else(|| CoreError::order_not_found(order_id))
    }

    async fn record_event(
        &self,
        notice: &PaymentNotice,
        payload_hash: String,
        outcome: IngestOutcome,
    ) -> Result<()> {
        self.events
            .record(PaymentEventRecord {
                provider: notice.provider,
                provider_event_id: notice.provider_event_id.clone(),
                payload_hash,
                order_id: Some(notice.order_id),
                status: Some(notice.status),
                amount: Some(notice.amount),
                currency: Some(notice.currency.clone()),
                outcome,
                received_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Notification failures are logged, never propagated: delivery is the
    /// dispatcher's concern and must not roll back a committed transition.
    async fn notify(&self, order: &Order) {
        let change = StateChange {
            order_id: order.id,
            new_state: order.state,
            buyer: order.buyer.clone(),
        };
        if let Err(error) = self.notifier.order_state_changed(change).await {
            tracing::warn!(order_id = %order.id, %error, "notification dispatch failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::inventory::MemoryInventory;
    use crate::notify::RecordingNotifier;
    use crate::store::memory::{MemoryCatalog, MemoryOrders, MemoryPaymentEvents, MemorySeeds};
    use crate::testing::{sample_buyer, sample_raffle};
    use crate::types::{Currency, Money, PaymentStatus, PromoCode, RaffleId};

    struct Harness {
        service: Arc<OrderService>,
        notifier: Arc<RecordingNotifier>,
        raffle_id: RaffleId,
    }

    async fn harness() -> Harness {
        harness_with_window(Duration::hours(48)).await
    }

    async fn harness_with_window(window: Duration) -> Harness {
        let raffle = sample_raffle(100);
        let raffle_id = raffle.id;
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_raffle(raffle).await;
        catalog
            .insert_promo(
                raffle_id,
                PromoCode {
                    code: "AMIGOS7".to_string(),
                    percent: 7,
                    valid_from: None,
                    valid_until: None,
                },
            )
            .await;
        let seeds = Arc::new(MemorySeeds::new());
        let inventory = Arc::new(MemoryInventory::new(catalog.clone(), seeds));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = Arc::new(OrderService::new(
            catalog,
            Arc::new(MemoryOrders::new()),
            Arc::new(MemoryPaymentEvents::new()),
            inventory,
            notifier.clone(),
            window,
        ));
        Harness {
            service,
            notifier,
            raffle_id,
        }
    }

    fn nums(values: &[u32]) -> Vec<TicketNumber> {
        values.iter().copied().map(TicketNumber::new).collect()
    }

    fn request(raffle_id: RaffleId, tickets: &[u32]) -> CreateOrder {
        CreateOrder {
            raffle_id,
            tickets: nums(tickets),
            buyer: sample_buyer(),
            provider: PaymentProvider::CryptoPay,
            promo_code: None,
        }
    }

    fn notice(order: &Order, status: PaymentStatus, event_id: &str) -> PaymentNotice {
        PaymentNotice {
            provider: order.provider,
            provider_event_id: event_id.to_string(),
            order_id: order.id,
            status,
            amount: order.total,
            currency: order.currency.clone(),
        }
    }

    #[tokio::test]
    async fn create_freezes_price_and_reserves() {
        let h = harness().await;
        let order = h
            .service
            .create(request(h.raffle_id, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]))
            .await
            .unwrap();

        assert_eq!(order.state, OrderState::PendingPayment);
        assert_eq!(order.subtotal, Money::from_cents(180_000));
        assert_eq!(order.discount_percent, 10);
        assert_eq!(order.total, Money::from_cents(162_000));
        assert_eq!(order.reference, format!("SORTEO-{}", order.id));
        assert_eq!(h.notifier.count().await, 1);

        // The tickets are now held against a second order.
        let err = h
            .service
            .create(request(h.raffle_id, &[12, 13]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InventoryConflict(_)));
    }

    #[tokio::test]
    async fn create_rejects_bad_requests() {
        let h = harness().await;

        let empty = h.service.create(request(h.raffle_id, &[])).await;
        assert!(matches!(empty, Err(CoreError::Validation(_))));

        let mut bad_buyer = request(h.raffle_id, &[1]);
        bad_buyer.buyer.email = "nope".to_string();
        assert!(matches!(
            h.service.create(bad_buyer).await,
            Err(CoreError::Validation(_))
        ));

        let mut unknown_promo = request(h.raffle_id, &[1]);
        unknown_promo.promo_code = Some("NADA".to_string());
        assert!(matches!(
            h.service.create(unknown_promo).await,
            Err(CoreError::Validation(_))
        ));

        let unknown_raffle = h.service.create(request(RaffleId::new(), &[1])).await;
        assert!(matches!(unknown_raffle, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn concurrent_creates_cannot_double_sell() {
        let h = harness().await;
        let a = {
            let service = Arc::clone(&h.service);
            let raffle_id = h.raffle_id;
            tokio::spawn(async move { service.create(request(raffle_id, &[20, 21])).await })
        };
        let b = {
            let service = Arc::clone(&h.service);
            let raffle_id = h.raffle_id;
            tokio::spawn(async move { service.create(request(raffle_id, &[21, 22])).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_ok() != b.is_ok(), "exactly one create may win");
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(CoreError::InventoryConflict(_))));
    }

    #[tokio::test]
    async fn confirmed_event_completes_and_marks_sold() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[1, 2])).await.unwrap();

        let updated = h
            .service
            .apply_payment_event(&notice(&order, PaymentStatus::Confirmed, "evt-1"), "hash".into())
            .await
            .unwrap();
        assert_eq!(updated.state, OrderState::Completed);
        assert_eq!(h.notifier.count().await, 2);

        // Completed tickets stay occupied even against release.
        let err = h
            .service
            .create(request(h.raffle_id, &[2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InventoryConflict(_)));
    }

    #[tokio::test]
    async fn replayed_event_is_noop_without_second_notification() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[4])).await.unwrap();
        let event = notice(&order, PaymentStatus::Confirmed, "evt-dup");

        let first = h
            .service
            .apply_payment_event(&event, "hash".into())
            .await
            .unwrap();
        let second = h
            .service
            .apply_payment_event(&event, "hash".into())
            .await
            .unwrap();

        assert_eq!(first.state, OrderState::Completed);
        assert_eq!(first, second, "replay must return identical state");
        // create + completed; no third notification for the replay.
        assert_eq!(h.notifier.count().await, 2);
    }

    #[tokio::test]
    async fn rejected_event_cancels_and_frees_tickets() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[30])).await.unwrap();
        let updated = h
            .service
            .apply_payment_event(&notice(&order, PaymentStatus::Rejected, "evt-rej"), "h".into())
            .await
            .unwrap();
        assert_eq!(updated.state, OrderState::Cancelled);

        // Ticket is purchasable again.
        assert!(h.service.create(request(h.raffle_id, &[30])).await.is_ok());
    }

    #[tokio::test]
    async fn pending_event_moves_to_verification_once() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[40])).await.unwrap();

        let updated = h
            .service
            .apply_payment_event(&notice(&order, PaymentStatus::Pending, "evt-p1"), "h".into())
            .await
            .unwrap();
        assert_eq!(updated.state, OrderState::PendingVerification);

        let again = h
            .service
            .apply_payment_event(&notice(&order, PaymentStatus::Pending, "evt-p2"), "h".into())
            .await
            .unwrap();
        assert_eq!(again.state, OrderState::PendingVerification);
        // create + first pending; the second pending changed nothing.
        assert_eq!(h.notifier.count().await, 2);
    }

    #[tokio::test]
    async fn terminal_orders_never_transition() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[50])).await.unwrap();
        h.service
            .apply_payment_event(&notice(&order, PaymentStatus::Rejected, "evt-1"), "h".into())
            .await
            .unwrap();

        // A late confirmation is recorded but ignored.
        let after = h
            .service
            .apply_payment_event(&notice(&order, PaymentStatus::Confirmed, "evt-2"), "h".into())
            .await
            .unwrap();
        assert_eq!(after.state, OrderState::Cancelled);

        let events = h.service.events_for(order.id, None, 10).await.unwrap();
        assert!(events
            .iter()
            .any(|e| e.outcome == IngestOutcome::IgnoredTerminal));

        // Manual cancel of a terminal order is a validation error.
        assert!(matches!(
            h.service.cancel(order.id, "again").await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn attach_proof_is_idempotent() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[60])).await.unwrap();

        let first = h
            .service
            .attach_proof(order.id, "receipt-1".to_string())
            .await
            .unwrap();
        assert_eq!(first.state, OrderState::PendingVerification);
        assert_eq!(first.proof_reference.as_deref(), Some("receipt-1"));

        let second = h
            .service
            .attach_proof(order.id, "receipt-2".to_string())
            .await
            .unwrap();
        assert_eq!(second.proof_reference.as_deref(), Some("receipt-1"), "no-op past pending_payment");
    }

    #[tokio::test]
    async fn expiry_sweep_releases_tickets() {
        let h = harness_with_window(Duration::seconds(-1)).await;
        let order = h.service.create(request(h.raffle_id, &[70])).await.unwrap();

        let expired = h.service.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(expired, 1);
        assert_eq!(
            h.service.get(order.id).await.unwrap().state,
            OrderState::Expired
        );

        // Released ticket can be bought again.
        assert!(h.service.create(request(h.raffle_id, &[70])).await.is_ok());

        // Sweep again: nothing left to expire.
        // (The replacement order has a fresh negative window too, so filter
        // on the original id only.)
        let after = h.service.expire(order.id, Utc::now()).await.unwrap();
        assert_eq!(after.state, OrderState::Expired);
    }

    #[tokio::test]
    async fn amount_mismatch_is_applied_with_warning() {
        let h = harness().await;
        let order = h.service.create(request(h.raffle_id, &[80])).await.unwrap();
        let mut event = notice(&order, PaymentStatus::Confirmed, "evt-amt");
        event.amount = Money::from_cents(1);
        event.currency = Currency::new("USD");

        let updated = h
            .service
            .apply_payment_event(&event, "h".into())
            .await
            .unwrap();
        assert_eq!(updated.state, OrderState::Completed);
    }
}
