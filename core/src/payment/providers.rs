//! Per-provider payload parsing and normalization.
//!
//! Each provider gets its own typed payload struct and one parser; anything
//! that does not match a known shape is rejected as a validation error
//! before it can reach an order. The output is always a [`PaymentNotice`]:
//! the canonical, provider-agnostic form of one payment notification.

use crate::error::{CoreError, Result};
use crate::types::{Currency, Money, Order, OrderId, PaymentProvider, PaymentStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Canonical payment event fed to the order lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentNotice {
    /// Provider that reported the payment
    pub provider: PaymentProvider,
    /// Provider's event identifier, or a stable payload hash when the
    /// provider supplies none
    pub provider_event_id: String,
    /// Order the payment is for
    pub order_id: OrderId,
    /// Canonical status
    pub status: PaymentStatus,
    /// Amount the provider claims was paid
    pub amount: Money,
    /// Currency of the claimed amount
    pub currency: Currency,
}

// ============================================================================
// Provider payload shapes
// ============================================================================

/// Crypto-pay gateway notification. Carries a business status code; only
/// `PAY_SUCCESS` is final, everything else stays pending.
#[derive(Debug, Deserialize)]
struct CryptoPayPayload {
    /// Gateway notification id
    #[serde(default)]
    notify_id: Option<String>,
    /// Merchant order code embedded at charge creation
    order_code: String,
    /// Business status code (`PAY_SUCCESS`, `PAY_PENDING`, ...)
    trade_status: String,
    amount: f64,
    currency: String,
}

/// Cash-voucher network notification, wrapped charge object with an event
/// type.
#[derive(Debug, Deserialize)]
struct VoucherPayload {
    /// Event type: `charge.paid`, `charge.pending`, `charge.expired`
    event: String,
    charge: VoucherCharge,
}

#[derive(Debug, Deserialize)]
struct VoucherCharge {
    id: String,
    amount: f64,
    currency: String,
    #[serde(default)]
    metadata: Option<VoucherMetadata>,
}

#[derive(Debug, Deserialize)]
struct VoucherMetadata {
    #[serde(default)]
    order_id: Option<String>,
}

/// Bank-transfer notification; both transfer providers share this shape.
#[derive(Debug, Deserialize)]
struct TransferPayload {
    /// Bank-side transaction id, when the back office recorded one
    #[serde(default)]
    transaction_id: Option<String>,
    /// Free-text reference the buyer quoted (`SORTEO-<order id>`)
    reference: String,
    status: TransferStatus,
    amount: f64,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransferStatus {
    Confirmed,
    Pending,
    Rejected,
}

impl From<TransferStatus> for PaymentStatus {
    fn from(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Confirmed => Self::Confirmed,
            TransferStatus::Pending => Self::Pending,
            TransferStatus::Rejected => Self::Rejected,
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Base64-encoded SHA-256 of a raw webhook body, stored on every audit
/// record.
#[must_use]
pub fn payload_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Normalizes a provider-specific payload into a [`PaymentNotice`].
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for payloads that do not match the
/// provider's shape, carry an unknown status vocabulary, or reference an
/// unparseable order.
pub fn normalize(provider: PaymentProvider, body: &[u8]) -> Result<PaymentNotice> {
    match provider {
        PaymentProvider::CryptoPay => normalize_cryptopay(body),
        PaymentProvider::CashVoucher => normalize_voucher(body),
        PaymentProvider::BankTransfer | PaymentProvider::BankTransferIntl => {
            normalize_transfer(provider, body)
        }
    }
}

fn normalize_cryptopay(body: &[u8]) -> Result<PaymentNotice> {
    let provider = PaymentProvider::CryptoPay;
    let payload: CryptoPayPayload = parse(provider, body)?;

    let status = if payload.trade_status == "PAY_SUCCESS" {
        PaymentStatus::Confirmed
    } else {
        PaymentStatus::Pending
    };
    let order_id = parse_order_id(provider, &payload.order_code)?;
    let amount = parse_amount(provider, payload.amount)?;
    let currency = Currency::new(payload.currency);

    let provider_event_id = payload
        .notify_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| stable_event_id(provider, order_id, status, amount, &currency));

    Ok(PaymentNotice {
        provider,
        provider_event_id,
        order_id,
        status,
        amount,
        currency,
    })
}

fn normalize_voucher(body: &[u8]) -> Result<PaymentNotice> {
    let provider = PaymentProvider::CashVoucher;
    let payload: VoucherPayload = parse(provider, body)?;

    let status = match payload.event.as_str() {
        "charge.paid" => PaymentStatus::Confirmed,
        "charge.pending" => PaymentStatus::Pending,
        "charge.expired" => PaymentStatus::Rejected,
        other => {
            return Err(CoreError::Validation(format!(
                "unknown voucher event type {other:?}"
            )))
        }
    };

    // Order id lives in charge metadata; charges created before metadata was
    // attached fall back to the charge id itself.
    let order_reference = payload
        .charge
        .metadata
        .as_ref()
        .and_then(|m| m.order_id.as_deref())
        .unwrap_or(&payload.charge.id);
    let order_id = parse_order_id(provider, order_reference)?;
    let amount = parse_amount(provider, payload.charge.amount)?;

    Ok(PaymentNotice {
        provider,
        provider_event_id: payload.charge.id.clone(),
        order_id,
        status,
        amount,
        currency: Currency::new(payload.charge.currency),
    })
}

fn normalize_transfer(provider: PaymentProvider, body: &[u8]) -> Result<PaymentNotice> {
    let payload: TransferPayload = parse(provider, body)?;

    let reference = payload.reference.trim();
    let order_part = reference
        .strip_prefix(Order::REFERENCE_PREFIX)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "transfer reference {reference:?} does not carry the {} prefix",
                Order::REFERENCE_PREFIX
            ))
        })?;
    let order_id = parse_order_id(provider, order_part)?;
    let status = PaymentStatus::from(payload.status);
    let amount = parse_amount(provider, payload.amount)?;
    let currency = Currency::new(payload.currency);

    let provider_event_id = payload
        .transaction_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| stable_event_id(provider, order_id, status, amount, &currency));

    Ok(PaymentNotice {
        provider,
        provider_event_id,
        order_id,
        status,
        amount,
        currency,
    })
}

fn parse<'a, T: Deserialize<'a>>(provider: PaymentProvider, body: &'a [u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        CoreError::Validation(format!("malformed {provider} payload: {e}"))
    })
}

fn parse_order_id(provider: PaymentProvider, reference: &str) -> Result<OrderId> {
    let bare = reference
        .trim()
        .strip_prefix(Order::REFERENCE_PREFIX)
        .unwrap_or_else(|| reference.trim());
    Uuid::parse_str(bare)
        .map(OrderId::from_uuid)
        .map_err(|_| {
            CoreError::Validation(format!(
                "{provider} payload references an unparseable order id {reference:?}"
            ))
        })
}

fn parse_amount(provider: PaymentProvider, amount: f64) -> Result<Money> {
    Money::from_decimal(amount).ok_or_else(|| {
        CoreError::Validation(format!(
            "{provider} payload carries an invalid amount {amount}"
        ))
    })
}

/// Stable substitute event id for providers that omit their own: a SHA-256
/// over the normalized fields, so the same logical event always hashes to
/// the same key and replays dedupe correctly.
fn stable_event_id(
    provider: PaymentProvider,
    order_id: OrderId,
    status: PaymentStatus,
    amount: Money,
    currency: &Currency,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.wire_name());
    hasher.update(b"|");
    hasher.update(order_id.as_uuid().as_bytes());
    hasher.update(b"|");
    hasher.update(status.as_str());
    hasher.update(b"|");
    hasher.update(amount.cents().to_be_bytes());
    hasher.update(b"|");
    hasher.update(currency.as_str());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order_uuid() -> Uuid {
        Uuid::parse_str("6f2c9e9e-6a1b-4f60-9f40-8a21d1efab37").unwrap()
    }

    #[test]
    fn cryptopay_success_confirms() {
        let body = format!(
            r#"{{"notify_id":"n-123","order_code":"{}","trade_status":"PAY_SUCCESS","amount":1620.0,"currency":"MXN"}}"#,
            order_uuid()
        );
        let notice = normalize(PaymentProvider::CryptoPay, body.as_bytes()).unwrap();
        assert_eq!(notice.status, PaymentStatus::Confirmed);
        assert_eq!(notice.provider_event_id, "n-123");
        assert_eq!(notice.order_id, OrderId::from_uuid(order_uuid()));
        assert_eq!(notice.amount, Money::from_cents(162_000));
    }

    #[test]
    fn cryptopay_anything_else_is_pending() {
        for status in ["PAY_PENDING", "WAIT_BUYER_PAY", "weird"] {
            let body = format!(
                r#"{{"order_code":"{}","trade_status":"{status}","amount":10.0,"currency":"MXN"}}"#,
                order_uuid()
            );
            let notice = normalize(PaymentProvider::CryptoPay, body.as_bytes()).unwrap();
            assert_eq!(notice.status, PaymentStatus::Pending, "{status}");
        }
    }

    #[test]
    fn cryptopay_without_notify_id_gets_stable_fallback() {
        let body = format!(
            r#"{{"order_code":"{}","trade_status":"PAY_SUCCESS","amount":10.0,"currency":"MXN"}}"#,
            order_uuid()
        );
        let a = normalize(PaymentProvider::CryptoPay, body.as_bytes()).unwrap();
        let b = normalize(PaymentProvider::CryptoPay, body.as_bytes()).unwrap();
        assert_eq!(a.provider_event_id, b.provider_event_id);
        assert!(!a.provider_event_id.is_empty());
    }

    #[test]
    fn voucher_event_types_map() {
        let cases = [
            ("charge.paid", PaymentStatus::Confirmed),
            ("charge.pending", PaymentStatus::Pending),
            ("charge.expired", PaymentStatus::Rejected),
        ];
        for (event, expected) in cases {
            let body = format!(
                r#"{{"event":"{event}","charge":{{"id":"ch_9","amount":150.0,"currency":"MXN","metadata":{{"order_id":"{}"}}}}}}"#,
                order_uuid()
            );
            let notice = normalize(PaymentProvider::CashVoucher, body.as_bytes()).unwrap();
            assert_eq!(notice.status, expected, "{event}");
            assert_eq!(notice.provider_event_id, "ch_9");
        }
    }

    #[test]
    fn voucher_unknown_event_rejected() {
        let body = br#"{"event":"charge.refunded","charge":{"id":"ch_9","amount":1.0,"currency":"MXN"}}"#;
        assert!(matches!(
            normalize(PaymentProvider::CashVoucher, body),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn voucher_falls_back_to_charge_id_without_metadata() {
        // Charges created with id == order id reconcile through the
        // fallback path.
        let body = format!(
            r#"{{"event":"charge.paid","charge":{{"id":"{}","amount":1.0,"currency":"MXN"}}}}"#,
            order_uuid()
        );
        let notice = normalize(PaymentProvider::CashVoucher, body.as_bytes()).unwrap();
        assert_eq!(notice.order_id, OrderId::from_uuid(order_uuid()));
    }

    #[test]
    fn transfer_reference_prefix_is_stripped() {
        let body = format!(
            r#"{{"transaction_id":"tx-1","reference":"SORTEO-{}","status":"confirmed","amount":1620.0,"currency":"MXN"}}"#,
            order_uuid()
        );
        for provider in [PaymentProvider::BankTransfer, PaymentProvider::BankTransferIntl] {
            let notice = normalize(provider, body.as_bytes()).unwrap();
            assert_eq!(notice.order_id, OrderId::from_uuid(order_uuid()));
            assert_eq!(notice.status, PaymentStatus::Confirmed);
            assert_eq!(notice.provider_event_id, "tx-1");
        }
    }

    #[test]
    fn transfer_without_prefix_rejected() {
        let body = format!(
            r#"{{"reference":"{}","status":"confirmed","amount":1.0,"currency":"MXN"}}"#,
            order_uuid()
        );
        assert!(matches!(
            normalize(PaymentProvider::BankTransfer, body.as_bytes()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn transfer_unknown_status_rejected() {
        let body = format!(
            r#"{{"reference":"SORTEO-{}","status":"maybe","amount":1.0,"currency":"MXN"}}"#,
            order_uuid()
        );
        assert!(matches!(
            normalize(PaymentProvider::BankTransfer, body.as_bytes()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn transfer_without_transaction_id_hashes_stably() {
        let body = format!(
            r#"{{"reference":"SORTEO-{}","status":"pending","amount":3.5,"currency":"MXN"}}"#,
            order_uuid()
        );
        let a = normalize(PaymentProvider::BankTransfer, body.as_bytes()).unwrap();
        let b = normalize(PaymentProvider::BankTransfer, body.as_bytes()).unwrap();
        assert_eq!(a.provider_event_id, b.provider_event_id);
        // The other transfer provider hashes to a different key.
        let c = normalize(PaymentProvider::BankTransferIntl, body.as_bytes()).unwrap();
        assert_ne!(a.provider_event_id, c.provider_event_id);
    }

    #[test]
    fn malformed_payloads_rejected() {
        for provider in PaymentProvider::ALL {
            assert!(matches!(
                normalize(provider, b"not json"),
                Err(CoreError::Validation(_))
            ));
            assert!(matches!(
                normalize(provider, b"{}"),
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn payload_hash_is_stable() {
        assert_eq!(payload_hash(b"abc"), payload_hash(b"abc"));
        assert_ne!(payload_hash(b"abc"), payload_hash(b"abd"));
    }
}
