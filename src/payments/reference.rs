//! Transaction reference generation.

use crate::payments::types::Gateway;
use chrono::Utc;
use rand::Rng;

/// Build a gateway-tagged, human-sortable transaction reference:
/// short gateway prefix, millisecond timestamp, 4-digit random suffix.
///
/// Collisions are unlikely but possible; the ledger's unique constraint on
/// `reference` is the actual uniqueness guarantee and a violation there is
/// reported to the caller as a retryable creation failure.
pub fn generate(gateway: Gateway) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}_{}_{:04}", gateway.reference_prefix(), millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_carries_gateway_prefix() {
        assert!(generate(Gateway::Stripe).starts_with("STR_"));
        assert!(generate(Gateway::Paystack).starts_with("PSK_"));
    }

    #[test]
    fn reference_has_three_segments() {
        let reference = generate(Gateway::Paystack);
        let parts: Vec<&str> = reference.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].parse::<u32>().is_ok());
    }

    #[test]
    fn references_are_sortable_by_creation_order() {
        let first = generate(Gateway::Stripe);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generate(Gateway::Stripe);
        assert!(second > first);
    }
}
