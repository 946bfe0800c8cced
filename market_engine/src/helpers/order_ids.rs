use chrono::Utc;
use rand::Rng;

fn reference(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = rand::thread_rng().gen_range(0..10_000);
    format!("{prefix}{millis}{suffix:04}")
}

/// Generates a human-readable order id, `ORD` followed by the current UTC time in milliseconds and 4 random digits.
///
/// Uniqueness is enforced by the database, so the (very unlikely) collision surfaces as an insert error rather than
/// a silently shared order.
pub fn generate_order_id() -> String {
    reference("ORD")
}

/// Generates the local reference recorded against a captured payment.
pub fn generate_payment_id() -> String {
    reference("PAY")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_id_format() {
        let id = generate_order_id();
        assert!(id.starts_with("ORD"));
        // 13 digits of millis + 4 random digits
        assert_eq!(id.len(), 3 + 13 + 4);
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn payment_id_format() {
        let id = generate_payment_id();
        assert!(id.starts_with("PAY"));
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
