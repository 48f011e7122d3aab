//! Gateway references.
//!
//! A reference is generated once per booking or voucher and round-tripped
//! through the gateway as `referenceId`. Bookings and vouchers use distinct
//! prefixes so a reference never matches both.

/// References of this length or shorter are treated as malformed.
pub const MALFORMED_REFERENCE_MAX_LEN: usize = 2;

/// Reference for a booking checkout.
pub fn booking_reference(booking_id: i64) -> String {
    format!("Boukii #{}", booking_id)
}

/// Reference for a voucher purchase.
pub fn voucher_reference(voucher_id: i64) -> String {
    format!("Boukii Voucher #{}", voucher_id)
}

/// Trims an inbound reference. Returns `None` when what remains is too short
/// to be a real reference.
///
/// ```rust
/// use boukii_core::reference::normalize_reference;
///
/// assert_eq!(normalize_reference("  Boukii #7 "), Some("Boukii #7"));
/// assert_eq!(normalize_reference(" #7"), None);
/// ```
pub fn normalize_reference(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MALFORMED_REFERENCE_MAX_LEN {
        None
    } else {
        Some(trimmed)
    }
}
