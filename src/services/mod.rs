pub mod admin_service;
pub mod order_service;
pub mod payment_service;

/// Append a fragment to an order note without destroying what is already
/// there. Notes accumulate cancel reasons and reconciliation records.
pub(crate) fn append_note(existing: Option<&str>, fragment: &str) -> String {
    match existing {
        Some(note) if !note.is_empty() => format!("{note} | {fragment}"),
        _ => fragment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::append_note;

    #[test]
    fn append_preserves_existing_text() {
        assert_eq!(
            append_note(Some("gift wrap please"), "Cancelled: changed mind"),
            "gift wrap please | Cancelled: changed mind"
        );
        assert_eq!(append_note(None, "Cancelled: changed mind"), "Cancelled: changed mind");
        assert_eq!(append_note(Some(""), "x"), "x");
    }
}
