use nanoid::nanoid;

/// Alphabet for document identifiers (no ambiguous glyphs).
const DOCUMENT_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
/// Default document id length.
const DOCUMENT_ID_LENGTH: usize = 20;

/// Generates a new document identifier, used by store backends on `add_document`.
pub fn generate_document_id() -> String {
    nanoid!(DOCUMENT_ID_LENGTH, DOCUMENT_ID_ALPHABET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_length_and_charset() {
        let id = generate_document_id();
        assert_eq!(id.len(), DOCUMENT_ID_LENGTH);
        assert!(id.chars().all(|c| DOCUMENT_ID_ALPHABET.contains(&c)));
    }

    #[test]
    fn ids_do_not_repeat() {
        assert_ne!(generate_document_id(), generate_document_id());
    }
}
