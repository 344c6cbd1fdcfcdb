/// Redis key-construction helpers for the document store.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn document(&self, collection: &str, document_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, document_id)
    }

    /// Key prefix covered by a collection's search index.
    pub fn document_prefix(&self, collection: &str) -> String {
        format!("{}:{}:", self.prefix, collection)
    }

    /// Set of document ids belonging to a collection.
    pub fn id_set(&self, collection: &str) -> String {
        format!("{}:ids:{}", self.prefix, collection)
    }

    /// Pub/sub channel carrying change events for a collection.
    pub fn changes(&self, collection: &str) -> String {
        format!("{}:changes:{}", self.prefix, collection)
    }

    pub fn search_index(&self, collection: &str) -> String {
        format!("{}:idx:{}", self.prefix, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_document_keys() {
        let ctx = KeyContext::new("reel");
        assert_eq!(ctx.document("videos", "abc"), "reel:videos:abc");
        assert!(ctx.document("videos", "abc").starts_with(&ctx.document_prefix("videos")));
    }

    #[test]
    fn bookkeeping_keys_stay_outside_the_document_prefix() {
        let ctx = KeyContext::new("reel");
        let prefix = ctx.document_prefix("videos");
        assert!(!ctx.id_set("videos").starts_with(&prefix));
        assert!(!ctx.changes("videos").starts_with(&prefix));
        assert!(!ctx.search_index("videos").starts_with(&prefix));
    }
}
