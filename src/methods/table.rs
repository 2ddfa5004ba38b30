//! Verb -> handler table

use super::{join_methods, Method, MethodNotAllowed};

/// Ordered verb -> handler table, built once per handler registration
#[derive(Debug, Clone)]
pub struct MethodTable<H> {
    entries: Vec<(Method, H)>,
}

/// Collects per-verb handlers before the table is frozen
#[derive(Debug, Clone)]
pub struct MethodTableBuilder<H> {
    get: Option<H>,
    head: Option<H>,
    post: Option<H>,
    put: Option<H>,
    delete: Option<H>,
}

impl<H> Default for MethodTableBuilder<H> {
    fn default() -> Self {
        Self {
            get: None,
            head: None,
            post: None,
            put: None,
            delete: None,
        }
    }
}

impl<H: Clone> MethodTableBuilder<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, handler: H) -> Self {
        self.get = Some(handler);
        self
    }

    pub fn head(mut self, handler: H) -> Self {
        self.head = Some(handler);
        self
    }

    pub fn post(mut self, handler: H) -> Self {
        self.post = Some(handler);
        self
    }

    pub fn put(mut self, handler: H) -> Self {
        self.put = Some(handler);
        self
    }

    pub fn delete(mut self, handler: H) -> Self {
        self.delete = Some(handler);
        self
    }

    /// Register `handler` under `method`, replacing any earlier one
    pub fn method(self, method: Method, handler: H) -> Self {
        match method {
            Method::Get => self.get(handler),
            Method::Head => self.head(handler),
            Method::Post => self.post(handler),
            Method::Put => self.put(handler),
            Method::Delete => self.delete(handler),
        }
    }

    /// Freeze the table. Without an explicit HEAD handler, HEAD is served by
    /// the GET handler.
    pub fn build(self) -> MethodTable<H> {
        let head = self.head.or_else(|| self.get.clone());
        let slots = [
            (Method::Get, self.get),
            (Method::Head, head),
            (Method::Post, self.post),
            (Method::Put, self.put),
            (Method::Delete, self.delete),
        ];

        MethodTable {
            entries: slots
                .into_iter()
                .filter_map(|(method, handler)| handler.map(|h| (method, h)))
                .collect(),
        }
    }
}

impl<H> MethodTable<H> {
    /// Look up the handler for a raw request verb
    pub fn route(&self, method: &str) -> Result<&H, MethodNotAllowed> {
        self.entries
            .iter()
            .find(|(m, _)| m.as_str() == method)
            .map(|(_, handler)| handler)
            .ok_or_else(|| MethodNotAllowed {
                allowed: self.allowed(),
            })
    }

    /// Verbs with a handler, in table order
    pub fn allowed(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| *m).collect()
    }

    pub fn allow_header(&self) -> String {
        join_methods(&self.allowed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Called {
        Get,
        Head,
        Post,
        Delete,
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let table = MethodTableBuilder::new().get(Called::Get).build();

        assert_eq!(table.route("HEAD"), Ok(&Called::Get));
        assert_eq!(table.route("GET"), Ok(&Called::Get));
        assert_eq!(table.allowed(), vec![Method::Get, Method::Head]);
    }

    #[test]
    fn test_unmatched_lists_allowed() {
        let table = MethodTableBuilder::new().get(Called::Get).build();

        let err = table.route("DELETE").unwrap_err();
        assert_eq!(err.allowed, vec![Method::Get, Method::Head]);
        assert_eq!(err.allow_header(), "GET, HEAD");
    }

    #[test]
    fn test_explicit_head_wins() {
        let table = MethodTableBuilder::new()
            .head(Called::Head)
            .get(Called::Get)
            .build();

        assert_eq!(table.route("HEAD"), Ok(&Called::Head));
    }

    #[test]
    fn test_no_get_no_head() {
        let table = MethodTableBuilder::new().post(Called::Post).build();

        assert_eq!(table.allowed(), vec![Method::Post]);
        assert_eq!(table.route("HEAD").unwrap_err().allow_header(), "POST");
    }

    #[test]
    fn test_table_order_is_canonical() {
        let table = MethodTableBuilder::new()
            .delete(Called::Delete)
            .post(Called::Post)
            .get(Called::Get)
            .build();

        assert_eq!(table.allow_header(), "GET, HEAD, POST, DELETE");
    }

    #[test]
    fn test_unknown_and_lowercase_verbs_rejected() {
        let table = MethodTableBuilder::new()
            .method(Method::Get, Called::Get)
            .build();

        assert!(table.route("get").is_err());
        assert!(table.route("PATCH").is_err());
        assert!(table.route("").is_err());
    }

    #[test]
    fn test_empty_table() {
        let table: MethodTable<Called> = MethodTableBuilder::new().build();
        assert!(table.allowed().is_empty());
        assert_eq!(table.route("GET").unwrap_err().allowed, vec![]);
    }

    #[test]
    fn test_function_handlers() {
        fn get(count: &mut u32) -> &'static str {
            *count += 1;
            "get"
        }
        fn delete(_: &mut u32) -> &'static str {
            "delete"
        }

        let table = MethodTableBuilder::<fn(&mut u32) -> &'static str>::new()
            .get(get)
            .delete(delete)
            .build();

        let mut count = 0;
        let handler = table.route("HEAD").unwrap();
        assert_eq!(handler(&mut count), "get");
        assert_eq!(count, 1);
    }
}
