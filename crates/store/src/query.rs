use common::{ClientId, PageRequest};
use domain::{Client, Order, OrderState, Product};

pub const PRODUCTS_PER_PAGE: u32 = 12;
pub const CLIENTS_PER_PAGE: u32 = 20;
pub const ORDERS_PER_PAGE: u32 = 20;

/// Filter for product listings.
///
/// Defaults to active products only, first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// Case-insensitive substring matched against name and SKU.
    pub search: Option<String>,
    pub active_only: bool,
    pub page: PageRequest,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            search: None,
            active_only: true,
            page: PageRequest::first(PRODUCTS_PER_PAGE),
        }
    }
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = normalize_search(text.into());
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = PageRequest::new(page, self.page.per_page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.page = PageRequest::new(self.page.page, per_page);
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.active_only && !product.active {
            return false;
        }
        match &self.search {
            Some(text) => product.matches_search(text),
            None => true,
        }
    }
}

/// Filter for client listings.
///
/// Defaults to active clients only, first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientQuery {
    /// Case-insensitive substring matched against name, email and phone.
    pub search: Option<String>,
    pub active_only: bool,
    pub page: PageRequest,
}

impl Default for ClientQuery {
    fn default() -> Self {
        Self {
            search: None,
            active_only: true,
            page: PageRequest::first(CLIENTS_PER_PAGE),
        }
    }
}

impl ClientQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = normalize_search(text.into());
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = PageRequest::new(page, self.page.per_page);
        self
    }

    pub fn matches(&self, client: &Client) -> bool {
        if self.active_only && !client.active {
            return false;
        }
        match &self.search {
            Some(text) => client.matches_search(text),
            None => true,
        }
    }
}

/// Filter for order listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub state: Option<OrderState>,
    pub client_id: Option<ClientId>,
    pub page: PageRequest,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            state: None,
            client_id: None,
            page: PageRequest::first(ORDERS_PER_PAGE),
        }
    }
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: OrderState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = PageRequest::new(page, self.page.per_page);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.state.is_none_or(|s| order.state() == s)
            && self.client_id.is_none_or(|c| order.client_id() == c)
    }
}

fn normalize_search(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, NewProduct};

    #[test]
    fn product_query_defaults() {
        let query = ProductQuery::new();
        assert!(query.active_only);
        assert_eq!(query.page.per_page, PRODUCTS_PER_PAGE);
        assert_eq!(query.page.page, 1);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(ProductQuery::new().search("   ").search, None);
        assert_eq!(ClientQuery::new().search(" ana ").search.as_deref(), Some("ana"));
    }

    #[test]
    fn product_query_filters_inactive() {
        let product =
            Product::register(NewProduct::new("P1", "Pen", Money::zero(), 1).inactive()).unwrap();
        assert!(!ProductQuery::new().matches(&product));
        assert!(ProductQuery::new().include_inactive().matches(&product));
        assert!(!ProductQuery::new().include_inactive().search("pad").matches(&product));
    }

    #[test]
    fn page_builder_keeps_page_size() {
        let query = OrderQuery::new().page(3);
        assert_eq!(query.page.page, 3);
        assert_eq!(query.page.per_page, ORDERS_PER_PAGE);
    }
}
