//! Backend-neutral description of a view read.

use async_trait::async_trait;
use serde_json::Value;

use crate::application::repos::RepoError;

/// Column ordering for a view query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A `select(columns).eq(...).order(...).limit(n)` read against one view.
///
/// Identifiers are validated when the query is built so backends can splice
/// them into URLs and SQL without further escaping concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    view: String,
    columns: Vec<String>,
    filters: Vec<(String, String)>,
    order: Vec<(String, Direction)>,
    limit: Option<u32>,
}

impl ViewQuery {
    pub fn from_view(view: &str) -> Result<Self, RepoError> {
        Ok(Self {
            view: identifier(view)?,
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        })
    }

    /// Restrict the selected columns. An empty selection means every column.
    pub fn select(mut self, columns: &[&str]) -> Result<Self, RepoError> {
        self.columns = columns
            .iter()
            .map(|column| identifier(column))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Result<Self, RepoError> {
        self.filters.push((identifier(column)?, value.into()));
        Ok(self)
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Result<Self, RepoError> {
        self.order.push((identifier(column)?, direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }
}

/// The single I/O boundary to the upstream database.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Short backend label for logs and metrics.
    fn backend(&self) -> &'static str;

    /// Run a view read and return its rows as JSON objects.
    async fn select(&self, query: &ViewQuery) -> Result<Vec<Value>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

fn identifier(raw: &str) -> Result<String, RepoError> {
    let mut chars = raw.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(raw.to_string())
    } else {
        Err(RepoError::data_access(format!(
            "invalid identifier `{raw}` in view query"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_clauses_in_order() {
        let query = ViewQuery::from_view("items_view")
            .and_then(|q| q.select(&["id", "name"]))
            .and_then(|q| q.eq("rarity", "rare"))
            .and_then(|q| q.order("name", Direction::Asc))
            .map(|q| q.limit(5))
            .expect("valid query");

        assert_eq!(query.view(), "items_view");
        assert_eq!(query.columns(), ["id", "name"]);
        assert_eq!(query.filters(), [("rarity".to_string(), "rare".to_string())]);
        assert_eq!(query.ordering(), [("name".to_string(), Direction::Asc)]);
        assert_eq!(query.row_limit(), Some(5));
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(ViewQuery::from_view("items; drop table items").is_err());
        assert!(ViewQuery::from_view("9items").is_err());
        assert!(ViewQuery::from_view("").is_err());

        let query = ViewQuery::from_view("items_view").expect("valid view");
        assert!(query.clone().select(&["name\""]).is_err());
        assert!(query.clone().eq("id = id or", "x").is_err());
        assert!(query.order("_sort_key2", Direction::Desc).is_ok());
    }

    #[test]
    fn filter_values_are_not_identifiers() {
        let query = ViewQuery::from_view("item_sources_view")
            .and_then(|q| q.eq("item_id", "it's; weird"))
            .expect("values are free text");
        assert_eq!(query.filters()[0].1, "it's; weird");
    }
}
