//! OData query construction
//!
//! Builds the `$filter`, `$orderby` and `$skip` parameters sent with every
//! page request. Clauses are ANDed; a clause containing `or` is wrapped in
//! parentheses when combined with others.

use crate::catalog::StreamDescriptor;
use crate::pagination::PageToken;
use crate::types::{format_filter_timestamp, QueryParams};
use chrono::{DateTime, Duration, Utc};

/// Builder for one request's query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ODataQuery {
    filters: Vec<String>,
    order_by: Option<String>,
    skip: u64,
}

impl ODataQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `$filter` clause
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        let clause = clause.into();
        if !clause.trim().is_empty() {
            self.filters.push(clause);
        }
        self
    }

    /// Order ascending by a field
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Skip a number of records; zero is not sent
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// The combined `$filter` expression, if any
    pub fn filter_expression(&self) -> Option<String> {
        match self.filters.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            many => Some(
                many.iter()
                    .map(|c| {
                        if c.contains(" or ") {
                            format!("({c})")
                        } else {
                            c.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" and "),
            ),
        }
    }

    /// Render as ordered query parameters
    pub fn into_params(self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(filter) = self.filter_expression() {
            params.push(("$filter".to_string(), filter));
        }
        if let Some(field) = self.order_by {
            params.push(("$orderby".to_string(), field));
        }
        if self.skip > 0 {
            params.push(("$skip".to_string(), self.skip.to_string()));
        }
        params
    }
}

/// `field eq A or field eq B ...` over a set of parent keys.
///
/// Quote characters are stripped from the keys; the API rejects them inside
/// member lists.
pub fn member_list_clause(field: &str, keys: &[String]) -> String {
    keys.iter()
        .map(|key| {
            let key: String = key.chars().filter(|c| *c != '\'' && *c != '"').collect();
            format!("{field} eq {key}")
        })
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Last second of the day `window` after `start`
fn window_end(start: DateTime<Utc>, window: Duration) -> String {
    format!("{}T23:59:59Z", (start + window).format("%Y-%m-%d"))
}

/// Query for one page of a top-level stream.
///
/// `lower_bound` is the run's starting value for unwindowed streams with a
/// replication key; windowed tokens carry their own bounds.
pub fn page_query(
    descriptor: &StreamDescriptor,
    token: &PageToken,
    lower_bound: Option<DateTime<Utc>>,
) -> ODataQuery {
    let mut query = ODataQuery::new().skip(token.skip());

    match (token.window_start(), &descriptor.window_fields) {
        (Some(start), Some(fields)) => {
            query = query.filter(format!(
                "{} ge {} and {} le {}",
                fields.lower,
                format_filter_timestamp(&start),
                fields.upper,
                window_end(start, descriptor.window())
            ));
        }
        (Some(start), None) => {
            if let Some(rk) = &descriptor.replication_key {
                query = query.filter(format!(
                    "{rk} ge {} and {rk} lt {}",
                    format_filter_timestamp(&start),
                    window_end(start, descriptor.window())
                ));
            }
        }
        (None, _) => {
            if let (Some(rk), Some(bound)) = (&descriptor.replication_key, lower_bound) {
                query = query.filter(format!("{rk} ge {}", format_filter_timestamp(&bound)));
            }
        }
    }

    if let Some(type_filter) = &descriptor.type_filter {
        query = query.filter(type_filter.clone());
    }

    if let Some(rk) = &descriptor.replication_key {
        query = query.order_by(rk.clone());
    }

    query
}

/// Query for one page of a child stream restricted to a batch of parent keys
pub fn child_query(descriptor: &StreamDescriptor, keys: &[String], skip: u64) -> ODataQuery {
    let field = descriptor
        .parent
        .as_ref()
        .map_or_else(|| descriptor.key_field().unwrap_or_default(), |p| p.child_key.as_str());

    let mut query = ODataQuery::new()
        .filter(member_list_clause(field, keys))
        .skip(skip);
    if let Some(type_filter) = &descriptor.type_filter {
        query = query.filter(type_filter.clone());
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts(y: i32, m: u32, d: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, s).unwrap()
    }

    fn param<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_empty_query_has_no_params() {
        assert!(ODataQuery::new().into_params().is_empty());
    }

    #[test]
    fn test_clauses_joined_with_and() {
        let params = ODataQuery::new()
            .filter("a eq 1")
            .filter("b eq 2")
            .order_by("a")
            .skip(5000)
            .into_params();

        assert_eq!(
            params,
            vec![
                ("$filter".to_string(), "a eq 1 and b eq 2".to_string()),
                ("$orderby".to_string(), "a".to_string()),
                ("$skip".to_string(), "5000".to_string()),
            ]
        );
    }

    #[test]
    fn test_or_clause_parenthesized_when_combined() {
        let query = ODataQuery::new()
            .filter("id eq 1 or id eq 2")
            .filter("type eq 'X'");
        assert_eq!(
            query.filter_expression().unwrap(),
            "(id eq 1 or id eq 2) and type eq 'X'"
        );

        let alone = ODataQuery::new().filter("id eq 1 or id eq 2");
        assert_eq!(alone.filter_expression().unwrap(), "id eq 1 or id eq 2");
    }

    #[test]
    fn test_member_list_strips_quotes() {
        let clause = member_list_clause("transactionId", &["A'1".to_string(), "\"B\"".to_string()]);
        assert_eq!(clause, "transactionId eq A1 or transactionId eq B");
        assert!(!clause.contains('\''));
    }

    #[test]
    fn test_window_query_for_typed_stream() {
        let catalog = Catalog::builtin().unwrap();
        let bills = catalog.descriptor("bills").unwrap();
        let token = PageToken::Window {
            window_start: ts(2024, 1, 1, 1),
            skip: 5000,
            final_window: false,
        };

        let params = page_query(bills, &token, None).into_params();

        assert_eq!(
            param(&params, "$filter"),
            Some(
                "modifiedOn ge 2024-01-01T00:00:01Z and modifiedOn lt 2024-01-11T23:59:59Z \
                 and type eq 'AP Invoice'"
            )
        );
        assert_eq!(param(&params, "$orderby"), Some("modifiedOn"));
        assert_eq!(param(&params, "$skip"), Some("5000"));
    }

    #[test]
    fn test_first_page_sends_no_skip() {
        let catalog = Catalog::builtin().unwrap();
        let sales = catalog.descriptor("sales_detail").unwrap();
        let token = PageToken::window(ts(2024, 3, 1, 1), false);

        let params = page_query(sales, &token, None).into_params();
        assert!(param(&params, "$skip").is_none());
    }

    #[test]
    fn test_window_fields_query() {
        let catalog = Catalog::builtin().unwrap();
        let payroll = catalog.descriptor("payroll_summary").unwrap();
        let token = PageToken::window(ts(2024, 1, 1, 1), false);

        let params = page_query(payroll, &token, None).into_params();

        assert_eq!(
            param(&params, "$filter"),
            Some("payrollStart ge 2024-01-01T00:00:01Z and payrollEnd le 2024-01-11T23:59:59Z")
        );
        assert!(param(&params, "$orderby").is_none());
    }

    #[test]
    fn test_unwindowed_lower_bound() {
        let catalog = Catalog::builtin().unwrap();
        let items = catalog.descriptor("items").unwrap();

        let params = page_query(items, &PageToken::Single, Some(ts(2024, 2, 1, 1))).into_params();
        assert_eq!(
            param(&params, "$filter"),
            Some("modifiedOn ge 2024-02-01T00:00:01Z")
        );

        let params = page_query(items, &PageToken::Single, None).into_params();
        assert!(param(&params, "$filter").is_none());
        assert_eq!(param(&params, "$orderby"), Some("modifiedOn"));
    }

    #[test]
    fn test_child_query() {
        let catalog = Catalog::builtin().unwrap();
        let detail = catalog.descriptor("transaction_detail").unwrap();

        let params =
            child_query(detail, &["T1".to_string(), "T2".to_string()], 5000).into_params();
        assert_eq!(
            param(&params, "$filter"),
            Some("transactionId eq T1 or transactionId eq T2")
        );
        assert_eq!(param(&params, "$skip"), Some("5000"));
    }
}
