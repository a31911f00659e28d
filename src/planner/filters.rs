//! Row filter fragments: saved filters and inline allow-lists.

use crate::sql::{col, lit_str, raw_sql, Expr, ExprExt, Predicate};

use super::resolve::ResolvedColumn;

/// Saved filter predicates, in definition order.
///
/// Filter bodies are trusted predicate text from the catalog; they are
/// parenthesized so surrounding ANDs cannot change their meaning.
pub fn saved_filter_predicates(column: &ResolvedColumn) -> Vec<Predicate> {
    column
        .saved_filters
        .iter()
        .map(|filter| {
            Predicate::new(Expr::Paren(Box::new(raw_sql(&filter.value))))
                .with_comment(&format!("Saved filter: {}", filter.name))
        })
        .collect()
}

/// Inline allow-list predicates, one per filtered column in key order.
///
/// An empty allow-list keeps the shape but matches nothing.
pub fn inline_filter_predicates(column: &ResolvedColumn) -> Vec<Predicate> {
    column
        .inline_filters
        .iter()
        .map(|(key, values)| {
            let expr = col(key).in_list(values.iter().map(|value| lit_str(value)).collect());
            let comment = if values.is_empty() {
                "No allowed values selected".to_string()
            } else {
                format!("Only rows matching the selected {} values", key)
            };
            Predicate::new(expr).with_comment(&comment)
        })
        .collect()
}

/// All row predicates for one fact query, in stable order: saved
/// filters, inline filters, window bounds, then zero exclusion.
pub fn row_predicates(
    column: &ResolvedColumn,
    window: Vec<Predicate>,
    zero_exclusion: Option<Predicate>,
) -> Vec<Predicate> {
    let mut predicates = saved_filter_predicates(column);
    predicates.extend(inline_filter_predicates(column));
    predicates.extend(window);
    predicates.extend(zero_exclusion);
    predicates
}
