use crate::config::NullPolicy;
use crate::discovery::Candidate;
use crate::error::FdResult;
use crate::validation::{quote_identifier, quote_literal};
use super::TableSchema;

/// Build the validity query for `candidate`
///
/// Returns a single boolean: true when at least one `GROUP BY L` group has
/// more than one distinct `R` value.
///
/// ```sql
/// SELECT EXISTS (
///     SELECT 1 FROM items GROUP BY "category"
///     HAVING COUNT(DISTINCT "price") + MAX(CASE WHEN "price" IS NULL THEN 1 ELSE 0 END) > 1
/// )
/// ```
///
/// Every column is checked against `schema` before it is quoted in.
pub fn violation_query(
    schema: &TableSchema,
    candidate: &Candidate,
    null_policy: NullPolicy,
) -> FdResult<String> {
    schema.check_candidate(candidate)?;

    let group_by = candidate
        .lhs
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let rhs = quote_identifier(&candidate.rhs);

    let distinct_count = match null_policy {
        NullPolicy::AsValue => format!(
            "COUNT(DISTINCT {rhs}) + MAX(CASE WHEN {rhs} IS NULL THEN 1 ELSE 0 END)"
        ),
        NullPolicy::Ignore => format!("COUNT(DISTINCT {rhs})"),
    };

    Ok(format!(
        "SELECT EXISTS (SELECT 1 FROM {} GROUP BY {} HAVING {} > 1)",
        schema.relation, group_by, distinct_count
    ))
}

/// Catalog query resolving a validated table argument to its relation name
///
/// Always one row; `relation` is NULL when the table does not exist.
pub fn resolve_relation_query(table: &str) -> String {
    format!(
        "SELECT (SELECT c.oid::regclass::text \
                 FROM pg_class c \
                 WHERE c.oid = to_regclass({}) AND c.relkind IN ('r', 'p', 'v', 'm', 'f')) AS relation",
        quote_literal(table)
    )
}

/// Probe for at least one row in a resolved relation
pub fn row_exists_query(relation: &str) -> String {
    format!("SELECT EXISTS (SELECT 1 FROM {})", relation)
}

/// Catalog query listing live columns of a resolved relation in `attnum` order
pub fn list_columns_query(relation: &str) -> String {
    format!(
        "SELECT attname::text AS column_name \
         FROM pg_attribute \
         WHERE attrelid = {}::regclass AND attnum > 0 AND NOT attisdropped \
         ORDER BY attnum",
        quote_literal(relation)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema {
            relation: "public.items".to_string(),
            columns: vec!["id".to_string(), "category".to_string(), "price".to_string()],
        }
    }

    #[test]
    fn test_single_lhs_query() {
        let c = Candidate::new(vec!["category".to_string()], "price");
        let sql = violation_query(&schema(), &c, NullPolicy::Ignore).unwrap();

        assert_eq!(
            sql,
            "SELECT EXISTS (SELECT 1 FROM public.items GROUP BY \"category\" \
             HAVING COUNT(DISTINCT \"price\") > 1)"
        );
    }

    #[test]
    fn test_composite_lhs_with_null_as_value() {
        let c = Candidate::new(vec!["id".to_string(), "category".to_string()], "price");
        let sql = violation_query(&schema(), &c, NullPolicy::AsValue).unwrap();

        assert!(sql.contains("GROUP BY \"id\", \"category\""));
        assert!(sql.contains("MAX(CASE WHEN \"price\" IS NULL THEN 1 ELSE 0 END)"));
    }

    #[test]
    fn test_untrusted_column_never_reaches_query_text() {
        let c = Candidate::new(vec!["id".to_string()], "price) > 0; DROP TABLE items; --");
        let result = violation_query(&schema(), &c, NullPolicy::Ignore);
        crate::error::testing::assert_error_sqlstate(result, "42703");
    }

    #[test]
    fn test_catalog_queries_quote_literals() {
        assert!(resolve_relation_query("items").contains("to_regclass('items')"));
        assert!(list_columns_query("\"Odd\"").contains("'\"Odd\"'::regclass"));
        assert!(list_columns_query("public.items").contains("ORDER BY attnum"));
        assert_eq!(row_exists_query("items"), "SELECT EXISTS (SELECT 1 FROM items)");
    }
}
