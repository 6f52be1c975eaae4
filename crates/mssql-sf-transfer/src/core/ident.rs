//! Centralized identifier shaping and quoting for warehouse DDL.
//!
//! SQL identifiers cannot be passed as parameters in prepared statements, so
//! every schema, table, and column name that reaches the warehouse goes
//! through this module. Quoting is applied only where Snowflake requires it:
//! reserved words, identifiers that start with a non-letter, and identifiers
//! containing anything outside `[A-Za-z0-9]`.

/// Snowflake reserved words, sorted for binary search.
///
/// A column emitted bare with one of these names would fail CREATE TABLE.
static RESERVED: &[&str] = &[
    "ACCOUNT",
    "ALL",
    "ALTER",
    "AND",
    "ANY",
    "AS",
    "BETWEEN",
    "BY",
    "CASE",
    "CAST",
    "CHECK",
    "COLUMN",
    "CONNECT",
    "CONNECTION",
    "CONSTRAINT",
    "CREATE",
    "CROSS",
    "CURRENT",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DATABASE",
    "DELETE",
    "DISTINCT",
    "DROP",
    "ELSE",
    "EXISTS",
    "FALSE",
    "FOLLOWING",
    "FOR",
    "FROM",
    "FULL",
    "GRANT",
    "GROUP",
    "GSCLUSTER",
    "HAVING",
    "ILIKE",
    "IN",
    "INCREMENT",
    "INNER",
    "INSERT",
    "INTERSECT",
    "INTO",
    "IS",
    "ISSUE",
    "JOIN",
    "LATERAL",
    "LEFT",
    "LIKE",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "MINUS",
    "NATURAL",
    "NOT",
    "NULL",
    "OF",
    "ON",
    "OR",
    "ORDER",
    "ORGANIZATION",
    "QUALIFY",
    "REGEXP",
    "REVOKE",
    "RIGHT",
    "RLIKE",
    "ROW",
    "ROWS",
    "SAMPLE",
    "SCHEMA",
    "SELECT",
    "SET",
    "SOME",
    "START",
    "TABLE",
    "TABLESAMPLE",
    "THEN",
    "TO",
    "TRIGGER",
    "TRUE",
    "TRY_CAST",
    "UNION",
    "UNIQUE",
    "UPDATE",
    "USING",
    "VALUES",
    "VIEW",
    "WHEN",
    "WHENEVER",
    "WHERE",
    "WITH",
];

/// Check whether an identifier is a Snowflake reserved word.
pub fn is_reserved(word: &str) -> bool {
    RESERVED.binary_search(&word).is_ok()
}

/// True iff `word` contains any character outside `[A-Za-z0-9]`.
///
/// Spaces and underscores both count as non-alphanumeric.
pub fn has_non_alnum(word: &str) -> bool {
    word.chars().any(|c| !c.is_ascii_alphanumeric())
}

/// Wrap `word` in double quotes when `quote` is set, otherwise pass through.
pub fn quote_if_true(word: &str, quote: bool) -> String {
    if quote {
        format!("\"{}\"", word)
    } else {
        word.to_string()
    }
}

/// Retain only Unicode letters and digits.
///
/// Used for object-store sub-directory names, which must be safe in S3 keys
/// and COPY source paths.
pub fn clean_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_numeric())
        .collect()
}

/// Shape a source column name into a warehouse column identifier.
///
/// The name is upper-cased, then quoted iff it is a reserved word, starts
/// with a non-letter, or contains any non-alphanumeric character.
pub fn column_ident(name: &str) -> String {
    let upper = name.to_uppercase();
    let needs_quotes = is_reserved(&upper)
        || !upper.chars().next().map(char::is_alphabetic).unwrap_or(false)
        || has_non_alnum(&upper);
    quote_if_true(&upper, needs_quotes)
}

/// Shape a source `schema.table` pair into a single warehouse table identifier.
///
/// Both parts are upper-cased with spaces converted to underscores and joined
/// with an underscore; the result is quoted iff either source name contained
/// a non-alphanumeric character.
pub fn table_ident(schema: &str, table: &str) -> String {
    let either_non_alnum = has_non_alnum(schema) || has_non_alnum(table);
    let combined = format!(
        "{}_{}",
        schema.to_uppercase().replace(' ', "_"),
        table.to_uppercase().replace(' ', "_"),
    );
    quote_if_true(&combined, either_non_alnum)
}

/// Object-store sub-directory for one table's chunks.
///
/// Built from the original-case source names so `dbo.Customers` lands under
/// `dboCustomers`.
pub fn object_dir_name(schema: &str, table: &str) -> String {
    clean_string(&format!("{}_{}", schema, table))
}

/// Normalize a target database name: strip the corporate DNS suffix, convert
/// spaces, and upper-case.
pub fn normalize_target_db(name: &str) -> String {
    name.replace(".NA.PACCAR.COM", "")
        .to_uppercase()
        .replace(' ', "_")
}

/// Staging schema name: `{DIVISION}_MSSQL_{DB}_STAGING`, quoted iff the
/// source database name contained non-alphanumeric characters.
pub fn staging_schema_name(division_code: &str, source_db: &str) -> String {
    let name = format!(
        "{}_MSSQL_{}_STAGING",
        division_code.to_uppercase(),
        source_db.to_uppercase(),
    );
    quote_if_true(&name, has_non_alnum(source_db))
}

/// Draft production schema name handed to the schema-access grant procedure.
///
/// The procedure's return value, not this draft, is the authoritative
/// production schema.
pub fn draft_prod_schema_name(division_code: &str, source_db: &str) -> String {
    format!(
        "{}_MSSQL_{}",
        division_code.to_uppercase(),
        source_db.to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_list_is_sorted() {
        let mut sorted = RESERVED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED);
    }

    #[test]
    fn test_has_non_alnum() {
        assert!(!has_non_alnum("Customers"));
        assert!(!has_non_alnum("Table123"));
        assert!(has_non_alnum("Order Details"));
        assert!(has_non_alnum("a_b"));
        assert!(has_non_alnum("a-b"));
        assert!(!has_non_alnum(""));
    }

    #[test]
    fn test_quote_iff_non_alnum() {
        for s in ["Customers", "Order Details", "x", "a_b", "123"] {
            let quoted = quote_if_true(s, has_non_alnum(s));
            assert_eq!(quoted.starts_with('"'), has_non_alnum(s), "{}", s);
        }
    }

    #[test]
    fn test_clean_string() {
        assert_eq!(clean_string("dbo_Customers"), "dboCustomers");
        assert_eq!(clean_string("sales_Order Details"), "salesOrderDetails");
        assert_eq!(clean_string("naïve42"), "naïve42");
    }

    #[test]
    fn test_column_ident_reserved() {
        assert_eq!(column_ident("Order"), "\"ORDER\"");
        assert_eq!(column_ident("select"), "\"SELECT\"");
    }

    #[test]
    fn test_column_ident_plain() {
        assert_eq!(column_ident("Id"), "ID");
        assert_eq!(column_ident("Name"), "NAME");
    }

    #[test]
    fn test_column_ident_non_letter_start() {
        assert_eq!(column_ident("1stPlace"), "\"1STPLACE\"");
    }

    #[test]
    fn test_column_ident_non_alnum() {
        assert_eq!(column_ident("Unit Price"), "\"UNIT PRICE\"");
    }

    #[test]
    fn test_table_ident() {
        assert_eq!(table_ident("dbo", "Customers"), "DBO_CUSTOMERS");
        assert_eq!(
            table_ident("sales", "Order Details"),
            "\"SALES_ORDER_DETAILS\""
        );
    }

    #[test]
    fn test_object_dir_name() {
        assert_eq!(object_dir_name("dbo", "Customers"), "dboCustomers");
        assert_eq!(object_dir_name("sales", "Order Details"), "salesOrderDetails");
    }

    #[test]
    fn test_normalize_target_db() {
        assert_eq!(normalize_target_db("ANALYTICS.NA.PACCAR.COM"), "ANALYTICS");
        assert_eq!(normalize_target_db("my db"), "MY_DB");
    }

    #[test]
    fn test_normalize_target_db_idempotent() {
        for s in ["ANALYTICS.NA.PACCAR.COM", "my db", "PLAIN"] {
            let once = normalize_target_db(s);
            assert_eq!(normalize_target_db(&once), once);
        }
    }

    #[test]
    fn test_schema_names() {
        assert_eq!(staging_schema_name("PAC", "SALES"), "PAC_MSSQL_SALES_STAGING");
        assert_eq!(
            staging_schema_name("pac", "my db"),
            "\"PAC_MSSQL_MY DB_STAGING\""
        );
        assert_eq!(draft_prod_schema_name("PAC", "SALES"), "PAC_MSSQL_SALES");
    }
}
