//! Two-slot table versioning for the explore table.
//!
//! A sync writes into the standby slot (`staging`) and promotes it with a
//! pair of renames: `live -> retired`, then `staging -> live`. The pair must
//! be applied as one unit so the live name always resolves to a table.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Postgres truncates identifiers beyond this length.
const MAX_IDENTIFIER_LEN: usize = 63;
const STAGING_SUFFIX: &str = "_staging";
const RETIRED_SUFFIX: &str = "_old";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableNameError {
    #[error("table name must not be empty")]
    Empty,
    #[error("table name `{0}` must start with a lowercase letter or underscore")]
    InvalidStart(String),
    #[error("table name `{0}` may only contain lowercase ASCII letters, digits and underscores")]
    InvalidCharacter(String),
    #[error("table name `{0}` is too long once the staging suffix is added")]
    TooLong(String),
}

/// The live / staging / retired names that make up one versioned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    live: String,
    staging: String,
    retired: String,
}

impl TableSet {
    pub const DEFAULT_LIVE: &'static str = "explore_books";

    /// Derives the staging and retired names from a validated live name.
    ///
    /// # Errors
    /// Returns [`TableNameError`] when `live` is not a plain lowercase SQL identifier.
    pub fn new(live: &str) -> Result<Self, TableNameError> {
        validate_identifier(live)?;
        if live.len() + STAGING_SUFFIX.len() > MAX_IDENTIFIER_LEN {
            return Err(TableNameError::TooLong(live.to_string()));
        }

        Ok(Self {
            live: live.to_string(),
            staging: format!("{live}{STAGING_SUFFIX}"),
            retired: format!("{live}{RETIRED_SUFFIX}"),
        })
    }

    #[must_use]
    pub fn live(&self) -> &str {
        &self.live
    }

    #[must_use]
    pub fn staging(&self) -> &str {
        &self.staging
    }

    #[must_use]
    pub fn retired(&self) -> &str {
        &self.retired
    }

    /// The rename pair that promotes staging to live.
    #[must_use]
    pub fn swap_plan(&self) -> SwapPlan {
        SwapPlan {
            retire: Rename {
                from: self.live.clone(),
                to: self.retired.clone(),
            },
            promote: Rename {
                from: self.staging.clone(),
                to: self.live.clone(),
            },
        }
    }

    /// Canonical DDL for any slot of this set.
    #[must_use]
    pub fn create_table_sql(table: &str, if_not_exists: bool) -> String {
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        format!(
            r"
            CREATE TABLE {guard}{table} (
                id SERIAL PRIMARY KEY,
                google_books_id VARCHAR(50),
                title VARCHAR(255) NOT NULL,
                author VARCHAR(255) NOT NULL,
                book_image VARCHAR(500),
                isbn_13 VARCHAR(20),
                isbn_10 VARCHAR(15),
                list_name VARCHAR(100) NOT NULL,
                list_name_encoded VARCHAR(100) NOT NULL,
                rank INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT NOW()
            )
            "
        )
    }
}

impl Default for TableSet {
    fn default() -> Self {
        Self {
            live: Self::DEFAULT_LIVE.to_string(),
            staging: format!("{}{STAGING_SUFFIX}", Self::DEFAULT_LIVE),
            retired: format!("{}{RETIRED_SUFFIX}", Self::DEFAULT_LIVE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

impl Rename {
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.from, self.to)
    }
}

impl fmt::Display for Rename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    Retire,
    Promote,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwapStepError {
    #[error("{step:?} failed: table `{table}` does not exist")]
    MissingSource { step: SwapStep, table: String },
    #[error("{step:?} failed: table `{table}` already exists")]
    TargetExists { step: SwapStep, table: String },
}

/// The ordered rename pair of one promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    retire: Rename,
    promote: Rename,
}

impl SwapPlan {
    #[must_use]
    pub fn steps(&self) -> [(SwapStep, &Rename); 2] {
        [
            (SwapStep::Retire, &self.retire),
            (SwapStep::Promote, &self.promote),
        ]
    }

    /// Applies both renames to a name-keyed table catalog, all or nothing.
    ///
    /// If the promote step fails the retire step is undone before the error
    /// is returned, leaving `catalog` exactly as it was.
    ///
    /// # Errors
    /// Returns [`SwapStepError`] naming the step that could not be applied.
    pub fn apply<T>(&self, catalog: &mut HashMap<String, T>) -> Result<(), SwapStepError> {
        rename_entry(catalog, SwapStep::Retire, &self.retire)?;
        if let Err(error) = rename_entry(catalog, SwapStep::Promote, &self.promote) {
            if let Some(table) = catalog.remove(&self.retire.to) {
                catalog.insert(self.retire.from.clone(), table);
            }
            return Err(error);
        }
        Ok(())
    }
}

fn rename_entry<T>(
    catalog: &mut HashMap<String, T>,
    step: SwapStep,
    rename: &Rename,
) -> Result<(), SwapStepError> {
    if catalog.contains_key(&rename.to) {
        return Err(SwapStepError::TargetExists {
            step,
            table: rename.to.clone(),
        });
    }
    let table = catalog
        .remove(&rename.from)
        .ok_or_else(|| SwapStepError::MissingSource {
            step,
            table: rename.from.clone(),
        })?;
    catalog.insert(rename.to.clone(), table);
    Ok(())
}

fn validate_identifier(name: &str) -> Result<(), TableNameError> {
    let Some(first) = name.chars().next() else {
        return Err(TableNameError::Empty);
    };
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(TableNameError::InvalidStart(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(TableNameError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> HashMap<String, &'static str> {
        names
            .iter()
            .map(|name| ((*name).to_string(), "rows"))
            .collect()
    }

    #[test]
    fn derives_slot_names_from_live_name() {
        let tables = TableSet::new("explore_books").expect("valid name");
        assert_eq!(tables, TableSet::default());
        assert_eq!(tables.staging(), "explore_books_staging");
        assert_eq!(tables.retired(), "explore_books_old");
    }

    #[test]
    fn created_at_column_matches_legacy_timestamp_type() {
        let sql = TableSet::create_table_sql("explore_books", true);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS explore_books"));
        assert!(sql.contains("created_at TIMESTAMP NOT NULL"));
        assert!(!sql.contains("TIMESTAMPTZ"));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert_eq!(TableSet::new(""), Err(TableNameError::Empty));
        assert!(matches!(
            TableSet::new("1books"),
            Err(TableNameError::InvalidStart(_))
        ));
        assert!(matches!(
            TableSet::new("books\"; drop"),
            Err(TableNameError::InvalidCharacter(_))
        ));
        assert!(matches!(
            TableSet::new(&"a".repeat(60)),
            Err(TableNameError::TooLong(_))
        ));
    }

    #[test]
    fn swap_plan_renders_rename_pair_in_order() {
        let plan = TableSet::default().swap_plan();
        let sql: Vec<String> = plan.steps().iter().map(|(_, r)| r.to_sql()).collect();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE explore_books RENAME TO explore_books_old",
                "ALTER TABLE explore_books_staging RENAME TO explore_books",
            ]
        );
    }

    #[test]
    fn apply_promotes_staging_and_retires_live() {
        let tables = TableSet::default();
        let mut catalog = HashMap::from([
            ("explore_books".to_string(), "old rows"),
            ("explore_books_staging".to_string(), "new rows"),
        ]);

        tables.swap_plan().apply(&mut catalog).expect("swap applies");

        assert_eq!(catalog.get("explore_books"), Some(&"new rows"));
        assert_eq!(catalog.get("explore_books_old"), Some(&"old rows"));
        assert!(!catalog.contains_key("explore_books_staging"));
    }

    #[test]
    fn failed_promote_restores_live_table() {
        let tables = TableSet::default();
        let mut catalog = catalog(&["explore_books"]);

        let error = tables
            .swap_plan()
            .apply(&mut catalog)
            .expect_err("missing staging must fail");

        assert_eq!(
            error,
            SwapStepError::MissingSource {
                step: SwapStep::Promote,
                table: "explore_books_staging".to_string(),
            }
        );
        assert_eq!(catalog, self::catalog(&["explore_books"]));
    }

    #[test]
    fn stale_retired_table_blocks_swap_without_side_effects() {
        let tables = TableSet::default();
        let mut catalog = catalog(&["explore_books", "explore_books_staging", "explore_books_old"]);
        let before = catalog.clone();

        let error = tables
            .swap_plan()
            .apply(&mut catalog)
            .expect_err("retired slot occupied");

        assert!(matches!(
            error,
            SwapStepError::TargetExists {
                step: SwapStep::Retire,
                ..
            }
        ));
        assert_eq!(catalog, before);
    }
}
