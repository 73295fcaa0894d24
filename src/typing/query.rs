//! Typing statement construction

use crate::catalog::StreamConfig;
use crate::dialect::SqlDialect;
use crate::naming::{
    ColumnId, COLUMN_EXTRACTED_AT, COLUMN_LOADED_AT, COLUMN_META, COLUMN_RAW_ID,
};
use crate::schema::{AirbyteType, PrimitiveKind};
use crate::sql::Sql;
use chrono::{DateTime, Utc};

const ROW_NUMBER: &str = "_airbyte_row_number";

/// Which raw rows a typing run reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSource {
    /// Rows not yet typed, optionally limited to rows extracted after `since`
    Unprocessed { since: Option<DateTime<Utc>> },
    /// Every raw row (used to rebuild a table from scratch)
    FullHistory,
}

impl TypingSource {
    /// All unprocessed rows
    pub fn unprocessed() -> Self {
        TypingSource::Unprocessed { since: None }
    }
}

/// Build the typing operation for one stream
///
/// The result is a single transaction: clear target rows that came from the
/// selected raw rows, insert typed (and, for `append_dedup`, deduplicated)
/// rows, drop superseded and deleted rows, then mark the raw rows processed.
/// Running it twice over the same raw data yields the same final table.
pub fn build_typing_operation(
    dialect: &dyn SqlDialect,
    config: &StreamConfig,
    source: TypingSource,
    target_suffix: &str,
) -> Sql {
    TypingQuery {
        dialect,
        config,
        source,
        target: dialect.table(&config.id().final_table(target_suffix)),
        raw: dialect.table(&config.id().raw_table()),
    }
    .build()
}

struct TypingQuery<'a> {
    dialect: &'a dyn SqlDialect,
    config: &'a StreamConfig,
    source: TypingSource,
    target: String,
    raw: String,
}

impl TypingQuery<'_> {
    fn build(&self) -> Sql {
        let mut statements = vec![self.delete_retyped_rows(), self.insert_typed_rows()];

        if self.config.is_dedup() {
            statements.push(self.delete_superseded_rows());
            if let Some(marker) = self.config.deletion_marker() {
                statements.push(self.delete_deleted_rows(marker));
            }
        }

        statements.push(self.mark_processed());
        Sql::transactionally(statements)
    }

    fn q(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    /// WHERE clause over the raw table selecting the rows to type
    fn selection(&self) -> String {
        let loaded_at = self.q(COLUMN_LOADED_AT);

        let unprocessed = match self.source {
            TypingSource::FullHistory => return "TRUE".to_string(),
            TypingSource::Unprocessed { since: None } => format!("{loaded_at} IS NULL"),
            TypingSource::Unprocessed { since: Some(ts) } => format!(
                "{loaded_at} IS NULL AND {} > {}",
                self.q(COLUMN_EXTRACTED_AT),
                self.dialect.timestamp_literal(ts)
            ),
        };

        // Processed deletions are re-read so they keep winning against late older inserts
        match self.config.deletion_marker() {
            Some(marker) if self.config.is_dedup() => format!(
                "({unprocessed}) OR ({loaded_at} IS NOT NULL AND {})",
                self.dialect.raw_deletion_marker_is_set(marker)
            ),
            _ => unprocessed,
        }
    }

    fn delete_retyped_rows(&self) -> String {
        let raw_id = self.q(COLUMN_RAW_ID);
        format!(
            "DELETE FROM {target} WHERE {raw_id} IN (SELECT {raw_id} FROM {raw} WHERE {selection})",
            target = self.target,
            raw = self.raw,
            selection = self.selection(),
        )
    }

    fn final_columns(&self) -> Vec<String> {
        [COLUMN_RAW_ID, COLUMN_EXTRACTED_AT, COLUMN_META]
            .into_iter()
            .map(|c| self.q(c))
            .chain(self.config.columns().keys().map(|c| self.q(c.name())))
            .collect()
    }

    fn typed_select(&self) -> String {
        let mut projections = vec![self.q(COLUMN_RAW_ID), self.q(COLUMN_EXTRACTED_AT)];
        let mut failures = Vec::new();

        for (column, ty) in self.config.columns() {
            let cast = self.dialect.extract_and_cast(column, ty);
            if can_fail(ty) {
                failures.push((
                    column.original_name.clone(),
                    format!("{} AND ({cast}) IS NULL", self.dialect.field_is_set(column)),
                ));
            }
            projections.push(format!("{cast} AS {}", self.q(column.name())));
        }
        projections.push(format!(
            "{} AS {}",
            self.dialect.meta_expression(&failures),
            self.q(COLUMN_META)
        ));

        format!(
            "SELECT {} FROM {} WHERE {}",
            projections.join(", "),
            self.raw,
            self.selection()
        )
    }

    /// `ROW_NUMBER()` ranking rows per primary key, best first
    fn row_number(&self) -> String {
        let partition: Vec<String> = self
            .config
            .primary_key()
            .iter()
            .map(|c| self.q(c.name()))
            .collect();

        let mut order = Vec::new();
        if let Some(cursor) = self.config.cursor() {
            order.push(format!("{} DESC NULLS LAST", self.q(cursor.name())));
        }
        order.push(format!("{} DESC", self.q(COLUMN_EXTRACTED_AT)));
        order.push(format!("{} DESC", self.q(COLUMN_RAW_ID)));

        format!(
            "ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {}) AS {}",
            partition.join(", "),
            order.join(", "),
            self.q(ROW_NUMBER)
        )
    }

    /// Predicate: some primary key column is NULL (missing or failed to cast)
    ///
    /// Such rows have no key to deduplicate on, so every one of them is kept.
    fn primary_key_missing(&self) -> String {
        let checks: Vec<String> = self
            .config
            .primary_key()
            .iter()
            .map(|c| format!("{} IS NULL", self.q(c.name())))
            .collect();
        format!("({})", checks.join(" OR "))
    }

    fn insert_typed_rows(&self) -> String {
        let columns = self.final_columns().join(", ");
        let typed = self.typed_select();

        let select = if self.config.is_dedup() {
            format!(
                "SELECT {columns} FROM (SELECT *, {} FROM ({typed}) AS \"typed\") AS \"ranked\" \
                 WHERE {} = 1 OR {}",
                self.row_number(),
                self.q(ROW_NUMBER),
                self.primary_key_missing()
            )
        } else {
            format!("SELECT {columns} FROM ({typed}) AS \"typed\"")
        };

        format!("INSERT INTO {} ({columns}) {select}", self.target)
    }

    fn delete_superseded_rows(&self) -> String {
        let raw_id = self.q(COLUMN_RAW_ID);
        format!(
            "DELETE FROM {target} WHERE {raw_id} IN (SELECT {raw_id} FROM \
             (SELECT {raw_id}, {row_number} FROM {target} WHERE NOT {missing}) AS \"ranked\" \
             WHERE {rn} <> 1)",
            target = self.target,
            row_number = self.row_number(),
            missing = self.primary_key_missing(),
            rn = self.q(ROW_NUMBER),
        )
    }

    fn delete_deleted_rows(&self, marker: &ColumnId) -> String {
        let predicate = match self.config.columns().get(marker) {
            Some(AirbyteType::Primitive(PrimitiveKind::Boolean)) => "IS TRUE",
            _ => "IS NOT NULL",
        };
        format!(
            "DELETE FROM {} WHERE {} {predicate}",
            self.target,
            self.q(marker.name())
        )
    }

    fn mark_processed(&self) -> String {
        let loaded_at = self.q(COLUMN_LOADED_AT);
        let mut statement = format!(
            "UPDATE {} SET {loaded_at} = {} WHERE {loaded_at} IS NULL",
            self.raw,
            self.dialect.current_timestamp()
        );
        if let TypingSource::Unprocessed { since: Some(ts) } = self.source {
            statement.push_str(&format!(
                " AND {} > {}",
                self.q(COLUMN_EXTRACTED_AT),
                self.dialect.timestamp_literal(ts)
            ));
        }
        statement
    }
}

/// Whether a cast to this type can reject a present value
fn can_fail(ty: &AirbyteType) -> bool {
    !matches!(
        ty,
        AirbyteType::Primitive(PrimitiveKind::String | PrimitiveKind::Unknown)
    )
}
