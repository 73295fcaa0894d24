//! Statement batches

use std::fmt;

/// An ordered list of transactions, each an ordered list of statements
///
/// Every inner list is executed atomically; the lists run one after another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sql {
    transactions: Vec<Vec<String>>,
}

impl Sql {
    /// Empty batch
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single statement in its own transaction
    pub fn of(statement: impl Into<String>) -> Self {
        Self {
            transactions: vec![vec![statement.into()]],
        }
    }

    /// Each statement in its own transaction
    pub fn separately<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transactions: statements.into_iter().map(|s| vec![s.into()]).collect(),
        }
    }

    /// All statements in one transaction
    pub fn transactionally<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statements: Vec<String> = statements.into_iter().map(Into::into).collect();
        if statements.is_empty() {
            return Self::empty();
        }
        Self {
            transactions: vec![statements],
        }
    }

    /// Append another batch after this one
    pub fn concat(mut self, other: Sql) -> Self {
        self.transactions.extend(other.transactions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions in execution order
    pub fn transactions(&self) -> &[Vec<String>] {
        &self.transactions
    }

    /// All statements, flattened
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().flatten().map(String::as_str)
    }
}

impl FromIterator<Sql> for Sql {
    fn from_iter<T: IntoIterator<Item = Sql>>(iter: T) -> Self {
        iter.into_iter().fold(Sql::empty(), Sql::concat)
    }
}

impl fmt::Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for transaction in &self.transactions {
            if transaction.len() > 1 {
                writeln!(f, "BEGIN;")?;
            }
            for statement in transaction {
                writeln!(f, "{statement};")?;
            }
            if transaction.len() > 1 {
                writeln!(f, "COMMIT;")?;
            }
        }
        Ok(())
    }
}
