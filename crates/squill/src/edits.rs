//! The alter-table edit DSL.
//!
//! A [`TableEdits`] value is an ordered block of column and constraint
//! edits handed to the alter-table compiler. Edits are applied to the
//! working table in declaration order, and every edit addresses columns by
//! their pre-edit name: the user edits the column they know by its old
//! name, even after an earlier edit in the same block renamed it.

use crate::model::{Column, ColumnType, TableConstraint};

/// Changes to apply to one existing column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnChange {
    pub(crate) rename_to: Option<String>,
    pub(crate) column_type: Option<ColumnType>,
    pub(crate) constraints: Option<Vec<String>>,
    pub(crate) set_value: Option<String>,
}

impl ColumnChange {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the column.
    #[must_use]
    pub fn rename_to(mut self, name: impl Into<String>) -> Self {
        self.rename_to = Some(name.into());
        self
    }

    /// Changes the column's type affinity.
    #[must_use]
    pub fn retype(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Replaces the column's constraint clauses wholesale.
    #[must_use]
    pub fn constraints(mut self, clauses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.constraints = Some(clauses.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a raw SQL expression, evaluated against each old row, that
    /// populates the column during the rebuild's data copy.
    #[must_use]
    pub fn set_value(mut self, expr: impl Into<String>) -> Self {
        self.set_value = Some(expr.into());
        self
    }
}

/// One edit within an alter-table block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnEdit {
    Add {
        column: Column,
        set_value: Option<String>,
    },
    Drop {
        name: String,
    },
    Alter {
        name: String,
        change: ColumnChange,
    },
    AddConstraint {
        constraint: TableConstraint,
    },
    DropConstraint {
        name: String,
    },
}

/// An ordered block of edits for one `alter_table` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableEdits {
    pub(crate) edits: Vec<ColumnEdit>,
}

impl TableEdits {
    /// Creates an empty edit block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column at the end of the table. Existing rows take the
    /// column's `DEFAULT` value, or `NULL`.
    #[must_use]
    pub fn add_column(mut self, column: Column) -> Self {
        self.edits.push(ColumnEdit::Add {
            column,
            set_value: None,
        });
        self
    }

    /// Appends a column and populates existing rows from a raw SQL
    /// expression evaluated against each old row. Forces a rebuild.
    #[must_use]
    pub fn add_column_with(mut self, column: Column, set_value: impl Into<String>) -> Self {
        self.edits.push(ColumnEdit::Add {
            column,
            set_value: Some(set_value.into()),
        });
        self
    }

    /// Removes a column. Indexes covering it are dropped with it.
    #[must_use]
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.edits.push(ColumnEdit::Drop { name: name.into() });
        self
    }

    /// Alters a column, addressed by its pre-edit name.
    #[must_use]
    pub fn alter_column(mut self, name: impl Into<String>, change: ColumnChange) -> Self {
        self.edits.push(ColumnEdit::Alter {
            name: name.into(),
            change,
        });
        self
    }

    /// Adds a table-level constraint. Forces a rebuild.
    #[must_use]
    pub fn add_constraint(mut self, constraint: TableConstraint) -> Self {
        self.edits.push(ColumnEdit::AddConstraint { constraint });
        self
    }

    /// Drops a named table-level constraint. Forces a rebuild.
    #[must_use]
    pub fn drop_constraint(mut self, name: impl Into<String>) -> Self {
        self.edits.push(ColumnEdit::DropConstraint { name: name.into() });
        self
    }

    /// Returns true if the block contains no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
