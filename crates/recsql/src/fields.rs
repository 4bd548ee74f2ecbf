//! Field descriptors and field-set discovery.
//!
//! Every record type declares its fields once, as a static descriptor list
//! (normally generated by `#[derive(Record)]`). The [`FieldSet`] derived from
//! it is the ordered list of columns the caller may write, excluding the
//! system-managed columns and embedded sub-structures.

use crate::record::Record;

/// Columns maintained by the store itself.
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// The only system column callers may filter on.
pub const ID_COLUMN: &str = "id";

/// Check whether a column is system-managed.
pub fn is_system_column(name: &str) -> bool {
    SYSTEM_COLUMNS.contains(&name)
}

/// How a declared field maps onto the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain column.
    Column,
    /// An embedded structure whose own columns are managed elsewhere.
    Embedded,
}

/// Static description of one declared record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn column(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Column,
        }
    }

    pub const fn embedded(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Embedded,
        }
    }

    /// Whether this descriptor contributes a column to the field set.
    pub fn is_persistable(&self) -> bool {
        self.kind == FieldKind::Column && !self.name.contains('.') && !is_system_column(self.name)
    }
}

/// Ordered, duplicate-free list of persistable column names for one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    names: Vec<&'static str>,
}

impl FieldSet {
    /// Derive the field set from a descriptor list, in declaration order.
    ///
    /// Skips embedded fields, dotted (nested) names and the system columns.
    /// A repeated name keeps its first position.
    pub fn discover(descriptors: &[FieldDescriptor]) -> Self {
        let mut names: Vec<&'static str> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors.iter().filter(|d| d.is_persistable()) {
            debug_assert!(
                !names.contains(&descriptor.name),
                "duplicate field descriptor {:?}",
                descriptor.name
            );
            if !names.contains(&descriptor.name) {
                names.push(descriptor.name);
            }
        }
        Self { names }
    }

    /// Field set of a record type.
    pub fn of<R: Record>() -> Self {
        Self::discover(R::descriptors())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| *n == name)
    }

    pub fn as_slice(&self) -> &[&'static str] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
