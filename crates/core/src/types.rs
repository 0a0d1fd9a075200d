// crates/core/src/types.rs
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::lifecycle::SessionStatus;

/// One row of the status reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDef {
    pub status_id: i64,
    pub code: String,
    pub display_name: String,
}

/// Status id and display name for every [`SessionStatus`], resolved once at
/// startup so handlers never look statuses up by code at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCatalog {
    defs: HashMap<SessionStatus, StatusDef>,
}

impl StatusCatalog {
    /// Build the catalog from table rows. Every status must be present;
    /// unknown codes are ignored.
    pub fn from_rows<I>(rows: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = StatusDef>,
    {
        let mut defs = HashMap::new();
        for row in rows {
            if let Some(status) = SessionStatus::from_code(&row.code) {
                defs.entry(status).or_insert(row);
            }
        }
        if let Some(missing) = SessionStatus::ALL.iter().find(|s| !defs.contains_key(s)) {
            return Err(CatalogError::MissingStatus {
                code: missing.code(),
            });
        }
        Ok(Self { defs })
    }

    /// The row for `status`. Always present after construction.
    pub fn def(&self, status: SessionStatus) -> &StatusDef {
        &self.defs[&status]
    }

    pub fn id(&self, status: SessionStatus) -> i64 {
        self.def(status).status_id
    }

    pub fn display_name(&self, status: SessionStatus) -> &str {
        &self.def(status).display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, code: &str, name: &str) -> StatusDef {
        StatusDef {
            status_id: id,
            code: code.into(),
            display_name: name.into(),
        }
    }

    #[test]
    fn test_catalog_resolves_all_statuses() {
        let catalog = StatusCatalog::from_rows([
            row(1, "ACTIVE", "Active"),
            row(2, "COMPLETED", "Completed"),
            row(3, "CANCELLED", "Cancelled"),
            row(9, "PAUSED", "Paused"),
        ])
        .unwrap();
        assert_eq!(catalog.id(SessionStatus::Completed), 2);
        assert_eq!(catalog.display_name(SessionStatus::Cancelled), "Cancelled");
    }

    #[test]
    fn test_catalog_missing_row_is_an_error() {
        let err = StatusCatalog::from_rows([row(1, "ACTIVE", "Active"), row(3, "CANCELLED", "Cancelled")])
            .unwrap_err();
        assert_eq!(err, CatalogError::MissingStatus { code: "COMPLETED" });
    }
}
