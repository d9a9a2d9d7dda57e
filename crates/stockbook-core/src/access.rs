//! # Roles and Permissions
//!
//! Every API route names one [`Permission`]; a user's [`Role`] decides which
//! permissions they hold.
//!
//! ```text
//! ┌──────────────────────────┬───────┬─────────┬───────┐
//! │ Permission               │ admin │ manager │ clerk │
//! ├──────────────────────────┼───────┼─────────┼───────┤
//! │ partners / catalog read  │   ✓   │    ✓    │   ✓   │
//! │ partners / catalog write │   ✓   │    ✓    │       │
//! │ inventory.read           │   ✓   │    ✓    │   ✓   │
//! │ inventory.adjust         │   ✓   │    ✓    │       │
//! │ transactions.*           │   ✓   │    ✓    │   ✓   │
//! │ accounting.read          │   ✓   │    ✓    │       │
//! │ accounting.write         │   ✓   │    ✓    │       │
//! │ payments.*               │   ✓   │    ✓    │   ✓   │
//! │ notifications            │   ✓   │    ✓    │   ✓   │
//! │ settings                 │   ✓   │         │       │
//! └──────────────────────────┴───────┴─────────┴───────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Clerk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Permission {
    #[serde(rename = "partners.read")]
    PartnersRead,
    #[serde(rename = "partners.write")]
    PartnersWrite,
    #[serde(rename = "catalog.read")]
    CatalogRead,
    #[serde(rename = "catalog.write")]
    CatalogWrite,
    #[serde(rename = "inventory.read")]
    InventoryRead,
    #[serde(rename = "inventory.adjust")]
    InventoryAdjust,
    #[serde(rename = "transactions.read")]
    TransactionsRead,
    #[serde(rename = "transactions.write")]
    TransactionsWrite,
    #[serde(rename = "accounting.read")]
    AccountingRead,
    #[serde(rename = "accounting.write")]
    AccountingWrite,
    #[serde(rename = "payments.read")]
    PaymentsRead,
    #[serde(rename = "payments.write")]
    PaymentsWrite,
    #[serde(rename = "notifications")]
    Notifications,
    #[serde(rename = "settings")]
    Settings,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::PartnersRead,
        Permission::PartnersWrite,
        Permission::CatalogRead,
        Permission::CatalogWrite,
        Permission::InventoryRead,
        Permission::InventoryAdjust,
        Permission::TransactionsRead,
        Permission::TransactionsWrite,
        Permission::AccountingRead,
        Permission::AccountingWrite,
        Permission::PaymentsRead,
        Permission::PaymentsWrite,
        Permission::Notifications,
        Permission::Settings,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::PartnersRead => "partners.read",
            Permission::PartnersWrite => "partners.write",
            Permission::CatalogRead => "catalog.read",
            Permission::CatalogWrite => "catalog.write",
            Permission::InventoryRead => "inventory.read",
            Permission::InventoryAdjust => "inventory.adjust",
            Permission::TransactionsRead => "transactions.read",
            Permission::TransactionsWrite => "transactions.write",
            Permission::AccountingRead => "accounting.read",
            Permission::AccountingWrite => "accounting.write",
            Permission::PaymentsRead => "payments.read",
            Permission::PaymentsWrite => "payments.write",
            Permission::Notifications => "notifications",
            Permission::Settings => "settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Clerk => "clerk",
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Admin => true,
            Role::Manager => permission != Settings,
            Role::Clerk => matches!(
                permission,
                PartnersRead
                    | CatalogRead
                    | InventoryRead
                    | TransactionsRead
                    | TransactionsWrite
                    | PaymentsRead
                    | PaymentsWrite
                    | Notifications
            ),
        }
    }

    /// The full permission list for this role, in declaration order.
    pub fn permissions(&self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.allows(*p))
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
