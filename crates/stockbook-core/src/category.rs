//! Category hierarchy rules.
//!
//! Categories form a forest through `parent_id`. The repository loads the
//! whole `id → parent_id` map (categories are few) and asks
//! [`check_parent`] before every insert or re-parent.

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult, ValidationError};

/// Verifies that giving `category_id` the parent `parent_id` keeps the
/// hierarchy acyclic.
///
/// `category_id` is `None` for a category that does not exist yet; a new
/// node cannot close a loop, so only the parent's existence is checked.
///
/// ```rust
/// use std::collections::HashMap;
/// use stockbook_core::category::check_parent;
///
/// // 1 ← 2 ← 3
/// let parents = HashMap::from([(1, None), (2, Some(1)), (3, Some(2))]);
/// assert!(check_parent(&parents, Some(3), 1).is_ok());
/// assert!(check_parent(&parents, Some(1), 3).is_err());
/// ```
pub fn check_parent(
    parents: &HashMap<i64, Option<i64>>,
    category_id: Option<i64>,
    parent_id: i64,
) -> CoreResult<()> {
    if !parents.contains_key(&parent_id) {
        return Err(ValidationError::invalid("parentId", format!("category {} does not exist", parent_id)).into());
    }

    let Some(category_id) = category_id else {
        return Ok(());
    };

    let cycle = CoreError::CategoryCycle {
        category_id,
        parent_id,
    };

    // Walk up from the proposed parent; reaching the category closes a loop.
    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(id) = cursor {
        if id == category_id || !seen.insert(id) {
            return Err(cycle);
        }
        cursor = parents.get(&id).copied().flatten();
    }

    Ok(())
}
