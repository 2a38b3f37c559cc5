use uuid::Uuid;

use super::{Branch, ResourceKind, Visibility};

/// WHERE fragment with positional parameters starting at `$1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPredicate {
    pub clause: String,
    pub params: Vec<Uuid>,
}

/// Renders `visibility` against a table aliased as `alias`. Branches become
/// OR-ed terms; a scope with no applicable branch renders as `FALSE`.
pub fn predicate(visibility: &Visibility, alias: &str) -> SqlPredicate {
    let mut params = vec![];
    let mut terms = vec![];

    for branch in visibility.branches() {
        match (*branch, visibility.kind()) {
            (Branch::OwnedPrivate(actor), _) => {
                params.push(actor);
                terms.push(format!(
                    "({alias}.user_id = ${} AND {alias}.family_id IS NULL)",
                    params.len()
                ));
            }
            (Branch::Family(family_id), _) => {
                params.push(family_id);
                terms.push(format!("{alias}.family_id = ${}", params.len()));
            }
            (Branch::Collaborator(actor), ResourceKind::Note) => {
                params.push(actor);
                terms.push(format!(
                    "EXISTS (SELECT 1 FROM collaborators c WHERE c.note_id = {alias}.id AND c.user_id = ${})",
                    params.len()
                ));
            }
            (Branch::System, ResourceKind::Event) => {
                terms.push(format!("{alias}.is_system"));
            }
            // Branch does not exist for this resource
            _ => {}
        }
    }

    let clause = if terms.is_empty() {
        "FALSE".to_string()
    } else {
        format!("({})", terms.join(" OR "))
    };

    SqlPredicate { clause, params }
}
