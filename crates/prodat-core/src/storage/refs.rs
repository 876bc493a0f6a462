use git2::{Oid, Repository};

use crate::error::CoreError;
use crate::model::{EntityId, EntityKind};

/// Build the full ref name for a record: refs/prodat/<kind>/<ab>/<full-id>
pub fn entity_ref_name(kind: EntityKind, id: &EntityId) -> String {
    format!("{}{}/{}", kind.ref_prefix(), id.fanout_prefix(), id.as_str())
}

/// Create or update the ref for a record.
pub fn create_entity_ref(
    repo: &Repository,
    kind: EntityKind,
    id: &EntityId,
    commit_oid: Oid,
) -> Result<(), CoreError> {
    let ref_name = entity_ref_name(kind, id);
    let log_message = format!("prodat: write {}", kind.to_string().to_lowercase());
    repo.reference(&ref_name, commit_oid, true, &log_message)?;
    Ok(())
}

/// Delete the ref for a record.
pub fn delete_entity_ref(
    repo: &Repository,
    kind: EntityKind,
    id: &EntityId,
) -> Result<(), CoreError> {
    let ref_name = entity_ref_name(kind, id);
    let mut reference = repo.find_reference(&ref_name).map_err(|_| CoreError::NotFound {
        kind,
        id: id.to_string(),
    })?;
    reference.delete()?;
    Ok(())
}

/// Look up the commit a record ref points to, if the ref exists.
pub fn find_entity_ref(repo: &Repository, kind: EntityKind, id: &EntityId) -> Option<Oid> {
    repo.find_reference(&entity_ref_name(kind, id))
        .ok()
        .and_then(|r| r.target())
}

/// List all refs of one kind. Returns (EntityId, commit Oid) pairs.
pub fn list_entity_refs(
    repo: &Repository,
    kind: EntityKind,
) -> Result<Vec<(EntityId, Oid)>, CoreError> {
    let prefix = kind.ref_prefix();
    let mut results = Vec::new();
    let refs = repo.references_glob(&format!("{prefix}*/*"))?;
    for reference in refs {
        let reference = reference?;
        if let (Some(name), Some(oid)) = (reference.name(), reference.target()) {
            // name is refs/prodat/<kind>/ab/full-id
            if let Some((_fanout, full_id)) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.split_once('/'))
            {
                results.push((EntityId(full_id.to_string()), oid));
            }
        }
    }
    Ok(results)
}

/// Resolve an ID (or unique prefix) to its full ID and commit Oid.
pub fn resolve_entity_ref(
    repo: &Repository,
    kind: EntityKind,
    id_or_prefix: &str,
) -> Result<(EntityId, Oid), CoreError> {
    let needle = id_or_prefix.trim().to_ascii_lowercase();

    // First try exact match
    let exact_id = EntityId(needle.clone());
    if let Some(oid) = find_entity_ref(repo, kind, &exact_id) {
        return Ok((exact_id, oid));
    }

    if needle.len() < 2 {
        return Err(CoreError::InvalidId(format!(
            "'{id_or_prefix}' is too short, give at least 2 characters"
        )));
    }

    let mut matches: Vec<_> = list_entity_refs(repo, kind)?
        .into_iter()
        .filter(|(id, _)| id.as_str().starts_with(&needle))
        .collect();

    match matches.len() {
        0 => Err(CoreError::NotFound {
            kind,
            id: id_or_prefix.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(CoreError::Ambiguous {
            kind,
            prefix: id_or_prefix.to_string(),
            count,
        }),
    }
}
