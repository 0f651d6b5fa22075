//! Entity identity: parsing of native identifiers and deterministic derivation
//! for entities the external document does not identify.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{FieldPath, MappingError, Result};

/// Length of the hyphenated textual form; the only form accepted on input.
const HYPHENATED_LEN: usize = 36;

/// Parses a native identifier. Anything other than a hyphenated UUID is
/// rejected with the field path; no replacement identifier is produced.
pub fn parse_uuid(value: &str, path: &FieldPath) -> Result<Uuid> {
    let invalid = || MappingError::InvalidIdentifier {
        path: path.clone(),
        value: value.to_string(),
    };
    if value.len() != HYPHENATED_LEN {
        return Err(invalid());
    }
    Uuid::try_parse(value).map_err(|_| invalid())
}

pub fn parse_opt_uuid(value: &Option<String>, path: &FieldPath) -> Result<Option<Uuid>> {
    value.as_deref().map(|v| parse_uuid(v, path)).transpose()
}

pub fn parse_uuid_list(values: &Option<Vec<String>>, path: &FieldPath) -> Result<Option<Vec<Uuid>>> {
    crate::column::try_map_opt(values, |i, v| parse_uuid(v, &path.index(i)))
}

pub fn parse_uuid_vec(values: &[String], path: &FieldPath) -> Result<Vec<Uuid>> {
    crate::column::try_map_vec(values, |i, v| parse_uuid(v, &path.index(i)))
}

pub fn render_uuid(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

pub fn render_opt_uuid(id: &Option<Uuid>) -> Option<String> {
    id.as_ref().map(render_uuid)
}

pub fn render_uuid_list(ids: &Option<Vec<Uuid>>) -> Option<Vec<String>> {
    crate::column::map_opt(ids, render_uuid)
}

pub fn render_uuid_vec(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(render_uuid).collect()
}

/// Derives a stable identifier from descriptive attributes.
///
/// Pairs are sorted, then each key and value is fed to SHA-256 behind its
/// byte length, so no choice of separator characters can make two attribute
/// sets collide. The first eight digest bytes seed a `StdRng`, from which
/// sixteen bytes are drawn and stamped as a version 4 UUID.
pub fn derive_uuid<I, K, V>(attributes: I) -> Uuid
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = attributes
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (k, v) in &pairs {
        hasher.update((k.len() as u64).to_be_bytes());
        hasher.update(k.as_bytes());
        hasher.update((v.len() as u64).to_be_bytes());
        hasher.update(v.as_bytes());
    }

    let mut rng = StdRng::seed_from_u64(seed_from_digest(&hasher.finalize()));
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Identity of a structural block or tree node that has no native
/// identifier: derived from the owning document and the node's field path.
pub fn structural_uuid(root_id: Uuid, path: &FieldPath) -> Uuid {
    derive_uuid([("document", render_uuid(&root_id)), ("path", path.to_string())])
}

/// Identity of a component known only by a descriptive key such as
/// `components/common/ssh`, optionally qualified by extra attributes.
pub fn component_uuid<'a, I>(identifier: &'a str, attributes: I) -> Uuid
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let attrs = std::iter::once(("identifier", identifier)).chain(attributes);
    derive_uuid(attrs)
}

fn seed_from_digest(digest: &[u8]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn derive_is_order_independent() {
        let a = derive_uuid([("name", "ssh"), ("kind", "software"), ("vendor", "openbsd")]);
        let b = derive_uuid([("vendor", "openbsd"), ("name", "ssh"), ("kind", "software")]);
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert("kind".to_string(), "software".to_string());
        map.insert("vendor".to_string(), "openbsd".to_string());
        map.insert("name".to_string(), "ssh".to_string());
        assert_eq!(derive_uuid(&map), a);
    }

    #[test]
    fn derive_distinguishes_attribute_sets() {
        let a = derive_uuid([("identifier", "components/common/ssh")]);
        let b = derive_uuid([("identifier", "components/common/sshd")]);
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn separators_inside_attributes_do_not_collide() {
        assert_ne!(derive_uuid([("a", "1,b=2")]), derive_uuid([("a", "1"), ("b", "2")]));
        assert_ne!(derive_uuid([("a=b", "c")]), derive_uuid([("a", "b=c")]));
        assert_ne!(derive_uuid([("ab", "")]), derive_uuid([("a", "b")]));
    }

    #[test]
    fn component_uuid_matches_plain_derivation() {
        let via_helper = component_uuid("components/common/ssh", [("version", "9.6")]);
        let direct = derive_uuid([("version", "9.6"), ("identifier", "components/common/ssh")]);
        assert_eq!(via_helper, direct);
    }

    #[test]
    fn parse_rejects_garbage_with_path() {
        let path = FieldPath::root("catalog").field("uuid");
        let err = parse_uuid("invalid-uuid", &path).unwrap_err();
        match err {
            MappingError::InvalidIdentifier { path, value } => {
                assert_eq!(path.as_str(), "catalog.uuid");
                assert_eq!(value, "invalid-uuid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_rejects_non_hyphenated_forms() {
        let path = FieldPath::root("x");
        assert!(parse_uuid("74c8ba1e5cd44ad1bbfdd888e2f6c724", &path).is_err());
        assert!(parse_uuid("{74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724}", &path).is_err());
        let id = parse_uuid("74C8BA1E-5CD4-4AD1-BBFD-D888E2F6C724", &path).unwrap();
        assert_eq!(render_uuid(&id), "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724");
    }
}
