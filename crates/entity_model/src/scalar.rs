use chrono::{DateTime, FixedOffset, NaiveDate};
use oscal_model::common as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::column::{decode_list, encode_list, map_opt, Codec, JsonColumn};
use crate::error::{FieldPath, MappingError, Result};
use crate::identity::{parse_opt_uuid, parse_uuid_list, parse_uuid_vec, render_opt_uuid, render_uuid_list, render_uuid_vec};
use crate::owner::{Owner, ResponsibleRoleOwner};

pub type Props = JsonColumn<Option<Vec<Property>>>;
pub type Links = JsonColumn<Option<Vec<Link>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub ns: Option<String>,
    pub value: String,
    pub class: Option<String>,
    pub group: Option<String>,
    pub remarks: Option<String>,
}

impl Codec for Property {
    type External = ext::Property;

    fn decode(ext: &ext::Property, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            name: ext.name.clone(),
            uuid: parse_opt_uuid(&ext.uuid, &path.field("uuid"))?,
            ns: ext.ns.clone(),
            value: ext.value.clone(),
            class: ext.class.clone(),
            group: ext.group.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Property {
        ext::Property {
            name: self.name.clone(),
            uuid: render_opt_uuid(&self.uuid),
            ns: self.ns.clone(),
            value: self.value.clone(),
            class: self.class.clone(),
            group: self.group.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: Option<String>,
    pub media_type: Option<String>,
    pub resource_fragment: Option<String>,
    pub text: Option<String>,
}

impl Codec for Link {
    type External = ext::Link;

    fn decode(ext: &ext::Link, _path: &FieldPath) -> Result<Self> {
        Ok(Self {
            href: ext.href.clone(),
            rel: ext.rel.clone(),
            media_type: ext.media_type.clone(),
            resource_fragment: ext.resource_fragment.clone(),
            text: ext.text.clone(),
        })
    }

    fn encode(&self) -> ext::Link {
        ext::Link {
            href: self.href.clone(),
            rel: self.rel.clone(),
            media_type: self.media_type.clone(),
            resource_fragment: self.resource_fragment.clone(),
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hash {
    pub algorithm: String,
    pub value: String,
}

impl Codec for Hash {
    type External = ext::Hash;

    fn decode(ext: &ext::Hash, _path: &FieldPath) -> Result<Self> {
        Ok(Self { algorithm: ext.algorithm.clone(), value: ext.value.clone() })
    }

    fn encode(&self) -> ext::Hash {
        ext::Hash { algorithm: self.algorithm.clone(), value: self.value.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_type: Option<String>,
    pub addr_lines: Option<Vec<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Codec for Address {
    type External = ext::Address;

    fn decode(ext: &ext::Address, _path: &FieldPath) -> Result<Self> {
        Ok(Self {
            address_type: ext.address_type.clone(),
            addr_lines: ext.addr_lines.clone(),
            city: ext.city.clone(),
            state: ext.state.clone(),
            postal_code: ext.postal_code.clone(),
            country: ext.country.clone(),
        })
    }

    fn encode(&self) -> ext::Address {
        ext::Address {
            address_type: self.address_type.clone(),
            addr_lines: self.addr_lines.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephoneNumber {
    pub number_type: Option<String>,
    pub number: String,
}

impl Codec for TelephoneNumber {
    type External = ext::TelephoneNumber;

    fn decode(ext: &ext::TelephoneNumber, _path: &FieldPath) -> Result<Self> {
        Ok(Self { number_type: ext.number_type.clone(), number: ext.number.clone() })
    }

    fn encode(&self) -> ext::TelephoneNumber {
        ext::TelephoneNumber { number_type: self.number_type.clone(), number: self.number.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentId {
    pub scheme: Option<String>,
    pub identifier: String,
}

impl Codec for DocumentId {
    type External = ext::DocumentId;

    fn decode(ext: &ext::DocumentId, _path: &FieldPath) -> Result<Self> {
        Ok(Self { scheme: ext.scheme.clone(), identifier: ext.identifier.clone() })
    }

    fn encode(&self) -> ext::DocumentId {
        ext::DocumentId { scheme: self.scheme.clone(), identifier: self.identifier.clone() }
    }
}

/// `date-time-with-timezone` literal. The text is validated on decode and
/// kept verbatim so re-encoding reproduces the exact input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateTimeLiteral(String);

impl DateTimeLiteral {
    pub fn parse(value: &str, path: &FieldPath) -> Result<Self> {
        DateTime::parse_from_rfc3339(value).map_err(|_| MappingError::InvalidDate {
            path: path.clone(),
            value: value.to_string(),
        })?;
        Ok(Self(value.to_string()))
    }

    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.0).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Codec for DateTimeLiteral {
    type External = String;

    fn decode(ext: &String, path: &FieldPath) -> Result<Self> {
        Self::parse(ext, path)
    }

    fn encode(&self) -> String {
        self.0.clone()
    }
}

/// Calendar date with an optional `Z` or `+hh:mm` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateLiteral(String);

impl DateLiteral {
    pub fn parse(value: &str, path: &FieldPath) -> Result<Self> {
        let invalid = || MappingError::InvalidDate {
            path: path.clone(),
            value: value.to_string(),
        };
        let (date, zone) = match (value.get(..10), value.get(10..)) {
            (Some(date), Some(zone)) => (date, zone),
            _ => return Err(invalid()),
        };
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
        if !is_zone_suffix(zone) {
            return Err(invalid());
        }
        Ok(Self(value.to_string()))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.0.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_zone_suffix(zone: &str) -> bool {
    match zone.as_bytes() {
        [] | [b'Z'] => true,
        [sign, h1, h2, b':', m1, m2] => {
            matches!(sign, b'+' | b'-') && [h1, h2, m1, m2].iter().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

impl Codec for DateLiteral {
    type External = String;

    fn decode(ext: &String, path: &FieldPath) -> Result<Self> {
        Self::parse(ext, path)
    }

    fn encode(&self) -> String {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsibleParty {
    pub role_id: String,
    pub party_ids: Vec<Uuid>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for ResponsibleParty {
    type External = ext::ResponsibleParty;

    fn decode(ext: &ext::ResponsibleParty, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            role_id: ext.role_id.clone(),
            party_ids: parse_uuid_vec(&ext.party_uuids, &path.field("party-uuids"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ResponsibleParty {
        ext::ResponsibleParty {
            role_id: self.role_id.clone(),
            party_uuids: render_uuid_vec(&self.party_ids),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

pub type ResponsibleParties = Option<Vec<ResponsibleParty>>;

/// Role binding attached to one of several parent kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsibleRole {
    pub owner: Owner<ResponsibleRoleOwner>,
    pub role_id: String,
    pub props: Props,
    pub links: Links,
    pub party_ids: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl ResponsibleRole {
    pub fn decode(ext: &ext::ResponsibleRole, owner: Owner<ResponsibleRoleOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            owner,
            role_id: ext.role_id.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            party_ids: parse_uuid_list(&ext.party_uuids, &path.field("party-uuids"))?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::ResponsibleRole {
        ext::ResponsibleRole {
            role_id: self.role_id.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            party_uuids: render_uuid_list(&self.party_ids),
            remarks: self.remarks.clone(),
        }
    }
}

/// Decodes the `responsible-roles` list of one owner.
pub fn decode_roles(
    src: &Option<Vec<ext::ResponsibleRole>>,
    owner_id: Uuid,
    kind: ResponsibleRoleOwner,
    path: &FieldPath,
) -> Result<Option<Vec<ResponsibleRole>>> {
    let owner = Owner::new(owner_id, kind);
    crate::column::try_map_opt(src, |i, role| ResponsibleRole::decode(role, owner, &path.index(i)))
}

pub fn encode_roles(roles: &Option<Vec<ResponsibleRole>>) -> Option<Vec<ext::ResponsibleRole>> {
    map_opt(roles, ResponsibleRole::encode)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    pub class: Option<String>,
    pub depends_on: Option<String>,
    pub props: Props,
    pub links: Links,
    pub label: Option<String>,
    pub usage: Option<String>,
    pub constraints: Option<Vec<ext::ParameterConstraint>>,
    pub guidelines: Option<Vec<ext::ParameterGuideline>>,
    pub values: Option<Vec<String>>,
    pub select: Option<ext::ParameterSelection>,
    pub remarks: Option<String>,
}

impl Codec for Parameter {
    type External = ext::Parameter;

    fn decode(ext: &ext::Parameter, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: ext.id.clone(),
            class: ext.class.clone(),
            depends_on: ext.depends_on.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            label: ext.label.clone(),
            usage: ext.usage.clone(),
            constraints: ext.constraints.clone(),
            guidelines: ext.guidelines.clone(),
            values: ext.values.clone(),
            select: ext.select.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Parameter {
        ext::Parameter {
            id: self.id.clone(),
            class: self.class.clone(),
            depends_on: self.depends_on.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            label: self.label.clone(),
            usage: self.usage.clone(),
            constraints: self.constraints.clone(),
            guidelines: self.guidelines.clone(),
            values: self.values.clone(),
            select: self.select.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

/// Narrative part kept inline in its parent's row. Catalog parts live in
/// the arena instead; see `catalog::PartNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub part_id: Option<String>,
    pub name: String,
    pub ns: Option<String>,
    pub class: Option<String>,
    pub title: Option<String>,
    pub props: Props,
    pub prose: Option<String>,
    pub parts: Option<Vec<Part>>,
    pub links: Links,
}

impl Codec for Part {
    type External = ext::Part;

    fn decode(ext: &ext::Part, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            part_id: ext.id.clone(),
            name: ext.name.clone(),
            ns: ext.ns.clone(),
            class: ext.class.clone(),
            title: ext.title.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            prose: ext.prose.clone(),
            parts: decode_list(&ext.parts, &path.field("parts"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
        })
    }

    fn encode(&self) -> ext::Part {
        ext::Part {
            id: self.part_id.clone(),
            name: self.name.clone(),
            ns: self.ns.clone(),
            class: self.class.clone(),
            title: self.title.clone(),
            props: self.props.encode(),
            prose: self.prose.clone(),
            parts: encode_list(&self.parts),
            links: self.links.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub title: Option<String>,
    pub port_ranges: Option<Vec<ext::PortRange>>,
}

impl Codec for Protocol {
    type External = ext::Protocol;

    fn decode(ext: &ext::Protocol, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            uuid: parse_opt_uuid(&ext.uuid, &path.field("uuid"))?,
            name: ext.name.clone(),
            title: ext.title.clone(),
            port_ranges: ext.port_ranges.clone(),
        })
    }

    fn encode(&self) -> ext::Protocol {
        ext::Protocol {
            uuid: render_opt_uuid(&self.uuid),
            name: self.name.clone(),
            title: self.title.clone(),
            port_ranges: self.port_ranges.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_literal_keeps_original_text() {
        let path = FieldPath::root("metadata").field("last-modified");
        let lit = DateTimeLiteral::parse("2024-03-01T12:30:00.000-05:00", &path).unwrap();
        assert_eq!(lit.encode(), "2024-03-01T12:30:00.000-05:00");
        assert!(lit.instant().is_some());
    }

    #[test]
    fn date_time_without_zone_is_rejected() {
        let path = FieldPath::root("metadata").field("published");
        let err = DateTimeLiteral::parse("2024-03-01T12:30:00", &path).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("metadata.published"));
    }

    #[test]
    fn date_literal_accepts_zone_suffixes() {
        let path = FieldPath::root("d");
        for ok in ["2023-06-30", "2023-06-30Z", "2023-06-30-04:00"] {
            assert_eq!(DateLiteral::parse(ok, &path).unwrap().as_str(), ok);
        }
        for bad in ["2023-13-01", "2023-06-30T00:00:00Z", "30/06/2023", "2023-06-3"] {
            assert!(DateLiteral::parse(bad, &path).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn property_uuid_is_validated() {
        let prop = ext::Property {
            name: "label".into(),
            uuid: Some("nope".into()),
            ns: None,
            value: "AC-1".into(),
            class: None,
            group: None,
            remarks: None,
        };
        let err = Property::decode(&prop, &FieldPath::root("control").item("props", 1)).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("control.props[1].uuid"));
    }

    #[test]
    fn nested_inline_parts_round_trip() {
        let json = serde_json::json!({
            "name": "statement",
            "parts": [{"name": "item", "parts": [{"name": "item", "prose": "deep", "links": []}]}]
        });
        let ext: ext::Part = serde_json::from_value(json.clone()).unwrap();
        let part = Part::decode(&ext, &FieldPath::root("p")).unwrap();
        assert_eq!(serde_json::to_value(part.encode()).unwrap(), json);
    }
}
