//! Polymorphic ownership.
//!
//! Entity kinds reused under unrelated parents carry an `(owner_id,
//! owner_kind)` pair instead of a typed foreign key. Each such entity has its
//! own closed owner-kind enum, so adding a parent kind is a compile-time
//! change at every attachment site. Owner kinds persist as string tags.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MappingError, Result};

pub trait OwnerKind: Copy + Eq + fmt::Debug + Serialize + DeserializeOwned + 'static {
    const ALL: &'static [Self];

    fn tag(self) -> &'static str;

    fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == tag)
            .ok_or_else(|| MappingError::UnknownOwnerKind(tag.to_string()))
    }
}

macro_rules! owner_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $tag)] $variant),+
        }

        impl OwnerKind for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.tag())
            }
        }
    };
}

owner_kind! {
    /// Document root kinds. Owner kind of metadata and back-matter blocks.
    DocumentKind {
        Catalog => "catalog",
        Profile => "profile",
        ComponentDefinition => "component-definition",
        SystemSecurityPlan => "system-security-plan",
        AssessmentPlan => "assessment-plan",
        AssessmentResults => "assessment-results",
        PlanOfActionAndMilestones => "plan-of-action-and-milestones",
    }
}

owner_kind! {
    GroupOwner {
        Catalog => "catalog",
        Group => "group",
    }
}

owner_kind! {
    ControlOwner {
        Catalog => "catalog",
        Group => "group",
        Control => "control",
    }
}

owner_kind! {
    PartOwner {
        Group => "group",
        Control => "control",
        Part => "part",
    }
}

owner_kind! {
    TaskOwner {
        AssessmentPlan => "assessment-plan",
        Task => "task",
    }
}

owner_kind! {
    /// Blocks that list system components.
    ComponentOwner {
        SystemImplementation => "system-implementation",
        PlanLocalDefinitions => "plan-local-definitions",
        AssessmentAssets => "assessment-assets",
        ResultLocalDefinitions => "result-local-definitions",
        PoamLocalDefinitions => "poam-local-definitions",
    }
}

owner_kind! {
    InventoryItemOwner {
        SystemImplementation => "system-implementation",
        PlanLocalDefinitions => "plan-local-definitions",
        ResultLocalDefinitions => "result-local-definitions",
        PoamLocalDefinitions => "poam-local-definitions",
    }
}

owner_kind! {
    DiagramOwner {
        AuthorizationBoundary => "authorization-boundary",
        NetworkArchitecture => "network-architecture",
        DataFlow => "data-flow",
    }
}

owner_kind! {
    /// Owners of observations, risks and findings.
    RecordOwner {
        AssessmentResult => "result",
        PlanOfActionAndMilestones => "plan-of-action-and-milestones",
    }
}

owner_kind! {
    ResponsibleRoleOwner {
        SystemComponent => "system-component",
        DefinedComponent => "defined-component",
        ComponentRequirement => "component-requirement",
        ComponentStatement => "component-statement",
        ImplementedRequirement => "implemented-requirement",
        Statement => "statement",
        ByComponent => "by-component",
        Inherited => "inherited",
        Satisfied => "satisfied",
        Activity => "activity",
        Step => "step",
        Task => "task",
        AssociatedActivity => "associated-activity",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner<K> {
    pub owner_id: Uuid,
    pub owner_kind: K,
}

impl<K: OwnerKind> Owner<K> {
    pub fn new(owner_id: Uuid, owner_kind: K) -> Self {
        Self { owner_id, owner_kind }
    }

    /// Joint match on both halves of the pair.
    pub fn is(&self, owner_id: Uuid, tag: &str) -> bool {
        self.owner_id == owner_id && self.owner_kind.tag() == tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tags_match_serde<K: OwnerKind>() {
        for kind in K::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.tag().to_string()));
            assert_eq!(K::from_tag(kind.tag()).unwrap(), *kind);
        }
    }

    #[test]
    fn tags_agree_with_serialized_form() {
        assert_tags_match_serde::<DocumentKind>();
        assert_tags_match_serde::<GroupOwner>();
        assert_tags_match_serde::<ControlOwner>();
        assert_tags_match_serde::<PartOwner>();
        assert_tags_match_serde::<TaskOwner>();
        assert_tags_match_serde::<ComponentOwner>();
        assert_tags_match_serde::<InventoryItemOwner>();
        assert_tags_match_serde::<DiagramOwner>();
        assert_tags_match_serde::<RecordOwner>();
        assert_tags_match_serde::<ResponsibleRoleOwner>();
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = DocumentKind::from_tag("group").unwrap_err();
        assert!(matches!(err, MappingError::UnknownOwnerKind(tag) if tag == "group"));
    }

    #[test]
    fn owner_match_requires_both_fields() {
        let id = Uuid::new_v4();
        let owner = Owner::new(id, ControlOwner::Group);
        assert!(owner.is(id, "group"));
        assert!(!owner.is(id, "catalog"));
        assert!(!owner.is(Uuid::new_v4(), "group"));
    }
}
