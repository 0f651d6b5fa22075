//! Observations, risks and findings are rows owned through a `RecordOwner`;
//! everything else here is kept inline in its parent's row.

use oscal_model::assessment as ext;
use oscal_model::common as ext_common;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arena::Table;
use crate::column::{decode_list, decode_opt, decode_vec, encode_list, encode_opt, encode_vec, map_opt, try_map_opt, Codec};
use crate::error::{FieldPath, Result};
use crate::identity::{parse_opt_uuid, parse_uuid, render_opt_uuid, render_uuid};
use crate::owner::{Owner, OwnerKind, RecordOwner, ResponsibleRoleOwner};
use crate::rows::{Entity, EntityKind, RowIndex, RowSet};
use crate::scalar::{decode_roles, encode_roles, DateTimeLiteral, Links, Props, ResponsibleParties, ResponsibleRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSelection {
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub include_all: Option<ext_common::Marker>,
    pub include_controls: Option<Vec<ext::SelectControl>>,
    pub exclude_controls: Option<Vec<ext::SelectControl>>,
    pub remarks: Option<String>,
}

impl Codec for ControlSelection {
    type External = ext::ControlSelection;

    fn decode(ext: &ext::ControlSelection, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            include_all: ext.include_all.clone(),
            include_controls: ext.include_controls.clone(),
            exclude_controls: ext.exclude_controls.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ControlSelection {
        ext::ControlSelection {
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            include_all: self.include_all.clone(),
            include_controls: self.include_controls.clone(),
            exclude_controls: self.exclude_controls.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlObjectiveSelection {
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub include_all: Option<ext_common::Marker>,
    pub include_objectives: Option<Vec<ext::SelectObjective>>,
    pub exclude_objectives: Option<Vec<ext::SelectObjective>>,
    pub remarks: Option<String>,
}

impl Codec for ControlObjectiveSelection {
    type External = ext::ControlObjectiveSelection;

    fn decode(ext: &ext::ControlObjectiveSelection, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            include_all: ext.include_all.clone(),
            include_objectives: ext.include_objectives.clone(),
            exclude_objectives: ext.exclude_objectives.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ControlObjectiveSelection {
        ext::ControlObjectiveSelection {
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            include_all: self.include_all.clone(),
            include_objectives: self.include_objectives.clone(),
            exclude_objectives: self.exclude_objectives.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedControls {
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub control_selections: Vec<ControlSelection>,
    pub control_objective_selections: Option<Vec<ControlObjectiveSelection>>,
    pub remarks: Option<String>,
}

impl Codec for ReviewedControls {
    type External = ext::ReviewedControls;

    fn decode(ext: &ext::ReviewedControls, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            control_selections: decode_vec(&ext.control_selections, &path.field("control-selections"))?,
            control_objective_selections: decode_list(
                &ext.control_objective_selections,
                &path.field("control-objective-selections"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ReviewedControls {
        ext::ReviewedControls {
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            control_selections: encode_vec(&self.control_selections),
            control_objective_selections: encode_list(&self.control_objective_selections),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSubject {
    pub subject_id: Uuid,
    pub subject_type: String,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for SelectSubject {
    type External = ext::SelectSubject;

    fn decode(ext: &ext::SelectSubject, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            subject_id: parse_uuid(&ext.subject_uuid, &path.field("subject-uuid"))?,
            subject_type: ext.subject_type.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::SelectSubject {
        ext::SelectSubject {
            subject_uuid: render_uuid(&self.subject_id),
            subject_type: self.subject_type.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSubject {
    pub subject_type: String,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub include_all: Option<ext_common::Marker>,
    pub include_subjects: Option<Vec<SelectSubject>>,
    pub exclude_subjects: Option<Vec<SelectSubject>>,
    pub remarks: Option<String>,
}

impl Codec for AssessmentSubject {
    type External = ext::AssessmentSubject;

    fn decode(ext: &ext::AssessmentSubject, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            subject_type: ext.subject_type.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            include_all: ext.include_all.clone(),
            include_subjects: decode_list(&ext.include_subjects, &path.field("include-subjects"))?,
            exclude_subjects: decode_list(&ext.exclude_subjects, &path.field("exclude-subjects"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::AssessmentSubject {
        ext::AssessmentSubject {
            subject_type: self.subject_type.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            include_all: self.include_all.clone(),
            include_subjects: encode_list(&self.include_subjects),
            exclude_subjects: encode_list(&self.exclude_subjects),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub reviewed_controls: Option<ReviewedControls>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Codec for Step {
    type External = ext::Step;

    fn decode(ext: &ext::Step, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            reviewed_controls: decode_opt(&ext.reviewed_controls, &path.field("reviewed-controls"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::Step,
                &path.field("responsible-roles"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Step {
        ext::Step {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            reviewed_controls: encode_opt(&self.reviewed_controls),
            responsible_roles: encode_roles(&self.responsible_roles),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub steps: Option<Vec<Step>>,
    pub related_controls: Option<ReviewedControls>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Codec for Activity {
    type External = ext::Activity;

    fn decode(ext: &ext::Activity, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            steps: decode_list(&ext.steps, &path.field("steps"))?,
            related_controls: decode_opt(&ext.related_controls, &path.field("related-controls"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::Activity,
                &path.field("responsible-roles"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Activity {
        ext::Activity {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            steps: encode_list(&self.steps),
            related_controls: encode_opt(&self.related_controls),
            responsible_roles: encode_roles(&self.responsible_roles),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTimeLiteral,
    pub end: DateTimeLiteral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub on_date: Option<DateTimeLiteral>,
    pub within_date_range: Option<DateRange>,
    pub at_frequency: Option<ext::Frequency>,
}

impl Codec for Timing {
    type External = ext::Timing;

    fn decode(ext: &ext::Timing, path: &FieldPath) -> Result<Self> {
        let on_date = match &ext.on_date {
            Some(on) => Some(DateTimeLiteral::parse(&on.date, &path.field("on-date").field("date"))?),
            None => None,
        };
        let within_date_range = match &ext.within_date_range {
            Some(range) => {
                let range_path = path.field("within-date-range");
                Some(DateRange {
                    start: DateTimeLiteral::parse(&range.start, &range_path.field("start"))?,
                    end: DateTimeLiteral::parse(&range.end, &range_path.field("end"))?,
                })
            }
            None => None,
        };
        Ok(Self { on_date, within_date_range, at_frequency: ext.at_frequency.clone() })
    }

    fn encode(&self) -> ext::Timing {
        ext::Timing {
            on_date: self.on_date.as_ref().map(|d| ext::OnDate { date: d.encode() }),
            within_date_range: self.within_date_range.as_ref().map(|r| ext::DateRange {
                start: r.start.encode(),
                end: r.end.encode(),
            }),
            at_frequency: self.at_frequency.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub remarks: Option<String>,
}

impl Codec for TaskDependency {
    type External = ext::TaskDependency;

    fn decode(ext: &ext::TaskDependency, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            task_id: parse_uuid(&ext.task_uuid, &path.field("task-uuid"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::TaskDependency {
        ext::TaskDependency { task_uuid: render_uuid(&self.task_id), remarks: self.remarks.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedActivity {
    pub activity_id: Uuid,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub subjects: Vec<AssessmentSubject>,
    pub remarks: Option<String>,
}

impl Codec for AssociatedActivity {
    type External = ext::AssociatedActivity;

    fn decode(ext: &ext::AssociatedActivity, path: &FieldPath) -> Result<Self> {
        let activity_id = parse_uuid(&ext.activity_uuid, &path.field("activity-uuid"))?;
        Ok(Self {
            activity_id,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                activity_id,
                ResponsibleRoleOwner::AssociatedActivity,
                &path.field("responsible-roles"),
            )?,
            subjects: decode_vec(&ext.subjects, &path.field("subjects"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::AssociatedActivity {
        ext::AssociatedActivity {
            activity_uuid: render_uuid(&self.activity_id),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
            subjects: encode_vec(&self.subjects),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesComponent {
    pub component_id: Uuid,
    pub props: Props,
    pub links: Links,
    pub responsible_parties: ResponsibleParties,
    pub remarks: Option<String>,
}

impl Codec for UsesComponent {
    type External = ext::UsesComponent;

    fn decode(ext: &ext::UsesComponent, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            component_id: parse_uuid(&ext.component_uuid, &path.field("component-uuid"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::UsesComponent {
        ext::UsesComponent {
            component_uuid: render_uuid(&self.component_id),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_parties: encode_list(&self.responsible_parties),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPlatform {
    pub id: Uuid,
    pub title: Option<String>,
    pub props: Props,
    pub links: Links,
    pub uses_components: Option<Vec<UsesComponent>>,
    pub remarks: Option<String>,
}

impl Codec for AssessmentPlatform {
    type External = ext::AssessmentPlatform;

    fn decode(ext: &ext::AssessmentPlatform, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            uses_components: decode_list(&ext.uses_components, &path.field("uses-components"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::AssessmentPlatform {
        ext::AssessmentPlatform {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            uses_components: encode_list(&self.uses_components),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginActor {
    pub actor_type: String,
    pub actor_id: Uuid,
    pub role_id: Option<String>,
    pub props: Props,
    pub links: Links,
}

impl Codec for OriginActor {
    type External = ext::OriginActor;

    fn decode(ext: &ext::OriginActor, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            actor_type: ext.actor_type.clone(),
            actor_id: parse_uuid(&ext.actor_uuid, &path.field("actor-uuid"))?,
            role_id: ext.role_id.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
        })
    }

    fn encode(&self) -> ext::OriginActor {
        ext::OriginActor {
            actor_type: self.actor_type.clone(),
            actor_uuid: render_uuid(&self.actor_id),
            role_id: self.role_id.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub actors: Vec<OriginActor>,
}

impl Codec for Origin {
    type External = ext::Origin;

    fn decode(ext: &ext::Origin, path: &FieldPath) -> Result<Self> {
        Ok(Self { actors: decode_vec(&ext.actors, &path.field("actors"))? })
    }

    fn encode(&self) -> ext::Origin {
        ext::Origin { actors: encode_vec(&self.actors) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectReference {
    pub subject_id: Uuid,
    pub subject_type: String,
    pub title: Option<String>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for SubjectReference {
    type External = ext::SubjectReference;

    fn decode(ext: &ext::SubjectReference, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            subject_id: parse_uuid(&ext.subject_uuid, &path.field("subject-uuid"))?,
            subject_type: ext.subject_type.clone(),
            title: ext.title.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::SubjectReference {
        ext::SubjectReference {
            subject_uuid: render_uuid(&self.subject_id),
            subject_type: self.subject_type.clone(),
            title: self.title.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantEvidence {
    pub href: Option<String>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for RelevantEvidence {
    type External = ext::RelevantEvidence;

    fn decode(ext: &ext::RelevantEvidence, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            href: ext.href.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::RelevantEvidence {
        ext::RelevantEvidence {
            href: self.href.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub owner: Owner<RecordOwner>,
    pub title: Option<String>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub methods: Vec<String>,
    pub types: Option<Vec<String>>,
    pub origins: Option<Vec<Origin>>,
    pub subjects: Option<Vec<SubjectReference>>,
    pub relevant_evidence: Option<Vec<RelevantEvidence>>,
    pub collected: DateTimeLiteral,
    pub expires: Option<DateTimeLiteral>,
    pub remarks: Option<String>,
}

impl Observation {
    pub fn decode(ext: &ext::Observation, owner: Owner<RecordOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            owner,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            methods: ext.methods.clone(),
            types: ext.types.clone(),
            origins: decode_list(&ext.origins, &path.field("origins"))?,
            subjects: decode_list(&ext.subjects, &path.field("subjects"))?,
            relevant_evidence: decode_list(&ext.relevant_evidence, &path.field("relevant-evidence"))?,
            collected: DateTimeLiteral::decode(&ext.collected, &path.field("collected"))?,
            expires: decode_opt(&ext.expires, &path.field("expires"))?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::Observation {
        ext::Observation {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            methods: self.methods.clone(),
            types: self.types.clone(),
            origins: encode_list(&self.origins),
            subjects: encode_list(&self.subjects),
            relevant_evidence: encode_list(&self.relevant_evidence),
            collected: self.collected.encode(),
            expires: encode_opt(&self.expires),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigatingFactor {
    pub id: Uuid,
    pub implementation_id: Option<Uuid>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub subjects: Option<Vec<SubjectReference>>,
}

impl Codec for MitigatingFactor {
    type External = ext::MitigatingFactor;

    fn decode(ext: &ext::MitigatingFactor, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            implementation_id: parse_opt_uuid(&ext.implementation_uuid, &path.field("implementation-uuid"))?,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            subjects: decode_list(&ext.subjects, &path.field("subjects"))?,
        })
    }

    fn encode(&self) -> ext::MitigatingFactor {
        ext::MitigatingFactor {
            uuid: render_uuid(&self.id),
            implementation_uuid: render_opt_uuid(&self.implementation_id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            subjects: encode_list(&self.subjects),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub lifecycle: String,
    pub title: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub origins: Option<Vec<Origin>>,
    pub remarks: Option<String>,
}

impl Codec for Response {
    type External = ext::Response;

    fn decode(ext: &ext::Response, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            lifecycle: ext.lifecycle.clone(),
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            origins: decode_list(&ext.origins, &path.field("origins"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Response {
        ext::Response {
            uuid: render_uuid(&self.id),
            lifecycle: self.lifecycle.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            origins: encode_list(&self.origins),
            remarks: self.remarks.clone(),
        }
    }
}

pub(crate) fn parse_related_observations(
    src: &Option<Vec<ext::RelatedObservation>>,
    path: &FieldPath,
) -> Result<Option<Vec<Uuid>>> {
    try_map_opt(src, |i, r| parse_uuid(&r.observation_uuid, &path.index(i).field("observation-uuid")))
}

pub(crate) fn render_related_observations(ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::RelatedObservation>> {
    map_opt(ids, |id| ext::RelatedObservation { observation_uuid: render_uuid(id) })
}

pub(crate) fn parse_related_risks(src: &Option<Vec<ext::AssociatedRisk>>, path: &FieldPath) -> Result<Option<Vec<Uuid>>> {
    try_map_opt(src, |i, r| parse_uuid(&r.risk_uuid, &path.index(i).field("risk-uuid")))
}

pub(crate) fn render_related_risks(ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::AssociatedRisk>> {
    map_opt(ids, |id| ext::AssociatedRisk { risk_uuid: render_uuid(id) })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: Uuid,
    pub owner: Owner<RecordOwner>,
    pub title: String,
    pub description: String,
    pub statement: String,
    pub props: Props,
    pub links: Links,
    pub status: String,
    pub origins: Option<Vec<Origin>>,
    pub threat_ids: Option<Vec<ext::ThreatId>>,
    pub mitigating_factors: Option<Vec<MitigatingFactor>>,
    pub deadline: Option<DateTimeLiteral>,
    pub remediations: Option<Vec<Response>>,
    pub related_observations: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl Risk {
    pub fn decode(ext: &ext::Risk, owner: Owner<RecordOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            owner,
            title: ext.title.clone(),
            description: ext.description.clone(),
            statement: ext.statement.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            status: ext.status.clone(),
            origins: decode_list(&ext.origins, &path.field("origins"))?,
            threat_ids: ext.threat_ids.clone(),
            mitigating_factors: decode_list(&ext.mitigating_factors, &path.field("mitigating-factors"))?,
            deadline: decode_opt(&ext.deadline, &path.field("deadline"))?,
            remediations: decode_list(&ext.remediations, &path.field("remediations"))?,
            related_observations: parse_related_observations(
                &ext.related_observations,
                &path.field("related-observations"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::Risk {
        ext::Risk {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            statement: self.statement.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            status: self.status.clone(),
            origins: encode_list(&self.origins),
            threat_ids: self.threat_ids.clone(),
            mitigating_factors: encode_list(&self.mitigating_factors),
            deadline: encode_opt(&self.deadline),
            remediations: encode_list(&self.remediations),
            related_observations: render_related_observations(&self.related_observations),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingTarget {
    pub target_type: String,
    pub target_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub status: ext::ObjectiveStatus,
    pub implementation_status: Option<ext_common::Status>,
    pub remarks: Option<String>,
}

impl Codec for FindingTarget {
    type External = ext::FindingTarget;

    fn decode(ext: &ext::FindingTarget, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            target_type: ext.target_type.clone(),
            target_id: ext.target_id.clone(),
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            status: ext.status.clone(),
            implementation_status: ext.implementation_status.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::FindingTarget {
        ext::FindingTarget {
            target_type: self.target_type.clone(),
            target_id: self.target_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            status: self.status.clone(),
            implementation_status: self.implementation_status.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub owner: Owner<RecordOwner>,
    pub title: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub origins: Option<Vec<Origin>>,
    pub target: FindingTarget,
    pub implementation_statement_id: Option<Uuid>,
    pub related_observations: Option<Vec<Uuid>>,
    pub related_risks: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl Finding {
    pub fn decode(ext: &ext::Finding, owner: Owner<RecordOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            owner,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            origins: decode_list(&ext.origins, &path.field("origins"))?,
            target: FindingTarget::decode(&ext.target, &path.field("target"))?,
            implementation_statement_id: parse_opt_uuid(
                &ext.implementation_statement_uuid,
                &path.field("implementation-statement-uuid"),
            )?,
            related_observations: parse_related_observations(
                &ext.related_observations,
                &path.field("related-observations"),
            )?,
            related_risks: parse_related_risks(&ext.related_risks, &path.field("related-risks"))?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::Finding {
        ext::Finding {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            origins: encode_list(&self.origins),
            target: self.target.encode(),
            implementation_statement_uuid: render_opt_uuid(&self.implementation_statement_id),
            related_observations: render_related_observations(&self.related_observations),
            related_risks: render_related_risks(&self.related_risks),
            remarks: self.remarks.clone(),
        }
    }
}

macro_rules! record_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn owner(&self) -> Option<(Uuid, &'static str)> {
                Some((self.owner.owner_id, self.owner.owner_kind.tag()))
            }
        }
    };
}

record_entity!(Observation, EntityKind::Observation);
record_entity!(Risk, EntityKind::Risk);
record_entity!(Finding, EntityKind::Finding);

/// Observation, risk and finding rows of one document. Owners keep the
/// ordered id lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Records {
    pub observations: Table<Observation>,
    pub risks: Table<Risk>,
    pub findings: Table<Finding>,
}

impl Records {
    pub fn decode_observations(
        &mut self,
        src: &Option<Vec<ext::Observation>>,
        owner: Owner<RecordOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(src, |i, o| {
            let item = path.index(i);
            self.observations.insert(Observation::decode(o, owner, &item)?, &item)
        })
    }

    pub fn decode_risks(
        &mut self,
        src: &Option<Vec<ext::Risk>>,
        owner: Owner<RecordOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(src, |i, r| {
            let item = path.index(i);
            self.risks.insert(Risk::decode(r, owner, &item)?, &item)
        })
    }

    pub fn decode_findings(
        &mut self,
        src: &Option<Vec<ext::Finding>>,
        owner: Owner<RecordOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(src, |i, f| {
            let item = path.index(i);
            self.findings.insert(Finding::decode(f, owner, &item)?, &item)
        })
    }

    pub fn encode_observations(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::Observation>> {
        self.observations.encode_children(ids, Observation::encode)
    }

    pub fn encode_risks(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::Risk>> {
        self.risks.encode_children(ids, Risk::encode)
    }

    pub fn encode_findings(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::Finding>> {
        self.findings.encode_children(ids, Finding::encode)
    }

    pub fn push_rows(&self, rows: &mut RowSet) -> Result<()> {
        rows.push_table(&self.observations)?;
        rows.push_table(&self.risks)?;
        rows.push_table(&self.findings)
    }

    pub fn from_index(index: RowIndex<'_>) -> Result<Self> {
        Ok(Self {
            observations: index.table()?,
            risks: index.table()?,
            findings: index.table()?,
        })
    }

    /// Risks whose status is not `closed`.
    pub fn open_risks(&self) -> impl Iterator<Item = &Risk> {
        self.risks.iter().filter(|r| r.status != "closed")
    }
}

/// Assessment part used by terms-and-conditions and attestations; kept
/// inline, nests freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPart {
    pub id: Option<Uuid>,
    pub name: String,
    pub ns: Option<String>,
    pub class: Option<String>,
    pub title: Option<String>,
    pub props: Props,
    pub prose: Option<String>,
    pub parts: Option<Vec<AssessmentPart>>,
    pub links: Links,
}

impl Codec for AssessmentPart {
    type External = ext::AssessmentPart;

    fn decode(ext: &ext::AssessmentPart, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_opt_uuid(&ext.uuid, &path.field("uuid"))?,
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

    fn encode(&self) -> ext::AssessmentPart {
        ext::AssessmentPart {
            uuid: render_opt_uuid(&self.id),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timing_dates_are_checked() {
        let ext: ext::Timing = serde_json::from_value(json!({
            "within-date-range": {"start": "2024-01-01T00:00:00Z", "end": "not a date"}
        }))
        .unwrap();
        let err = Timing::decode(&ext, &FieldPath::root("task").field("timing")).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("task.timing.within-date-range.end"));
    }

    #[test]
    fn records_attach_to_their_owner() {
        let owner = Owner::new(Uuid::new_v4(), RecordOwner::PlanOfActionAndMilestones);
        let observations: Vec<ext::Observation> = serde_json::from_value(json!([{
            "uuid": "33333333-3333-4333-8333-333333333333",
            "description": "scan",
            "methods": ["TEST"],
            "collected": "2024-04-01T00:00:00Z"
        }]))
        .unwrap();
        let mut records = Records::default();
        let ids = records
            .decode_observations(&Some(observations), owner, &FieldPath::root("poam").field("observations"))
            .unwrap()
            .unwrap();
        let obs = records.observations.get(ids[0]).unwrap();
        assert!(obs.owner.is(owner.owner_id, "plan-of-action-and-milestones"));
        assert!(!obs.owner.is(owner.owner_id, "result"));
    }
}
