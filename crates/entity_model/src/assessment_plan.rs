use oscal_model::assessment as ext_assessment;
use oscal_model::assessment_plan as ext;
use oscal_model::common as ext_common;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::arena::Table;
use crate::assessment::{
    Activity, AssessmentPart, AssessmentPlatform, AssessmentSubject, AssociatedActivity, ReviewedControls,
    TaskDependency, Timing,
};
use crate::back_matter::BackMatter;
use crate::column::{decode_list, decode_opt, decode_vec, encode_list, encode_opt, encode_vec, try_map_opt, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid, structural_uuid};
use crate::implementation::{Inventory, SystemUser};
use crate::metadata::Metadata;
use crate::owner::{ComponentOwner, DocumentKind, InventoryItemOwner, Owner, OwnerKind, ResponsibleRoleOwner, TaskOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{decode_roles, encode_roles, Links, Props, ResponsibleRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLocalDefinitions {
    pub id: Uuid,
    pub components: Option<Vec<Uuid>>,
    pub inventory_items: Option<Vec<Uuid>>,
    pub users: Option<Vec<SystemUser>>,
    pub activities: Option<Vec<Activity>>,
    pub remarks: Option<String>,
}

impl PlanLocalDefinitions {
    fn decode(
        ext: &ext::PlanLocalDefinitions,
        root_id: Uuid,
        inventory: &mut Inventory,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        Ok(Self {
            id,
            components: inventory.decode_components(
                &ext.components,
                Owner::new(id, ComponentOwner::PlanLocalDefinitions),
                &path.field("components"),
            )?,
            inventory_items: inventory.decode_items(
                &ext.inventory_items,
                Owner::new(id, InventoryItemOwner::PlanLocalDefinitions),
                &path.field("inventory-items"),
            )?,
            users: decode_list(&ext.users, &path.field("users"))?,
            activities: decode_list(&ext.activities, &path.field("activities"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, inventory: &Inventory) -> ext::PlanLocalDefinitions {
        ext::PlanLocalDefinitions {
            components: inventory.encode_components(&self.components),
            inventory_items: inventory.encode_items(&self.inventory_items),
            users: encode_list(&self.users),
            activities: encode_list(&self.activities),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAssets {
    pub id: Uuid,
    pub components: Option<Vec<Uuid>>,
    pub assessment_platforms: Vec<AssessmentPlatform>,
}

impl AssessmentAssets {
    fn decode(
        ext: &ext_assessment::AssessmentAssets,
        root_id: Uuid,
        inventory: &mut Inventory,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        Ok(Self {
            id,
            components: inventory.decode_components(
                &ext.components,
                Owner::new(id, ComponentOwner::AssessmentAssets),
                &path.field("components"),
            )?,
            assessment_platforms: decode_vec(&ext.assessment_platforms, &path.field("assessment-platforms"))?,
        })
    }

    fn encode(&self, inventory: &Inventory) -> ext_assessment::AssessmentAssets {
        ext_assessment::AssessmentAssets {
            components: inventory.encode_components(&self.components),
            assessment_platforms: encode_vec(&self.assessment_platforms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAndConditions {
    pub parts: Option<Vec<AssessmentPart>>,
}

impl Codec for TermsAndConditions {
    type External = ext::TermsAndConditions;

    fn decode(ext: &ext::TermsAndConditions, path: &FieldPath) -> Result<Self> {
        Ok(Self { parts: decode_list(&ext.parts, &path.field("parts"))? })
    }

    fn encode(&self) -> ext::TermsAndConditions {
        ext::TermsAndConditions { parts: encode_list(&self.parts) }
    }
}

/// Task tree node. Sub-tasks are separate rows whose parent is this task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub root_id: Uuid,
    pub parent: Owner<TaskOwner>,
    pub task_type: String,
    pub title: String,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub timing: Option<Timing>,
    pub dependencies: Option<Vec<TaskDependency>>,
    pub tasks: Option<Vec<Uuid>>,
    pub associated_activities: Option<Vec<AssociatedActivity>>,
    pub subjects: Option<Vec<AssessmentSubject>>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.parent.owner_id)
    }

    fn owner(&self) -> Option<(Uuid, &'static str)> {
        Some((self.parent.owner_id, self.parent.owner_kind.tag()))
    }
}

fn decode_tasks(
    src: &Option<Vec<ext_assessment::Task>>,
    root_id: Uuid,
    parent: Owner<TaskOwner>,
    tasks: &mut Table<Task>,
    path: &FieldPath,
) -> Result<Option<Vec<Uuid>>> {
    try_map_opt(src, |i, t| decode_task(t, root_id, parent, tasks, &path.index(i)))
}

fn decode_task(
    ext: &ext_assessment::Task,
    root_id: Uuid,
    parent: Owner<TaskOwner>,
    tasks: &mut Table<Task>,
    path: &FieldPath,
) -> Result<Uuid> {
    let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
    let children = decode_tasks(&ext.tasks, root_id, Owner::new(id, TaskOwner::Task), tasks, &path.field("tasks"))?;
    let node = Task {
        id,
        root_id,
        parent,
        task_type: ext.task_type.clone(),
        title: ext.title.clone(),
        description: ext.description.clone(),
        props: Props::decode(&ext.props, &path.field("props"))?,
        links: Links::decode(&ext.links, &path.field("links"))?,
        timing: decode_opt(&ext.timing, &path.field("timing"))?,
        dependencies: decode_list(&ext.dependencies, &path.field("dependencies"))?,
        tasks: children,
        associated_activities: decode_list(&ext.associated_activities, &path.field("associated-activities"))?,
        subjects: decode_list(&ext.subjects, &path.field("subjects"))?,
        responsible_roles: decode_roles(
            &ext.responsible_roles,
            id,
            ResponsibleRoleOwner::Task,
            &path.field("responsible-roles"),
        )?,
        remarks: ext.remarks.clone(),
    };
    tasks.insert(node, path)
}

fn encode_task(task: &Task, tasks: &Table<Task>) -> ext_assessment::Task {
    ext_assessment::Task {
        uuid: render_uuid(&task.id),
        task_type: task.task_type.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        props: task.props.encode(),
        links: task.links.encode(),
        timing: encode_opt(&task.timing),
        dependencies: encode_list(&task.dependencies),
        tasks: tasks.encode_children(&task.tasks, |t| encode_task(t, tasks)),
        associated_activities: encode_list(&task.associated_activities),
        subjects: encode_list(&task.subjects),
        responsible_roles: encode_roles(&task.responsible_roles),
        remarks: task.remarks.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPlanRoot {
    pub id: Uuid,
    pub import_ssp: ext_common::ImportRef,
    pub local_definitions: Option<PlanLocalDefinitions>,
    pub terms_and_conditions: Option<TermsAndConditions>,
    pub reviewed_controls: ReviewedControls,
    pub assessment_subjects: Option<Vec<AssessmentSubject>>,
    pub assessment_assets: Option<AssessmentAssets>,
    pub tasks: Option<Vec<Uuid>>,
}

impl Entity for AssessmentPlanRoot {
    const KIND: EntityKind = EntityKind::AssessmentPlan;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentPlan {
    pub root: AssessmentPlanRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
    pub inventory: Inventory,
    pub tasks: Table<Task>,
}

impl AssessmentPlan {
    /// Tasks at any depth that schedule `activity_id`.
    pub fn tasks_for_activity(&self, activity_id: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| {
                t.associated_activities
                    .iter()
                    .flatten()
                    .any(|a| a.activity_id == activity_id)
            })
            .collect()
    }
}

impl Aggregate for AssessmentPlan {
    const KIND: DocumentKind = DocumentKind::AssessmentPlan;
    type External = ext::AssessmentPlan;

    fn decode(ext: &ext::AssessmentPlan) -> Result<Self> {
        let path = FieldPath::root("assessment-plan");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::AssessmentPlan);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;
        let import_ssp = require(&ext.import_ssp, &path.field("import-ssp"))?.clone();

        let mut inventory = Inventory::default();
        let local_definitions = match &ext.local_definitions {
            Some(local) => Some(PlanLocalDefinitions::decode(
                local,
                id,
                &mut inventory,
                &path.field("local-definitions"),
            )?),
            None => None,
        };
        let assessment_assets = match &ext.assessment_assets {
            Some(assets) => Some(AssessmentAssets::decode(
                assets,
                id,
                &mut inventory,
                &path.field("assessment-assets"),
            )?),
            None => None,
        };

        let reviewed_path = path.field("reviewed-controls");
        let reviewed_controls = ReviewedControls::decode(require(&ext.reviewed_controls, &reviewed_path)?, &reviewed_path)?;

        let mut tasks = Table::new();
        let root_tasks = decode_tasks(
            &ext.tasks,
            id,
            Owner::new(id, TaskOwner::AssessmentPlan),
            &mut tasks,
            &path.field("tasks"),
        )?;

        tracing::debug!(
            assessment_plan = %id,
            tasks = tasks.len(),
            components = inventory.components.len(),
            "decoded assessment plan"
        );

        Ok(Self {
            root: AssessmentPlanRoot {
                id,
                import_ssp,
                local_definitions,
                terms_and_conditions: decode_opt(&ext.terms_and_conditions, &path.field("terms-and-conditions"))?,
                reviewed_controls,
                assessment_subjects: decode_list(&ext.assessment_subjects, &path.field("assessment-subjects"))?,
                assessment_assets,
                tasks: root_tasks,
            },
            metadata,
            back_matter,
            inventory,
            tasks,
        })
    }

    fn encode(&self) -> ext::AssessmentPlan {
        let root = &self.root;
        ext::AssessmentPlan {
            uuid: render_uuid(&root.id),
            metadata: Some(self.metadata.encode()),
            import_ssp: Some(root.import_ssp.clone()),
            local_definitions: root.local_definitions.as_ref().map(|l| l.encode(&self.inventory)),
            terms_and_conditions: encode_opt(&root.terms_and_conditions),
            reviewed_controls: Some(root.reviewed_controls.encode()),
            assessment_subjects: encode_list(&root.assessment_subjects),
            assessment_assets: root.assessment_assets.as_ref().map(|a| a.encode(&self.inventory)),
            tasks: self.tasks.encode_children(&root.tasks, |t| encode_task(t, &self.tasks)),
            back_matter: self.back_matter.as_ref().map(BackMatter::encode),
        }
    }

    fn id(&self) -> Uuid {
        self.root.id
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn to_rows(&self) -> Result<RowSet> {
        let mut rows = start_rows(&self.root, &self.metadata, &self.back_matter)?;
        self.inventory.push_rows(&mut rows)?;
        rows.push_table(&self.tasks)?;
        Ok(rows)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: AssessmentPlanRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::AssessmentPlan)?;
        Ok(Self {
            metadata,
            back_matter,
            inventory: Inventory::from_index(index)?,
            tasks: index.table()?,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_json() -> serde_json::Value {
        json!({
            "uuid": "a0000000-0000-4000-8000-000000000001",
            "metadata": {
                "title": "Annual assessment",
                "last-modified": "2024-02-01T00:00:00Z",
                "version": "1",
                "oscal-version": "1.1.2"
            },
            "import-ssp": {"href": "ssp.json"},
            "local-definitions": {
                "activities": [{
                    "uuid": "a0000000-0000-4000-8000-0000000000a1",
                    "description": "Interview admins",
                    "steps": [{"uuid": "a0000000-0000-4000-8000-0000000000b1", "description": "Schedule"}]
                }]
            },
            "reviewed-controls": {"control-selections": [{"include-all": {}}]},
            "tasks": [{
                "uuid": "a0000000-0000-4000-8000-0000000000c1",
                "type": "milestone",
                "title": "Kickoff",
                "timing": {"on-date": {"date": "2024-03-01T09:00:00Z"}},
                "tasks": [{
                    "uuid": "a0000000-0000-4000-8000-0000000000c2",
                    "type": "action",
                    "title": "Interviews",
                    "associated-activities": [{
                        "activity-uuid": "a0000000-0000-4000-8000-0000000000a1",
                        "subjects": [{"type": "component", "include-all": {}}]
                    }]
                }]
            }]
        })
    }

    #[test]
    fn nested_tasks_round_trip() {
        let ext: ext::AssessmentPlan = serde_json::from_value(plan_json()).unwrap();
        let plan = AssessmentPlan::decode(&ext).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.encode(), ext);
    }

    #[test]
    fn subtask_is_owned_by_its_task() {
        let ext: ext::AssessmentPlan = serde_json::from_value(plan_json()).unwrap();
        let plan = AssessmentPlan::decode(&ext).unwrap();
        let outer = Uuid::parse_str("a0000000-0000-4000-8000-0000000000c1").unwrap();
        let inner = plan.tasks.get(Uuid::parse_str("a0000000-0000-4000-8000-0000000000c2").unwrap()).unwrap();
        assert!(inner.parent.is(outer, "task"));

        let activity = Uuid::parse_str("a0000000-0000-4000-8000-0000000000a1").unwrap();
        let scheduled: Vec<_> = plan.tasks_for_activity(activity).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(scheduled, vec!["Interviews"]);
    }

    #[test]
    fn rows_reassemble() {
        let ext: ext::AssessmentPlan = serde_json::from_value(plan_json()).unwrap();
        let plan = AssessmentPlan::decode(&ext).unwrap();
        let rows = plan.to_rows().unwrap();
        let root = rows.root().unwrap().clone();
        let back = AssessmentPlan::from_rows(&root, RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back.encode(), ext);
    }

    #[test]
    fn missing_reviewed_controls_is_reported() {
        let mut value = plan_json();
        value.as_object_mut().unwrap().remove("reviewed-controls");
        let ext: ext::AssessmentPlan = serde_json::from_value(value).unwrap();
        let err = AssessmentPlan::decode(&ext).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("assessment-plan.reviewed-controls"));
    }
}
