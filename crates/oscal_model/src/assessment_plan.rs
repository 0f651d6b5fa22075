use serde::{Deserialize, Serialize};

use crate::assessment::{
    Activity, AssessmentAssets, AssessmentPart, AssessmentSubject, ReviewedControls, Task,
};
use crate::back_matter::BackMatter;
use crate::common::{ImportRef, InventoryItem, SystemComponent, SystemUser};
use crate::metadata::Metadata;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlanLocalDefinitions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<SystemComponent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_items: Option<Vec<InventoryItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<SystemUser>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<Activity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAndConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<AssessmentPart>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssessmentPlan {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_ssp: Option<ImportRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_definitions: Option<PlanLocalDefinitions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_and_conditions: Option<TermsAndConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_controls: Option<ReviewedControls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_subjects: Option<Vec<AssessmentSubject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_assets: Option<AssessmentAssets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_matter: Option<BackMatter>,
}
