//! Briefing wizard stages, the record they fill in, and stage-scoped validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::types::Locale;

/// Sections of the briefing wizard, in the order they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStage {
    Personal,
    Company,
    Project,
    Confirmation,
}

impl FormStage {
    pub const ALL: [FormStage; 4] = [
        FormStage::Personal,
        FormStage::Company,
        FormStage::Project,
        FormStage::Confirmation,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<FormStage> {
        FormStage::ALL.get(self.ordinal() + 1).copied()
    }

    pub fn previous(self) -> Option<FormStage> {
        self.ordinal()
            .checked_sub(1)
            .and_then(|index| FormStage::ALL.get(index).copied())
    }

    pub fn is_terminal(self) -> bool {
        self == FormStage::Confirmation
    }

    /// Constraints checked before leaving this stage.
    pub fn rules(self) -> &'static [FieldRule] {
        match self {
            FormStage::Personal => PERSONAL_RULES,
            FormStage::Company => COMPANY_RULES,
            FormStage::Project => PROJECT_RULES,
            FormStage::Confirmation => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BriefingField {
    Name,
    Email,
    Phone,
    Role,
    CompanyName,
    Segment,
    CompanySize,
    Website,
    ServiceType,
    ProjectDescription,
    Deadline,
    Budget,
}

impl BriefingField {
    pub fn as_str(self) -> &'static str {
        match self {
            BriefingField::Name => "name",
            BriefingField::Email => "email",
            BriefingField::Phone => "phone",
            BriefingField::Role => "role",
            BriefingField::CompanyName => "companyName",
            BriefingField::Segment => "segment",
            BriefingField::CompanySize => "companySize",
            BriefingField::Website => "website",
            BriefingField::ServiceType => "serviceType",
            BriefingField::ProjectDescription => "projectDescription",
            BriefingField::Deadline => "deadline",
            BriefingField::Budget => "budget",
        }
    }
}

impl fmt::Display for BriefingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    MinChars(usize),
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: BriefingField,
    pub rule: Rule,
}

const fn min(field: BriefingField, chars: usize) -> FieldRule {
    FieldRule {
        field,
        rule: Rule::MinChars(chars),
    }
}

const PERSONAL_RULES: &[FieldRule] = &[
    min(BriefingField::Name, 3),
    FieldRule {
        field: BriefingField::Email,
        rule: Rule::Email,
    },
    min(BriefingField::Phone, 10),
    min(BriefingField::Role, 2),
];

const COMPANY_RULES: &[FieldRule] = &[
    min(BriefingField::CompanyName, 2),
    min(BriefingField::Segment, 2),
    min(BriefingField::CompanySize, 1),
];

const PROJECT_RULES: &[FieldRule] = &[
    min(BriefingField::ServiceType, 2),
    min(BriefingField::ProjectDescription, 20),
    min(BriefingField::Deadline, 1),
];

/// Everything the wizard collects, across all stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BriefingRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub company_name: String,
    pub segment: String,
    pub company_size: String,
    pub website: Option<String>,
    pub service_type: String,
    pub project_description: String,
    pub deadline: String,
    pub budget: Option<String>,
    pub prefer_whats_app: bool,
    pub prefer_email: bool,
    pub prefer_phone: bool,
    pub prefer_calendly: bool,
}

impl Default for BriefingRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            role: String::new(),
            company_name: String::new(),
            segment: String::new(),
            company_size: String::new(),
            website: None,
            service_type: String::new(),
            project_description: String::new(),
            deadline: String::new(),
            budget: None,
            prefer_whats_app: true,
            prefer_email: false,
            prefer_phone: false,
            prefer_calendly: false,
        }
    }
}

impl BriefingRecord {
    pub fn value(&self, field: BriefingField) -> &str {
        match field {
            BriefingField::Name => &self.name,
            BriefingField::Email => &self.email,
            BriefingField::Phone => &self.phone,
            BriefingField::Role => &self.role,
            BriefingField::CompanyName => &self.company_name,
            BriefingField::Segment => &self.segment,
            BriefingField::CompanySize => &self.company_size,
            BriefingField::Website => self.website.as_deref().unwrap_or_default(),
            BriefingField::ServiceType => &self.service_type,
            BriefingField::ProjectDescription => &self.project_description,
            BriefingField::Deadline => &self.deadline,
            BriefingField::Budget => self.budget.as_deref().unwrap_or_default(),
        }
    }
}

/// A failed constraint on one field, with copy in the active locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: BriefingField,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check only the constraints that belong to `stage`.
pub fn validate_stage(stage: FormStage, record: &BriefingRecord, locale: Locale) -> Vec<FieldError> {
    stage
        .rules()
        .iter()
        .filter_map(|rule| {
            let value = record.value(rule.field);
            let passes = match rule.rule {
                Rule::MinChars(chars) => value.chars().count() >= chars,
                Rule::Email => is_valid_email(value),
            };
            (!passes).then(|| FieldError {
                field: rule.field,
                message: rule_message(rule.rule, locale),
            })
        })
        .collect()
}

/// Check every stage, in order.
pub fn validate_all(record: &BriefingRecord, locale: Locale) -> Vec<FieldError> {
    FormStage::ALL
        .iter()
        .flat_map(|stage| validate_stage(*stage, record, locale))
        .collect()
}

pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn rule_message(rule: Rule, locale: Locale) -> String {
    match (rule, locale) {
        (Rule::Email, Locale::Pt) => "E-mail inválido".to_string(),
        (Rule::Email, Locale::En) => "Invalid email address".to_string(),
        (Rule::Email, Locale::Es) => "Correo electrónico inválido".to_string(),
        (Rule::MinChars(1), Locale::Pt) => "Campo obrigatório".to_string(),
        (Rule::MinChars(1), Locale::En) => "This field is required".to_string(),
        (Rule::MinChars(1), Locale::Es) => "Este campo es obligatorio".to_string(),
        (Rule::MinChars(n), Locale::Pt) => format!("Deve ter pelo menos {n} caracteres"),
        (Rule::MinChars(n), Locale::En) => format!("Must be at least {n} characters"),
        (Rule::MinChars(n), Locale::Es) => format!("Debe tener al menos {n} caracteres"),
    }
}
