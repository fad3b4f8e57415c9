//! Plain-text rendering of a briefing for chat and mail hand-off.

use crate::domain::briefing::{BriefingField, BriefingRecord, FormStage};
use crate::domain::types::Locale;

const EMPTY_VALUE: &str = "-";

/// Multi-line summary listing every stage's fields, then the contact
/// preferences that were chosen.
pub fn format_summary(record: &BriefingRecord, locale: Locale) -> String {
    let mut lines = vec![format!("*{}*", heading(locale))];

    for stage in [FormStage::Personal, FormStage::Company, FormStage::Project] {
        lines.push(String::new());
        lines.push(format!("*{}*", stage_title(stage, locale)));
        lines.extend(stage_fields(stage).iter().map(|field| {
            let value = record.value(*field).trim();
            let value = if value.is_empty() { EMPTY_VALUE } else { value };
            format!("{}: {}", field_label(*field, locale), value)
        }));
    }

    lines.push(String::new());
    lines.push(format!("*{}*", stage_title(FormStage::Confirmation, locale)));
    let preferences = chosen_preferences(record, locale);
    lines.push(if preferences.is_empty() {
        no_preference(locale).to_string()
    } else {
        preferences.join(", ")
    });
    lines.join("\n")
}

fn stage_fields(stage: FormStage) -> &'static [BriefingField] {
    match stage {
        FormStage::Personal => &[
            BriefingField::Name,
            BriefingField::Email,
            BriefingField::Phone,
            BriefingField::Role,
        ],
        FormStage::Company => &[
            BriefingField::CompanyName,
            BriefingField::Segment,
            BriefingField::CompanySize,
            BriefingField::Website,
        ],
        FormStage::Project => &[
            BriefingField::ServiceType,
            BriefingField::ProjectDescription,
            BriefingField::Deadline,
            BriefingField::Budget,
        ],
        FormStage::Confirmation => &[],
    }
}

fn chosen_preferences(record: &BriefingRecord, locale: Locale) -> Vec<&'static str> {
    let phone = match locale {
        Locale::Pt => "Telefone",
        Locale::En => "Phone call",
        Locale::Es => "Teléfono",
    };
    let email = match locale {
        Locale::Pt => "E-mail",
        Locale::En => "Email",
        Locale::Es => "Correo electrónico",
    };
    let scheduler = match locale {
        Locale::Pt => "Agendar reunião (Calendly)",
        Locale::En => "Book a meeting (Calendly)",
        Locale::Es => "Agendar reunión (Calendly)",
    };

    [
        (record.prefer_whats_app, "WhatsApp"),
        (record.prefer_email, email),
        (record.prefer_phone, phone),
        (record.prefer_calendly, scheduler),
    ]
    .into_iter()
    .filter_map(|(chosen, label)| chosen.then_some(label))
    .collect()
}

fn heading(locale: Locale) -> &'static str {
    match locale {
        Locale::Pt => "Novo briefing de projeto",
        Locale::En => "New project briefing",
        Locale::Es => "Nuevo briefing de proyecto",
    }
}

fn no_preference(locale: Locale) -> &'static str {
    match locale {
        Locale::Pt => "Nenhuma preferência informada",
        Locale::En => "No preference given",
        Locale::Es => "Ninguna preferencia indicada",
    }
}

fn stage_title(stage: FormStage, locale: Locale) -> &'static str {
    match (stage, locale) {
        (FormStage::Personal, Locale::Pt) => "Dados pessoais",
        (FormStage::Personal, Locale::En) => "Personal details",
        (FormStage::Personal, Locale::Es) => "Datos personales",
        (FormStage::Company, Locale::Pt) => "Empresa",
        (FormStage::Company, Locale::En) => "Company",
        (FormStage::Company, Locale::Es) => "Empresa",
        (FormStage::Project, Locale::Pt) => "Projeto",
        (FormStage::Project, Locale::En) => "Project",
        (FormStage::Project, Locale::Es) => "Proyecto",
        (FormStage::Confirmation, Locale::Pt) => "Preferências de contato",
        (FormStage::Confirmation, Locale::En) => "Contact preferences",
        (FormStage::Confirmation, Locale::Es) => "Preferencias de contacto",
    }
}

fn field_label(field: BriefingField, locale: Locale) -> &'static str {
    match locale {
        Locale::Pt => match field {
            BriefingField::Name => "Nome",
            BriefingField::Email => "E-mail",
            BriefingField::Phone => "Telefone",
            BriefingField::Role => "Cargo",
            BriefingField::CompanyName => "Empresa",
            BriefingField::Segment => "Segmento",
            BriefingField::CompanySize => "Porte",
            BriefingField::Website => "Site",
            BriefingField::ServiceType => "Serviço",
            BriefingField::ProjectDescription => "Descrição",
            BriefingField::Deadline => "Prazo",
            BriefingField::Budget => "Orçamento",
        },
        Locale::En => match field {
            BriefingField::Name => "Name",
            BriefingField::Email => "Email",
            BriefingField::Phone => "Phone",
            BriefingField::Role => "Role",
            BriefingField::CompanyName => "Company",
            BriefingField::Segment => "Industry",
            BriefingField::CompanySize => "Company size",
            BriefingField::Website => "Website",
            BriefingField::ServiceType => "Service",
            BriefingField::ProjectDescription => "Description",
            BriefingField::Deadline => "Deadline",
            BriefingField::Budget => "Budget",
        },
        Locale::Es => match field {
            BriefingField::Name => "Nombre",
            BriefingField::Email => "Correo",
            BriefingField::Phone => "Teléfono",
            BriefingField::Role => "Cargo",
            BriefingField::CompanyName => "Empresa",
            BriefingField::Segment => "Sector",
            BriefingField::CompanySize => "Tamaño",
            BriefingField::Website => "Sitio web",
            BriefingField::ServiceType => "Servicio",
            BriefingField::ProjectDescription => "Descripción",
            BriefingField::Deadline => "Plazo",
            BriefingField::Budget => "Presupuesto",
        },
    }
}
