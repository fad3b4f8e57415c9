use std::sync::Arc;

use url::Url;

use agencia::application::notify::{ToastBuffer, ToastKind};
use agencia::application::wizard::{
    Channel, LaunchKind, RecordingLauncher, WizardController, WizardError,
};
use agencia::config::DeliverySettings;
use agencia::domain::briefing::{BriefingField, BriefingRecord, FormStage};
use agencia::domain::types::Locale;

struct Harness {
    wizard: WizardController,
    launcher: Arc<RecordingLauncher>,
    toasts: Arc<ToastBuffer>,
}

fn delivery() -> DeliverySettings {
    DeliverySettings {
        whatsapp_number: "5511988887777".to_string(),
        email_recipient: "briefing@agencia.test".to_string(),
        email_subject: "Novo briefing".to_string(),
        scheduler_url: Url::parse("https://calendly.com/agencia/briefing").expect("url"),
    }
}

fn harness(locale: Locale) -> Harness {
    let launcher = Arc::new(RecordingLauncher::new());
    let toasts = Arc::new(ToastBuffer::new());
    let wizard = WizardController::new(delivery(), locale, launcher.clone(), toasts.clone());
    Harness {
        wizard,
        launcher,
        toasts,
    }
}

fn complete_record() -> BriefingRecord {
    BriefingRecord {
        name: "Joana Prado".to_string(),
        email: "joana@prado.com.br".to_string(),
        phone: "11987654321".to_string(),
        role: "Diretora".to_string(),
        company_name: "Prado Móveis".to_string(),
        segment: "Varejo".to_string(),
        company_size: "11-50".to_string(),
        website: Some("https://prado.com.br".to_string()),
        service_type: "Identidade visual".to_string(),
        project_description: "Renovar a marca para a linha de móveis planejados.".to_string(),
        deadline: "2 meses".to_string(),
        budget: None,
        ..BriefingRecord::default()
    }
}

fn walk_to_confirmation(wizard: &mut WizardController) {
    while !wizard.stage().is_terminal() {
        assert!(wizard.advance(), "blocked at {:?}: {:?}", wizard.stage(), wizard.errors());
    }
}

#[test]
fn stage_gating_checks_only_the_current_stage() {
    let mut h = harness(Locale::Pt);
    h.wizard.record_mut().name = "Jo".to_string();
    h.wizard.record_mut().company_name = String::new();

    assert!(!h.wizard.advance());
    assert_eq!(h.wizard.stage(), FormStage::Personal);
    let fields: Vec<_> = h.wizard.errors().iter().map(|error| error.field).collect();
    assert_eq!(
        fields,
        [BriefingField::Name, BriefingField::Email, BriefingField::Phone, BriefingField::Role]
    );
    assert_eq!(h.wizard.errors()[0].message, "Deve ter pelo menos 3 caracteres");

    let record = complete_record();
    {
        let draft = h.wizard.record_mut();
        draft.name = record.name.clone();
        draft.email = record.email.clone();
        draft.phone = record.phone.clone();
        draft.role = record.role.clone();
    }
    assert!(h.wizard.advance());
    assert_eq!(h.wizard.stage(), FormStage::Company);
    assert!(h.wizard.errors().is_empty());

    assert!(!h.wizard.advance());
    assert!(
        h.wizard
            .errors()
            .iter()
            .all(|error| error.field != BriefingField::Name)
    );
}

#[test]
fn retreat_stops_at_the_first_stage() {
    let mut h = harness(Locale::En);
    *h.wizard.record_mut() = complete_record();
    assert!(h.wizard.advance());
    assert!(h.wizard.advance());
    assert_eq!(h.wizard.stage(), FormStage::Project);

    h.wizard.record_mut().deadline.clear();
    assert!(h.wizard.retreat(), "going back never validates");
    assert_eq!(h.wizard.stage(), FormStage::Company);
    assert!(h.wizard.retreat());
    assert!(!h.wizard.retreat());
    assert_eq!(h.wizard.stage(), FormStage::Personal);
}

#[test]
fn whatsapp_only_submit_opens_one_window_and_resets() {
    let mut h = harness(Locale::Pt);
    *h.wizard.record_mut() = complete_record();
    walk_to_confirmation(&mut h.wizard);

    let outcome = h.wizard.submit().expect("submit");

    assert_eq!(outcome.dispatched, [Channel::WhatsApp]);
    assert!(!outcome.showing_scheduler);
    assert!(outcome.summary.contains("Nome: Joana Prado"));
    assert!(outcome.summary.contains("Orçamento: -"));

    let launches = h.launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].kind, LaunchKind::NewWindow);
    assert!(
        launches[0]
            .url
            .as_str()
            .starts_with("https://wa.me/5511988887777?text=")
    );
    let text = launches[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "text")
        .map(|(_, value)| value.into_owned());
    assert_eq!(text.as_deref(), Some(outcome.summary.as_str()));

    assert_eq!(h.wizard.stage(), FormStage::Personal);
    assert_eq!(h.wizard.record(), &BriefingRecord::default());

    let toasts = h.toasts.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Success);
    assert_eq!(toasts[0].title, "Briefing enviado!");
}

#[test]
fn email_channel_navigates_to_mailto() {
    let mut h = harness(Locale::En);
    *h.wizard.record_mut() = BriefingRecord {
        prefer_whats_app: false,
        prefer_email: true,
        ..complete_record()
    };
    walk_to_confirmation(&mut h.wizard);

    let outcome = h.wizard.submit().expect("submit");

    assert_eq!(outcome.dispatched, [Channel::Email]);
    let launches = h.launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].kind, LaunchKind::Navigate);
    assert_eq!(launches[0].url.scheme(), "mailto");
    assert!(outcome.summary.starts_with("*New project briefing*"));
}

#[test]
fn scheduler_keeps_the_form_until_closed() {
    let mut h = harness(Locale::Es);
    *h.wizard.record_mut() = BriefingRecord {
        prefer_calendly: true,
        ..complete_record()
    };
    walk_to_confirmation(&mut h.wizard);

    let outcome = h.wizard.submit().expect("submit");

    assert_eq!(outcome.dispatched, [Channel::WhatsApp, Channel::Scheduler]);
    assert!(outcome.showing_scheduler);
    assert!(h.wizard.is_showing_scheduler());
    assert_eq!(h.wizard.stage(), FormStage::Confirmation);
    assert_eq!(h.wizard.record().name, "Joana Prado");
    assert_eq!(
        h.wizard.scheduler_url().map(|url| url.to_string()).as_deref(),
        Some("https://calendly.com/agencia/briefing?locale=es")
    );

    let again = h.wizard.submit().expect_err("already sent");
    assert!(matches!(again, WizardError::AlreadySubmitted));
    assert_eq!(h.launcher.launches().len(), 1, "no second hand-off");
    assert_eq!(h.toasts.drain().len(), 1);

    h.wizard.close_scheduler();
    assert!(!h.wizard.is_showing_scheduler());
    assert!(h.wizard.scheduler_url().is_none());
    assert_eq!(h.wizard.stage(), FormStage::Personal);
    assert_eq!(h.wizard.record(), &BriefingRecord::default());
}

#[test]
fn invalid_record_dispatches_nothing() {
    let mut h = harness(Locale::Pt);
    *h.wizard.record_mut() = complete_record();
    walk_to_confirmation(&mut h.wizard);
    h.wizard.record_mut().email = "joana@".to_string();

    let err = h.wizard.submit().expect_err("invalid");

    match err {
        WizardError::Validation(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, BriefingField::Email);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.launcher.launches().is_empty());
    assert!(h.toasts.is_empty());
    assert_eq!(h.wizard.stage(), FormStage::Confirmation);
}

#[test]
fn submit_is_refused_before_confirmation() {
    let mut h = harness(Locale::Pt);
    *h.wizard.record_mut() = complete_record();

    let err = h.wizard.submit().expect_err("too early");

    assert!(matches!(
        err,
        WizardError::NotAtConfirmation {
            stage: FormStage::Personal
        }
    ));
    assert!(h.launcher.launches().is_empty());
}

#[test]
fn locale_change_resets_the_form() {
    let mut h = harness(Locale::Pt);
    *h.wizard.record_mut() = complete_record();
    assert!(h.wizard.advance());

    assert!(!h.wizard.set_locale(Locale::Pt));
    assert_eq!(h.wizard.stage(), FormStage::Company);

    assert!(h.wizard.set_locale(Locale::En));
    assert_eq!(h.wizard.locale(), Locale::En);
    assert_eq!(h.wizard.stage(), FormStage::Personal);
    assert_eq!(h.wizard.record(), &BriefingRecord::default());

    assert!(!h.wizard.advance());
    assert_eq!(h.wizard.errors()[0].message, "Must be at least 3 characters");
}
