//! CLI commands

use casepay_bus::{
    Dispatcher, DocumentArchiver, Notifier, Outbox, RecordingMessenger, RecordingMirror,
    RecordingStorage, RetryStore, SheetMirrorSync,
};
use casepay_core::{Actor, ActorId, Amount, Attachment, CaseDetails, CaseKind, CaseStatus};
use casepay_payment::SearchOutcome;
use serde_json::json;
use std::sync::Arc;

use crate::config::DeskConfig;
use crate::desk::Desk;

/// Print the effective configuration (secrets omitted)
pub fn print_config(config: &DeskConfig) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn retry_store(config: &DeskConfig) -> Result<RetryStore, anyhow::Error> {
    Ok(match &config.outbox.retry_db_path {
        Some(path) => RetryStore::new(path)?,
        None => RetryStore::in_memory()?,
    })
}

/// Run the sale-listing payment flow end to end against an in-process desk
/// and print the resulting case, audit trail and collaborator traffic
pub async fn simulate(config: DeskConfig, base: u64) -> Result<(), anyhow::Error> {
    let storage = Arc::new(RecordingStorage::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let mirror = Arc::new(RecordingMirror::new());

    let dispatcher = Arc::new(
        Dispatcher::new()
            .with_retry_store(Arc::new(retry_store(&config)?))
            .subscribe(Arc::new(DocumentArchiver::new(storage.clone())))
            .subscribe(Arc::new(Notifier::new(messenger.clone())))
            .subscribe(Arc::new(SheetMirrorSync::new(mirror.clone()))),
    );

    let (outbox, receiver) = Outbox::channel();
    let dispatching = Arc::clone(&dispatcher).spawn(receiver);
    let desk = Desk::new(config, outbox)?;

    let customer = Actor::customer("customer-1");
    let operator = Actor::operator("operator-1");
    let admin = Actor::administrator("admin-1");

    let details = CaseDetails::titled("Account listing")
        .with_description("Level 80 account with rare items")
        .with_asking_price(Amount::new(base))
        .with_attachment(Attachment {
            filename: "screenshot.png".to_string(),
            mime_type: "image/png".to_string(),
            content_base64: "iVBORw0KGgo=".to_string(),
        });
    let case = desk.create_case(&customer, ActorId::new("customer-1"), CaseKind::SaleListing, details)?;
    let payment = desk.create_payment(&customer, &case.id, None)?.payment;

    let code = payment.unique_code().to_string();
    let found = match desk.search_payments(&operator, payment.amount(), &code, None)? {
        SearchOutcome::Unique(found) => found,
        SearchOutcome::Ambiguous(candidates) => candidates
            .into_iter()
            .find(|p| p.order_ref() == payment.order_ref())
            .ok_or_else(|| anyhow::anyhow!("payment {} not among candidates", payment.id()))?,
    };

    desk.confirm_payment(
        &operator,
        found.id(),
        found.order_ref(),
        found.amount(),
        &code,
        Some("Transfer seen on statement".to_string()),
    )?;
    desk.assign_operator(&admin, &case.id, &operator)?;
    desk.update_status(&operator, &case.id, CaseStatus::InReview)?;

    let view = desk.get_case(&operator, &case.id)?;
    let trail = desk.list_audit(&operator, &case.id)?;
    let verified = desk.verify_audit(&operator, &case.id)?;

    drop(desk);
    let dispatched = dispatching.await?;
    let pending_retries = match dispatcher.retry_store() {
        Some(store) => store.pending_count()?,
        None => 0,
    };

    let report = json!({
        "case": view,
        "audit": trail,
        "audit_verified_entries": verified,
        "outbox": {
            "events_dispatched": dispatched,
            "documents_stored": storage.stored().len(),
            "messages_sent": messenger.sent().len(),
            "mirror_rows": mirror.rows().len(),
            "pending_retries": pending_retries,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
