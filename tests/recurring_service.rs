use std::{
    path::Path,
    sync::{Arc, Barrier, Mutex},
    thread,
};

use rusqlite::Connection;
use tempfile::tempdir;
use time::{Date, macros::date};

use recurring_budget::{
    Error, FixedClock, Frequency, NewTemplate, RecurringService, RecurringTemplate,
    TemplateChanges, TransactionKind,
};

fn get_service(today: Date) -> (RecurringService, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::on(today));
    let conn = Connection::open_in_memory().unwrap();
    let service = RecurringService::new(Arc::new(Mutex::new(conn)), clock.clone()).unwrap();
    service.create_budget("Household").unwrap();

    (service, clock)
}

fn open_service(path: &Path, clock: Arc<FixedClock>) -> RecurringService {
    let conn = Connection::open(path).unwrap();
    RecurringService::new(Arc::new(Mutex::new(conn)), clock).unwrap()
}

fn monthly(title: &str, amount: f64, day: u8) -> NewTemplate {
    NewTemplate {
        budget_id: 1,
        title: title.to_owned(),
        amount,
        category_id: None,
        kind: TransactionKind::Expense,
        frequency: Frequency::Monthly,
        day: Some(day),
    }
}

fn change_amount(service: &RecurringService, template: &RecurringTemplate, amount: f64, effective: Option<Date>) {
    service
        .submit_update(
            template.id,
            &TemplateChanges {
                amount: Some(amount),
                ..Default::default()
            },
            effective,
            None,
        )
        .unwrap();
}

#[test]
fn materializes_due_occurrence_once() {
    let (service, _) = get_service(date!(2025 - 06 - 05));
    service.create_template(monthly("Rent", 100.0, 1)).unwrap();

    let first = service.materialize(1).unwrap();
    let second = service.materialize(1).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].date, date!(2025 - 06 - 01));
    assert_eq!(first[0].amount, 100.0);
    assert!(first[0].is_recurring);
    assert!(second.is_empty());
    assert_eq!(service.transactions_for_budget(1).unwrap(), first);
}

#[test]
fn clamps_day_to_short_month() {
    let (service, _) = get_service(date!(2025 - 06 - 30));
    service.create_template(monthly("Rent", 100.0, 31)).unwrap();

    let created = service.materialize(1).unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].date, date!(2025 - 06 - 30));
}

#[test]
fn enumerates_weekly_occurrences() {
    let (service, _) = get_service(date!(2025 - 08 - 22));
    service
        .create_template(NewTemplate {
            frequency: Frequency::Weekly,
            day: Some(4),
            ..monthly("Lunch", 15.0, 1)
        })
        .unwrap();

    let created = service.materialize(1).unwrap();

    let mut dates: Vec<_> = created.iter().map(|transaction| transaction.date).collect();
    dates.sort();
    assert_eq!(
        dates,
        vec![date!(2025 - 08 - 01), date!(2025 - 08 - 08), date!(2025 - 08 - 15), date!(2025 - 08 - 22)]
    );
}

#[test]
fn immediate_updates_keep_one_open_version() {
    let (service, clock) = get_service(date!(2025 - 06 - 05));
    let template = service.create_template(monthly("Rent", 100.0, 1)).unwrap();

    change_amount(&service, &template, 110.0, None);
    clock.set_date(date!(2025 - 06 - 10));
    change_amount(&service, &template, 120.0, None);

    let history = service.fetch_history(template.id).unwrap();
    let open: Vec<_> = history
        .iter()
        .filter(|version| version.effective_until.is_none())
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(history[1].effective_until, Some(history[0].effective_from));
    assert_eq!(service.fetch_with_pending(template.id).unwrap().template.amount, 120.0);
}

#[test]
fn future_update_waits_for_its_day() {
    let (service, clock) = get_service(date!(2025 - 06 - 05));
    let template = service.create_template(monthly("Rent", 100.0, 1)).unwrap();

    change_amount(&service, &template, 150.0, Some(date!(2025 - 07 - 01)));

    let details = service.fetch_with_pending(template.id).unwrap();
    assert_eq!(details.template, template);
    let pending = details.pending_version.unwrap();
    assert_eq!(pending.effective_from, date!(2025 - 07 - 01));
    assert_eq!(pending.effective_until, None);
    assert_eq!(service.fetch_history(template.id).unwrap(), vec![pending]);
    assert_eq!(service.materialize(1).unwrap()[0].amount, 100.0);

    clock.set_date(date!(2025 - 07 - 02));
    let created = service.materialize(1).unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].date, date!(2025 - 07 - 01));
    assert_eq!(created[0].amount, 150.0);
    assert_eq!(service.fetch_with_pending(template.id).unwrap().template.amount, 150.0);
}

#[test]
fn only_future_versions_can_be_cancelled() {
    let (service, _) = get_service(date!(2025 - 06 - 05));
    let template = service.create_template(monthly("Rent", 100.0, 1)).unwrap();
    change_amount(&service, &template, 110.0, None);
    change_amount(&service, &template, 150.0, Some(date!(2025 - 07 - 01)));
    let history = service.fetch_history(template.id).unwrap();
    let (future, current) = (&history[0], &history[1]);

    let rejected = service.cancel_pending(current.id);
    service.cancel_pending(future.id).unwrap();

    assert!(rejected.as_ref().is_err_and(Error::is_invalid_state));
    let remaining = service.fetch_history(template.id).unwrap();
    assert_eq!(remaining, vec![current.clone()]);
    assert_eq!(service.fetch_with_pending(template.id).unwrap().pending_version, None);
}

#[test]
fn paused_template_is_not_materialized() {
    let (service, _) = get_service(date!(2025 - 06 - 05));
    let template = service.create_template(monthly("Rent", 100.0, 1)).unwrap();

    let paused = service.toggle_active(template.id).unwrap();
    let created = service.materialize(1).unwrap();
    let resumed = service.toggle_active(template.id).unwrap();

    assert!(!paused.active);
    assert!(created.is_empty());
    assert!(resumed.active);
    assert_eq!(service.materialize(1).unwrap().len(), 1);
}

#[test]
fn lists_templates_with_category_names() {
    let (service, _) = get_service(date!(2025 - 06 - 05));
    let housing = service.create_category(1, "Housing", None).unwrap();
    let rent = service.create_category(1, "Rent", Some(housing.id)).unwrap();
    service
        .create_template(NewTemplate {
            category_id: Some(rent.id),
            ..monthly("Rent", 100.0, 1)
        })
        .unwrap();
    service.create_template(monthly("Gym", 30.0, 2)).unwrap();

    let templates = service.list_templates(1).unwrap();

    assert_eq!(templates.len(), 2);
    assert_eq!(templates[0].category_name, "Rent");
    assert_eq!(templates[0].parent_category_id, Some(housing.id));
    assert_eq!(templates[0].parent_category_name.as_deref(), Some("Housing"));
    assert_eq!(templates[1].category_name, "Unknown");
    assert_eq!(templates[1].parent_category_name, None);
}

#[test]
fn deleting_template_keeps_transactions() {
    let (service, _) = get_service(date!(2025 - 06 - 05));
    let template = service.create_template(monthly("Rent", 100.0, 1)).unwrap();
    change_amount(&service, &template, 150.0, Some(date!(2025 - 07 - 01)));
    let created = service.materialize(1).unwrap();

    service.delete_template(template.id).unwrap();

    assert_eq!(
        service.fetch_history(template.id),
        Err(Error::TemplateNotFound(template.id))
    );
    assert_eq!(service.transactions_for_budget(1).unwrap(), created);
    assert!(service.list_templates(1).unwrap().is_empty());
}

#[test]
fn invalid_input_is_rejected() {
    let (service, _) = get_service(date!(2025 - 06 - 05));

    let result = service.create_template(monthly("Rent", 0.0, 1));

    assert!(result.is_err_and(|error| error.is_validation()));
    assert!(service.list_templates(1).unwrap().is_empty());
}

#[test]
fn unknown_ids_are_not_found() {
    let (service, _) = get_service(date!(2025 - 06 - 05));

    assert!(service.toggle_active(9).is_err_and(|error| error.is_not_found()));
    assert!(service.cancel_pending(9).is_err_and(|error| error.is_not_found()));
    assert!(service.materialize(9).is_err_and(|error| error.is_not_found()));
}

#[test]
fn failed_materialization_leaves_no_transactions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let clock = Arc::new(FixedClock::on(date!(2025 - 06 - 05)));
    let service = open_service(&path, clock);
    service.create_budget("Household").unwrap();
    service.create_template(monthly("Rent", 100.0, 1)).unwrap();
    service.create_template(monthly("Gym", 30.0, 2)).unwrap();
    Connection::open(&path)
        .unwrap()
        .execute(
            "CREATE TRIGGER reject_gym BEFORE INSERT ON \"transaction\"
             WHEN NEW.title = 'Gym'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
            (),
        )
        .unwrap();

    let result = service.materialize(1);

    assert!(matches!(result, Err(Error::SqlError(_))));
    assert!(service.transactions_for_budget(1).unwrap().is_empty());
}

#[test]
fn concurrent_materialization_creates_each_occurrence_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let clock = Arc::new(FixedClock::on(date!(2025 - 06 - 25)));
    let setup = open_service(&path, clock.clone());
    setup.create_budget("Household").unwrap();
    setup.create_template(monthly("Rent", 100.0, 1)).unwrap();
    setup
        .create_template(NewTemplate {
            frequency: Frequency::Weekly,
            day: Some(0),
            ..monthly("Groceries", 80.0, 1)
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = open_service(&path, clock.clone());
            let barrier = barrier.clone();

            thread::spawn(move || {
                barrier.wait();
                service.materialize(1).unwrap().len()
            })
        })
        .collect();

    let created: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();

    // June 2025: Rent on the 1st and Mondays on the 2nd, 9th, 16th and 23rd.
    assert_eq!(created, 5);
    assert_eq!(setup.transactions_for_budget(1).unwrap().len(), 5);
}

#[test]
fn concurrent_updates_leave_one_open_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let clock = Arc::new(FixedClock::on(date!(2025 - 06 - 05)));
    let setup = open_service(&path, clock.clone());
    setup.create_budget("Household").unwrap();
    let template = setup.create_template(monthly("Rent", 100.0, 1)).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [110.0, 120.0]
        .into_iter()
        .map(|amount| {
            let service = open_service(&path, clock.clone());
            let barrier = barrier.clone();
            let template = template.clone();

            thread::spawn(move || {
                barrier.wait();
                change_amount(&service, &template, amount, None);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let history = setup.fetch_history(template.id).unwrap();
    let open: Vec<_> = history
        .iter()
        .filter(|version| version.effective_until.is_none())
        .collect();
    assert_eq!(history.len(), 2);
    assert_eq!(open.len(), 1);
    assert_eq!(
        setup.fetch_with_pending(template.id).unwrap().template.amount,
        open[0].amount
    );
}
