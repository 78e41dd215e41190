use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tix_core::clock::{Clock, ManualClock};
use tix_core::model::{Action, NewTicket, Status};
use tix_core::store::{MemoryStore, TicketStore};
use tix_core::{LifecycleService, Projector};

struct Desk {
    clock: Arc<ManualClock>,
    svc: LifecycleService,
    projector: Projector,
}

fn desk() -> Desk {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 8, 3, 8, 0, 0).unwrap(),
    ));
    let store: Arc<dyn TicketStore> = Arc::new(MemoryStore::new());
    Desk {
        svc: LifecycleService::new(Arc::clone(&store), clock.clone()),
        projector: Projector::new(store, clock.clone()),
        clock,
    }
}

#[test]
fn histogram_tracks_transitions() {
    let desk = desk();
    let empty = desk.projector.status_histogram().unwrap();
    assert_eq!(empty.total(), 0);
    assert!(empty.iter().all(|(_, count)| count == 0));

    let a = desk.svc.create(NewTicket::new("a")).unwrap();
    let b = desk.svc.create(NewTicket::new("b")).unwrap();
    desk.svc.create(NewTicket::new("c")).unwrap();
    desk.svc.apply_action(&a.id, Action::Start, None).unwrap();
    desk.svc.apply_action(&b.id, Action::Cancel, None).unwrap();

    let histogram = desk.projector.status_histogram().unwrap();
    assert_eq!(histogram.get(Status::Created), 1);
    assert_eq!(histogram.get(Status::InProgress), 1);
    assert_eq!(histogram.get(Status::Canceled), 1);
    assert_eq!(histogram.total(), 3);
    assert_eq!(histogram.iter().map(|(_, n)| n).sum::<usize>(), histogram.total());
}

#[test]
fn unassigned_backlog_only_holds_unowned_created_or_waiting() {
    let desk = desk();
    let old = desk.svc.create(NewTicket::new("old")).unwrap();
    desk.clock.advance(Duration::minutes(1));
    let waiting = desk.svc.create(NewTicket::new("waiting")).unwrap();
    desk.svc.apply_action(&waiting.id, Action::Wait, None).unwrap();
    desk.clock.advance(Duration::minutes(1));
    let owned = desk.svc.create(NewTicket::new("owned")).unwrap();
    desk.svc.assign(&owned.id, "bob", None).unwrap();
    desk.clock.advance(Duration::minutes(1));
    let started = desk.svc.create(NewTicket::new("started")).unwrap();
    desk.svc.apply_action(&started.id, Action::Start, None).unwrap();

    let backlog = desk.projector.unassigned(50).unwrap();
    let ids: Vec<_> = backlog.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec![waiting.id, old.id]);
    assert!(backlog.iter().all(|t| t.assignee.is_none()));
}

#[test]
fn overdue_backlog_follows_the_clock() {
    let desk = desk();
    let now = desk.clock.now();
    let soon = desk
        .svc
        .create(NewTicket::new("soon").with_due_at(now + Duration::hours(1)))
        .unwrap();
    let later = desk
        .svc
        .create(NewTicket::new("later").with_due_at(now + Duration::hours(3)))
        .unwrap();
    desk.svc.create(NewTicket::new("no due")).unwrap();

    assert!(desk.projector.overdue(50).unwrap().is_empty());

    desk.clock.advance(Duration::hours(2));
    let ids: Vec<_> = desk
        .projector
        .overdue(50)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![soon.id.clone()]);

    desk.clock.advance(Duration::hours(2));
    desk.svc.apply_action(&soon.id, Action::Escalate, None).unwrap();
    let ids: Vec<_> = desk
        .projector
        .overdue(50)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![soon.id.clone(), later.id.clone()]);

    desk.svc.apply_action(&soon.id, Action::Resolve, None).unwrap();
    desk.svc.apply_action(&later.id, Action::Close, None).unwrap();
    assert!(desk.projector.overdue(50).unwrap().is_empty());
}

#[test]
fn dashboard_is_one_consistent_snapshot() {
    let desk = desk();
    let now = desk.clock.now();
    for n in 0..5 {
        desk.svc
            .create(NewTicket::new(format!("t{n}")).with_due_at(now - Duration::minutes(n)))
            .unwrap();
    }

    let dashboard = desk.projector.dashboard(3).unwrap();
    assert_eq!(dashboard.stats.total(), 5);
    assert_eq!(dashboard.unassigned.len(), 3);
    assert_eq!(dashboard.overdue.len(), 3);
    assert_eq!(dashboard.generated_at, now);

    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["stats"]["created"], 5);
    assert_eq!(json["overdue"][0]["title"], "t4");
}
