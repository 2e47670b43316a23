//! Booking engine tests against the in-memory backend

use chrono::{DateTime, Duration, Utc};
use tokio_test::{assert_err, assert_ok};

use shareit_server::{
    models::{
        booking::{Booking, BookingStatus, CreateBooking},
        comment::CreateComment,
        item::{CreateItem, Item, UpdateItem},
        user::{CreateUser, UpdateUser, User},
    },
    repository::Repository,
    services::Services,
    AppError,
};

struct Fixture {
    services: Services,
    owner: User,
    booker: User,
    item: Item,
}

async fn user(services: &Services, name: &str) -> User {
    services
        .users
        .create_user(CreateUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        })
        .await
        .unwrap()
}

async fn fixture() -> Fixture {
    let services = Services::new(Repository::in_memory());
    let owner = user(&services, "Owner").await;
    let booker = user(&services, "Booker").await;
    let item = services
        .items
        .create_item(
            owner.id,
            CreateItem {
                name: "Drill".to_string(),
                description: "Cordless drill".to_string(),
                available: true,
                request_id: None,
            },
        )
        .await
        .unwrap();

    Fixture { services, owner, booker, item }
}

async fn book(f: &Fixture, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Booking, AppError> {
    f.services
        .bookings
        .create_booking(
            f.booker.id,
            CreateBooking {
                item_id: f.item.id,
                start: Some(start),
                end: Some(end),
            },
        )
        .await
}

#[tokio::test]
async fn test_new_booking_is_waiting() {
    let f = fixture().await;
    let t = Utc::now();

    let booking = assert_ok!(book(&f, t + Duration::days(1), t + Duration::days(2)).await);
    assert_eq!(booking.status, BookingStatus::Waiting);
    assert_eq!(booking.item.id, f.item.id);
    assert_eq!(booking.item.owner_id, f.owner.id);
    assert_eq!(booking.booker.id, f.booker.id);
}

#[tokio::test]
async fn test_second_decision_conflicts() {
    let f = fixture().await;
    let t = Utc::now();
    let booking = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let approved = assert_ok!(f.services.bookings.set_approval(booking.id, f.owner.id, true).await);
    assert_eq!(approved.status, BookingStatus::Approved);

    let again = f.services.bookings.set_approval(booking.id, f.owner.id, true).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let reject = f.services.bookings.set_approval(booking.id, f.owner.id, false).await;
    assert!(matches!(reject, Err(AppError::Conflict(_))));

    let stored = f.services.bookings.get_booking(booking.id, f.booker.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Approved);
}

#[tokio::test]
async fn test_rejection_is_terminal() {
    let f = fixture().await;
    let t = Utc::now();
    let booking = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let rejected = f.services.bookings.set_approval(booking.id, f.owner.id, false).await.unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert_err!(f.services.bookings.set_approval(booking.id, f.owner.id, true).await);
}

#[tokio::test]
async fn test_only_owner_decides() {
    let f = fixture().await;
    let t = Utc::now();
    let booking = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let by_booker = f.services.bookings.set_approval(booking.id, f.booker.id, true).await;
    assert!(matches!(by_booker, Err(AppError::Validation(msg)) if msg == "only owner may decide"));

    let missing = f.services.bookings.set_approval(999, f.owner.id, true).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_overlapping_bookings_are_accepted() {
    let f = fixture().await;
    let t = Utc::now();
    let first = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let overlapping = assert_ok!(book(&f, t + Duration::hours(36), t + Duration::days(3)).await);
    assert_ne!(first.id, overlapping.id);
    assert_eq!(overlapping.status, BookingStatus::Waiting);
}

#[tokio::test]
async fn test_current_and_past_share_one_instant() {
    let f = fixture().await;
    let t = Utc::now();
    let current = book(&f, t - Duration::hours(1), t + Duration::hours(1)).await.unwrap();
    let future = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let listed = f.services.bookings.list_by_booker(f.booker.id, "CURRENT", 0, 10).await.unwrap();
    assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), vec![current.id]);

    let past = f.services.bookings.list_by_booker(f.booker.id, "past", 0, 10).await.unwrap();
    assert!(past.is_empty());

    let upcoming = f.services.bookings.list_by_owner(f.owner.id, "Future", 0, 10).await.unwrap();
    assert_eq!(upcoming.iter().map(|b| b.id).collect::<Vec<_>>(), vec![future.id]);
}

#[tokio::test]
async fn test_stranger_cannot_read_booking() {
    let f = fixture().await;
    let stranger = user(&f.services, "Stranger").await;
    let t = Utc::now();
    let booking = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let denied = f.services.bookings.get_booking(booking.id, stranger.id).await;
    assert!(matches!(denied, Err(AppError::Validation(msg)) if msg == "access denied"));

    assert_ok!(f.services.bookings.get_booking(booking.id, f.owner.id).await);
    assert_ok!(f.services.bookings.get_booking(booking.id, f.booker.id).await);
}

#[tokio::test]
async fn test_booking_rejections() {
    let f = fixture().await;
    let t = Utc::now();

    let own = f
        .services
        .bookings
        .create_booking(
            f.owner.id,
            CreateBooking {
                item_id: f.item.id,
                start: Some(t + Duration::days(1)),
                end: Some(t + Duration::days(2)),
            },
        )
        .await;
    assert!(matches!(own, Err(AppError::Validation(msg)) if msg == "owner cannot book own item"));

    let inverted = book(&f, t + Duration::days(2), t + Duration::days(1)).await;
    assert!(matches!(inverted, Err(AppError::Validation(msg)) if msg == "invalid dates"));

    let empty = book(&f, t + Duration::days(1), t + Duration::days(1)).await;
    assert!(matches!(empty, Err(AppError::Validation(msg)) if msg == "invalid dates"));

    let missing_end = f
        .services
        .bookings
        .create_booking(
            f.booker.id,
            CreateBooking { item_id: f.item.id, start: Some(t), end: None },
        )
        .await;
    assert!(matches!(missing_end, Err(AppError::Validation(_))));

    let unknown_item = f
        .services
        .bookings
        .create_booking(
            f.booker.id,
            CreateBooking {
                item_id: 999,
                start: Some(t + Duration::days(1)),
                end: Some(t + Duration::days(2)),
            },
        )
        .await;
    assert!(matches!(unknown_item, Err(AppError::NotFound(_))));

    // nothing above was stored
    let all = f.services.bookings.list_by_booker(f.booker.id, "ALL", 0, 10).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_unavailable_item_cannot_be_booked() {
    let f = fixture().await;
    f.services
        .items
        .update_item(
            f.item.id,
            f.owner.id,
            UpdateItem { available: Some(false), ..UpdateItem::default() },
        )
        .await
        .unwrap();

    let t = Utc::now();
    let result = book(&f, t + Duration::days(1), t + Duration::days(2)).await;
    assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "item not available"));
}

#[tokio::test]
async fn test_status_filters() {
    let f = fixture().await;
    let t = Utc::now();
    let waiting = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();
    let approved = book(&f, t + Duration::days(3), t + Duration::days(4)).await.unwrap();
    let rejected = book(&f, t + Duration::days(5), t + Duration::days(6)).await.unwrap();
    f.services.bookings.set_approval(approved.id, f.owner.id, true).await.unwrap();
    f.services.bookings.set_approval(rejected.id, f.owner.id, false).await.unwrap();

    let ids = |bookings: Vec<Booking>| bookings.iter().map(|b| b.id).collect::<Vec<_>>();
    let bookings = &f.services.bookings;

    assert_eq!(ids(bookings.list_by_owner(f.owner.id, "WAITING", 0, 10).await.unwrap()), vec![waiting.id]);
    assert_eq!(ids(bookings.list_by_owner(f.owner.id, "APPROVED", 0, 10).await.unwrap()), vec![approved.id]);
    assert_eq!(ids(bookings.list_by_booker(f.booker.id, "REJECTED", 0, 10).await.unwrap()), vec![rejected.id]);
    assert_eq!(
        ids(bookings.list_by_booker(f.booker.id, "ALL", 0, 10).await.unwrap()),
        vec![rejected.id, approved.id, waiting.id]
    );

    let canceled = bookings.list_by_booker(f.booker.id, "CANCELED", 0, 10).await;
    assert!(matches!(canceled, Err(AppError::Validation(msg)) if msg.contains("CANCELED")));
}

#[tokio::test]
async fn test_page_rounds_down() {
    let f = fixture().await;
    let t = Utc::now();
    let mut created = Vec::new();
    for day in 1..=5 {
        created.push(book(&f, t + Duration::days(day), t + Duration::days(day) + Duration::hours(1)).await.unwrap());
    }

    // from=3 with size=2 lands on page 1, rows 2..4 of the descending order
    let page = f.services.bookings.list_by_booker(f.booker.id, "ALL", 3, 2).await.unwrap();
    assert_eq!(page.iter().map(|b| b.id).collect::<Vec<_>>(), vec![created[2].id, created[1].id]);

    let bad_size = f.services.bookings.list_by_booker(f.booker.id, "ALL", 0, 0).await;
    assert!(matches!(bad_size, Err(AppError::Validation(_))));
    let bad_from = f.services.bookings.list_by_booker(f.booker.id, "ALL", -1, 10).await;
    assert!(matches!(bad_from, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_concurrent_approvals_have_one_winner() {
    let f = fixture().await;
    let t = Utc::now();
    let booking = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();

    let first = f.services.bookings.clone();
    let second = f.services.bookings.clone();
    let (owner_id, booking_id) = (f.owner.id, booking.id);

    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.set_approval(booking_id, owner_id, true).await }),
        tokio::spawn(async move { second.set_approval(booking_id, owner_id, false).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    let winners: Vec<&Booking> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(AppError::Conflict(_)))));

    let stored = f.services.bookings.get_booking(booking_id, owner_id).await.unwrap();
    assert_eq!(stored.status, winners[0].status);
}

#[tokio::test]
async fn test_owner_items_show_last_and_next() {
    let f = fixture().await;
    let t = Utc::now();
    let past = book(&f, t - Duration::days(3), t - Duration::days(2)).await.unwrap();
    let older = book(&f, t - Duration::days(6), t - Duration::days(5)).await.unwrap();
    let next = book(&f, t + Duration::days(1), t + Duration::days(2)).await.unwrap();
    book(&f, t + Duration::days(4), t + Duration::days(5)).await.unwrap();
    f.services.bookings.set_approval(older.id, f.owner.id, true).await.unwrap();

    let items = f.services.items.list_by_owner(f.owner.id).await.unwrap();
    assert_eq!(items.len(), 1);

    let details = &items[0];
    assert_eq!(details.id, f.item.id);
    assert_eq!(details.last_booking.as_ref().map(|b| b.id), Some(past.id));
    // still WAITING, shown anyway
    assert_eq!(details.next_booking.as_ref().map(|b| b.id), Some(next.id));
    assert_eq!(details.next_booking.as_ref().map(|b| b.booker_id), Some(f.booker.id));

    let booker_items = f.services.items.list_by_owner(f.booker.id).await.unwrap();
    assert!(booker_items.is_empty());
}

#[tokio::test]
async fn test_item_update_requires_owner() {
    let f = fixture().await;
    let result = f
        .services
        .items
        .update_item(
            f.item.id,
            f.booker.id,
            UpdateItem { name: Some("Hammer".to_string()), ..UpdateItem::default() },
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let updated = f
        .services
        .items
        .update_item(
            f.item.id,
            f.owner.id,
            UpdateItem { name: Some("Hammer".to_string()), ..UpdateItem::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Hammer");
    assert_eq!(updated.description, "Cordless drill");
    assert!(updated.available);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let f = fixture().await;
    let result = f
        .services
        .users
        .create_user(CreateUser {
            name: "Again".to_string(),
            email: f.owner.email.to_uppercase(),
        })
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_comment_needs_finished_rental() {
    let f = fixture().await;
    let t = Utc::now();
    let comment = |text: &str| CreateComment { text: text.to_string() };

    // A running booking is not enough
    book(&f, t - Duration::hours(1), t + Duration::hours(1)).await.unwrap();
    let early = f.services.items.add_comment(f.item.id, f.booker.id, comment("Nice")).await;
    assert!(matches!(early, Err(AppError::Validation(msg)) if msg.contains("rented")));

    let owner = f.services.items.add_comment(f.item.id, f.owner.id, comment("Mine")).await;
    assert!(matches!(owner, Err(AppError::Validation(_))));

    book(&f, t - Duration::days(3), t - Duration::days(2)).await.unwrap();
    let first = assert_ok!(f.services.items.add_comment(f.item.id, f.booker.id, comment("Works well")).await);
    assert_eq!(first.author_name, "Booker");
    let second = assert_ok!(f.services.items.add_comment(f.item.id, f.booker.id, comment("Still fine")).await);

    let details = f.services.items.get_item_details(f.item.id).await.unwrap();
    assert_eq!(details.comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    assert!(details.last_booking.is_none());

    let listed = f.services.items.list_by_owner(f.owner.id).await.unwrap();
    assert_eq!(listed[0].comments.len(), 2);
    assert!(listed[0].last_booking.is_some());

    assert_err!(f.services.items.add_comment(999, f.booker.id, comment("Ghost")).await);
}

#[tokio::test]
async fn test_search_finds_available_items_only() {
    let f = fixture().await;
    let saw = f
        .services
        .items
        .create_item(
            f.owner.id,
            CreateItem {
                name: "Saw".to_string(),
                description: "Hand saw, fits a drill case".to_string(),
                available: false,
                request_id: None,
            },
        )
        .await
        .unwrap();

    let found = f.services.items.search("dRiLL").await.unwrap();
    assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![f.item.id]);
    assert!(!found.iter().any(|i| i.id == saw.id));

    assert!(f.services.items.search("cordless").await.unwrap().len() == 1);
    assert!(f.services.items.search("").await.unwrap().is_empty());
    assert!(f.services.items.search("hammer").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_update_list_and_delete() {
    let f = fixture().await;

    let renamed = f
        .services
        .users
        .update_user(f.booker.id, UpdateUser { name: Some("Renter".to_string()), email: None })
        .await
        .unwrap();
    assert_eq!(renamed.name, "Renter");
    assert_eq!(renamed.email, f.booker.email);

    let taken = f
        .services
        .users
        .update_user(f.booker.id, UpdateUser { name: None, email: Some(f.owner.email.to_uppercase()) })
        .await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));

    // Changing only the case of one's own email is allowed
    assert_ok!(
        f.services
            .users
            .update_user(f.owner.id, UpdateUser { name: None, email: Some(f.owner.email.to_uppercase()) })
            .await
    );

    let missing = f.services.users.update_user(999, UpdateUser::default()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let all = f.services.users.list_users().await.unwrap();
    assert_eq!(all.iter().map(|u| u.id).collect::<Vec<_>>(), vec![f.owner.id, f.booker.id]);

    // The owner still has an item
    assert!(matches!(f.services.users.delete_user(f.owner.id).await, Err(AppError::Conflict(_))));

    let idle = user(&f.services, "Idle").await;
    assert_ok!(f.services.users.delete_user(idle.id).await);
    assert_ok!(f.services.users.delete_user(idle.id).await);
    assert!(matches!(f.services.users.get_user(idle.id).await, Err(AppError::NotFound(_))));
}
