use std::time::Duration;

use chrono::Utc;
use docstore::Db;
use dotenv::dotenv;
use frontdesk::{booking::BookingError, Frontdesk};
use log::info;
use model::{
    class::GymClass,
    profile::{Role, UserProfile},
};
use storage::Storage;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load .env before the logger so RUST_LOG from the file takes effect,
    // but report the failure once the logger exists.
    let env_file = dotenv();
    pretty_env_logger::init();
    color_eyre::install()?;
    if let Err(err) = env_file {
        info!("Failed to load .env file: {}", err);
    }

    info!("opening the store");
    let db = Db::new();
    let storage = Storage::new(&db);
    let desk = Frontdesk::new(storage.clone());

    info!("seeding the gym");
    let dana = UserProfile::new("Dana".to_string(), Role::Trainer);
    let ada = UserProfile::new("Ada".to_string(), Role::Member);
    let ben = UserProfile::new("Ben".to_string(), Role::Member);
    let cleo = UserProfile::new("Cleo".to_string(), Role::Member);
    let mut session = db.session(dana.id);
    for profile in [&dana, &ada, &ben, &cleo] {
        storage.profiles.insert(&mut session, profile).await?;
    }

    let spin = GymClass::new(
        "Spin".to_string(),
        dana.id,
        dana.name.clone(),
        Utc::now() - chrono::Duration::hours(2),
        60,
        2,
    );
    let yoga = GymClass::new(
        "Yoga".to_string(),
        dana.id,
        dana.name.clone(),
        Utc::now() + chrono::Duration::hours(24),
        45,
        10,
    );
    desk.classes.add_class(&mut session, &spin).await?;
    desk.classes.add_class(&mut session, &yoga).await?;

    let schedule = desk.schedule_view(ada.id);
    let dashboard = desk.trainer_dashboard(dana.id);

    info!("two seats in spin, three members at the door");
    session.set_actor(ada.id);
    desk.bookings.book_class(&mut session, spin.id, ada.id).await?;
    session.set_actor(ben.id);
    desk.bookings.book_class(&mut session, spin.id, ben.id).await?;
    session.set_actor(cleo.id);
    match desk.bookings.book_class(&mut session, spin.id, cleo.id).await {
        Err(BookingError::CapacityExceeded) => info!("spin is full, Cleo waits"),
        other => other?,
    }

    session.set_actor(ada.id);
    desk.bookings.cancel_booking(&mut session, spin.id, ada.id).await?;
    session.set_actor(cleo.id);
    desk.bookings.book_class(&mut session, spin.id, cleo.id).await?;
    info!("Ada stepped back, Cleo got the seat");

    session.set_actor(ada.id);
    desk.bookings.book_class(&mut session, yoga.id, ada.id).await?;

    info!("class over: check-ins and ratings");
    session.set_actor(ben.id);
    desk.bookings.check_in(&mut session, spin.id, ben.id, true).await?;
    desk.ratings
        .submit_rating(&mut session, spin.id, ben.id, 5, "great pace")
        .await?;
    session.set_actor(cleo.id);
    desk.bookings.check_in(&mut session, spin.id, cleo.id, true).await?;
    desk.ratings
        .submit_rating(&mut session, spin.id, cleo.id, 4, "solid")
        .await?;

    // Let the live views catch up with the feeds.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = schedule.state().borrow().clone();
    info!(
        "Ada's schedule: {} classes listed, {} booked",
        state.filtered_classes.len(),
        state.my_bookings.len()
    );

    let state = dashboard.state().borrow().clone();
    info!(
        "Dana's dashboard: {} members, attendance {:.0}%, {} classes this month",
        state.stats.total_members,
        state.stats.avg_attendance,
        state.stats.classes_this_month
    );
    let trainer = storage
        .profiles
        .get(&mut session, dana.id)
        .await?
        .ok_or_else(|| eyre::eyre!("trainer profile vanished"))?;
    info!(
        "Dana's rating: {:.1} over {} votes",
        trainer.average_rating, trainer.rating_count
    );

    let teaching = storage.classes.find_by_trainer(&mut session, dana.id).await?;
    let seats = storage.bookings.find_by_user(&mut session, ada.id).await?;
    info!(
        "Dana teaches {} classes, Ada holds {} booking(s)",
        teaching.len(),
        seats.len()
    );

    let recent = desk.history.get_actor_logs(&mut session, ada.id, 5, 0).await?;
    for row in &recent {
        info!("Ada's trail: {:?}", row.action);
    }
    let rows = desk.history.dump(&mut session).await?;
    info!("{} history rows written", rows.len());

    schedule.cancel();
    dashboard.cancel();
    db.close();
    Ok(())
}
