//! Event fan-out: one appointment event becomes one notification row per
//! interested party, plus best-effort mail to administrators. Every
//! recipient is delivered independently; a failed insert or mail for one
//! recipient never blocks the others and never propagates to the caller.

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;

use crate::{
    models::{
        notifications::{NewNotification, KIND_APPOINTMENT, PRIORITY_HIGH, PRIORITY_NORMAL},
        users::Role,
    },
    utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Created,
    Updated,
    Cancelled,
}

/// The appointment fields the notification copy is built from.
pub struct AppointmentView {
    pub id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: u64,
    pub name: String,
    pub role: Role,
    pub email: String,
}

/// Persistence seam for notification rows. The production impl wraps a
/// pooled Diesel connection; tests substitute recording fakes.
pub trait NotificationStore {
    fn insert(&self, row: NewNotification) -> anyhow::Result<()>;
}

pub struct DieselNotificationStore<'a> {
    pub conn: &'a MysqlConnection,
}

impl NotificationStore for DieselNotificationStore<'_> {
    fn insert(&self, row: NewNotification) -> anyhow::Result<()> {
        use crate::schema::notifications;
        use anyhow::Context;

        diesel::insert_into(notifications::table)
            .values(row)
            .execute(self.conn)
            .context("notification insert")?;
        Ok(())
    }
}

/// Outbound mail seam. The production impl dispatches on a detached thread
/// and always reports success; the Result is here so tests can exercise
/// transport failure.
pub trait MailSender {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Aggregate outcome of one fan-out, for logging. The triggering operation
/// succeeds regardless of what these counters say.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeliveryStats {
    pub notifications: usize,
    pub failures: usize,
    pub mails_sent: usize,
    pub mails_failed: usize,
}

fn self_copy(event: AppointmentEvent, view: &AppointmentView) -> (String, String) {
    let date = utils::format_date_str(&view.date);
    let time = utils::format_time_str(&view.time);
    match event {
        AppointmentEvent::Created => (
            "Appointment scheduled".to_string(),
            format!(
                "Your appointment on {} at {} has been scheduled. You will be notified once it is confirmed.",
                date, time
            ),
        ),
        AppointmentEvent::Updated => (
            "Appointment updated".to_string(),
            format!(
                "Your appointment on {} at {} was updated. Current status: {}.",
                date, time, view.status
            ),
        ),
        AppointmentEvent::Cancelled => (
            "Appointment cancelled".to_string(),
            format!("Your appointment on {} at {} has been cancelled.", date, time),
        ),
    }
}

fn admin_copy(view: &AppointmentView, owner: &Recipient) -> (String, String) {
    (
        "New appointment request".to_string(),
        format!(
            "{} ({}) booked an appointment on {} at {}: {}",
            owner.name,
            owner.role,
            utils::format_date_str(&view.date),
            utils::format_time_str(&view.time),
            view.purpose
        ),
    )
}

/// Delivers one event. The requester always gets a self-notification; on
/// `Created` every active administrator additionally gets a notification
/// row and, when an address is on file, a best-effort email.
pub fn fan_out(
    event: AppointmentEvent,
    view: &AppointmentView,
    owner: &Recipient,
    actor_id: u64,
    admins: &[Recipient],
    store: &dyn NotificationStore,
    mail: &dyn MailSender,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    let (title, message) = self_copy(event, view);
    let row = NewNotification {
        recipient_id: owner.user_id,
        sender_id: Some(actor_id),
        kind: KIND_APPOINTMENT.to_string(),
        title,
        message,
        appointment_id: Some(view.id),
        is_read: false,
        priority: PRIORITY_NORMAL.to_string(),
    };
    match store.insert(row) {
        Ok(()) => stats.notifications += 1,
        Err(err) => {
            stats.failures += 1;
            log::warn!(
                "self-notification for appointment {} to user {} failed: {:#}",
                view.id,
                owner.user_id,
                err
            );
        }
    }

    if event != AppointmentEvent::Created {
        return stats;
    }

    let (title, message) = admin_copy(view, owner);
    for admin in admins {
        let row = NewNotification {
            recipient_id: admin.user_id,
            sender_id: Some(owner.user_id),
            kind: KIND_APPOINTMENT.to_string(),
            title: title.clone(),
            message: message.clone(),
            appointment_id: Some(view.id),
            is_read: false,
            priority: PRIORITY_HIGH.to_string(),
        };
        match store.insert(row) {
            Ok(()) => stats.notifications += 1,
            Err(err) => {
                stats.failures += 1;
                log::warn!(
                    "admin notification for appointment {} to user {} failed: {:#}",
                    view.id,
                    admin.user_id,
                    err
                );
            }
        }

        if admin.email.is_empty() {
            continue;
        }
        match mail.send(&admin.email, &title, &message) {
            Ok(()) => stats.mails_sent += 1,
            Err(err) => {
                stats.mails_failed += 1;
                log::warn!(
                    "mail for appointment {} to {} failed: {:#}",
                    view.id,
                    admin.email,
                    err
                );
            }
        }
    }

    stats
}

/// Resolves the recipients from the database and runs the fan-out. Lookup
/// failures degrade to a no-op with a warning; by this point the triggering
/// write has committed and must not be disturbed.
pub fn deliver(
    conn: &MysqlConnection,
    mail: &dyn MailSender,
    event: AppointmentEvent,
    view: &AppointmentView,
    owner_id: u64,
    actor_id: u64,
) -> DeliveryStats {
    let owner = match load_recipient(conn, owner_id) {
        Ok(Some(owner)) => owner,
        Ok(None) => {
            log::warn!(
                "skipping fan-out for appointment {}: owner {} not found",
                view.id,
                owner_id
            );
            return DeliveryStats::default();
        }
        Err(err) => {
            log::warn!("skipping fan-out for appointment {}: {}", view.id, err);
            return DeliveryStats::default();
        }
    };

    let admins = if event == AppointmentEvent::Created {
        match load_active_admins(conn) {
            Ok(admins) => admins,
            Err(err) => {
                log::warn!(
                    "could not enumerate administrators for appointment {}: {}",
                    view.id,
                    err
                );
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let store = DieselNotificationStore { conn };
    fan_out(event, view, &owner, actor_id, &admins, &store, mail)
}

fn load_recipient(conn: &MysqlConnection, id: u64) -> QueryResult<Option<Recipient>> {
    use crate::models::users::UserData;
    use crate::schema::users;

    let user = users::table.find(id).first::<UserData>(conn).optional()?;
    Ok(user.and_then(|user| {
        let role = Role::parse(&user.role)?;
        Some(Recipient {
            user_id: user.id,
            name: user.name,
            role,
            email: user.email,
        })
    }))
}

fn load_active_admins(conn: &MysqlConnection) -> QueryResult<Vec<Recipient>> {
    use crate::models::users::UserData;
    use crate::schema::users;

    let rows = users::table
        .filter(users::role.eq(Role::Admin.as_str()))
        .filter(users::is_active.eq(true))
        .load::<UserData>(conn)?;
    Ok(rows
        .into_iter()
        .map(|user| Recipient {
            user_id: user.id,
            name: user.name,
            role: Role::Admin,
            email: user.email,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::cell::RefCell;

    struct RecordingStore {
        rows: RefCell<Vec<NewNotification>>,
        fail_for: Option<u64>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                rows: RefCell::new(Vec::new()),
                fail_for: None,
            }
        }

        fn failing_for(recipient_id: u64) -> Self {
            Self {
                rows: RefCell::new(Vec::new()),
                fail_for: Some(recipient_id),
            }
        }

        fn recipient_ids(&self) -> Vec<u64> {
            self.rows.borrow().iter().map(|r| r.recipient_id).collect()
        }
    }

    impl NotificationStore for RecordingStore {
        fn insert(&self, row: NewNotification) -> anyhow::Result<()> {
            if self.fail_for == Some(row.recipient_id) {
                anyhow::bail!("insert refused for recipient {}", row.recipient_id);
            }
            self.rows.borrow_mut().push(row);
            Ok(())
        }
    }

    struct RecordingMail {
        sent: RefCell<Vec<String>>,
        fail_for: Option<String>,
    }

    impl RecordingMail {
        fn new() -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                fail_for: None,
            }
        }

        fn failing_for(address: &str) -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                fail_for: Some(address.to_string()),
            }
        }
    }

    impl MailSender for RecordingMail {
        fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(to) {
                anyhow::bail!("smtp refused {}", to);
            }
            self.sent.borrow_mut().push(to.to_string());
            Ok(())
        }
    }

    fn view() -> AppointmentView {
        AppointmentView {
            id: 7,
            date: NaiveDate::from_ymd(2024, 6, 10),
            time: NaiveTime::from_hms(9, 0, 0),
            purpose: "annual check-up".to_string(),
            status: "scheduled".to_string(),
        }
    }

    fn owner() -> Recipient {
        Recipient {
            user_id: 1,
            name: "Dana Lee".to_string(),
            role: Role::Student,
            email: "dana@example.edu".to_string(),
        }
    }

    fn admin(id: u64, email: &str) -> Recipient {
        Recipient {
            user_id: id,
            name: format!("Admin {}", id),
            role: Role::Admin,
            email: email.to_string(),
        }
    }

    #[test]
    fn created_event_reaches_requester_and_every_admin() {
        let store = RecordingStore::new();
        let mail = RecordingMail::new();
        let admins = vec![
            admin(10, "a@clinic.edu"),
            admin(11, "b@clinic.edu"),
            admin(12, "c@clinic.edu"),
        ];

        let stats = fan_out(
            AppointmentEvent::Created,
            &view(),
            &owner(),
            1,
            &admins,
            &store,
            &mail,
        );

        assert_eq!(stats.notifications, 1 + admins.len());
        assert_eq!(stats.failures, 0);
        assert_eq!(store.recipient_ids(), vec![1, 10, 11, 12]);
        assert_eq!(stats.mails_sent, 3);
    }

    #[test]
    fn updated_and_cancelled_events_notify_requester_only() {
        for event in [AppointmentEvent::Updated, AppointmentEvent::Cancelled].iter() {
            let store = RecordingStore::new();
            let mail = RecordingMail::new();
            let admins = vec![admin(10, "a@clinic.edu")];

            let stats = fan_out(*event, &view(), &owner(), 99, &admins, &store, &mail);

            assert_eq!(stats.notifications, 1);
            assert_eq!(store.recipient_ids(), vec![1]);
            assert_eq!(stats.mails_sent, 0);
        }
    }

    #[test]
    fn mail_failure_does_not_block_other_recipients() {
        let store = RecordingStore::new();
        let mail = RecordingMail::failing_for("b@clinic.edu");
        let admins = vec![
            admin(10, "a@clinic.edu"),
            admin(11, "b@clinic.edu"),
            admin(12, "c@clinic.edu"),
        ];

        let stats = fan_out(
            AppointmentEvent::Created,
            &view(),
            &owner(),
            1,
            &admins,
            &store,
            &mail,
        );

        assert_eq!(stats.notifications, 4);
        assert_eq!(stats.mails_failed, 1);
        assert_eq!(stats.mails_sent, 2);
        assert_eq!(
            *mail.sent.borrow(),
            vec!["a@clinic.edu".to_string(), "c@clinic.edu".to_string()]
        );
    }

    #[test]
    fn store_failure_is_isolated_per_recipient() {
        let store = RecordingStore::failing_for(11);
        let mail = RecordingMail::new();
        let admins = vec![
            admin(10, "a@clinic.edu"),
            admin(11, "b@clinic.edu"),
            admin(12, "c@clinic.edu"),
        ];

        let stats = fan_out(
            AppointmentEvent::Created,
            &view(),
            &owner(),
            1,
            &admins,
            &store,
            &mail,
        );

        assert_eq!(stats.notifications, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(store.recipient_ids(), vec![1, 10, 12]);
        // Mail is still attempted for the recipient whose insert failed.
        assert_eq!(stats.mails_sent, 3);
    }

    #[test]
    fn admin_without_email_gets_a_row_but_no_mail() {
        let store = RecordingStore::new();
        let mail = RecordingMail::new();
        let admins = vec![admin(10, ""), admin(11, "b@clinic.edu")];

        let stats = fan_out(
            AppointmentEvent::Created,
            &view(),
            &owner(),
            1,
            &admins,
            &store,
            &mail,
        );

        assert_eq!(stats.notifications, 3);
        assert_eq!(stats.mails_sent, 1);
        assert_eq!(*mail.sent.borrow(), vec!["b@clinic.edu".to_string()]);
    }

    #[test]
    fn admin_copy_names_requester_role_and_purpose() {
        let (_, message) = admin_copy(&view(), &owner());
        assert!(message.contains("Dana Lee"));
        assert!(message.contains("student"));
        assert!(message.contains("2024-06-10"));
        assert!(message.contains("09:00"));
        assert!(message.contains("annual check-up"));
    }
}
