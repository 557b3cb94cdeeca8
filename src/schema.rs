table! {
    appointments (id) {
        id -> Unsigned<Bigint>,
        user_id -> Unsigned<Bigint>,
        date -> Date,
        time -> Time,
        purpose -> Varchar,
        duration -> Integer,
        status -> Varchar,
        notes -> Nullable<Varchar>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

table! {
    audit_logs (id) {
        id -> Unsigned<Bigint>,
        user_id -> Unsigned<Bigint>,
        user_role -> Varchar,
        action -> Varchar,
        entity_type -> Varchar,
        entity_id -> Nullable<Unsigned<Bigint>>,
        description -> Varchar,
        ip_address -> Nullable<Varchar>,
        metadata -> Nullable<Text>,
        created_at -> Datetime,
    }
}

table! {
    day_slots (date) {
        date -> Date,
        booked -> Integer,
    }
}

table! {
    notifications (id) {
        id -> Unsigned<Bigint>,
        recipient_id -> Unsigned<Bigint>,
        sender_id -> Nullable<Unsigned<Bigint>>,
        kind -> Varchar,
        title -> Varchar,
        message -> Varchar,
        appointment_id -> Nullable<Unsigned<Bigint>>,
        is_read -> Bool,
        priority -> Varchar,
        created_at -> Datetime,
    }
}

table! {
    sessions (token) {
        token -> Char,
        user_id -> Unsigned<Bigint>,
        login_time -> Datetime,
    }
}

table! {
    users (id) {
        id -> Unsigned<Bigint>,
        username -> Varchar,
        password -> Char,
        name -> Varchar,
        email -> Varchar,
        role -> Varchar,
        is_active -> Bool,
    }
}

allow_tables_to_appear_in_same_query!(
    appointments,
    audit_logs,
    day_slots,
    notifications,
    sessions,
    users,
);
