diesel::table! {
    availability_slots (id) {
        id -> Int8,
        resource_id -> Int8,
        slot_date -> Date,
        slot_time -> Time,
        max_capacity -> Int4,
        current_bookings -> Int4,
    }
}

diesel::table! {
    bookings (id) {
        id -> Int8,
        resource_id -> Int8,
        user_id -> Uuid,
        contact_email -> Text,
        booking_date -> Date,
        start_time -> Time,
        duration_minutes -> Int4,
        party_size -> Int4,
        total_price_minor -> Int8,
        currency -> Text,
        status -> Text,
        payment_status -> Text,
        special_requests -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    payment_intents (id) {
        id -> Text,
        booking_id -> Int8,
        gateway -> Text,
        amount_minor -> Int8,
        currency -> Text,
        status -> Text,
        metadata -> Jsonb,
        client_secret -> Nullable<Text>,
        receipt_url -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(payment_intents -> bookings (booking_id));

diesel::allow_tables_to_appear_in_same_query!(availability_slots, bookings, payment_intents);
