diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        title -> Text,
        message -> Text,
        #[sql_name = "type"]
        type_ -> Text,
        action_url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pieces (id) {
        id -> Uuid,
        title -> Text,
        amount_raised -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    profiles (id) {
        id -> Uuid,
        total_donated_amount -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    stripe_customers (customer_id) {
        customer_id -> Text,
        user_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    stripe_orders (checkout_session_id) {
        checkout_session_id -> Text,
        payment_intent_id -> Nullable<Text>,
        customer_id -> Text,
        amount_subtotal -> Nullable<Int8>,
        amount_total -> Nullable<Int8>,
        currency -> Nullable<Text>,
        payment_status -> Text,
        status -> Text,
        piece_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    stripe_subscriptions (customer_id) {
        customer_id -> Text,
        subscription_id -> Nullable<Text>,
        price_id -> Nullable<Text>,
        current_period_start -> Nullable<Int8>,
        current_period_end -> Nullable<Int8>,
        cancel_at_period_end -> Nullable<Bool>,
        payment_method_brand -> Nullable<Text>,
        payment_method_last4 -> Nullable<Text>,
        status -> Text,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    notifications,
    pieces,
    profiles,
    stripe_customers,
    stripe_orders,
    stripe_subscriptions,
);
