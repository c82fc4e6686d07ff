// Declaraciones Diesel escritas a mano (espejo de migrations/).

diesel::table! {
    staging.external_users (id) {
        id -> Int8,
        raw -> Jsonb,
        synced_at -> Timestamptz,
    }
}

diesel::table! {
    staging.external_contracts (id) {
        id -> Int8,
        raw -> Jsonb,
        synced_at -> Timestamptz,
    }
}

diesel::table! {
    core.clients_versions (id) {
        id -> Int8,
        client_id -> Int8,
        version -> Int4,
        surname -> Text,
        name -> Text,
        patronymic -> Text,
        birthday -> Text,
        birth_place -> Text,
        contact_email -> Text,
        inn -> Text,
        snils -> Text,
        pass_series -> Text,
        pass_number -> Text,
        pass_issue_date -> Text,
        pass_issuer -> Text,
        pass_issuer_code -> Text,
        main_phone -> Text,
        created_lk_at -> Text,
        updated_lk_at -> Text,
        country -> Text,
        region -> Text,
        city -> Text,
        street -> Text,
        house -> Text,
        district -> Text,
        raw -> Jsonb,
        trigger_hash -> Text,
        hash -> Text,
        status -> Text,
        external_risk_level -> Text,
        needs_second_part -> Bool,
        second_part_created -> Bool,
        synced_at -> Timestamptz,
        valid_from -> Timestamptz,
        valid_to -> Nullable<Timestamptz>,
        is_current -> Bool,
    }
}

diesel::table! {
    core.second_part_versions (id) {
        id -> Int8,
        client_id -> Int8,
        client_version -> Int4,
        version -> Int4,
        is_current -> Bool,
        valid_from -> Timestamptz,
        valid_to -> Nullable<Timestamptz>,
        status -> Text,
        data -> Jsonb,
        risk_level -> Text,
        due_at -> Nullable<Timestamptz>,
        created_by -> Nullable<Int8>,
        updated_by -> Nullable<Int8>,
        approved_by -> Nullable<Int8>,
        reason -> Text,
    }
}

diesel::table! {
    core.second_part_checks (id) {
        id -> Int8,
        client_id -> Int8,
        second_part_version -> Int4,
        kind -> Text,
        status -> Text,
        payload -> Jsonb,
        result -> Nullable<Jsonb>,
        run_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
        run_by -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    core.contracts (id) {
        id -> Int8,
        external_id -> Int8,
        user_id -> Nullable<Int8>,
        status -> Text,
        kind -> Text,
        inner_code -> Text,
        raw -> Jsonb,
        hash -> Text,
        synced_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(clients_versions, second_part_versions);
