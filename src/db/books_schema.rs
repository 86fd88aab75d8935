diesel::table! {
    books (id) {
        id -> Integer,
        identifier -> Text,
        title -> Text,
        description -> Nullable<Text>,
        version -> Text,
        created_at -> Timestamp,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    book_aliases (id) {
        id -> Integer,
        book_id -> Integer,
        scheme -> Text,
        value -> Text,
    }
}

diesel::joinable!(book_aliases -> books (book_id));

diesel::allow_tables_to_appear_in_same_query!(books, book_aliases);
