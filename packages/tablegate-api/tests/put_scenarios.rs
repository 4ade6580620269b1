//! End-to-end PUT scenarios against the seeded bookstore catalog.

mod common;

use common::{text, Fixture};
use ntest::timeout;
use serde_json::json;
use tablegate_core::policy::ROLE_CLAIM;
use tablegate_core::response::PRECONDITION_FAILED_MESSAGE;
use tablegate_core::schema::ColumnType;
use tablegate_core::upsert::CancellationFlag;
use tablegate_core::value::Value;
use tablegate_core::PutRequest;
use tablegate_store::{StoreColumn, StoreTable};

#[timeout(2000)]
#[test]
fn update_existing_row_returns_200_with_row() {
    let fx = Fixture::new();
    let response = fx.put("Book", "id/1", r#"{"title":"The Hobbit Returns","publisher_id":2345}"#);

    assert_eq!(response.status, 200);
    assert_eq!(
        response.data(),
        Some(&json!({"id": 1, "title": "The Hobbit Returns", "publisher_id": 2345}))
    );
    assert!(response.header("Location").is_none());

    let row = fx.row("books", &[1]).unwrap();
    assert_eq!(row["title"], text("The Hobbit Returns"));
    assert_eq!(row["publisher_id"], Value::Int(2345));
}

#[timeout(2000)]
#[test]
fn entity_resolves_by_name_and_rest_path() {
    let fx = Fixture::new();
    let by_path = fx.put("Book", "id/2", r#"{"title":"A","publisher_id":1234}"#);
    let by_name = fx.put("books", "id/2", r#"{"title":"B","publisher_id":1234}"#);
    assert_eq!(by_path.status, 200);
    assert_eq!(by_name.status, 200);
    assert_eq!(fx.row("books", &[2]).unwrap()["title"], text("B"));
}

#[timeout(2000)]
#[test]
fn body_value_that_does_not_cast_is_rejected() {
    let fx = Fixture::new();
    let response = fx.put(
        "Book",
        "id/1",
        r#"{"title":"x","publisher_id":"StringFailsToCastToInt"}"#,
    );

    assert_eq!(response.status, 400);
    assert_eq!(response.error_code(), Some("BadRequest"));
    assert_eq!(
        response.error_message(),
        Some("Parameter \"StringFailsToCastToInt\" cannot be resolved as column \"publisher_id\" with type \"Int32\".")
    );
    assert_eq!(fx.row("books", &[1]).unwrap()["title"], text("Awesome book"));
}

#[timeout(2000)]
#[test]
fn route_value_that_does_not_cast_is_rejected() {
    let fx = Fixture::new();
    let response = fx.put(
        "Book",
        "id/StringFailsToCastToInt",
        r#"{"title":"x","publisher_id":1234}"#,
    );

    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message(),
        Some("Parameter \"StringFailsToCastToInt\" cannot be resolved as column \"id\" with type \"Int32\".")
    );
}

#[timeout(2000)]
#[test]
fn route_errors() {
    let fx = Fixture::new();
    let body = r#"{"content":"x"}"#;

    let missing = fx.put("Review", "", body);
    assert_eq!(missing.status, 400);
    assert_eq!(
        missing.error_message(),
        Some("Primary Key for UPSERT requests is required.")
    );

    for path in ["book_id/1", "book_id/1/content/2", "book_id/1/book_id/2", "book_id/1/id"] {
        let response = fx.put("Review", path, body);
        assert_eq!(response.status, 400, "path {}", path);
        assert_eq!(
            response.error_message(),
            Some("Primary key column(s) provided do not match DB schema."),
            "path {}",
            path
        );
    }
}

#[timeout(2000)]
#[test]
fn missing_required_field_is_rejected() {
    let fx = Fixture::new();
    let response = fx.put("Book", "id/1", r#"{"title":"Only a title"}"#);
    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message(),
        Some("Invalid request body. Missing field in body: publisher_id.")
    );
}

#[timeout(2000)]
#[test]
fn unknown_and_null_fields_are_rejected() {
    let fx = Fixture::new();

    let unknown = fx.put("Book", "id/1", r#"{"title":"x","publisher_id":1,"isbn":"123"}"#);
    assert_eq!(unknown.status, 400);
    assert_eq!(
        unknown.error_message(),
        Some("Invalid request body. Contained unexpected fields in body: isbn")
    );

    let null = fx.put("Book", "id/1", r#"{"title":null,"publisher_id":1}"#);
    assert_eq!(null.status, 400);
    assert_eq!(
        null.error_message(),
        Some("Invalid value for field title in request body.")
    );
}

#[timeout(2000)]
#[test]
fn body_must_be_a_json_object() {
    let fx = Fixture::new();
    for body in ["[1,2]", "not json", ""] {
        let response = fx.put("Magazine", "id/1", body);
        assert_eq!(response.status, 400, "body {:?}", body);
        assert_eq!(response.error_code(), Some("BadRequest"));
    }
}

#[timeout(2000)]
#[test]
fn insert_then_update_is_idempotent() {
    let fx = Fixture::new();
    let body = r#"{"title":"Forbes","issue_number":7}"#;

    let first = fx.put("Magazine", "id/2000", body);
    assert_eq!(first.status, 201);
    assert_eq!(first.header("Location"), Some("id/2000"));
    assert_eq!(
        first.data(),
        Some(&json!({"id": 2000, "title": "Forbes", "issue_number": 7}))
    );

    let second = fx.put("Magazine", "id/2000", body);
    assert_eq!(second.status, 200);
    assert_eq!(second.data(), first.data());
    assert_eq!(fx.store.row_count("magazines"), 2);
}

#[timeout(2000)]
#[test]
fn absent_nullable_field_is_set_to_null() {
    let fx = Fixture::new();
    let response = fx.put("Magazine", "id/1", r#"{"title":"Vogue Paris"}"#);
    assert_eq!(response.status, 200);
    assert_eq!(
        response.data(),
        Some(&json!({"id": 1, "title": "Vogue Paris", "issue_number": null}))
    );
    assert_eq!(fx.row("magazines", &[1]).unwrap()["issue_number"], Value::Null);
}

#[timeout(2000)]
#[test]
fn generated_key_miss_is_not_found_and_inserts_nothing() {
    let fx = Fixture::new();
    let response = fx.put("Book", "id/1000", r#"{"title":"Ghost","publisher_id":1234}"#);

    assert_eq!(response.status, 404);
    assert_eq!(response.error_code(), Some("EntityNotFound"));
    assert_eq!(
        response.error_message(),
        Some("Cannot perform INSERT and could not find books with primary key <id: 1000> to perform UPDATE on.")
    );
    assert_eq!(fx.store.row_count("books"), 2);
}

#[timeout(2000)]
#[test]
fn composite_key_is_order_independent() {
    let fx = Fixture::new();
    let forward = fx.put("Review", "book_id/1/id/567", r#"{"content":"Updated"}"#);
    let reversed = fx.put("Review", "id/567/book_id/1", r#"{"content":"Updated again"}"#);

    assert_eq!(forward.status, 200);
    assert_eq!(reversed.status, 200);
    assert_eq!(fx.row("reviews", &[1, 567]).unwrap()["content"], text("Updated again"));
    assert_eq!(fx.store.row_count("reviews"), 2);
}

#[timeout(2000)]
#[test]
fn partly_generated_composite_key_miss_is_not_found() {
    let fx = Fixture::new();
    let response = fx.put("Review", "id/5002/book_id/1", r#"{"content":"Great book to read"}"#);

    assert_eq!(response.status, 404);
    assert_eq!(response.error_code(), Some("EntityNotFound"));
    assert_eq!(
        response.error_message(),
        Some("Cannot perform INSERT and could not find reviews with primary key <book_id: 1, id: 5002> to perform UPDATE on.")
    );
    assert_eq!(fx.store.row_count("reviews"), 2);
}

#[timeout(2000)]
#[test]
fn composite_key_insert_reports_location_in_key_order() {
    let fx = Fixture::new();
    let response = fx.put("Stock", "pieceid/7/categoryid/3", r#"{"categoryName":"Poetry"}"#);

    assert_eq!(response.status, 201);
    assert_eq!(response.header("Location"), Some("categoryid/3/pieceid/7"));
    assert!(fx.row("stocks", &[3, 7]).is_some());
}

#[timeout(2000)]
#[test]
fn body_key_must_match_route() {
    let fx = Fixture::new();

    let conflict = fx.put("Magazine", "id/1", r#"{"id":2,"title":"x"}"#);
    assert_eq!(conflict.status, 400);
    assert_eq!(
        conflict.error_message(),
        Some("Invalid request body. Primary key field id does not match the value in the URL.")
    );

    let agreeing = fx.put("Magazine", "id/1", r#"{"id":1,"title":"x"}"#);
    assert_eq!(agreeing.status, 200);
}

#[timeout(2000)]
#[test]
fn store_and_catalog_defaults_fill_absent_columns() {
    let fx = Fixture::new();

    let inserted = fx.put("Stock", "categoryid/1/pieceid/2", r#"{"categoryName":"History"}"#);
    assert_eq!(inserted.status, 201);
    assert_eq!(
        inserted.data(),
        Some(&json!({
            "categoryid": 1,
            "pieceid": 2,
            "categoryName": "History",
            "piecesAvailable": 0,
            "piecesRequired": 0
        }))
    );

    let updated = fx.put(
        "Stock",
        "categoryid/1/pieceid/2",
        r#"{"categoryName":"History","piecesAvailable":5,"piecesRequired":3}"#,
    );
    assert_eq!(updated.status, 200);

    // Full replace: store-defaulted columns become NULL, catalog defaults are reassigned
    let replaced = fx.put("Stock", "categoryid/1/pieceid/2", r#"{"categoryName":"History"}"#);
    assert_eq!(replaced.status, 200);
    assert_eq!(
        replaced.data(),
        Some(&json!({
            "categoryid": 1,
            "pieceid": 2,
            "categoryName": "History",
            "piecesAvailable": null,
            "piecesRequired": 0
        }))
    );
    let row = fx.row("stocks", &[1, 2]).unwrap();
    assert_eq!(row["piecesAvailable"], Value::Null);
    assert_eq!(row["piecesRequired"], Value::Int(0));
}

#[timeout(2000)]
#[test]
fn absent_non_nullable_store_default_fails_update() {
    let fx = Fixture::new();
    let response = fx.put("Review", "book_id/1/id/568", "{}");

    assert_eq!(response.status, 400);
    assert_eq!(response.error_code(), Some("DatabaseOperationFailed"));
    assert_eq!(
        response.error_message(),
        Some("Cannot insert the value NULL into column 'content', table 'reviews'; column does not allow nulls. UPDATE fails.")
    );
    assert_eq!(fx.row("reviews", &[1, 568]).unwrap()["content"], text("I loved it"));
}

#[timeout(2000)]
#[test]
fn aliased_columns_use_exposed_names() {
    let fx = Fixture::new();
    let response = fx.put("Tree", "treeId/1", r#"{"Scientific Name":"Acer","region":"South"}"#);

    assert_eq!(response.status, 200);
    assert_eq!(
        response.data(),
        Some(&json!({"treeId": 1, "Scientific Name": "Acer", "region": "South"}))
    );
    assert_eq!(fx.row("trees", &[1]).unwrap()["species"], text("Acer"));

    let backing_name = fx.put("Tree", "treeId/1", r#"{"species":"Acer"}"#);
    assert_eq!(backing_name.status, 400);
}

#[timeout(2000)]
#[test]
fn store_constraint_violation_is_database_operation_failed() {
    let fx = Fixture::new();
    // Store has drifted from the catalog: region became NOT NULL
    fx.store.add_table(
        StoreTable::new(
            "trees",
            vec![
                StoreColumn::new("treeId", ColumnType::Int32),
                StoreColumn::new("species", ColumnType::String),
                StoreColumn::new("region", ColumnType::String),
            ],
            &["treeId"],
        )
        .unwrap(),
    );

    let response = fx.put("Tree", "treeId/2", r#"{"Scientific Name":"Pinus"}"#);
    assert_eq!(response.status, 400);
    assert_eq!(response.error_code(), Some("DatabaseOperationFailed"));
    assert_eq!(
        response.error_message(),
        Some("Cannot insert the value NULL into column 'region', table 'trees'; column does not allow nulls. INSERT fails.")
    );
    assert_eq!(fx.store.row_count("trees"), 0);
}

#[timeout(2000)]
#[test]
fn view_writes_through_to_base_table() {
    let fx = Fixture::new();
    let response = fx.put("books_view_all", "id/1", r#"{"title":"Via view","publisher_id":2345}"#);
    assert_eq!(response.status, 200);
    assert_eq!(fx.row("books", &[1]).unwrap()["title"], text("Via view"));

    let missing = fx.put("books_view_all", "id/1000", r#"{"title":"x","publisher_id":1}"#);
    assert_eq!(missing.status, 404);
    assert_eq!(fx.store.row_count("books"), 2);
}

#[timeout(2000)]
#[test]
fn multi_table_view_accepts_only_base_table_fields() {
    let fx = Fixture::new();

    let rejected = fx.put(
        "books_publishers_view",
        "id/1",
        r#"{"title":"x","publisher_name":"Other"}"#,
    );
    assert_eq!(rejected.status, 400);
    assert_eq!(
        rejected.error_message(),
        Some("Cannot perform UPSERT on view books_publishers_view: field publisher_name does not belong to its base table.")
    );
    assert_eq!(fx.row("publishers", &[1234]).unwrap()["name"], text("Big Company"));

    let accepted = fx.put("books_publishers_view", "id/1", r#"{"title":"Only books"}"#);
    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.data(), Some(&json!({"id": 1, "title": "Only books"})));
    assert_eq!(fx.row("books", &[1]).unwrap()["publisher_id"], Value::Int(1234));
}

#[timeout(2000)]
#[test]
fn update_policy_filters_rows() {
    let fx = Fixture::new();
    let put_as = |role: &str, pk: &str| {
        fx.send(
            PutRequest::new("Publisher", pk)
                .with_body(r#"{"name":"Renamed"}"#)
                .with_claim(ROLE_CLAIM, role),
        )
    };

    let blocked = put_as("policy_tester", "id/1234");
    assert_eq!(blocked.status, 404);
    assert_eq!(fx.row("publishers", &[1234]).unwrap()["name"], text("Big Company"));

    assert_eq!(put_as("policy_tester", "id/2345").status, 200);
    assert_eq!(put_as("anonymous", "id/1234").status, 200);
}

#[timeout(2000)]
#[test]
fn if_match_star_never_inserts() {
    let fx = Fixture::new();
    let put = |pk: &str| {
        fx.send(
            PutRequest::new("Magazine", pk)
                .with_body(r#"{"title":"Wired"}"#)
                .with_header("If-Match", "*"),
        )
    };

    let missing = put("id/3000");
    assert_eq!(missing.status, 412);
    assert_eq!(missing.error_code(), Some("DatabaseOperationFailed"));
    assert_eq!(missing.error_message(), Some(PRECONDITION_FAILED_MESSAGE));
    assert!(fx.row("magazines", &[3000]).is_none());

    assert_eq!(put("id/1").status, 200);
}

#[timeout(2000)]
#[test]
fn unknown_entity_and_query_string() {
    let fx = Fixture::new();

    let unknown = fx.put("Comics", "id/1", "{}");
    assert_eq!(unknown.status, 404);
    assert_eq!(unknown.error_message(), Some("Entity Comics not found."));

    let query = fx.send(
        PutRequest::new("Magazine", "id/1")
            .with_body(r#"{"title":"x"}"#)
            .with_query("$filter=id eq 1"),
    );
    assert_eq!(query.status, 400);
    assert_eq!(
        query.error_message(),
        Some("Query string for PUT requests is an invalid url.")
    );
}

#[timeout(2000)]
#[test]
fn cancelled_request_writes_nothing() {
    let fx = Fixture::new();
    let flag = CancellationFlag::new();
    flag.cancel();

    let request = PutRequest::new("Magazine", "id/4000")
        .with_body(r#"{"title":"Late"}"#)
        .with_claim(ROLE_CLAIM, "anonymous");
    let response = fx.gateway.handle_put(&request, &flag);

    assert_eq!(response.status, 408);
    assert!(fx.row("magazines", &[4000]).is_none());
}

#[timeout(2000)]
#[test]
fn percent_encoded_route_values_are_decoded() {
    let fx = Fixture::new();
    let response = fx.put("Magazine", "id/%32%30%30%31", r#"{"title":"Encoded"}"#);
    assert_eq!(response.status, 201);
    assert_eq!(response.header("Location"), Some("id/2001"));
}

#[timeout(2000)]
#[test]
fn composite_row_update_leaves_key_columns() {
    let fx = Fixture::new();
    let response = fx.put("Review", "book_id/1/id/568", r#"{"content":"Good book to read"}"#);

    assert_eq!(response.status, 200);
    let row = fx.row("reviews", &[1, 568]).unwrap();
    assert_eq!(row["content"], text("Good book to read"));
    assert_eq!(row["book_id"], Value::Int(1));
    assert_eq!(fx.row("reviews", &[1, 567]).unwrap()["content"], text("Indeed a great book"));
}

#[timeout(2000)]
#[test]
fn client_keyed_insert_reports_route_as_location() {
    let fx = Fixture::new();
    let response = fx.put(
        "Magazine",
        "id/1000",
        r#"{"title":"Batman Returns","issue_number":1234}"#,
    );

    assert_eq!(response.status, 201);
    assert_eq!(response.header("Location"), Some("id/1000"));
    let row = fx.row("magazines", &[1000]).unwrap();
    assert_eq!(row["title"], text("Batman Returns"));
    assert_eq!(row["issue_number"], Value::Int(1234));
}

#[timeout(2000)]
#[test]
fn null_for_non_nullable_column_names_the_field() {
    let fx = Fixture::new();
    let response = fx.put(
        "Stock",
        "categoryid/1/pieceid/1",
        r#"{"categoryName":null,"piecesAvailable":1,"piecesRequired":1}"#,
    );

    assert_eq!(response.status, 400);
    assert_eq!(
        response.error_message(),
        Some("Invalid value for field categoryName in request body.")
    );
    assert_eq!(fx.row("stocks", &[1, 1]).unwrap()["categoryName"], text("SciFi"));
}

#[timeout(2000)]
#[test]
fn field_order_does_not_change_the_outcome() {
    let fx = Fixture::new();
    let a = fx.put("Book", "id/1", r#"{"title":"x","publisher_id":"bad","isbn":1}"#);
    let b = fx.put("Book", "id/1", r#"{"isbn":1,"publisher_id":"bad","title":"x"}"#);
    assert_eq!(a, b);
    assert_eq!(a.status, 400);

    let c = fx.put("Book", "id/1", r#"{"title":null,"publisher_id":"bad"}"#);
    let d = fx.put("Book", "id/1", r#"{"publisher_id":"bad","title":null}"#);
    assert_eq!(c, d);
}
