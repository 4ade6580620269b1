//! Shared fixtures: a bookstore catalog seeded into the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use tablegate_core::config::GatewayConfig;
use tablegate_core::executor::MutationExecutor;
use tablegate_core::policy::ROLE_CLAIM;
use tablegate_core::response::GatewayResponse;
use tablegate_core::schema::file::parse_catalog;
use tablegate_core::schema::Catalog;
use tablegate_core::upsert::CancellationFlag;
use tablegate_core::value::Value;
use tablegate_core::{Gateway, PutRequest};
use tablegate_store::Store;

pub const CATALOG: &str = r#"{
    "version": 1,
    "entities": [
        {
            "name": "publishers",
            "rest_path": "Publisher",
            "primary_key": ["id"],
            "columns": [
                {"name": "id", "type": "Int32", "autogenerated": true},
                {"name": "name", "type": "String"}
            ]
        },
        {
            "name": "books",
            "rest_path": "Book",
            "primary_key": ["id"],
            "columns": [
                {"name": "id", "type": "Int32", "autogenerated": true},
                {"name": "title", "type": "String"},
                {"name": "publisher_id", "type": "Int32"}
            ]
        },
        {
            "name": "reviews",
            "rest_path": "Review",
            "primary_key": ["book_id", "id"],
            "columns": [
                {"name": "book_id", "type": "Int32"},
                {"name": "id", "type": "Int32", "autogenerated": true},
                {"name": "content", "type": "String", "default": {"store": "Its a classic"}}
            ]
        },
        {
            "name": "magazines",
            "rest_path": "Magazine",
            "primary_key": ["id"],
            "columns": [
                {"name": "id", "type": "Int32"},
                {"name": "title", "type": "String"},
                {"name": "issue_number", "type": "Int32", "nullable": true}
            ]
        },
        {
            "name": "stocks",
            "rest_path": "Stock",
            "primary_key": ["categoryid", "pieceid"],
            "columns": [
                {"name": "categoryid", "type": "Int32"},
                {"name": "pieceid", "type": "Int32"},
                {"name": "categoryName", "type": "String"},
                {"name": "piecesAvailable", "type": "Int32", "nullable": true, "default": {"store": 0}},
                {"name": "piecesRequired", "type": "Int32", "default": {"catalog": 0}}
            ]
        },
        {
            "name": "trees",
            "rest_path": "Tree",
            "primary_key": ["treeId"],
            "columns": [
                {"name": "treeId", "type": "Int32"},
                {"name": "species", "alias": "Scientific Name", "type": "String"},
                {"name": "region", "type": "String", "nullable": true}
            ]
        },
        {
            "name": "books_view_all",
            "kind": "view",
            "base_table": "books",
            "primary_key": ["id"],
            "columns": [
                {"name": "id", "type": "Int32", "autogenerated": true, "source": {"table": "books", "column": "id"}},
                {"name": "title", "type": "String", "source": {"table": "books", "column": "title"}},
                {"name": "publisher_id", "type": "Int32", "source": {"table": "books", "column": "publisher_id"}}
            ]
        },
        {
            "name": "books_publishers_view",
            "kind": "view",
            "base_table": "books",
            "primary_key": ["id"],
            "columns": [
                {"name": "id", "type": "Int32", "autogenerated": true, "source": {"table": "books", "column": "id"}},
                {"name": "title", "type": "String", "source": {"table": "books", "column": "title"}},
                {"name": "publisher_name", "type": "String", "source": {"table": "publishers", "column": "name"}}
            ]
        }
    ],
    "policies": [
        {"entity": "publishers", "role": "policy_tester", "action": "update", "expression": "@item.id ne 1234"}
    ],
    "seed": {
        "publishers": [
            {"id": 1234, "name": "Big Company"},
            {"id": 2345, "name": "Small Town Publisher"}
        ],
        "books": [
            {"id": 1, "title": "Awesome book", "publisher_id": 1234},
            {"id": 2, "title": "Also Awesome book", "publisher_id": 1234}
        ],
        "reviews": [
            {"book_id": 1, "id": 567, "content": "Indeed a great book"},
            {"book_id": 1, "id": 568, "content": "I loved it"}
        ],
        "magazines": [
            {"id": 1, "title": "Vogue", "issue_number": 1234}
        ],
        "stocks": [
            {"categoryid": 1, "pieceid": 1, "categoryName": "SciFi", "piecesAvailable": 0, "piecesRequired": 0}
        ],
        "trees": [
            {"treeId": 1, "species": "Quercus", "region": "North"}
        ]
    }
}"#;

/// Gateway wired to a seeded store.
pub struct Fixture {
    pub gateway: Arc<Gateway>,
    pub store: Arc<Store>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let loaded = parse_catalog(CATALOG).expect("catalog fixture should load");
        let store = Arc::new(Store::from_catalog(&loaded.snapshot).expect("store should build"));
        for (table, rows) in &loaded.seed {
            store.seed(table, rows).expect("seed rows should insert");
        }
        let gateway = Gateway::new(
            Arc::new(Catalog::new(loaded.snapshot)),
            Arc::new(loaded.policies),
            store.clone(),
            config,
        );
        Self {
            gateway: Arc::new(gateway),
            store,
        }
    }

    /// Same catalog and seeded store, with statements routed through the
    /// executor `wrap` builds around the store.
    pub fn with_executor<F>(config: GatewayConfig, wrap: F) -> Self
    where
        F: FnOnce(Arc<Store>) -> Arc<dyn MutationExecutor>,
    {
        let seeded = Self::with_config(config.clone());
        let loaded = parse_catalog(CATALOG).expect("catalog fixture should load");
        let gateway = Gateway::new(
            Arc::new(Catalog::new(loaded.snapshot)),
            Arc::new(loaded.policies),
            wrap(seeded.store.clone()),
            config,
        );
        Self {
            gateway: Arc::new(gateway),
            store: seeded.store,
        }
    }

    pub fn put(&self, entity: &str, pk: &str, body: &str) -> GatewayResponse {
        self.send(PutRequest::new(entity, pk).with_body(body))
    }

    pub fn send(&self, request: PutRequest) -> GatewayResponse {
        let request = if request.claims.contains_key(ROLE_CLAIM) {
            request
        } else {
            request.with_claim(ROLE_CLAIM, "anonymous")
        };
        self.gateway.handle_put(&request, &CancellationFlag::new())
    }

    pub fn row(&self, table: &str, key: &[i64]) -> Option<std::collections::HashMap<String, Value>> {
        let key: Vec<Value> = key.iter().map(|k| Value::Int(*k)).collect();
        self.store.row(table, &key)
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
