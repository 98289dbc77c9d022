//! Test fixtures: a small publishing schema with articles, users and tags.

use helios_entity::access::Account;
use helios_entity::entity::reference_item;
use helios_entity::schema::Schema;
use helios_entity::{Entity, FieldItem};
use helios_jsonapi::ResourceTypeOverrides;
use serde_json::{Value, json};

/// Article ids.
pub const HELLO: &str = "a1";
/// Second article.
pub const WORLD: &str = "a2";
/// Article with a secret and no tags.
pub const DRAFT: &str = "a3";
/// User ids.
pub const ADA: &str = "u-ada";
/// Second user.
pub const BOB: &str = "u-bob";
/// Tag ids.
pub const RUST: &str = "t-rust";
/// Second tag.
pub const WEB: &str = "t-web";
/// Tag in a vocabulary articles may not reference.
pub const SECTION: &str = "t-section";

/// The schema document.
pub fn schema() -> Schema {
    Schema::from_json(
        r#"{"entity_types": [
            {"id": "node", "keys": {"bundle": "type", "label": "title"}, "bundles": {
                "article": {"fields": [
                    {"name": "title", "type": "string", "required": true},
                    {"name": "body", "type": "text"},
                    {"name": "promoted", "type": "boolean"},
                    {"name": "secret", "type": "string",
                     "view_permission": "view secrets", "edit_permission": "edit secrets"},
                    {"name": "uid", "type": "entity_reference",
                     "settings": {"target_type": "user"}},
                    {"name": "tags", "type": "entity_reference", "cardinality": -1,
                     "extra_properties": ["weight"],
                     "settings": {"target_type": "taxonomy_term", "target_bundles": ["tags"]}}
                ]},
                "page": {"fields": [
                    {"name": "title", "type": "string", "required": true}
                ]}
            }},
            {"id": "user", "base_fields": [
                {"name": "name", "type": "string"},
                {"name": "mail", "type": "string", "view_permission": "view mail"}
            ]},
            {"id": "taxonomy_term", "keys": {"bundle": "vid"}, "bundles": {
                "tags": {"fields": [{"name": "name", "type": "string"}]},
                "sections": {"fields": [{"name": "name", "type": "string"}]}
            }}
        ]}"#,
    )
    .expect("fixture schema is valid")
}

/// Resource type overrides: `uid` is exposed as `author`, article
/// collections report a total count and pages are internal.
pub fn overrides() -> ResourceTypeOverrides {
    serde_json::from_value(json!({
        "node--article": {
            "include_count": true,
            "fields": {"uid": {"public_name": "author"}}
        },
        "node--page": {"internal": true}
    }))
    .expect("fixture overrides are valid")
}

fn tag_item(id: &str, weight: i64) -> FieldItem {
    let mut item = reference_item(id.to_string());
    item.insert("weight".to_string(), json!(weight));
    item
}

fn article(id: &str, title: &str, author: &str) -> Entity {
    Entity::new("node", "article", id)
        .with_value("title", Value::from(title))
        .with_references("uid", [author])
}

/// Seed entities.
pub fn entities() -> Vec<Entity> {
    let mut hello = article(HELLO, "Hello", ADA).with_value("promoted", Value::Bool(true));
    hello.set("tags", vec![tag_item(RUST, 1), tag_item(WEB, 2)]);

    let mut world = article(WORLD, "World", BOB).with_value("promoted", Value::Bool(false));
    world.set("tags", vec![tag_item(RUST, 1)]);

    let draft = article(DRAFT, "Draft", ADA).with_value("secret", Value::from("classified"));

    vec![
        Entity::new("user", "user", ADA)
            .with_value("name", Value::from("Ada"))
            .with_value("mail", Value::from("ada@example.com")),
        Entity::new("user", "user", BOB).with_value("name", Value::from("Bob")),
        Entity::new("taxonomy_term", "tags", RUST).with_value("name", Value::from("rust")),
        Entity::new("taxonomy_term", "tags", WEB).with_value("name", Value::from("web")),
        Entity::new("taxonomy_term", "sections", SECTION).with_value("name", Value::from("news")),
        hello,
        world,
        draft,
        Entity::new("node", "page", "p1").with_value("title", Value::from("About")),
    ]
}

/// Permissions of unidentified requests.
pub const ANONYMOUS_PERMISSIONS: &str = "view node, view user, view taxonomy_term";

/// Registered accounts.
pub fn accounts() -> Vec<Account> {
    vec![
        Account::administrator("admin"),
        Account::new(
            "editor",
            [
                "view node",
                "create node--article",
                "update node--article",
                "delete node--article",
                "view secrets",
                "view user",
                "view taxonomy_term",
            ],
        ),
        Account::new(
            "writer",
            [
                "view node",
                "update node--article",
                "view user",
                "view taxonomy_term",
            ],
        ),
        Account::new("reader", ["view user"]),
    ]
}
