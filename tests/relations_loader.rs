//! Integration tests for RelationsLoader
//!
//! These tests drive the public API against the in-memory store and check the
//! batched queries it receives and the resulting object graph.

mod common;

use common::{blog, family, id, membership_id, memberships};
use relations_loader::memory::QueryKind;
use relations_loader::{
    Criteria, EntityRef, LoadError, LoaderConfig, Materializable, RelationSpec, RelationsLoader,
};
use sea_query::Value;
use serde_json::json;

fn ids(entities: &[EntityRef]) -> Vec<Value> {
    entities.iter().map(|e| e.scalar("id").unwrap()).collect()
}

fn values(raw: &[i32]) -> Vec<Value> {
    raw.iter().map(|v| Value::from(*v)).collect()
}

fn in_set(field: &str, raw: &[i32]) -> Criteria {
    Criteria::In {
        field: field.to_string(),
        values: values(raw),
    }
}

// ============================================================================
// Batching and deduplication
// ============================================================================

#[test]
fn test_to_one_targets_load_in_one_query() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();

    RelationsLoader::new(&store).load(&posts, "author").unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].class, "User");
    assert_eq!(queries[0].criteria, in_set("id", &[1, 2, 3]));
    assert!(queries[0].sql.contains(r#"FROM "users""#));
    for post in &posts {
        let author = post.reference("author").unwrap();
        assert!(author.is_materialized());
        assert!(author.scalar("name").is_some());
    }
}

#[test]
fn test_repeated_identifier_is_queried_once() {
    let store = blog();
    let first = store.find("Post", &id(1)).unwrap().unwrap();
    let third = store.find("Post", &id(3)).unwrap().unwrap();

    RelationsLoader::new(&store)
        .load(&vec![first.clone(), third.clone()], "author")
        .unwrap();

    assert_eq!(store.query_count(), 1);
    assert_eq!(store.queries()[0].criteria, in_set("id", &[1]));
    assert_eq!(first.reference("author"), third.reference("author"));
}

#[test]
fn test_loaded_targets_are_not_queried_again() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();
    let mut loader = RelationsLoader::new(&store);

    loader.load(&posts, "author").unwrap();
    loader.load(&posts, "author").unwrap();

    assert_eq!(store.query_count(), 1);
}

#[test]
fn test_null_references_issue_no_query() {
    let store = family();
    let grandparents = vec![
        store.find("Person", &id(1)).unwrap().unwrap(),
        store.find("Person", &id(2)).unwrap().unwrap(),
    ];

    RelationsLoader::new(&store).load(&grandparents, "parent").unwrap();

    assert_eq!(store.query_count(), 0);
    assert!(grandparents[0].reference("parent").is_none());
}

// ============================================================================
// Composite identifiers
// ============================================================================

#[test]
fn test_composite_identifiers_form_one_disjunction() {
    let store = memberships();
    let tasks = store.find_all("Task").unwrap();

    RelationsLoader::new(&store).load(&tasks, "membership").unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].class, "Membership");
    assert_eq!(
        queries[0].criteria,
        Criteria::AnyOf(vec![membership_id(1, 1), membership_id(2, 2)])
    );
    assert!(queries[0].sql.contains(r#""tenant_id" = 1 AND "user_id" = 1"#));
    assert!(queries[0].sql.contains(r#""tenant_id" = 2 AND "user_id" = 2"#));
    assert!(queries[0].sql.contains(" OR "));

    let membership = tasks[0].reference("membership").unwrap();
    assert!(membership.is_materialized());
    assert_eq!(membership.scalar("role"), Some(Value::from("member")));
    assert_eq!(tasks[0].reference("membership"), tasks[2].reference("membership"));
}

#[test]
fn test_nested_relation_through_composite_identifier() {
    let store = memberships();
    let tasks = store.find_all("Task").unwrap();

    RelationsLoader::new(&store)
        .load(&tasks, RelationSpec::new().nested("membership", "user"))
        .unwrap();

    let classes: Vec<String> = store.queries().into_iter().map(|q| q.class).collect();
    assert_eq!(classes, vec!["Membership", "User"]);
    let user = tasks[1]
        .reference("membership")
        .and_then(|m| m.reference("user"))
        .unwrap();
    assert!(user.is_materialized());
    assert_eq!(user.scalar("id"), Some(Value::from(2)));
}

// ============================================================================
// Traversal order and nesting
// ============================================================================

#[test]
fn test_leaf_and_branch_order_does_not_matter() {
    let branch_first = blog();
    let posts = branch_first.find_all("Post").unwrap();
    RelationsLoader::new(&branch_first)
        .load(&posts, RelationSpec::new().nested("author", "company").with("author"))
        .unwrap();

    let leaf_first = blog();
    let posts = leaf_first.find_all("Post").unwrap();
    RelationsLoader::new(&leaf_first)
        .load(&posts, RelationSpec::new().with("author").nested("author", "company"))
        .unwrap();

    let sql = |store: &relations_loader::memory::InMemoryStore| -> Vec<String> {
        store.queries().into_iter().map(|q| q.sql).collect()
    };
    assert_eq!(sql(&branch_first), sql(&leaf_first));
    assert_eq!(branch_first.query_count(), 2);
}

#[test]
fn test_nested_parents_take_one_query_per_level() {
    let store = family();
    let children: Vec<EntityRef> = [6, 7, 8, 9]
        .iter()
        .map(|person| store.find("Person", &id(*person)).unwrap().unwrap())
        .collect();

    RelationsLoader::new(&store)
        .load(&children, RelationSpec::new().nested("parent", "parent"))
        .unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].criteria, in_set("id", &[3, 4, 5]));
    assert_eq!(queries[1].criteria, in_set("id", &[1, 2]));

    let grandparent = children[0]
        .reference("parent")
        .and_then(|parent| parent.reference("parent"))
        .unwrap();
    assert!(grandparent.is_materialized());
    assert_eq!(grandparent.scalar("id"), Some(Value::from(1)));
}

#[test]
fn test_to_many_then_nested_to_one() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();

    RelationsLoader::new(&store)
        .load(&posts, RelationSpec::new().nested("comments", "author"))
        .unwrap();

    let queries = store.queries();
    let classes: Vec<&str> = queries.iter().map(|q| q.class.as_str()).collect();
    assert_eq!(classes, vec!["Comment", "User"]);
    assert_eq!(queries[1].criteria, in_set("id", &[2, 3]));

    let comments = posts[0].collection("comments").unwrap();
    assert!(comments
        .to_vec()
        .iter()
        .all(|c| c.reference("author").unwrap().is_materialized()));
}

#[test]
fn test_nested_to_many_levels() {
    let store = blog();
    let users = store.find_all("User").unwrap();

    RelationsLoader::new(&store)
        .load(&users, RelationSpec::new().nested("posts", "comments"))
        .unwrap();

    let classes: Vec<String> = store.queries().into_iter().map(|q| q.class).collect();
    assert_eq!(classes, vec!["Post", "Comment"]);
    let first_post = users[0].collection("posts").unwrap().to_vec()[1].clone();
    assert_eq!(first_post.scalar("id"), Some(Value::from(1)));
    assert_eq!(first_post.collection("comments").unwrap().len(), 3);
}

// ============================================================================
// To-many hydration
// ============================================================================

#[test]
fn test_to_many_collections_are_filled_in_order() {
    let store = blog();
    let users = store.find_all("User").unwrap();

    RelationsLoader::new(&store).load(&users, "posts").unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].criteria, in_set("author", &[1, 2, 3]));
    assert!(queries[0].sql.contains(r#"ORDER BY "position" ASC"#));

    let posts_of = |user: usize| ids(&users[user].collection("posts").unwrap().to_vec());
    assert_eq!(posts_of(0), values(&[3, 1]));
    assert_eq!(posts_of(1), values(&[2]));
    assert_eq!(posts_of(2), values(&[4, 5]));
}

#[test]
fn test_to_many_ordering_with_several_terms() {
    let store = blog();
    let post = store.find("Post", &id(1)).unwrap().unwrap();

    RelationsLoader::new(&store).load(&post, "comments").unwrap();

    assert!(store.queries()[0]
        .sql
        .contains(r#"ORDER BY "position" ASC, "id" DESC"#));
    let comments = post.collection("comments").unwrap().to_vec();
    assert_eq!(ids(&comments), values(&[4, 2, 1]));
}

#[test]
fn test_to_many_hydration_is_idempotent() {
    let store = blog();
    let users = store.find_all("User").unwrap();
    let mut loader = RelationsLoader::new(&store);

    loader.load(&users, "posts").unwrap();
    let posts = users[0].collection("posts").unwrap();
    assert!(posts.is_initialized());
    assert!(!posts.is_dirty());
    assert_eq!(posts.snapshot(), posts.to_vec());
    assert!(posts.insert_diff().is_empty());

    loader.load(&users, "posts").unwrap();
    assert_eq!(store.query_count(), 1);
    assert_eq!(posts.len(), 2);

    // user changes are still tracked against the loaded baseline
    let extra = store.find("Post", &id(4)).unwrap().unwrap();
    posts.add(extra.clone());
    assert!(posts.is_dirty());
    assert_eq!(posts.insert_diff(), vec![extra]);
}

#[test]
fn test_empty_collections_are_initialized() {
    let store = blog();
    let post = store.find("Post", &id(4)).unwrap().unwrap();

    RelationsLoader::new(&store).load(&post, "comments").unwrap();

    let comments = post.collection("comments").unwrap();
    assert!(comments.is_initialized());
    assert!(comments.is_empty());
}

#[test]
fn test_tracked_collection_as_input() {
    let store = blog();
    let user = store.find("User", &id(1)).unwrap().unwrap();
    let mut loader = RelationsLoader::new(&store);
    loader.load(&user, "posts").unwrap();
    store.clear_log();

    let posts = user.collection("posts").unwrap();
    loader.load(&posts, "comments").unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].criteria, in_set("post", &[3, 1]));
    assert!(posts.to_vec().iter().all(|p| p.collection("comments").unwrap().is_initialized()));
}

// ============================================================================
// Inputs
// ============================================================================

#[test]
fn test_empty_input_issues_no_query() {
    let store = blog();
    let mut loader = RelationsLoader::new(&store);
    let nothing: Vec<EntityRef> = Vec::new();

    let returned = loader.load(&nothing, "author").unwrap();
    assert!(returned.is_empty());
    loader.load(&None::<EntityRef>, "author").unwrap();

    let posts = store.find_all("Post").unwrap();
    loader.load(&posts, RelationSpec::new()).unwrap();

    assert_eq!(store.query_count(), 0);
}

#[test]
fn test_placeholder_roots_are_materialized_first() {
    let store = blog();
    let roots = [
        store.reference("Post", &id(1)).unwrap(),
        store.reference("Post", &id(2)).unwrap(),
    ];

    RelationsLoader::new(&store).load(&roots[..], "author").unwrap();

    let kinds: Vec<QueryKind> = store.queries().into_iter().map(|q| q.kind).collect();
    assert_eq!(
        kinds,
        vec![QueryKind::Materialize, QueryKind::Materialize, QueryKind::Batch]
    );
    assert!(roots.iter().all(|p| p.is_materialized()));
}

#[test]
fn test_dotted_and_json_specs_match_builder() {
    let builder = blog();
    let posts = builder.find_all("Post").unwrap();
    RelationsLoader::new(&builder)
        .load(
            &posts,
            RelationSpec::new()
                .with("comments")
                .nested("author", "company"),
        )
        .unwrap();

    let dotted = blog();
    let posts = dotted.find_all("Post").unwrap();
    let spec: RelationSpec = "comments, author.company".parse().unwrap();
    RelationsLoader::new(&dotted).load(&posts, spec).unwrap();

    let from_json = blog();
    let posts = from_json.find_all("Post").unwrap();
    let spec = RelationSpec::from_json(&json!(["comments", {"author": ["company"]}])).unwrap();
    RelationsLoader::new(&from_json).load(&posts, spec).unwrap();

    let sql = |store: &relations_loader::memory::InMemoryStore| -> Vec<String> {
        store.queries().into_iter().map(|q| q.sql).collect()
    };
    assert_eq!(sql(&builder).len(), 3);
    assert_eq!(sql(&builder), sql(&dotted));
    assert_eq!(sql(&builder), sql(&from_json));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_max_batch_size_splits_queries() {
    let store = blog();
    let users = store.find_all("User").unwrap();

    RelationsLoader::with_config(&store, LoaderConfig::with_max_batch_size(2))
        .load(&users, "posts")
        .unwrap();

    let queries = store.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].criteria, in_set("author", &[1, 2]));
    assert_eq!(queries[1].criteria, in_set("author", &[3]));
    assert_eq!(ids(&users[0].collection("posts").unwrap().to_vec()), values(&[3, 1]));
    assert_eq!(ids(&users[2].collection("posts").unwrap().to_vec()), values(&[4, 5]));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_relation_is_an_error() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();

    let err = RelationsLoader::new(&store).load(&posts, "autor").unwrap_err();
    assert_eq!(
        err,
        LoadError::UnknownAssociation {
            class: "Post".to_string(),
            field: "autor".to_string(),
        }
    );
}

#[test]
fn test_unknown_nested_relation_is_an_error() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();

    let err = RelationsLoader::new(&store)
        .load(&posts, RelationSpec::new().nested("author", "employer"))
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::UnknownAssociation { ref class, ref field } if class == "User" && field == "employer"
    ));
}

#[test]
fn test_storage_failure_propagates_and_keeps_completed_flushes() {
    let store = blog();
    let posts = store.find_all("Post").unwrap();
    store.fail_queries_for("User");
    let mut loader = RelationsLoader::new(&store);

    let err = loader.load(&posts, ["comments", "author"]).unwrap_err();
    assert!(matches!(err, LoadError::Storage(_)));

    // the comment flush ran before the failing user flush
    assert_eq!(store.query_count(), 1);
    let comments = posts[0].collection("comments").unwrap();
    assert!(comments.is_initialized());
    assert_eq!(comments.len(), 3);
    assert!(!posts[0].reference("author").unwrap().is_materialized());

    // the next call starts from an empty holder
    loader.load(&posts, "comments").unwrap();
    assert_eq!(store.query_count(), 1);
    assert!(loader.holder().is_empty());
}
