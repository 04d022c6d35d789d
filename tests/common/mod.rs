//! Shared fixtures for the integration tests.
//!
//! Schema:
//! - Company
//! - User: company → Company, posts → [Post] (by position)
//! - Post: author → User, comments → [Comment] (by position, then id descending)
//! - Comment: post → Post, author → User
//! - Person: parent → Person, children → [Person]
//! - Membership (tenant_id, user_id): user → User
//! - Task: membership → Membership

#![allow(dead_code)]

use relations_loader::memory::{InMemoryStore, Row};
use relations_loader::metadata::{
    AssociationMapping, ClassMetadata, IdentifierValues, Identity, OrderBy, Schema,
};

pub fn id(value: i32) -> IdentifierValues {
    IdentifierValues::single("id", value)
}

pub fn membership_id(tenant_id: i32, user_id: i32) -> IdentifierValues {
    IdentifierValues::new()
        .with("tenant_id", tenant_id)
        .with("user_id", user_id)
}

pub fn schema() -> Schema {
    Schema::new()
        .class(ClassMetadata::new("Company", Identity::unary("id")).table("companies"))
        .class(
            ClassMetadata::new("User", Identity::unary("id"))
                .table("users")
                .association("company", AssociationMapping::to_one("Company"))
                .association(
                    "posts",
                    AssociationMapping::to_many("Post", "author").order_by(OrderBy::asc("position")),
                ),
        )
        .class(
            ClassMetadata::new("Post", Identity::unary("id"))
                .table("posts")
                .association("author", AssociationMapping::to_one("User"))
                .association(
                    "comments",
                    AssociationMapping::to_many("Comment", "post")
                        .order_by(OrderBy::asc("position"))
                        .order_by(OrderBy::desc("id")),
                ),
        )
        .class(
            ClassMetadata::new("Comment", Identity::unary("id"))
                .table("comments")
                .association("post", AssociationMapping::to_one("Post"))
                .association("author", AssociationMapping::to_one("User")),
        )
        .class(
            ClassMetadata::new("Person", Identity::unary("id"))
                .table("people")
                .association("parent", AssociationMapping::to_one("Person"))
                .association("children", AssociationMapping::to_many("Person", "parent")),
        )
        .class(
            ClassMetadata::new("Membership", Identity::composite(["tenant_id", "user_id"]))
                .table("memberships")
                .association("user", AssociationMapping::to_one("User")),
        )
        .class(
            ClassMetadata::new("Task", Identity::unary("id"))
                .table("tasks")
                .association("membership", AssociationMapping::to_one("Membership")),
        )
}

/// Blog fixture
///
/// - companies 1, 2
/// - users 1..=3; user 1 and 2 work at company 1, user 3 at company 2
/// - posts 1..=4 written by users 1, 2, 1, 3; user 3 has a second post 5
/// - comments on posts 1 and 2, each written by user 2 or 3
pub fn blog() -> InMemoryStore {
    let store = InMemoryStore::new(schema());

    for company in 1..=2 {
        store
            .insert(Row::new("Company").value("id", company).value("name", format!("company-{}", company)))
            .unwrap();
    }

    for (user, company) in [(1, 1), (2, 1), (3, 2)] {
        store
            .insert(
                Row::new("User")
                    .value("id", user)
                    .value("name", format!("user-{}", user))
                    .reference("company", id(company)),
            )
            .unwrap();
    }

    // (post, author, position)
    for (post, author, position) in [(1, 1, 2), (2, 2, 1), (3, 1, 1), (4, 3, 1), (5, 3, 2)] {
        store
            .insert(
                Row::new("Post")
                    .value("id", post)
                    .value("position", position)
                    .reference("author", id(author)),
            )
            .unwrap();
    }

    // (comment, post, author, position)
    for (comment, post, author, position) in [(1, 1, 2, 2), (2, 1, 3, 1), (3, 2, 3, 1), (4, 1, 2, 1)] {
        store
            .insert(
                Row::new("Comment")
                    .value("id", comment)
                    .value("position", position)
                    .reference("post", id(post))
                    .reference("author", id(author)),
            )
            .unwrap();
    }

    store
}

/// Family fixture
///
/// - grandparents 1, 2 (no parent)
/// - parents 3, 4 (children of 1), 5 (child of 2)
/// - children 6, 7 (of 3), 8 (of 4), 9 (of 5)
pub fn family() -> InMemoryStore {
    let store = InMemoryStore::new(schema());
    for person in 1..=2 {
        store
            .insert(Row::new("Person").value("id", person).null_reference("parent"))
            .unwrap();
    }
    for (person, parent) in [(3, 1), (4, 1), (5, 2), (6, 3), (7, 3), (8, 4), (9, 5)] {
        store
            .insert(Row::new("Person").value("id", person).reference("parent", id(parent)))
            .unwrap();
    }
    store
}

/// Membership fixture: three tasks over two distinct memberships
pub fn memberships() -> InMemoryStore {
    let store = InMemoryStore::new(schema());
    store.insert(Row::new("User").value("id", 1)).unwrap();
    store.insert(Row::new("User").value("id", 2)).unwrap();
    for (tenant, user) in [(1, 1), (2, 2), (2, 1)] {
        store
            .insert(
                Row::new("Membership")
                    .value("tenant_id", tenant)
                    .value("user_id", user)
                    .value("role", "member")
                    .reference("user", id(user)),
            )
            .unwrap();
    }
    for (task, tenant, user) in [(1, 1, 1), (2, 2, 2), (3, 1, 1)] {
        store
            .insert(
                Row::new("Task")
                    .value("id", task)
                    .reference("membership", membership_id(tenant, user)),
            )
            .unwrap();
    }
    store
}
