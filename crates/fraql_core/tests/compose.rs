//! End-to-end composition: registry + resolver + declarator together.

use fraql_core::{build_query, merge_operations, FragmentRegistry, PendingOperation, Variables};
use serde_json::json;

fn registry() -> FragmentRegistry {
    FragmentRegistry::new(json!({
        "user": "on User {name}",
        "auth": {
            "user": "on User {token, ...user}"
        }
    }))
    .unwrap()
}

#[test]
fn assembles_fragments_and_declarations_in_one_document() {
    let mut registry = registry();
    registry
        .register(json!({"auth": {"error": "on Error {messages}"}}))
        .unwrap();

    let query = "query (@autodeclare) {\n\
\tuser(name: $name, bool: $bool, int: $int, id: $id) {\n\
\t\t...auth.user\n\
\t\t...auth.error\n\
\t}\n\
\tx {\n\
\t\t... auth.user\n\
\t}\n\
}";

    let variables = Variables::from([
        ("name".to_string(), json!("fatih")),
        ("bool".to_string(), json!(true)),
        ("int".to_string(), json!(2)),
        ("float".to_string(), json!(2.3)),
        ("id".to_string(), json!(1)),
        ("user_id!".to_string(), json!(2)),
        ("postID".to_string(), json!("45af67cd")),
        ("custom_id!CustomType".to_string(), json!("1")),
        ("customId".to_string(), json!("1")),
        ("target![ID!]".to_string(), json!(["Q29uZ3JhdHVsYXRpb25z"])),
    ]);

    let document = build_query(query, &variables, &registry).unwrap();

    let expected = String::from(
        "query ($name: String!, $bool: Boolean!, $int: Int!, $float: Float!, $id: ID!, \
         $user_id: Int!, $postID: ID!, $custom_id: CustomType!, $customId: ID!, $target: [ID!]!) {\n",
    ) + "\tuser(name: $name, bool: $bool, int: $int, id: $id) {\n"
        + "\t\t... auth_user\n"
        + "\t\t... auth_error\n"
        + "\t}\n"
        + "\tx {\n"
        + "\t\t... auth_user\n"
        + "\t}\n"
        + "}\n"
        + "\nfragment user on User {name}\n"
        + "\nfragment auth_user on User {token, ...user}\n"
        + "\nfragment auth_error on Error {messages}";

    assert_eq!(document, expected);
}

#[test]
fn marker_spread_and_fragment_come_together() {
    let registry = FragmentRegistry::new(json!({"user": "on User {name}"})).unwrap();
    let variables = Variables::from([("id".to_string(), json!(7))]);

    let document = build_query(
        "query (@autodeclare) { x(id: $id) { ...user } }",
        &variables,
        &registry,
    )
    .unwrap();

    assert_eq!(
        document,
        "query ($id: ID!) { x(id: $id) { ... user } }\n\nfragment user on User {name}"
    );
}

#[test]
fn merged_operations_flow_through_the_assembler() {
    let ops = [PendingOperation {
        alias: "merge1234".to_string(),
        query: "query {\n  post(id: $id) {\n    id\n    title\n    text\n  }\n} ".to_string(),
        variables: Variables::from([("id".to_string(), json!(123))]),
    }];

    let (merged_query, merged_variables) = merge_operations(&ops);
    let document = build_query(&merged_query, &merged_variables, &registry()).unwrap();

    assert_eq!(
        document,
        "query ($merge1234__id: ID!) {\nmerge1234_post:post(id: $merge1234__id) {\n    id\n    title\n    text\n  }\n }"
    );
}
