use std::path::Path;

use deck::{
    management,
    resources::{BuildStatus, Layer},
    DeckError,
};

use super::Project;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn integration_test_promoted_names_are_unique() {
    let project = Project::new();
    let source = project.write_entry(Layer::Custom, "nodejs-app", "DEV_PORT=3000\n");
    let before = std::fs::read_to_string(source.join(".env")).unwrap();

    let first = project.freeze("nodejs-app").await;
    let second = project.freeze("nodejs-app").await;

    assert_eq!(first, "nodejs-app-20250121-1430");
    assert_eq!(second, "nodejs-app-20250121-1430-2");
    assert_eq!(std::fs::read_to_string(source.join(".env")).unwrap(), before);

    let metadata = project
        .deck
        .directories()
        .read_metadata(&second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.get_image_name(), &second);
    assert_eq!(metadata.get_source_config(), "nodejs-app");
    assert_eq!(metadata.get_created_by(), "alice");
    assert_eq!(metadata.get_build_status(), &BuildStatus::Prepared);
}

#[test_log::test(tokio::test)]
async fn integration_test_completeness_check_is_idempotent() {
    let project = Project::new();
    let path = project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    std::fs::remove_file(path.join("Dockerfile")).unwrap();
    let tree = project.tree();

    let directories = project.deck.directories();
    let first = directories.validate_completeness(&path).await.unwrap();
    let second = directories.validate_completeness(&path).await.unwrap();

    assert_eq!(first, second);
    assert!(!first.is_complete());
    assert_eq!(first.missing.len(), 1);
    assert_eq!(project.tree(), tree);
}

#[test_log::test(tokio::test)]
async fn integration_test_image_entries_are_immutable() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    let name = project.freeze("api").await;

    let err = project
        .deck
        .directories()
        .write_file(Layer::Images, &name, Path::new("Dockerfile"), "FROM scratch\n")
        .await
        .unwrap_err();
    assert!(matches!(err, DeckError::PermissionViolation(_)));

    let err = project
        .deck
        .promote(Layer::Images, &name)
        .await
        .unwrap_err();
    assert!(matches!(err, DeckError::InvalidPromotion { .. }));
}

#[test_log::test(tokio::test)]
async fn integration_test_incomplete_custom_cannot_be_frozen() {
    let project = Project::new();
    let path = project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    std::fs::remove_file(path.join("docker-compose.yml")).unwrap();

    let err = project.deck.promote(Layer::Custom, "api").await.unwrap_err();
    assert!(matches!(err, DeckError::ResourceIncomplete { name, .. } if name == "api"));
    assert!(project.deck.list(None).await.unwrap().layer(Layer::Images).is_empty());
}

#[test_log::test(tokio::test)]
async fn integration_test_init_then_list_is_empty() {
    let project = Project::new();
    management::initialize(Some(project.dir.path().to_path_buf()))
        .await
        .unwrap();

    assert!(management::is_initialized(project.dir.path()).await);
    assert!(project.deck.list(None).await.unwrap().is_empty());
}
