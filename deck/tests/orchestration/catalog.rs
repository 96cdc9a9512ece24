use deck::{
    catalog::ResourceStatus,
    engine::{ContainerStatus, EngineCall},
    resources::Layer,
    DeckError,
};

use super::Project;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn integration_test_catalog_reads_without_side_effects() {
    let project = Project::new();
    project.write_entry(Layer::Templates, "nodejs", "DEV_PORT=3000\n");
    project.write_entry(Layer::Custom, "nodejs-app", "DEV_PORT=3000\n");
    let name = project.freeze("nodejs-app").await;
    let image_ref = project.add_built_image(&name);
    let dev = format!("{}-dev", name);
    project.add_container(&dev, ContainerStatus::Running, &image_ref);

    let tree = project.tree();
    project.engine.clear_calls();

    let first = project.deck.list(None).await.unwrap();
    let second = project.deck.list(None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(project.tree(), tree);
    assert!(project.engine.mutating_calls().is_empty());

    let image = first.find(Layer::Images, &name).unwrap();
    assert_eq!(image.status, ResourceStatus::Running);
    assert_eq!(image.related_image_ref.as_deref(), Some(image_ref.as_str()));
    assert_eq!(image.related_container_names, vec![dev.clone()]);

    let custom = first.find(Layer::Custom, "nodejs-app").unwrap();
    assert_eq!(custom.status, ResourceStatus::Ready);
    assert!(custom.related_container_names.is_empty());

    let template = first.find(Layer::Templates, "nodejs").unwrap();
    assert_eq!(template.status, ResourceStatus::Ready);
    assert!(template.is_available);

    let relationship = first.relationship(&name).unwrap();
    assert_eq!(relationship.container_names, vec![dev]);
}

#[test_log::test(tokio::test)]
async fn integration_test_incomplete_entry_is_unavailable() {
    let project = Project::new();
    let path = project.deck.directories().entry_path(Layer::Custom, "broken");
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join(".env"), "DEV_PORT=3000\n").unwrap();

    let catalog = project.deck.list(None).await.unwrap();
    let broken = catalog.find(Layer::Custom, "broken").unwrap();

    assert_eq!(broken.status, ResourceStatus::Unavailable);
    assert!(!broken.is_available);
    let reason = broken.unavailable_reason.as_deref().unwrap();
    assert!(reason.contains("compose file"));
    assert!(reason.contains("build file"));
}

#[test_log::test(tokio::test)]
async fn integration_test_stopped_and_built_states() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    project.write_entry(Layer::Custom, "web", "WEB_PORT=8080\n");
    let api = project.freeze("api").await;
    let web = project.freeze("web").await;
    let api_ref = project.add_built_image(&api);
    project.add_built_image(&web);
    project.add_container(&format!("{}-test", api), ContainerStatus::Stopped, &api_ref);

    let catalog = project.deck.list(None).await.unwrap();

    assert_eq!(catalog.find(Layer::Images, &api).unwrap().status, ResourceStatus::Stopped);
    assert_eq!(catalog.find(Layer::Images, &web).unwrap().status, ResourceStatus::ImageBuilt);
}

#[test_log::test(tokio::test)]
async fn integration_test_engine_failure_is_reported() {
    let project = Project::new();
    project.write_entry(Layer::Templates, "nodejs", "DEV_PORT=3000\n");
    project
        .engine
        .fail_on(EngineCall::ListContainers, "cannot connect to podman socket");

    let err = project.deck.list(None).await.unwrap_err();
    assert!(matches!(err, DeckError::Engine { diagnostic, .. } if diagnostic.contains("cannot connect")));
}
