use deck::{
    cleanup::{CleaningKind, CleaningOption, CleaningPlan},
    engine::{ContainerStatus, EngineCall},
    resources::Layer,
};
use tokio_util::sync::CancellationToken;

use super::Project;

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn options(plan: CleaningPlan) -> Vec<CleaningOption> {
    match plan {
        CleaningPlan::Options(options) => options,
        CleaningPlan::Refused { reason, .. } => panic!("unexpected refusal: {}", reason),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn integration_test_cascade_removes_containers_before_image() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "nodejs-app", "DEV_PORT=3000\n");
    let name = project.freeze("nodejs-app").await;
    let image_ref = project.add_built_image(&name);
    let dev = format!("{}-dev", name);
    let test = format!("{}-test", name);
    project.add_container(&dev, ContainerStatus::Running, &image_ref);
    project.add_container(&test, ContainerStatus::Stopped, &image_ref);

    let cleaner = project.deck.cleaner();
    let options = options(
        cleaner
            .compute_cleaning_options(Layer::Images, &name)
            .await
            .unwrap(),
    );
    let standard = options
        .iter()
        .find(|o| o.kind == CleaningKind::Standard)
        .unwrap();
    assert!(standard.recommended);
    assert_eq!(standard.containers, vec![dev.clone(), test.clone()]);
    assert_eq!(standard.image_ref.as_deref(), Some(image_ref.as_str()));

    project.engine.clear_calls();
    let confirmed = std::sync::Mutex::new(String::new());
    let confirm = |message: &str| {
        *confirmed.lock().unwrap() = message.to_string();
        true
    };
    let result = cleaner
        .execute(standard, &confirm, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success, "{}", result.message);
    assert_eq!(
        project.engine.mutating_calls(),
        vec![
            EngineCall::RemoveContainer(dev.clone()),
            EngineCall::RemoveContainer(test.clone()),
            EngineCall::RemoveImage(image_ref.clone()),
        ]
    );
    assert_eq!(
        result.cleaned_resources,
        vec![
            format!("container {}", dev),
            format!("container {}", test),
            format!("image {}", image_ref),
            format!("directory images/{}", name),
        ]
    );
    assert!(result.skipped_resources.is_empty());

    let summary = confirmed.lock().unwrap().clone();
    assert!(summary.contains(&dev) && summary.contains(&test) && summary.contains(&image_ref));

    assert!(project.engine.containers().is_empty());
    assert!(project.engine.images().is_empty());
    assert!(!project.deck.directories().entry_path(Layer::Images, &name).exists());
}

#[test_log::test(tokio::test)]
async fn integration_test_production_guard_deletes_nothing() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "shop", "DEV_PORT=3000\n");
    let name = project.freeze("shop").await;
    let image_ref = project.add_built_image(&name);
    project.add_container(&format!("{}-dev", name), ContainerStatus::Running, &image_ref);

    // Computed while no production container existed.
    let cleaner = project.deck.cleaner();
    let stale = options(
        cleaner
            .compute_cleaning_options(Layer::Images, &name)
            .await
            .unwrap(),
    )
    .into_iter()
    .find(|o| o.kind == CleaningKind::Standard)
    .unwrap();

    let prod = format!("{}-prod", name);
    project.add_container(&prod, ContainerStatus::Stopped, &image_ref);

    match cleaner
        .compute_cleaning_options(Layer::Images, &name)
        .await
        .unwrap()
    {
        CleaningPlan::Refused {
            production_container,
            hints,
            ..
        } => {
            assert_eq!(production_container.as_deref(), Some(prod.as_str()));
            assert!(hints.contains(&format!("podman ps --all --filter name={}", prod)));
        }
        CleaningPlan::Options(options) => panic!("expected a refusal, got {:?}", options),
    }

    project.engine.clear_calls();
    let result = cleaner
        .execute(&stale, &|_: &str| true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.refused);
    assert!(!result.success);
    assert!(result.cleaned_resources.is_empty());
    assert!(result.message.contains(&prod));
    assert!(project.engine.mutating_calls().is_empty());
    assert_eq!(project.engine.containers().len(), 2);
    assert_eq!(project.engine.images().len(), 1);
    assert!(project.deck.directories().entry_path(Layer::Images, &name).exists());
}

#[test_log::test(tokio::test)]
async fn integration_test_custom_cleanup_keeps_containers_by_default() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    project.add_container("api-dev", ContainerStatus::Running, "docker.io/library/node:20");

    let cleaner = project.deck.cleaner();
    let options = options(
        cleaner
            .compute_cleaning_options(Layer::Custom, "api")
            .await
            .unwrap(),
    );
    let kinds: Vec<CleaningKind> = options.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        [CleaningKind::DirectoryOnly, CleaningKind::DirectoryAndContainers]
    );
    assert!(options[0].recommended);

    let result = cleaner
        .execute(&options[0], &|_: &str| true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.cleaned_resources, vec!["directory custom/api".to_string()]);
    assert_eq!(project.engine.containers().len(), 1);
    assert!(!project.deck.directories().entry_path(Layer::Custom, "api").exists());
}

#[test_log::test(tokio::test)]
async fn integration_test_templates_are_never_cleaned() {
    let project = Project::new();
    project.write_entry(Layer::Templates, "nodejs", "DEV_PORT=3000\n");

    let plan = project
        .deck
        .cleaner()
        .compute_cleaning_options(Layer::Templates, "nodejs")
        .await
        .unwrap();

    assert!(matches!(plan, CleaningPlan::Refused { .. }));
    assert!(project.deck.directories().entry_path(Layer::Templates, "nodejs").exists());
}

#[test_log::test(tokio::test)]
async fn integration_test_custom_cleanup_spares_production_container() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    project.add_container("api-dev", ContainerStatus::Running, "docker.io/library/node:20");

    // Computed before the production container existed.
    let cleaner = project.deck.cleaner();
    let stale = options(
        cleaner
            .compute_cleaning_options(Layer::Custom, "api")
            .await
            .unwrap(),
    )
    .into_iter()
    .find(|o| o.kind == CleaningKind::DirectoryAndContainers)
    .unwrap();

    project.add_container("api-prod", ContainerStatus::Running, "docker.io/library/node:20");

    match cleaner
        .compute_cleaning_options(Layer::Custom, "api")
        .await
        .unwrap()
    {
        CleaningPlan::Refused {
            production_container,
            ..
        } => assert_eq!(production_container.as_deref(), Some("api-prod")),
        CleaningPlan::Options(options) => panic!("expected a refusal, got {:?}", options),
    }

    project.engine.clear_calls();
    let result = cleaner
        .execute(&stale, &|_: &str| true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.refused);
    assert!(result.cleaned_resources.is_empty());
    assert!(result.message.contains("api-prod"));
    assert!(project.engine.mutating_calls().is_empty());
    assert_eq!(project.engine.containers().len(), 2);
    assert!(project.deck.directories().entry_path(Layer::Custom, "api").exists());
}
