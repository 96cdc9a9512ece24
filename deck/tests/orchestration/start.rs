use deck::{
    engine::{ContainerStatus, EngineCall},
    lifecycle::{ChannelProgress, ProgressEvent, StartAction, TracingProgress},
    ports::{FixturePortProbe, ProcessInfo},
    resources::{BuildStatus, Layer},
};
use tokio_util::sync::CancellationToken;

use super::Project;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn integration_test_rebuild_creates_dev_container() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "nodejs-app", "DEV_PORT=3000\nDEBUG_PORT=9229\n");
    let name = project.freeze("nodejs-app").await;
    assert_eq!(name, "nodejs-app-20250121-1430");

    let (progress, mut events) = ChannelProgress::new();
    let outcome = project
        .deck
        .starter()
        .smart_start(&name, &progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.action, StartAction::Rebuild);
    assert!(outcome.report.success, "{}", outcome.report.message);
    assert_eq!(outcome.container.as_deref(), Some("nodejs-app-20250121-1430-dev"));
    assert_eq!(project.builder.builds(), vec![name.clone()]);

    let container = project
        .engine
        .containers()
        .into_iter()
        .find(|c| c.name == "nodejs-app-20250121-1430-dev")
        .unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
    assert!(container.ports.contains(&"3000->3000/tcp".to_string()));
    assert!(container.ports.contains(&"9229->9229/tcp".to_string()));

    let metadata = project
        .deck
        .directories()
        .read_metadata(&name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.get_build_status(), &BuildStatus::Built);
    assert!(metadata.get_last_started().is_some());

    let mut received: Vec<ProgressEvent> = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    let steps: Vec<usize> = received.iter().map(|e| e.step).collect();
    assert_eq!(steps, [1, 2, 3, 4, 5]);
    assert!(received.iter().all(|e| e.total == 5));
}

#[test_log::test(tokio::test)]
async fn integration_test_stopped_container_port_conflict() {
    let node = ProcessInfo::new(1234, "node");
    let project = Project::with_probe(FixturePortProbe::default().occupy(3000, Some(node.clone())));
    project.write_entry(Layer::Custom, "nodejs-app", "DEV_PORT=3000\n");
    let name = project.freeze("nodejs-app").await;
    let image_ref = project.add_built_image(&name);
    let container = format!("{}-dev", name);
    project.add_container(&container, ContainerStatus::Stopped, &image_ref);
    project.engine.clear_calls();

    let outcome = project
        .deck
        .starter()
        .smart_start(&name, &TracingProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome.action, StartAction::Restart { .. }));
    assert!(!outcome.report.success);
    assert!(outcome.report.message.contains("port 3000"));
    assert!(outcome
        .report
        .hints
        .iter()
        .any(|h| h.contains("PID 1234") && h.contains("'node'")));
    assert!(outcome.report.hints.contains(&node.stop_command));

    let check = &outcome.port_checks[0];
    assert_eq!(check.port, 3000);
    assert_eq!(check.occupying_process.as_ref().map(|p| p.pid), Some(1234));
    assert_eq!(check.suggested_port, Some(3001));

    assert!(project.engine.mutating_calls().is_empty());
    let stored = project.engine.containers();
    assert_eq!(stored[0].status, ContainerStatus::Stopped);
}

#[test_log::test(tokio::test)]
async fn integration_test_create_publishes_substitute_port() {
    let project = Project::with_probe(FixturePortProbe::default().occupy(3000, None));
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    let name = project.freeze("api").await;
    project.add_built_image(&name);

    let outcome = project
        .deck
        .starter()
        .smart_start(&name, &TracingProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome.action, StartAction::Create { .. }));
    assert!(outcome.report.success, "{}", outcome.report.message);
    assert!(outcome
        .report
        .hints
        .contains(&"DEV_PORT 3000 is taken, published on host port 3001".to_string()));

    let container = &project.engine.containers()[0];
    assert_eq!(container.name, format!("{}-dev", name));
    assert_eq!(container.ports, vec!["3001->3000/tcp".to_string()]);
    assert!(project.builder.builds().is_empty());
}

#[test_log::test(tokio::test)]
async fn integration_test_running_container_is_attached() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    let name = project.freeze("api").await;
    let image_ref = project.add_built_image(&name);
    project.add_container(&format!("{}-dev", name), ContainerStatus::Running, &image_ref);
    project.engine.clear_calls();

    let outcome = project
        .deck
        .starter()
        .smart_start(&name, &TracingProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome.action, StartAction::Attach { .. }));
    assert!(outcome.report.success);
    assert!(project.engine.mutating_calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn integration_test_failed_build_is_recorded() {
    let project = Project::with_failing_build("npm ERR! missing script: build");
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    let name = project.freeze("api").await;

    let outcome = project
        .deck
        .starter()
        .smart_start(&name, &TracingProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.action, StartAction::Rebuild);
    assert!(!outcome.report.success);
    assert!(outcome.report.message.contains("npm ERR! missing script: build"));
    assert!(project.engine.containers().is_empty());

    let metadata = project
        .deck
        .directories()
        .read_metadata(&name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.get_build_status(), &BuildStatus::Failed);
    assert!(metadata.get_last_started().is_none());
}

#[test_log::test(tokio::test)]
async fn integration_test_stop_then_restart() {
    let project = Project::new();
    project.write_entry(Layer::Custom, "api", "DEV_PORT=3000\n");
    let name = project.freeze("api").await;
    let image_ref = project.add_built_image(&name);
    let container = format!("{}-dev", name);
    project.add_container(&container, ContainerStatus::Running, &image_ref);
    let cancel = CancellationToken::new();

    let report = project.deck.starter().stop(&name, &cancel).await.unwrap();
    assert!(report.success, "{}", report.message);
    assert_eq!(project.engine.containers()[0].status, ContainerStatus::Stopped);

    let outcome = project
        .deck
        .starter()
        .restart(&name, &TracingProgress, &cancel)
        .await
        .unwrap();
    assert!(outcome.report.success, "{}", outcome.report.message);
    assert_eq!(project.engine.containers()[0].status, ContainerStatus::Running);
    assert!(project
        .engine
        .calls()
        .contains(&EngineCall::Start(container)));
}
