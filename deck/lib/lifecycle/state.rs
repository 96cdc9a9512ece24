use serde::{Deserialize, Serialize};

use crate::engine::{ContainerRecord, ContainerStatus, EngineKind, ImageRecord};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What smart start does for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartAction {
    /// The container is running. Nothing to do.
    Attach {
        /// The running container.
        container: String,
    },

    /// The container exists but isn't running. Check ports, then start it.
    Restart {
        /// The stopped or created container.
        container: String,
    },

    /// The container is paused. Resume it.
    Unpause {
        /// The paused container.
        container: String,
    },

    /// No container, but the image exists. Create a container from it.
    Create {
        /// The image to run.
        image_ref: String,
    },

    /// Neither container nor image. Build the image, then create a container.
    Rebuild,

    /// The container is in a state smart start won't touch.
    Refuse {
        /// The container.
        container: String,

        /// Its state.
        status: ContainerStatus,

        /// A command that gets the user unstuck.
        hint: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StartAction {
    /// The number of progress steps the action takes.
    pub fn total_steps(&self) -> usize {
        match self {
            Self::Refuse { .. } => 1,
            Self::Attach { .. } | Self::Unpause { .. } => 2,
            Self::Restart { .. } => 3,
            Self::Create { .. } => 4,
            Self::Rebuild => 5,
        }
    }

    /// A short name for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Attach { .. } => "attach",
            Self::Restart { .. } => "restart",
            Self::Unpause { .. } => "unpause",
            Self::Create { .. } => "create",
            Self::Rebuild => "rebuild",
            Self::Refuse { .. } => "refuse",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Finds the container smart start works with: the exact entry name, else `{name}-{env}`.
pub fn find_entry_container<'a>(
    name: &str,
    default_env: &str,
    containers: &'a [ContainerRecord],
) -> Option<&'a ContainerRecord> {
    let suffixed = format!("{}-{}", name, default_env);
    containers
        .iter()
        .find(|c| c.name == name)
        .or_else(|| containers.iter().find(|c| c.name == suffixed))
}

/// Finds the engine image built for an entry.
pub fn find_entry_image<'a>(name: &str, images: &'a [ImageRecord]) -> Option<&'a ImageRecord> {
    images.iter().find(|image| image.reference_named(name).is_some())
}

/// Decides what smart start does, given what the engine reports.
pub fn decide(
    kind: EngineKind,
    container: Option<&ContainerRecord>,
    image: Option<&ImageRecord>,
    entry_name: &str,
) -> StartAction {
    let Some(container) = container else {
        return match image {
            Some(image) => StartAction::Create {
                image_ref: image
                    .reference_named(entry_name)
                    .unwrap_or(image.display_ref())
                    .to_string(),
            },
            None => StartAction::Rebuild,
        };
    };

    let name = container.name.clone();
    match container.status {
        ContainerStatus::Running => StartAction::Attach { container: name },
        ContainerStatus::Created | ContainerStatus::Stopped => StartAction::Restart { container: name },
        ContainerStatus::Paused => StartAction::Unpause { container: name },
        status => {
            let hint = match status {
                ContainerStatus::Dead => kind.command_hint(&["rm", "--force", &name]),
                ContainerStatus::Restarting => kind.command_hint(&["stop", &name]),
                ContainerStatus::Removing => kind.command_hint(&["ps", "--all", "--filter", &format!("name={}", name)]),
                _ => kind.command_hint(&["inspect", &name]),
            };
            StartAction::Refuse {
                container: name,
                status,
                hint,
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, status: ContainerStatus) -> ContainerRecord {
        ContainerRecord::builder()
            .id(format!("id-{}", name))
            .name(name)
            .status(status)
            .image_ref("localhost/app-20250121-1430:latest")
            .build()
    }

    fn image() -> ImageRecord {
        ImageRecord::builder()
            .id("sha256:1")
            .references(vec!["localhost/app-20250121-1430:latest".to_string()])
            .build()
    }

    #[test]
    fn test_find_entry_container_prefers_exact_name() {
        let containers = vec![
            container("app-20250121-1430-dev", ContainerStatus::Running),
            container("app-20250121-1430", ContainerStatus::Stopped),
        ];
        let found = find_entry_container("app-20250121-1430", "dev", &containers).unwrap();
        assert_eq!(found.name, "app-20250121-1430");

        let found = find_entry_container("app-20250121-1430", "dev", &containers[..1]).unwrap();
        assert_eq!(found.name, "app-20250121-1430-dev");

        let test_only = vec![container("app-20250121-1430-test", ContainerStatus::Running)];
        assert!(find_entry_container("app-20250121-1430", "dev", &test_only).is_none());
    }

    #[test]
    fn test_decide_each_state() {
        let kind = EngineKind::Podman;
        let name = "app-20250121-1430";
        let image = image();

        let running = container("app-20250121-1430-dev", ContainerStatus::Running);
        assert!(matches!(decide(kind, Some(&running), None, name), StartAction::Attach { .. }));

        let stopped = container("app-20250121-1430-dev", ContainerStatus::Stopped);
        assert!(matches!(decide(kind, Some(&stopped), Some(&image), name), StartAction::Restart { .. }));

        let created = container("app-20250121-1430-dev", ContainerStatus::Created);
        assert!(matches!(decide(kind, Some(&created), None, name), StartAction::Restart { .. }));

        let paused = container("app-20250121-1430-dev", ContainerStatus::Paused);
        assert!(matches!(decide(kind, Some(&paused), None, name), StartAction::Unpause { .. }));

        assert_eq!(
            decide(kind, None, Some(&image), name),
            StartAction::Create {
                image_ref: "localhost/app-20250121-1430:latest".to_string()
            }
        );
        assert_eq!(decide(kind, None, None, name), StartAction::Rebuild);
    }

    #[test]
    fn test_decide_refuses_dead_container_with_hint() {
        let dead = container("app-20250121-1430-dev", ContainerStatus::Dead);
        let action = decide(EngineKind::Docker, Some(&dead), None, "app-20250121-1430");
        assert_eq!(
            action,
            StartAction::Refuse {
                container: "app-20250121-1430-dev".to_string(),
                status: ContainerStatus::Dead,
                hint: "docker rm --force app-20250121-1430-dev".to_string(),
            }
        );
        assert_eq!(action.total_steps(), 1);
    }
}
