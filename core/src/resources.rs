//! Resource facades: one line per endpoint, path template plus verb.

use serde_json::Value;

use crate::client::TaskClient;
use crate::http::HttpMethod;
use crate::request::{CollectionRequest, EventsRequest, ItemRequest};
use crate::types::{Compact, Event, Project, Tag, Task, Team, User, Webhook, Workspace};

macro_rules! facade {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            client: &'a TaskClient,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(client: &'a TaskClient) -> Self {
                Self { client }
            }
        }
    };
}

facade!(Projects);
facade!(Tasks);
facade!(Tags);
facade!(Teams);
facade!(Users);
facade!(Webhooks);
facade!(Workspaces);
facade!(Events);

impl Projects<'_> {
    pub fn create(&self) -> ItemRequest<Project> {
        self.client.item(HttpMethod::Post, "/projects")
    }

    pub fn create_in_workspace(&self, workspace: &str) -> ItemRequest<Project> {
        self.client.item(HttpMethod::Post, format!("/workspaces/{workspace}/projects"))
    }

    pub fn create_in_team(&self, team: &str) -> ItemRequest<Project> {
        self.client.item(HttpMethod::Post, format!("/teams/{team}/projects"))
    }

    pub fn find_by_id(&self, project: &str) -> ItemRequest<Project> {
        self.client.item(HttpMethod::Get, format!("/projects/{project}"))
    }

    pub fn update(&self, project: &str) -> ItemRequest<Project> {
        self.client.item(HttpMethod::Put, format!("/projects/{project}"))
    }

    pub fn delete(&self, project: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Delete, format!("/projects/{project}"))
    }

    pub fn find_all(&self) -> CollectionRequest<Project> {
        self.client.collection("/projects")
    }

    pub fn find_by_workspace(&self, workspace: &str) -> CollectionRequest<Project> {
        self.client.collection(format!("/workspaces/{workspace}/projects"))
    }

    pub fn find_by_team(&self, team: &str) -> CollectionRequest<Project> {
        self.client.collection(format!("/teams/{team}/projects"))
    }

    pub fn tasks(&self, project: &str) -> CollectionRequest<Task> {
        self.client.collection(format!("/projects/{project}/tasks"))
    }
}

impl Tasks<'_> {
    pub fn create(&self) -> ItemRequest<Task> {
        self.client.item(HttpMethod::Post, "/tasks")
    }

    pub fn create_in_workspace(&self, workspace: &str) -> ItemRequest<Task> {
        self.client.item(HttpMethod::Post, format!("/workspaces/{workspace}/tasks"))
    }

    pub fn find_by_id(&self, task: &str) -> ItemRequest<Task> {
        self.client.item(HttpMethod::Get, format!("/tasks/{task}"))
    }

    pub fn update(&self, task: &str) -> ItemRequest<Task> {
        self.client.item(HttpMethod::Put, format!("/tasks/{task}"))
    }

    pub fn delete(&self, task: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Delete, format!("/tasks/{task}"))
    }

    pub fn find_by_project(&self, project: &str) -> CollectionRequest<Task> {
        self.client.collection(format!("/projects/{project}/tasks"))
    }

    pub fn find_by_tag(&self, tag: &str) -> CollectionRequest<Task> {
        self.client.collection(format!("/tags/{tag}/tasks"))
    }

    pub fn find_all(&self) -> CollectionRequest<Task> {
        self.client.collection("/tasks")
    }

    pub fn subtasks(&self, task: &str) -> CollectionRequest<Task> {
        self.client.collection(format!("/tasks/{task}/subtasks"))
    }

    pub fn add_tag(&self, task: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Post, format!("/tasks/{task}/addTag"))
    }
}

impl Tags<'_> {
    pub fn create(&self) -> ItemRequest<Tag> {
        self.client.item(HttpMethod::Post, "/tags")
    }

    pub fn find_by_id(&self, tag: &str) -> ItemRequest<Tag> {
        self.client.item(HttpMethod::Get, format!("/tags/{tag}"))
    }

    pub fn update(&self, tag: &str) -> ItemRequest<Tag> {
        self.client.item(HttpMethod::Put, format!("/tags/{tag}"))
    }

    pub fn delete(&self, tag: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Delete, format!("/tags/{tag}"))
    }

    pub fn find_all(&self) -> CollectionRequest<Tag> {
        self.client.collection("/tags")
    }

    pub fn find_by_workspace(&self, workspace: &str) -> CollectionRequest<Tag> {
        self.client.collection(format!("/workspaces/{workspace}/tags"))
    }
}

impl Teams<'_> {
    pub fn find_by_id(&self, team: &str) -> ItemRequest<Team> {
        self.client.item(HttpMethod::Get, format!("/teams/{team}"))
    }

    pub fn find_by_organization(&self, organization: &str) -> CollectionRequest<Team> {
        self.client.collection(format!("/organizations/{organization}/teams"))
    }

    pub fn users(&self, team: &str) -> CollectionRequest<User> {
        self.client.collection(format!("/teams/{team}/users"))
    }
}

impl Users<'_> {
    pub fn me(&self) -> ItemRequest<User> {
        self.client.item(HttpMethod::Get, "/users/me")
    }

    pub fn find_by_id(&self, user: &str) -> ItemRequest<User> {
        self.client.item(HttpMethod::Get, format!("/users/{user}"))
    }

    pub fn find_all(&self) -> CollectionRequest<User> {
        self.client.collection("/users")
    }

    pub fn find_by_workspace(&self, workspace: &str) -> CollectionRequest<User> {
        self.client.collection(format!("/workspaces/{workspace}/users"))
    }
}

impl Webhooks<'_> {
    pub fn create(&self) -> ItemRequest<Webhook> {
        self.client.item(HttpMethod::Post, "/webhooks")
    }

    pub fn get_all(&self) -> CollectionRequest<Webhook> {
        self.client.collection("/webhooks")
    }

    pub fn get_by_id(&self, webhook: &str) -> ItemRequest<Webhook> {
        self.client.item(HttpMethod::Get, format!("/webhooks/{webhook}"))
    }

    pub fn delete_by_id(&self, webhook: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Delete, format!("/webhooks/{webhook}"))
    }
}

impl Workspaces<'_> {
    pub fn find_by_id(&self, workspace: &str) -> ItemRequest<Workspace> {
        self.client.item(HttpMethod::Get, format!("/workspaces/{workspace}"))
    }

    pub fn find_all(&self) -> CollectionRequest<Workspace> {
        self.client.collection("/workspaces")
    }

    pub fn update(&self, workspace: &str) -> ItemRequest<Workspace> {
        self.client.item(HttpMethod::Put, format!("/workspaces/{workspace}"))
    }

    /// Name search; set `type` and `query` with `with_query`.
    pub fn typeahead(&self, workspace: &str) -> CollectionRequest<Compact> {
        self.client.collection(format!("/workspaces/{workspace}/typeahead"))
    }

    pub fn add_user(&self, workspace: &str) -> ItemRequest<User> {
        self.client.item(HttpMethod::Post, format!("/workspaces/{workspace}/addUser"))
    }

    pub fn remove_user(&self, workspace: &str) -> ItemRequest<Value> {
        self.client.item(HttpMethod::Post, format!("/workspaces/{workspace}/removeUser"))
    }
}

impl Events<'_> {
    pub fn for_resource(&self, resource: &str) -> EventsRequest<Event> {
        self.client.events(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, TransportFailure};
    use crate::http::{HttpRequest, HttpResponse};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl Dispatcher for Offline {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
            Err(TransportFailure::new("offline"))
        }
    }

    #[test]
    fn facades_fill_path_and_verb() {
        let client = TaskClient::with_dispatcher(Offline);
        let create = client.projects().create_in_team("7");
        assert_eq!(create.path(), "/teams/7/projects");
        assert_eq!(create.method(), HttpMethod::Post);

        let tasks = client.tasks().find_by_project("9");
        assert_eq!(tasks.path(), "/projects/9/tasks");
        assert_eq!(tasks.method(), HttpMethod::Get);

        let delete = client.webhooks().delete_by_id("3");
        assert_eq!(delete.method(), HttpMethod::Delete);

        let typeahead = client.workspaces().typeahead("11");
        assert_eq!(typeahead.path(), "/workspaces/11/typeahead");
        let add_user = client.workspaces().add_user("11").with_data("user", "me");
        assert_eq!(add_user.method(), HttpMethod::Post);
        assert_eq!(add_user.path(), "/workspaces/11/addUser");

        let feed = client.event_feeds().for_resource("5");
        assert_eq!(feed.path(), "/events");
    }
}
