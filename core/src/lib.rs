//! Asynchronous client core for the task-management REST API.
//!
//! # Overview
//! Turns logical operations ("list the tasks of project X") into HTTP
//! exchanges and decodes typed results. Collections are paginated lazily,
//! event feeds are polled with sync tokens, and transient failures are
//! retried with backoff.
//!
//! # Design
//! - All network I/O crosses the [`Dispatcher`] trait. [`ReqwestDispatcher`]
//!   is the default; tests plug in scripted dispatchers.
//! - [`TaskClient`] owns a private copy of the [`Options`]; every request
//!   copies them again on creation and may override them freely.
//! - One builder type, [`Request`], serves all three request kinds. The kind
//!   marker decides whether the response is an item, a paginated collection
//!   or an event feed.
//! - The library only emits `tracing` events; installing a subscriber is up
//!   to the application.
//!
//! ```no_run
//! # async fn demo() -> taskapi_core::Result<()> {
//! use taskapi_core::TaskClient;
//!
//! let client = TaskClient::bearer("0/123abc")?;
//! let project = client
//!     .projects()
//!     .create_in_workspace("1337")
//!     .with_data("name", "demo project")
//!     .execute()
//!     .await?;
//!
//! let mut tasks = client.projects().tasks(&project.id).with_option("item_limit", 100).paginate();
//! while let Some(task) = tasks.next().await? {
//!     println!("{}", task.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod collection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod http;
pub mod options;
pub mod request;
pub mod resources;
pub mod retry;
pub mod types;

pub use client::{Credential, TaskClient};
pub use collection::{Collection, CollectionEnvelope, NextPage};
pub use dispatcher::{Dispatcher, ReqwestDispatcher, TransportFailure};
pub use error::{Error, Result};
pub use events::{EventBatch, EventStream};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use options::Options;
pub use request::{CollectionRequest, EventsRequest, ItemRequest, Request};
pub use retry::RetryPolicy;
pub use types::{Compact, Event, Project, Tag, Task, Team, User, Webhook, Workspace};
