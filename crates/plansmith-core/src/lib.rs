pub mod completion;
pub mod error;
pub mod gateway;
pub mod generate;
pub mod graph;
pub mod materialize;
pub mod model;
pub mod plan;
pub mod provision;
pub mod sites;

pub use error::{ErrorKind, GatewayError, RemoteFault};
pub use gateway::{Gateway, GroupPlans, NewTask, RetryPolicy};
pub use materialize::{
    BucketConflictPolicy, FailedTask, MaterializationResult, MaterializeOptions, Materializer,
    Outcome,
};
pub use plan::{EventPlan, MalformedPlanError, TaskItem, parse_event_plan};
