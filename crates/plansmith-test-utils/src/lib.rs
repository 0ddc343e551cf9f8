//! Shared test doubles for plansmith tests.
//!
//! - [`FakeGateway`]: an in-memory remote task service that records every
//!   call in order and fails on demand.
//! - [`ScriptedGenerator`]: a text generator that replays canned responses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use plansmith_core::error::{ErrorKind, GatewayError};
use plansmith_core::gateway::{Gateway, NewTask};
use plansmith_core::generate::{GenerateError, TextGenerator};
use plansmith_core::model::{Group, RemoteBucket, RemotePlan, RemoteTask, Site, User};

// ---------------------------------------------------------------------------
// FakeGateway
// ---------------------------------------------------------------------------

/// Gateway operations, used to target scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindUser,
    CreateGroup,
    AddMember,
    ListGroups,
    CreatePlan,
    ListGroupPlans,
    CreateBucket,
    ListPlanBuckets,
    CreateTask,
    GetTask,
    ListBucketTasks,
    UpdateTaskCompletion,
    ListSites,
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindUser(String),
    CreateGroup(String),
    AddMember { group_id: String, user_id: String },
    ListGroups,
    CreatePlan { title: String, owner: String },
    ListGroupPlans(String),
    CreateBucket { plan_id: String, name: String },
    ListPlanBuckets(String),
    CreateTask { bucket_id: String, title: String },
    GetTask(String),
    ListBucketTasks(String),
    UpdateTaskCompletion { task_id: String, percent: u8 },
    ListSites,
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::FindUser(_) => Op::FindUser,
            Call::CreateGroup(_) => Op::CreateGroup,
            Call::AddMember { .. } => Op::AddMember,
            Call::ListGroups => Op::ListGroups,
            Call::CreatePlan { .. } => Op::CreatePlan,
            Call::ListGroupPlans(_) => Op::ListGroupPlans,
            Call::CreateBucket { .. } => Op::CreateBucket,
            Call::ListPlanBuckets(_) => Op::ListPlanBuckets,
            Call::CreateTask { .. } => Op::CreateTask,
            Call::GetTask(_) => Op::GetTask,
            Call::ListBucketTasks(_) => Op::ListBucketTasks,
            Call::UpdateTaskCompletion { .. } => Op::UpdateTaskCompletion,
            Call::ListSites => Op::ListSites,
        }
    }
}

/// Shorthand for a classified remote error.
pub fn fault(kind: ErrorKind) -> GatewayError {
    GatewayError::remote(kind, format!("scripted {kind} failure"))
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    /// One-shot failures returned before the call takes effect.
    fail_next: HashMap<Op, VecDeque<GatewayError>>,
    /// One-shot failures returned after the call took effect.
    lose_next: HashMap<Op, VecDeque<GatewayError>>,
    fail_always: HashMap<Op, GatewayError>,
    group_plan_failures: HashMap<String, GatewayError>,

    users: Vec<User>,
    groups: Vec<Group>,
    members: Vec<(String, String)>,
    plans: Vec<RemotePlan>,
    buckets: Vec<RemoteBucket>,
    tasks: Vec<RemoteTask>,
    sites: Vec<Site>,
    next_id: u64,

    cancel_after_creates: Option<(usize, CancellationToken)>,
    successful_creates: usize,
    in_flight_creates: usize,
    max_in_flight_creates: usize,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn next_etag(&mut self) -> String {
        self.next_id += 1;
        format!("W/\"v{}\"", self.next_id)
    }

    fn take_failure(&mut self, op: Op) -> Option<GatewayError> {
        if let Some(err) = self.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Some(err);
        }
        self.fail_always.get(&op).cloned()
    }

    fn take_lost_response(&mut self, op: Op) -> Option<GatewayError> {
        self.lose_next.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

/// In-memory [`Gateway`] that records calls and applies them to local state.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, so overlapping calls would be visible.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Record `call` and return any scripted pre-failure.
    fn begin(&self, call: Call) -> Result<(), GatewayError> {
        let op = call.op();
        let mut state = self.state();
        state.calls.push(call);
        match state.take_failure(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn finish<T>(&self, op: Op, value: T) -> Result<T, GatewayError> {
        match self.state().take_lost_response(op) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    // -- scripting -----------------------------------------------------------

    /// Fail the next call of `op` with `err`, before it takes effect.
    /// Repeated calls queue failures in order.
    pub fn fail_next(&self, op: Op, err: GatewayError) -> &Self {
        self.state().fail_next.entry(op).or_default().push_back(err);
        self
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail_times(&self, op: Op, times: usize, err: GatewayError) -> &Self {
        for _ in 0..times {
            self.fail_next(op, err.clone());
        }
        self
    }

    /// Fail every call of `op`.
    pub fn fail_always(&self, op: Op, err: GatewayError) -> &Self {
        self.state().fail_always.insert(op, err);
        self
    }

    /// Apply the next call of `op` but report `err`, as when the response
    /// is lost after the service committed the change.
    pub fn lose_next_response(&self, op: Op, err: GatewayError) -> &Self {
        self.state().lose_next.entry(op).or_default().push_back(err);
        self
    }

    /// Fail plan listing for one group only.
    pub fn fail_group_plans(&self, group_id: &str, err: GatewayError) -> &Self {
        self.state()
            .group_plan_failures
            .insert(group_id.to_string(), err);
        self
    }

    /// Cancel `token` once `creates` tasks have been created.
    pub fn cancel_after_creates(&self, creates: usize, token: CancellationToken) -> &Self {
        self.state().cancel_after_creates = Some((creates, token));
        self
    }

    // -- seeding -------------------------------------------------------------

    pub fn add_user(&self, principal_name: &str, display_name: &str) -> User {
        let mut state = self.state();
        let user = User {
            id: state.next_id("user"),
            display_name: Some(display_name.to_string()),
            user_principal_name: Some(principal_name.to_string()),
            mail: Some(principal_name.to_string()),
        };
        state.users.push(user.clone());
        user
    }

    pub fn add_group(&self, name: &str) -> Group {
        let mut state = self.state();
        let group = Group {
            id: state.next_id("group"),
            display_name: Some(name.to_string()),
            description: None,
            mail_nickname: None,
        };
        state.groups.push(group.clone());
        group
    }

    pub fn add_plan(&self, owner_group_id: &str, title: &str) -> RemotePlan {
        let mut state = self.state();
        let plan = RemotePlan {
            id: state.next_id("plan"),
            title: Some(title.to_string()),
            owner: Some(owner_group_id.to_string()),
        };
        state.plans.push(plan.clone());
        plan
    }

    pub fn add_bucket(&self, plan_id: &str, name: &str) -> RemoteBucket {
        let mut state = self.state();
        let bucket = RemoteBucket {
            id: state.next_id("bucket"),
            name: name.to_string(),
            plan_id: plan_id.to_string(),
        };
        state.buckets.push(bucket.clone());
        bucket
    }

    pub fn add_task(&self, bucket_id: &str, title: &str, percent: Option<u8>) -> RemoteTask {
        let mut state = self.state();
        let plan_id = state
            .buckets
            .iter()
            .find(|b| b.id == bucket_id)
            .map(|b| b.plan_id.clone())
            .unwrap_or_default();
        let task = RemoteTask {
            id: state.next_id("task"),
            plan_id,
            bucket_id: Some(bucket_id.to_string()),
            title: title.to_string(),
            percent_complete: percent,
            due_date_time: None,
            etag: Some(state.next_etag()),
        };
        state.tasks.push(task.clone());
        task
    }

    pub fn add_site(&self, site: Site) {
        self.state().sites.push(site);
    }

    /// Simulate another writer touching the task: bumps its version token.
    pub fn touch_task(&self, task_id: &str) {
        let mut state = self.state();
        let etag = state.next_etag();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) {
            task.etag = Some(etag);
        }
    }

    // -- inspection ----------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Titles of every `create_task` call, in call order, including failures.
    pub fn create_task_titles(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateTask { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn buckets(&self) -> Vec<RemoteBucket> {
        self.state().buckets.clone()
    }

    pub fn tasks_in(&self, bucket_id: &str) -> Vec<RemoteTask> {
        self.state()
            .tasks
            .iter()
            .filter(|t| t.bucket_id.as_deref() == Some(bucket_id))
            .cloned()
            .collect()
    }

    pub fn task(&self, task_id: &str) -> Option<RemoteTask> {
        self.state().tasks.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn members_of(&self, group_id: &str) -> Vec<String> {
        self.state()
            .members
            .iter()
            .filter(|(g, _)| g == group_id)
            .map(|(_, u)| u.clone())
            .collect()
    }

    pub fn plans(&self) -> Vec<RemotePlan> {
        self.state().plans.clone()
    }

    /// Highest number of `create_task` calls observed in flight at once.
    pub fn max_concurrent_creates(&self) -> usize {
        self.state().max_in_flight_creates
    }
}

fn not_found(what: &str, id: &str) -> GatewayError {
    GatewayError::remote(ErrorKind::NotFound, format!("{what} {id} not found"))
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn find_user(&self, principal_name: &str) -> Result<Option<User>, GatewayError> {
        self.begin(Call::FindUser(principal_name.to_string()))?;
        self.simulate_latency().await;
        let user = self
            .state()
            .users
            .iter()
            .find(|u| u.user_principal_name.as_deref() == Some(principal_name))
            .cloned();
        self.finish(Op::FindUser, user)
    }

    async fn create_group(&self, name: &str, description: &str) -> Result<Group, GatewayError> {
        self.begin(Call::CreateGroup(name.to_string()))?;
        self.simulate_latency().await;
        let group = {
            let mut state = self.state();
            if state
                .groups
                .iter()
                .any(|g| g.display_name.as_deref() == Some(name))
            {
                return Err(GatewayError::remote(
                    ErrorKind::Conflict,
                    format!("group {name} already exists"),
                ));
            }
            let group = Group {
                id: state.next_id("group"),
                display_name: Some(name.to_string()),
                description: Some(description.to_string()),
                mail_nickname: None,
            };
            state.groups.push(group.clone());
            group
        };
        self.finish(Op::CreateGroup, group)
    }

    async fn add_member(&self, group_id: &str, user_id: &str) -> Result<(), GatewayError> {
        self.begin(Call::AddMember {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        self.simulate_latency().await;
        {
            let mut state = self.state();
            if !state.groups.iter().any(|g| g.id == group_id) {
                return Err(not_found("group", group_id));
            }
            let entry = (group_id.to_string(), user_id.to_string());
            if !state.members.contains(&entry) {
                state.members.push(entry);
            }
        }
        self.finish(Op::AddMember, ())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, GatewayError> {
        self.begin(Call::ListGroups)?;
        self.simulate_latency().await;
        let groups = self.state().groups.clone();
        self.finish(Op::ListGroups, groups)
    }

    async fn create_plan(
        &self,
        title: &str,
        owner_group_id: &str,
    ) -> Result<RemotePlan, GatewayError> {
        self.begin(Call::CreatePlan {
            title: title.to_string(),
            owner: owner_group_id.to_string(),
        })?;
        self.simulate_latency().await;
        if !self.state().groups.iter().any(|g| g.id == owner_group_id) {
            return Err(not_found("group", owner_group_id));
        }
        let plan = self.add_plan(owner_group_id, title);
        self.finish(Op::CreatePlan, plan)
    }

    async fn list_group_plans(&self, group_id: &str) -> Result<Vec<RemotePlan>, GatewayError> {
        self.begin(Call::ListGroupPlans(group_id.to_string()))?;
        self.simulate_latency().await;
        let plans = {
            let state = self.state();
            if let Some(err) = state.group_plan_failures.get(group_id) {
                return Err(err.clone());
            }
            state
                .plans
                .iter()
                .filter(|p| p.owner.as_deref() == Some(group_id))
                .cloned()
                .collect()
        };
        self.finish(Op::ListGroupPlans, plans)
    }

    async fn create_bucket(&self, plan_id: &str, name: &str) -> Result<RemoteBucket, GatewayError> {
        self.begin(Call::CreateBucket {
            plan_id: plan_id.to_string(),
            name: name.to_string(),
        })?;
        self.simulate_latency().await;
        let taken = self
            .state()
            .buckets
            .iter()
            .any(|b| b.plan_id == plan_id && b.name == name);
        if taken {
            return Err(GatewayError::remote(
                ErrorKind::Conflict,
                format!("bucket {name} already exists"),
            ));
        }
        let bucket = self.add_bucket(plan_id, name);
        self.finish(Op::CreateBucket, bucket)
    }

    async fn list_plan_buckets(&self, plan_id: &str) -> Result<Vec<RemoteBucket>, GatewayError> {
        self.begin(Call::ListPlanBuckets(plan_id.to_string()))?;
        self.simulate_latency().await;
        let buckets = self
            .state()
            .buckets
            .iter()
            .filter(|b| b.plan_id == plan_id)
            .cloned()
            .collect();
        self.finish(Op::ListPlanBuckets, buckets)
    }

    async fn create_task(&self, task: &NewTask) -> Result<RemoteTask, GatewayError> {
        self.begin(Call::CreateTask {
            bucket_id: task.bucket_id.clone(),
            title: task.title.clone(),
        })?;
        {
            let mut state = self.state();
            state.in_flight_creates += 1;
            state.max_in_flight_creates = state.max_in_flight_creates.max(state.in_flight_creates);
        }
        self.simulate_latency().await;

        let created = {
            let mut state = self.state();
            state.in_flight_creates -= 1;
            if !state.buckets.iter().any(|b| b.id == task.bucket_id) {
                return Err(not_found("bucket", &task.bucket_id));
            }
            let remote = RemoteTask {
                id: state.next_id("task"),
                plan_id: task.plan_id.clone(),
                bucket_id: Some(task.bucket_id.clone()),
                title: task.title.clone(),
                percent_complete: Some(0),
                due_date_time: task.due,
                etag: Some(state.next_etag()),
            };
            state.tasks.push(remote.clone());
            state.successful_creates += 1;
            if let Some((after, token)) = &state.cancel_after_creates {
                if state.successful_creates >= *after {
                    token.cancel();
                }
            }
            remote
        };
        self.finish(Op::CreateTask, created)
    }

    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, GatewayError> {
        self.begin(Call::GetTask(task_id.to_string()))?;
        self.simulate_latency().await;
        let task = self
            .task(task_id)
            .ok_or_else(|| not_found("task", task_id))?;
        self.finish(Op::GetTask, task)
    }

    async fn list_bucket_tasks(&self, bucket_id: &str) -> Result<Vec<RemoteTask>, GatewayError> {
        self.begin(Call::ListBucketTasks(bucket_id.to_string()))?;
        self.simulate_latency().await;
        let tasks = self.tasks_in(bucket_id);
        self.finish(Op::ListBucketTasks, tasks)
    }

    async fn update_task_completion(
        &self,
        task_id: &str,
        etag: Option<&str>,
        percent: u8,
    ) -> Result<(), GatewayError> {
        self.begin(Call::UpdateTaskCompletion {
            task_id: task_id.to_string(),
            percent,
        })?;
        self.simulate_latency().await;
        if percent > 100 {
            return Err(GatewayError::remote(
                ErrorKind::Fatal,
                format!("percent complete must be 0..=100, got {percent}"),
            ));
        }
        {
            let mut state = self.state();
            let fresh = state.next_etag();
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| not_found("task", task_id))?;
            if task.etag.as_deref() != etag {
                return Err(GatewayError::StaleVersion {
                    task_id: task_id.to_string(),
                });
            }
            task.percent_complete = Some(percent);
            task.etag = Some(fresh);
        }
        self.finish(Op::UpdateTaskCompletion, ())
    }

    async fn list_sites(&self) -> Result<Vec<Site>, GatewayError> {
        self.begin(Call::ListSites)?;
        self.simulate_latency().await;
        let sites = self.state().sites.clone();
        self.finish(Op::ListSites, sites)
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// [`TextGenerator`] that returns queued responses in order and records the
/// prompts it was given. Returns `EmptyResponse` once the queue runs dry.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, err: GenerateError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerateError::EmptyResponse))
    }
}
